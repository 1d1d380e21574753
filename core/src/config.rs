use crate::error::{IndexError, Result};
use crate::weight::WeightScheme;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TABLE_SLOTS: usize = 20_000;
pub const DEFAULT_MIN_TOKEN_LEN: usize = 2;

/// Knobs for one index build. Recorded in `meta.json` so a reader can tell
/// how the artifacts were produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub table_slots: usize,
    pub weight: WeightScheme,
    pub filter: FilterConfig,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { table_slots: DEFAULT_TABLE_SLOTS, weight: WeightScheme::default(), filter: FilterConfig::default() }
    }
}

impl IndexConfig {
    pub fn validate(&self) -> Result<()> {
        if self.table_slots == 0 {
            return Err(IndexError::InvalidConfig("table_slots must be at least 1".into()));
        }
        self.weight.validate()
    }
}

/// Tokenizer-side filtering. Applied when documents are tokenized and,
/// optionally, again while aggregating pre-tokenized files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub min_len: usize,
    pub reject_numeric: bool,
    pub stop_words: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self { min_len: DEFAULT_MIN_TOKEN_LEN, reject_numeric: true, stop_words: Vec::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_slots_rejected() {
        let cfg = IndexConfig { table_slots: 0, ..IndexConfig::default() };
        assert!(matches!(cfg.validate(), Err(IndexError::InvalidConfig(_))));
        assert!(IndexConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: IndexConfig = serde_json::from_str(r#"{"table_slots": 3}"#).unwrap();
        assert_eq!(cfg.table_slots, 3);
        assert_eq!(cfg.weight, WeightScheme::default());
        assert_eq!(cfg.filter.min_len, 2);
    }
}

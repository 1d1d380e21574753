use crate::error::{IndexError, Result};
use crate::postings::{PostingRecord, PostingStore, ValueKind};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

/// `clamp(round(frequency * scale / doc_length), 0, max)`.
///
/// The defaults (100, 99) keep every weight within two decimal digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightScheme {
    pub scale: u32,
    pub max: u32,
}

impl Default for WeightScheme {
    fn default() -> Self { Self { scale: 100, max: 99 } }
}

impl WeightScheme {
    pub fn validate(&self) -> Result<()> {
        if self.scale == 0 {
            return Err(IndexError::InvalidConfig("weight scale must be positive".into()));
        }
        Ok(())
    }

    /// Integer rounding, halves to the nearest even value. A zero length counts as one.
    pub fn weight(&self, frequency: u32, doc_length: u64) -> u32 {
        let len = u128::from(doc_length.max(1));
        let scaled = u128::from(frequency) * u128::from(self.scale);
        let (quot, rem) = (scaled / len, scaled % len);
        let rounded = match (2 * rem).cmp(&len) {
            Ordering::Less => quot,
            Ordering::Greater => quot + 1,
            Ordering::Equal => quot + (quot & 1),
        };
        rounded.min(u128::from(self.max)) as u32
    }

    /// Rewrite frequencies into weights. Which documents a token points to is untouched.
    pub fn apply(&self, store: PostingStore<String>, doc_lengths: &BTreeMap<String, u64>) -> PostingStore<String> {
        if store.kind() == ValueKind::Weight {
            tracing::warn!("posting store already weighted; leaving it unchanged");
            return store;
        }
        let mut unknown: HashSet<String> = HashSet::new();
        let records: Vec<PostingRecord<String>> = store
            .into_records()
            .into_iter()
            .map(|rec| {
                let len = match doc_lengths.get(&rec.doc) {
                    Some(&len) => len,
                    None => {
                        if unknown.insert(rec.doc.clone()) {
                            tracing::warn!(doc = %rec.doc, "no document length recorded; using 1");
                        }
                        1
                    }
                };
                PostingRecord { value: self.weight(rec.value, len), doc: rec.doc }
            })
            .collect();
        tracing::info!(num_postings = records.len(), scale = self.scale, max = self.max, "postings weighted");
        PostingStore::from_records(records, ValueKind::Weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_and_clamps() {
        let w = WeightScheme::default();
        assert_eq!(w.weight(3, 4), 75);
        assert_eq!(w.weight(1, 1), 99);
        assert_eq!(w.weight(1, 300), 0);
        assert_eq!(w.weight(0, 10), 0);
    }

    #[test]
    fn halves_round_to_even() {
        let w = WeightScheme::default();
        assert_eq!(w.weight(1, 8), 12); // 12.5
        assert_eq!(w.weight(3, 8), 38); // 37.5
        assert_eq!(w.weight(5, 8), 62); // 62.5
        assert_eq!(w.weight(1, 200), 0); // 0.5
        assert_eq!(w.weight(3, 200), 2); // 1.5
    }

    #[test]
    fn zero_length_treated_as_one() {
        let w = WeightScheme { scale: 10, max: 1000 };
        assert_eq!(w.weight(7, 0), w.weight(7, 1));
        assert_eq!(w.weight(7, 0), 70);
    }

    #[test]
    fn monotone_in_frequency_and_bounded() {
        let w = WeightScheme::default();
        for len in [1u64, 2, 3, 7, 40, 999] {
            let mut last = 0;
            for freq in 0..=(len as u32 * 2) {
                let x = w.weight(freq, len);
                assert!(x <= 99);
                assert!(x >= last);
                last = x;
            }
        }
    }

    #[test]
    fn apply_keeps_documents() {
        let store = PostingStore::from_records(
            vec![
                PostingRecord { doc: "a.html".to_string(), value: 3 },
                PostingRecord { doc: "ghost.html".to_string(), value: 1 },
            ],
            ValueKind::Frequency,
        );
        let lengths = BTreeMap::from([("a.html".to_string(), 4u64)]);
        let weighted = WeightScheme::default().apply(store, &lengths);
        assert_eq!(weighted.kind(), ValueKind::Weight);
        let vals: Vec<(&str, u32)> = weighted.records().iter().map(|r| (r.doc.as_str(), r.value)).collect();
        assert_eq!(vals, vec![("a.html", 75), ("ghost.html", 99)]);
    }
}

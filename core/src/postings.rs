use crate::aggregate::TermMap;
use crate::dictionary::{Dictionary, DictionaryEntry};
use serde::{Deserialize, Serialize};

/// What the `value` column of a posting store holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueKind {
    Frequency,
    Weight,
}

impl ValueKind {
    pub fn column_name(self) -> &'static str {
        match self {
            ValueKind::Frequency => "frequency",
            ValueKind::Weight => "weight",
        }
    }

    pub fn from_column_name(name: &str) -> Option<Self> {
        match name.trim() {
            "frequency" => Some(ValueKind::Frequency),
            "weight" => Some(ValueKind::Weight),
            _ => None,
        }
    }
}

/// One (document, value) association. `D` is the document name before the
/// document index stage and a `DocId` after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingRecord<D> {
    pub doc: D,
    pub value: u32,
}

/// Flat posting records grouped by token in dictionary order. A token's run is
/// addressed only by its dictionary entry's `(posting_offset, doc_count)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingStore<D> {
    records: Vec<PostingRecord<D>>,
    kind: ValueKind,
}

impl PostingStore<String> {
    /// Lay out frequencies for every dictionary entry, documents in filename order.
    pub fn build(dictionary: &Dictionary, terms: &TermMap) -> Self {
        let mut records = Vec::with_capacity(dictionary.posting_len());
        for entry in dictionary.entries() {
            if let Some(docs) = terms.get(&entry.token) {
                debug_assert_eq!(docs.len(), entry.doc_count as usize);
                records.extend(docs.iter().map(|(doc, &freq)| PostingRecord { doc: doc.clone(), value: freq }));
            }
        }
        tracing::debug!(num_postings = records.len(), "posting store laid out");
        Self { records, kind: ValueKind::Frequency }
    }
}

impl<D> PostingStore<D> {
    pub fn from_records(records: Vec<PostingRecord<D>>, kind: ValueKind) -> Self { Self { records, kind } }

    pub fn records(&self) -> &[PostingRecord<D>] { &self.records }

    pub fn into_records(self) -> Vec<PostingRecord<D>> { self.records }

    pub fn kind(&self) -> ValueKind { self.kind }

    pub fn len(&self) -> usize { self.records.len() }

    pub fn is_empty(&self) -> bool { self.records.is_empty() }

    /// The contiguous run for `entry`. Empty when the range does not fit the
    /// store, e.g. a dictionary paired with the wrong posting file.
    pub fn run(&self, entry: &DictionaryEntry) -> &[PostingRecord<D>] {
        self.records.get(entry.posting_range()).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn runs_follow_dictionary_offsets() {
        let mut terms = TermMap::new();
        terms.insert("dog".into(), BTreeMap::from([("b.html".to_string(), 2)]));
        terms.insert("cat".into(), BTreeMap::from([("b.html".to_string(), 1), ("a.html".to_string(), 3)]));
        let dict = Dictionary::build(&terms);
        let store = PostingStore::build(&dict, &terms);
        assert_eq!(store.len(), dict.posting_len());
        let cat = store.run(dict.get("cat").unwrap());
        assert_eq!(cat, &[PostingRecord { doc: "a.html".to_string(), value: 3 }, PostingRecord { doc: "b.html".to_string(), value: 1 }]);
        let dog = store.run(dict.get("dog").unwrap());
        assert_eq!(dog, &[PostingRecord { doc: "b.html".to_string(), value: 2 }]);
    }

    #[test]
    fn out_of_range_run_is_empty() {
        let store: PostingStore<u32> = PostingStore::from_records(vec![PostingRecord { doc: 1, value: 1 }], ValueKind::Weight);
        let entry = DictionaryEntry { token: "x".into(), total_frequency: 3, doc_count: 3, posting_offset: 0 };
        assert!(store.run(&entry).is_empty());
    }
}

use crate::aggregate::TermMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    pub token: String,
    pub total_frequency: u64,
    pub doc_count: u32,
    /// Index of this token's first record in the posting store.
    pub posting_offset: usize,
}

impl DictionaryEntry {
    pub fn posting_range(&self) -> std::ops::Range<usize> {
        self.posting_offset..self.posting_offset + self.doc_count as usize
    }
}

/// Case-insensitive order with raw byte order as the tie breaker.
pub fn token_order(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
}

/// Unique tokens in `token_order`, each carrying the offset of its posting run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dictionary {
    entries: Vec<DictionaryEntry>,
}

impl Dictionary {
    pub fn build(terms: &TermMap) -> Self {
        let mut tokens: Vec<&String> = terms.keys().collect();
        tokens.sort_by(|a, b| token_order(a, b));

        let mut offset = 0usize;
        let mut entries = Vec::with_capacity(tokens.len());
        for token in tokens {
            let docs = &terms[token];
            let doc_count = docs.len() as u32;
            entries.push(DictionaryEntry {
                token: token.clone(),
                total_frequency: docs.values().map(|&f| u64::from(f)).sum(),
                doc_count,
                posting_offset: offset,
            });
            offset += doc_count as usize;
        }
        tracing::info!(num_terms = entries.len(), num_postings = offset, "dictionary built");
        Self { entries }
    }

    /// Rebuild from entries read back from disk. Offsets are recomputed from
    /// `doc_count` in the given order, so a stale offset column cannot break
    /// the partition.
    pub fn from_entries(mut entries: Vec<DictionaryEntry>) -> Self {
        let mut offset = 0usize;
        for e in entries.iter_mut() {
            e.posting_offset = offset;
            offset += e.doc_count as usize;
        }
        Self { entries }
    }

    /// Keep the offsets the entries already carry. Runs must be in order and
    /// may leave gaps (a dropped entry's records stay in the store) but must
    /// not overlap. None if they do.
    pub fn with_recorded_offsets(entries: Vec<DictionaryEntry>) -> Option<Self> {
        let mut next = 0usize;
        for e in &entries {
            if e.posting_offset < next { return None; }
            next = e.posting_offset + e.doc_count as usize;
        }
        Some(Self { entries })
    }

    pub fn entries(&self) -> &[DictionaryEntry] { &self.entries }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Total posting records addressed by this dictionary.
    pub fn posting_len(&self) -> usize {
        self.entries.last().map_or(0, |e| e.posting_offset + e.doc_count as usize)
    }

    pub fn get(&self, token: &str) -> Option<&DictionaryEntry> {
        self.entries
            .binary_search_by(|e| token_order(&e.token, token))
            .ok()
            .map(|i| &self.entries[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn terms(pairs: Vec<(&str, Vec<(&str, u32)>)>) -> TermMap {
        pairs
            .iter()
            .map(|(t, docs)| (t.to_string(), docs.iter().map(|(d, f)| (d.to_string(), *f)).collect::<BTreeMap<_, _>>()))
            .collect()
    }

    #[test]
    fn offsets_are_prefix_sums() {
        let t = terms(vec![
            ("dog", vec![("a.html", 1)]),
            ("cat", vec![("a.html", 3), ("b.html", 1)]),
            ("Bird", vec![("b.html", 2), ("c.html", 1), ("a.html", 1)]),
        ]);
        let dict = Dictionary::build(&t);
        let tokens: Vec<&str> = dict.entries().iter().map(|e| e.token.as_str()).collect();
        assert_eq!(tokens, vec!["Bird", "cat", "dog"]);
        let offsets: Vec<usize> = dict.entries().iter().map(|e| e.posting_offset).collect();
        assert_eq!(offsets, vec![0, 3, 5]);
        assert_eq!(dict.posting_len(), 6);
        let cat = dict.get("cat").unwrap();
        assert_eq!((cat.total_frequency, cat.doc_count), (4, 2));
    }

    #[test]
    fn case_ties_broken_by_bytes() {
        let t = terms(vec![("apple", vec![("a.html", 1)]), ("Apple", vec![("a.html", 1)])]);
        let dict = Dictionary::build(&t);
        assert_eq!(dict.entries()[0].token, "Apple");
        assert_eq!(dict.entries()[1].token, "apple");
        assert!(dict.get("apple").is_some());
        assert!(dict.get("APPLE").is_none());
    }

    #[test]
    fn empty_corpus_gives_empty_dictionary() {
        let dict = Dictionary::build(&TermMap::new());
        assert!(dict.is_empty());
        assert_eq!(dict.posting_len(), 0);
    }

    #[test]
    fn recorded_offsets_may_gap_but_not_overlap() {
        let e = |token: &str, docs: u32, offset: usize| DictionaryEntry { token: token.into(), total_frequency: 1, doc_count: docs, posting_offset: offset };
        let dict = Dictionary::with_recorded_offsets(vec![e("ant", 1, 0), e("cat", 2, 2), e("dog", 1, 4)]).unwrap();
        assert_eq!(dict.get("cat").unwrap().posting_range(), 2..4);
        assert_eq!(dict.posting_len(), 5);
        assert!(Dictionary::with_recorded_offsets(vec![e("ant", 2, 0), e("cat", 1, 1)]).is_none());
    }
}

use crate::dictionary::Dictionary;
use crate::index::DocId;
use crate::postings::{PostingRecord, PostingStore};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Bijection between document names and 1-based ids, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentIndex {
    names: Vec<String>,
    #[serde(skip)]
    ids: HashMap<String, DocId>,
}

impl DocumentIndex {
    /// Number documents in the order they first appear in the store. Documents
    /// with no postings never get an id.
    pub fn assign(store: &PostingStore<String>) -> Self {
        let mut index = Self::default();
        for rec in store.records() {
            index.get_or_insert(&rec.doc);
        }
        tracing::info!(num_docs = index.len(), "document ids assigned");
        index
    }

    /// Restore from `(id, name)` pairs. Ids must run 1..=n with no gaps.
    pub fn from_pairs<I: IntoIterator<Item = (DocId, String)>>(pairs: I) -> Option<Self> {
        let mut pairs: Vec<(DocId, String)> = pairs.into_iter().collect();
        pairs.sort_by_key(|(id, _)| *id);
        let mut index = Self::default();
        for (expected, (id, name)) in (1..).zip(pairs) {
            if id != expected || index.ids.contains_key(&name) { return None; }
            index.get_or_insert(&name);
        }
        Some(index)
    }

    fn get_or_insert(&mut self, name: &str) -> DocId {
        if let Some(&id) = self.ids.get(name) { return id; }
        self.names.push(name.to_string());
        let id = self.names.len() as DocId;
        self.ids.insert(name.to_string(), id);
        id
    }

    /// Rewrite names into ids and order each token's run by id.
    pub fn reindex(&self, dictionary: &Dictionary, store: PostingStore<String>) -> PostingStore<DocId> {
        let kind = store.kind();
        let records = store.into_records();
        let mut out: Vec<PostingRecord<DocId>> = Vec::with_capacity(records.len());
        for entry in dictionary.entries() {
            let Some(run) = records.get(entry.posting_range()) else { continue };
            let start = out.len();
            out.extend(run.iter().filter_map(|rec| {
                self.id(&rec.doc).map(|id| PostingRecord { doc: id, value: rec.value })
            }));
            out[start..].sort_by_key(|rec| rec.doc);
        }
        PostingStore::from_records(out, kind)
    }

    pub fn id(&self, name: &str) -> Option<DocId> { self.ids.get(name).copied() }

    pub fn name(&self, id: DocId) -> Option<&str> {
        let idx = (id as usize).checked_sub(1)?;
        self.names.get(idx).map(String::as_str)
    }

    /// `(id, name)` in id order.
    pub fn iter(&self) -> impl Iterator<Item = (DocId, &str)> {
        self.names.iter().enumerate().map(|(i, n)| (i as DocId + 1, n.as_str()))
    }

    pub fn len(&self) -> usize { self.names.len() }

    pub fn is_empty(&self) -> bool { self.names.is_empty() }

    /// The name lookup is not serialized; call after deserializing a snapshot.
    pub(crate) fn rebuild_lookup(&mut self) {
        self.ids = self.iter().map(|(id, n)| (n.to_string(), id)).collect();
    }
}

use crate::config::DEFAULT_TABLE_SLOTS;
use crate::dictionary::DictionaryEntry;
use crate::doc_index::DocumentIndex;
use crate::error::Result;
use crate::hash_table::HashTable;
use crate::index::{DocId, Index};
use crate::persist::{self, IndexPaths};
use crate::postings::{PostingStore, ValueKind};
use crate::tokenizer::normalize_term;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub doc_id: Option<DocId>,
    pub document: String,
    pub value: u32,
}

#[derive(Debug)]
enum Postings {
    Named(PostingStore<String>),
    Indexed { store: PostingStore<DocId>, documents: DocumentIndex },
}

/// Read-only term lookup over finished artifacts. Holds no mutable state, so
/// one engine can serve any number of concurrent queries.
#[derive(Debug)]
pub struct SearchEngine {
    table: HashTable,
    postings: Postings,
}

impl SearchEngine {
    pub fn from_index(index: Index) -> Self {
        Self { table: index.table, postings: Postings::Indexed { store: index.postings, documents: index.documents } }
    }

    /// Engine over a table and document-name postings, before document ids exist.
    pub fn from_named(table: HashTable, store: PostingStore<String>) -> Self {
        Self { table, postings: Postings::Named(store) }
    }

    pub fn from_indexed(table: HashTable, store: PostingStore<DocId>, documents: DocumentIndex) -> Self {
        Self { table, postings: Postings::Indexed { store, documents } }
    }

    /// Open whatever the artifact directory holds: the snapshot if present,
    /// otherwise the text artifacts of the furthest stage that ran.
    pub fn open(paths: &IndexPaths) -> Result<Self> {
        if paths.snapshot().exists() {
            tracing::info!(path = %paths.snapshot().display(), "loading index snapshot");
            return Ok(Self::from_index(persist::load_snapshot(paths)?));
        }

        let table = if paths.hash_table().exists() {
            persist::load_hash_table(paths)?.value
        } else {
            persist::require(&paths.dictionary(), "search", "dictionary")?;
            let slots = persist::load_meta(paths).map(|m| m.config.table_slots).unwrap_or(DEFAULT_TABLE_SLOTS);
            HashTable::build(&persist::load_dictionary(paths)?.value, slots)?
        };

        if paths.postings_indexed().exists() && paths.documents().exists() {
            let store = persist::load_indexed_postings(&paths.postings_indexed())?.value;
            let documents = persist::load_documents(paths)?.value;
            return Ok(Self::from_indexed(table, store, documents));
        }
        let source = if paths.postings_weighted().exists() { paths.postings_weighted() } else { paths.postings() };
        persist::require(&source, "search", "dictionary")?;
        Ok(Self::from_named(table, persist::load_named_postings(&source)?.value))
    }

    /// Dictionary entry for `term` after normalization, scanning only its hash slot.
    pub fn lookup(&self, term: &str) -> Option<&DictionaryEntry> {
        let term = normalize_term(term);
        if term.is_empty() { return None; }
        self.table.lookup(&term)
    }

    /// Matching document names, sorted and deduplicated. A term that is not
    /// indexed yields an empty list.
    pub fn search(&self, term: &str) -> Vec<String> {
        self.search_hits(term).into_iter().map(|h| h.document).collect()
    }

    /// Like `search`, with the stored frequency or weight of each match.
    pub fn search_hits(&self, term: &str) -> Vec<SearchHit> {
        let Some(entry) = self.lookup(term) else { return Vec::new() };
        if entry.doc_count == 0 { return Vec::new(); }

        let mut hits: Vec<SearchHit> = match &self.postings {
            Postings::Named(store) => store
                .run(entry)
                .iter()
                .map(|r| SearchHit { doc_id: None, document: r.doc.clone(), value: r.value })
                .collect(),
            Postings::Indexed { store, documents } => store
                .run(entry)
                .iter()
                .filter_map(|r| {
                    let name = documents.name(r.doc)?;
                    Some(SearchHit { doc_id: Some(r.doc), document: name.to_string(), value: r.value })
                })
                .collect(),
        };
        hits.sort_by(|a, b| a.document.cmp(&b.document));
        hits.dedup_by(|a, b| a.document == b.document);
        hits
    }

    pub fn document(&self, doc_id: DocId) -> Option<&str> {
        match &self.postings {
            Postings::Indexed { documents, .. } => documents.name(doc_id),
            Postings::Named(_) => None,
        }
    }

    pub fn value_kind(&self) -> ValueKind {
        match &self.postings {
            Postings::Named(store) => store.kind(),
            Postings::Indexed { store, .. } => store.kind(),
        }
    }

    pub fn num_docs(&self) -> usize {
        match &self.postings {
            Postings::Indexed { documents, .. } => documents.len(),
            Postings::Named(store) => {
                let mut names: Vec<&str> = store.records().iter().map(|r| r.doc.as_str()).collect();
                names.sort_unstable();
                names.dedup();
                names.len()
            }
        }
    }

    pub fn table(&self) -> &HashTable { &self.table }
}

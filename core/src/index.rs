use crate::config::IndexConfig;
use crate::dictionary::Dictionary;
use crate::doc_index::DocumentIndex;
use crate::hash_table::{HashTable, TableStats};
use crate::postings::PostingStore;
use serde::{Deserialize, Serialize};

pub type DocId = u32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildStats {
    /// Documents that produced at least one posting.
    pub num_docs: usize,
    /// Documents seen by the aggregator, including ones left without postings.
    pub num_source_docs: usize,
    pub num_terms: usize,
    pub num_postings: usize,
    pub skipped_lines: usize,
    pub table: TableStats,
}

/// The finished artifacts of one build. Never mutated after construction;
/// a rebuild produces a new `Index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    pub config: IndexConfig,
    pub dictionary: Dictionary,
    pub table: HashTable,
    pub postings: PostingStore<DocId>,
    pub documents: DocumentIndex,
    pub stats: BuildStats,
}

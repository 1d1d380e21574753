pub mod aggregate;
pub mod config;
pub mod dictionary;
pub mod doc_index;
pub mod error;
pub mod hash_table;
pub mod index;
pub mod persist;
pub mod pipeline;
pub mod postings;
pub mod search;
pub mod tokenizer;
pub mod weight;

pub use aggregate::{Corpus, TermAggregator, TermMap};
pub use config::{FilterConfig, IndexConfig};
pub use dictionary::{Dictionary, DictionaryEntry};
pub use doc_index::DocumentIndex;
pub use error::{IndexError, Result};
pub use hash_table::{HashTable, Slot, TableStats};
pub use index::{BuildStats, DocId, Index};
pub use postings::{PostingRecord, PostingStore, ValueKind};
pub use search::{SearchEngine, SearchHit};
pub use weight::WeightScheme;

use std::path::PathBuf;

/// Errors surfaced by the indexing core.
///
/// Malformed records, lookup misses, empty documents and a crowded hash table
/// are not errors. They are handled where they occur and logged.
#[derive(thiserror::Error, Debug)]
pub enum IndexError {
    #[error("missing input {} for stage '{stage}'; run '{run_first}' first", .artifact.display())]
    MissingInput {
        artifact: PathBuf,
        stage: &'static str,
        run_first: &'static str,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("corrupt artifact {}: {reason}", .artifact.display())]
    Corrupt { artifact: PathBuf, reason: String },

    #[error("document '{document}' appears twice; second copy in {}", .artifact.display())]
    DuplicateDocument { document: String, artifact: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Snapshot(#[from] bincode::Error),

    #[error(transparent)]
    Meta(#[from] serde_json::Error),
}

pub type Result<T> = core::result::Result<T, IndexError>;

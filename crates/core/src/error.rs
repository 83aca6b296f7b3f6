//! Error taxonomy for the indexing engine.
//!
//! Per-file failures (`ReadFailure`, `FilteredOut`, `PolicyDenied`) are
//! recorded as data on the run (skip reasons, findings) rather than
//! propagated — only the variants below actually abort a run via `Err`.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, IndexError>;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unresolvable revision '{revision}' for {path}")]
    InvalidRevision { path: PathBuf, revision: String },

    #[error("snapshot failure: {0}")]
    SnapshotFailure(String),

    #[error("could not read '{path}' as text: {source}")]
    ReadFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("file filtered out: {reason}")]
    FilteredOut { reason: String },

    #[error("policy denied file '{path}': {message}")]
    PolicyDenied { path: String, message: String },

    #[error("tokenizer '{id}' unavailable: {reason}")]
    TokenizerUnavailable { id: String, reason: String },

    #[error("no index found for revision {revision:?} of {path}")]
    IndexMissing { path: PathBuf, revision: Option<String> },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("forge call failed: {0}")]
    ForgeFailure(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

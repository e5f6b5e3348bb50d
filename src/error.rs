//! Error taxonomy for the pipeline core.
//!
//! Batch ingestion treats [`Error::ParseFailure`] and
//! [`Error::EmptyDocument`] as per-document skips; everything else is
//! surfaced to the caller. Backend failures pass through unmodified;
//! retry policy lives with whoever owns the backend call.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The source tree could not be parsed as TEI XML.
    #[error("failed to parse {path}: {message}")]
    ParseFailure { path: PathBuf, message: String },

    /// The document has neither an abstract nor any section content.
    #[error("document '{paper_id}' has no retrievable text")]
    EmptyDocument { paper_id: String },

    /// Rejected before any work happens (e.g. overlap >= max words).
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Query addressed a collection that does not exist.
    #[error("collection '{collection}' not found under {persist_dir}")]
    NotFound {
        collection: String,
        persist_dir: PathBuf,
    },

    /// Embedding, generation, or index backend failure, unmodified.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        Error::Backend(e.into())
    }
}

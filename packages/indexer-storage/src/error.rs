use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("snapshot corrupt at {path}: {detail}")]
    SnapshotCorrupt { path: PathBuf, detail: String },

    #[error("adapter request failed: {detail}")]
    Adapter { detail: String },

    #[error("embedding provider failed for chunk {chunk_id}: {detail}")]
    Embedding { chunk_id: String, detail: String },

    #[error("vector store unreachable: {detail}")]
    Unreachable { detail: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

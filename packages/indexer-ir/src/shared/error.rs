use std::path::PathBuf;

use thiserror::Error;

/// The seven error kinds surfaced by the indexing core.
///
/// Each variant owns enough context for the orchestrator to build the
/// per-run failure summary without re-deriving anything from the file
/// system.
#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("no parser registered for extension {extension:?} ({file_path})")]
    UnsupportedLanguage {
        extension: String,
        file_path: PathBuf,
    },

    #[error("parse failed for {file_path}: {detail}")]
    ParseError { file_path: PathBuf, detail: String },

    #[error("hash mismatch for chunk {chunk_id}: snapshot integrity violated")]
    HashMismatch { chunk_id: String },

    #[error("embedding failed for chunk {chunk_id}: {detail}")]
    EmbeddingError { chunk_id: String, detail: String },

    #[error("store adapter failed: {detail}")]
    StoreError { detail: String },

    #[error("snapshot corrupt at {path}: {detail}")]
    SnapshotCorrupt { path: PathBuf, detail: String },

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl IndexerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IndexerError::UnsupportedLanguage { .. } => ErrorKind::UnsupportedLanguage,
            IndexerError::ParseError { .. } => ErrorKind::ParseError,
            IndexerError::HashMismatch { .. } => ErrorKind::HashMismatch,
            IndexerError::EmbeddingError { .. } => ErrorKind::EmbeddingError,
            IndexerError::StoreError { .. } => ErrorKind::StoreError,
            IndexerError::SnapshotCorrupt { .. } => ErrorKind::SnapshotCorrupt,
            IndexerError::ConfigError(_) => ErrorKind::ConfigError,
            IndexerError::Io(_) => ErrorKind::StoreError,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, IndexerError::ConfigError(_))
    }
}

/// Kind discriminator, independent of the error's owned context —
/// used for per-run summaries and "warn once per extension" bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    UnsupportedLanguage,
    ParseError,
    HashMismatch,
    EmbeddingError,
    StoreError,
    SnapshotCorrupt,
    ConfigError,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::UnsupportedLanguage => "unsupported_language",
            ErrorKind::ParseError => "parse_error",
            ErrorKind::HashMismatch => "hash_mismatch",
            ErrorKind::EmbeddingError => "embedding_error",
            ErrorKind::StoreError => "store_error",
            ErrorKind::SnapshotCorrupt => "snapshot_corrupt",
            ErrorKind::ConfigError => "config_error",
        };
        f.write_str(s)
    }
}

pub type Result<T> = std::result::Result<T, IndexerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        let err = IndexerError::UnsupportedLanguage {
            extension: "xyz".into(),
            file_path: PathBuf::from("/a/b.xyz"),
        };
        assert_eq!(err.kind(), ErrorKind::UnsupportedLanguage);
        assert!(!err.is_fatal());
    }

    #[test]
    fn config_error_is_fatal() {
        let err = IndexerError::ConfigError("missing EMBEDDING_API_KEY".into());
        assert!(err.is_fatal());
    }
}

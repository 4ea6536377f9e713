use thiserror::Error;

pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error(transparent)]
    Indexer(#[from] indexer_ir::IndexerError),

    #[error(transparent)]
    Store(#[from] indexer_storage::StoreError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OrchestratorError {
    pub fn config<E: std::fmt::Display>(e: E) -> Self {
        Self::Config(e.to_string())
    }

    /// Whether this run should exit fatally (2) rather than partially (1).
    /// Only configuration problems are fatal; every other failure is
    /// local to the file or chunk that produced it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, OrchestratorError::Config(_))
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            OrchestratorError::Config(_) => ErrorCategory::Permanent,
            OrchestratorError::Indexer(indexer_ir::IndexerError::ParseError { .. }) => {
                ErrorCategory::Permanent
            }
            OrchestratorError::Indexer(_) | OrchestratorError::Store(_) => ErrorCategory::Transient,
            OrchestratorError::Io(_) => ErrorCategory::Infrastructure,
            OrchestratorError::Serialization(_) => ErrorCategory::Permanent,
            OrchestratorError::Other(_) => ErrorCategory::Infrastructure,
        }
    }
}

/// Error category for retry logic and operator triage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorCategory {
    /// Retry automatically (timeout, connection failure).
    Transient,
    /// Don't retry (invalid input, parse error).
    Permanent,
    /// Alert the operator (disk full, unreachable config).
    Infrastructure,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Transient => "transient",
            ErrorCategory::Permanent => "permanent",
            ErrorCategory::Infrastructure => "infrastructure",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_is_fatal() {
        let err = OrchestratorError::config("missing VECTOR_STORE_URL");
        assert!(err.is_fatal());
        assert_eq!(err.category(), ErrorCategory::Permanent);
    }

    #[test]
    fn store_error_is_not_fatal() {
        let err = OrchestratorError::Store(indexer_storage::StoreError::Adapter {
            detail: "timeout".into(),
        });
        assert!(!err.is_fatal());
    }
}

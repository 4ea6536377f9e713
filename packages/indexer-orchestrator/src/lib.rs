pub mod change_detector;
pub mod cli;
pub mod config;
pub mod error;
pub mod graph_views;
pub mod logging;
pub mod orchestrator;
pub mod payload;

pub use change_detector::{
    classify_chunks, classify_files, ChunkClassification, Classification, FileClassification,
    FileObservation,
};
pub use config::{Config, EmbeddingProviderKind, ProjectConfig};
pub use error::{ErrorCategory, OrchestratorError, Result};
pub use graph_views::{EntityView, GraphPage, GraphViews};
pub use orchestrator::{FailureRecord, IndexerOrchestrator, RunMode, RunOptions, RunSummary};
pub use payload::{chunk_point, relation_point};

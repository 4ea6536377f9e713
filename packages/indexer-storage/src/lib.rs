//! indexer-storage — the per-run persisted state and the two external
//! adapters the indexing core drives: the embedding coordinator (C7) and
//! the vector store adapter (C8).
//!
//! - `error`      : `StoreError`, the crate's thiserror boundary type
//! - `snapshot`   : C5 — per-(collection, project) state store
//! - `vector_store` : C8 — typed key-value store over points
//! - `embedding`  : C7 — batching, retry, cost accounting

pub mod embedding;
pub mod error;
pub mod snapshot;
pub mod vector_store;

pub use embedding::{
    ApproximateTokenCounter, CostSummary, EmbeddedChunk, EmbeddingCoordinator, EmbeddingProvider,
    EmbeddingRequest, HttpEmbeddingProvider, TokenCounter,
};
pub use error::{Result, StoreError};
pub use snapshot::{ChunkRecord, FileRecord, Snapshot, SnapshotStore};
pub use vector_store::{
    Distance, HttpVectorStore, MemoryVectorStore, Point, PointFilter, ScrollPage, VectorStore,
};

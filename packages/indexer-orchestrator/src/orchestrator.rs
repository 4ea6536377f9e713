use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use indexer_ir::{ErrorKind, ParserRegistry};
use indexer_storage::{
    ChunkRecord, Distance, EmbeddedChunk, EmbeddingCoordinator, EmbeddingProvider, EmbeddingRequest,
    FileRecord, Point, PointFilter, Snapshot, SnapshotStore, VectorStore,
};
use tokio::sync::Semaphore;

use crate::change_detector::{classify_chunks, classify_files, ChunkClassification, FileObservation};
use crate::error::{OrchestratorError, Result};
use crate::payload::{chunk_point, relation_point};

/// Per-file work deadline. After this, the file is treated as a failure.
const FILE_DEADLINE: Duration = Duration::from_secs(60);
/// Bounded worker pool size for created/modified file processing.
const DEFAULT_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Full or incremental — determined per-file by the change detector
    /// against the snapshot, never chosen up front.
    Index,
    /// Erase every auto-generated (non-manual) point, keep manual records.
    Clear,
    /// Erase every point, including manual records.
    ClearAll,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub project_root: PathBuf,
    pub collection: String,
    pub mode: RunMode,
    pub force: bool,
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct FailureRecord {
    pub file_path: PathBuf,
    pub kind: ErrorKind,
    pub detail: String,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub files_indexed: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub chunks_upserted: usize,
    pub chunks_deleted: usize,
    pub chunks_unchanged: usize,
    pub tokens_used: u64,
    pub usd_estimate: f64,
    pub failures: Vec<FailureRecord>,
}

impl RunSummary {
    /// 0 success, 1 partial (some files failed). Fatal configuration
    /// failures short-circuit before a summary exists at all.
    pub fn exit_code(&self) -> i32 {
        if self.files_failed > 0 {
            1
        } else {
            0
        }
    }
}

pub struct IndexerOrchestrator<V: VectorStore, P: EmbeddingProvider> {
    registry: Arc<ParserRegistry>,
    vector_store: Arc<V>,
    embedding: Arc<EmbeddingCoordinator<P>>,
    snapshot_store: SnapshotStore,
    concurrency: usize,
}

impl<V: VectorStore + 'static, P: EmbeddingProvider + 'static> IndexerOrchestrator<V, P> {
    pub fn new(
        project_root: impl Into<PathBuf>,
        vector_store: Arc<V>,
        embedding: Arc<EmbeddingCoordinator<P>>,
    ) -> Self {
        let project_root = project_root.into();
        Self {
            registry: Arc::new(ParserRegistry::with_defaults()),
            vector_store,
            embedding,
            snapshot_store: SnapshotStore::new(project_root),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub async fn run(&self, options: RunOptions, vector_dim: usize) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        self.vector_store
            .ensure_collection(&options.collection, vector_dim, Distance::Cosine)
            .await?;

        let mut snapshot = self.snapshot_store.load_or_full_index(&options.collection);

        if matches!(options.mode, RunMode::Clear | RunMode::ClearAll) {
            let filter = match options.mode {
                RunMode::ClearAll => PointFilter::new(),
                _ => PointFilter::new().eq("is_manual", false),
            };
            self.vector_store
                .delete_by_filter(&options.collection, filter)
                .await?;
            snapshot = Snapshot::new(&options.collection);
            self.snapshot_store.save(&snapshot)?;
            return Ok(summary);
        }

        let observations = enumerate_files(
            &options.project_root,
            &options.include_globs,
            &options.exclude_globs,
        )?;
        let classification = classify_files(&observations, &snapshot, options.force);

        for path in &classification.deleted {
            let filter = PointFilter::new().eq("file_path", path.display().to_string());
            let removed = self.vector_store.delete_by_filter(&options.collection, filter).await?;
            summary.chunks_deleted += removed as usize;
            snapshot.remove_file(path);
        }
        summary.files_skipped += classification.unchanged.len();

        let mut warned_extensions: HashSet<String> = HashSet::new();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set = tokio::task::JoinSet::new();

        for path in classification
            .created
            .iter()
            .chain(classification.modified.iter())
            .cloned()
        {
            let extension = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default()
                .to_string();
            if self.registry.get_by_extension(&extension).is_none() {
                if warned_extensions.insert(extension.clone()) {
                    tracing::warn!(extension, "no parser registered, skipping extension this run");
                }
                summary.files_skipped += 1;
                continue;
            }

            let permit = semaphore.clone().acquire_owned().await.expect("semaphore open");

            let registry = self.registry.clone();
            let vector_store = self.vector_store.clone();
            let embedding = self.embedding.clone();
            let collection = options.collection.clone();
            let old_chunks = snapshot
                .files
                .get(&path)
                .map(|r| r.chunks.clone())
                .unwrap_or_default();

            join_set.spawn(async move {
                let _permit = permit;
                let outcome = tokio::time::timeout(
                    FILE_DEADLINE,
                    process_file(
                        registry,
                        vector_store,
                        embedding,
                        collection,
                        path.clone(),
                        old_chunks,
                    ),
                )
                .await;
                match outcome {
                    Ok(result) => (path, result),
                    Err(_) => (
                        path,
                        Err(OrchestratorError::config("file processing deadline exceeded")),
                    ),
                }
            });
        }

        while let Some(joined) = join_set.join_next().await {
            let (path, outcome) = joined.expect("task panicked");
            match outcome {
                Ok(file_summary) => {
                    summary.files_indexed += 1;
                    summary.chunks_upserted += file_summary.upserted;
                    summary.chunks_deleted += file_summary.removed;
                    summary.chunks_unchanged += file_summary.unchanged;
                    snapshot.record_entity_names(metadata_entity_names(&file_summary.chunk_records));
                    let metadata = current_file_metadata(&path)?;
                    snapshot.record_file(
                        path,
                        FileRecord {
                            mtime_unix: metadata.mtime_unix,
                            size_bytes: metadata.size_bytes,
                            chunks: file_summary.chunk_records,
                        },
                    );
                }
                Err(err) => {
                    summary.files_failed += 1;
                    summary.failures.push(FailureRecord {
                        file_path: path,
                        kind: classify_error_kind(&err),
                        detail: err.to_string(),
                    });
                }
            }
        }

        if summary.files_failed == 0 {
            let removed = self
                .orphan_sweep(&options.collection, &snapshot.known_entity_names)
                .await?;
            summary.chunks_deleted += removed;
        }

        let cost = self.embedding.cost_summary();
        summary.tokens_used = cost.tokens_used;
        summary.usd_estimate = cost.usd_estimate;

        self.snapshot_store.save(&snapshot)?;
        Ok(summary)
    }

    /// Scroll relations; drop any that reference an endpoint which used
    /// to resolve to a local entity and no longer does. `known_locally`
    /// is the collection's insert-only history of every entity name ever
    /// produced by a file here — an endpoint outside that set was never
    /// a local entity (an external/unresolved symbol such as a call into
    /// a third-party library) and is never flagged orphaned regardless
    /// of whether it currently resolves. An endpoint inside that set
    /// must currently resolve, or the relation is orphaned, even when
    /// its other endpoint still resolves fine.
    async fn orphan_sweep(&self, collection: &str, known_locally: &HashSet<String>) -> Result<usize> {
        let entity_names = self.collect_entity_names(collection).await?;
        let mut removed = 0;
        let mut cursor = None;
        loop {
            let page = self
                .vector_store
                .scroll(
                    collection,
                    PointFilter::new().eq("type", "relation"),
                    false,
                    cursor,
                    256,
                )
                .await?;
            if page.points.is_empty() {
                break;
            }
            let mut orphan_ids = Vec::new();
            for point in &page.points {
                let stale = |field: &str| {
                    point
                        .payload
                        .get(field)
                        .and_then(|v| v.as_str())
                        .map(|name| known_locally.contains(name) && !entity_names.contains(name))
                        .unwrap_or(false)
                };
                if stale("from_entity") || stale("to_entity") {
                    orphan_ids.push(point.id.clone());
                }
            }
            if !orphan_ids.is_empty() {
                removed += orphan_ids.len();
                self.vector_store.delete(collection, orphan_ids).await?;
            }
            cursor = page.next_cursor;
            if cursor.is_none() {
                break;
            }
        }
        Ok(removed)
    }

    async fn collect_entity_names(&self, collection: &str) -> Result<HashSet<String>> {
        let mut names = HashSet::new();
        let mut cursor = None;
        loop {
            let page = self
                .vector_store
                .scroll(
                    collection,
                    PointFilter::new().eq("type", "chunk").eq("chunk_type", "metadata"),
                    false,
                    cursor,
                    256,
                )
                .await?;
            if page.points.is_empty() {
                break;
            }
            for point in &page.points {
                if let Some(name) = point.payload.get("entity_name").and_then(|v| v.as_str()) {
                    names.insert(name.to_string());
                }
            }
            cursor = page.next_cursor;
            if cursor.is_none() {
                break;
            }
        }
        Ok(names)
    }
}

struct FileMetadata {
    mtime_unix: u64,
    size_bytes: u64,
}

fn current_file_metadata(path: &Path) -> Result<FileMetadata> {
    let metadata = std::fs::metadata(path)?;
    let mtime_unix = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0);
    Ok(FileMetadata {
        mtime_unix,
        size_bytes: metadata.len(),
    })
}

/// Entity names owned by a file's metadata chunks, derived from the
/// `{entity_name}::metadata` chunk-id convention (`Chunk::generate_id`).
fn metadata_entity_names(chunks: &[ChunkRecord]) -> Vec<String> {
    chunks
        .iter()
        .filter(|c| c.chunk_type == "metadata")
        .filter_map(|c| c.chunk_id.strip_suffix("::metadata").map(str::to_string))
        .collect()
}

struct FileProcessSummary {
    upserted: usize,
    removed: usize,
    unchanged: usize,
    chunk_records: Vec<ChunkRecord>,
}

/// Steps 5a-5d of the per-run algorithm for one created/modified file:
/// parse, diff against the prior snapshot entry, embed what changed,
/// and reconcile the store. Best-effort atomic — any failure here
/// leaves the caller's snapshot entry for this file untouched.
async fn process_file<V: VectorStore, P: EmbeddingProvider>(
    registry: Arc<ParserRegistry>,
    vector_store: Arc<V>,
    embedding: Arc<EmbeddingCoordinator<P>>,
    collection: String,
    path: PathBuf,
    old_chunks: Vec<ChunkRecord>,
) -> Result<FileProcessSummary> {
    let bytes = std::fs::read(&path)?;
    let extraction = registry.parse_file(&bytes, &path)?;

    let all_chunks: Vec<_> = extraction
        .metadata_chunks
        .iter()
        .chain(extraction.implementation_chunks.iter())
        .collect();
    let new_hashes: Vec<(String, String)> = all_chunks
        .iter()
        .map(|c| (c.id.clone(), c.content_hash.clone()))
        .collect();
    let diff = classify_chunks(&old_chunks, &new_hashes);

    let to_embed: Vec<EmbeddingRequest> = all_chunks
        .iter()
        .filter(|c| {
            matches!(
                diff.get(&c.id),
                Some(ChunkClassification::Added) | Some(ChunkClassification::Modified)
            )
        })
        .map(|c| EmbeddingRequest {
            chunk_id: c.id.clone(),
            content_hash: c.content_hash.clone(),
            text: c.content.clone(),
        })
        .collect();

    let embedded: Vec<EmbeddedChunk> = if to_embed.is_empty() {
        Vec::new()
    } else {
        embedding.embed_chunks(to_embed).await.map_err(OrchestratorError::from)?
    };
    let vectors: std::collections::HashMap<String, Vec<f32>> =
        embedded.into_iter().map(|e| (e.chunk_id, e.vector)).collect();

    let mut points_to_upsert = Vec::new();
    let mut unchanged = 0;
    for chunk in &all_chunks {
        match diff.get(&chunk.id) {
            Some(ChunkClassification::Added) | Some(ChunkClassification::Modified) => {
                let vector = vectors.get(&chunk.id).cloned().unwrap_or_default();
                points_to_upsert.push(chunk_point(chunk, vector));
            }
            Some(ChunkClassification::Unchanged) | None => unchanged += 1,
            Some(ChunkClassification::Removed) => {}
        }
    }
    let removed_ids: Vec<String> = diff
        .iter()
        .filter(|(_, class)| **class == ChunkClassification::Removed)
        .map(|(id, _)| id.clone())
        .collect();

    if !points_to_upsert.is_empty() {
        vector_store
            .upsert(&collection, points_to_upsert.clone())
            .await
            .map_err(OrchestratorError::from)?;
    }
    if !removed_ids.is_empty() {
        vector_store
            .delete(&collection, removed_ids.clone())
            .await
            .map_err(OrchestratorError::from)?;
    }

    // Relations are always fully rewritten for the file: drop every
    // prior relation it owned, then upsert the freshly emitted set.
    let filter = PointFilter::new()
        .eq("type", "relation")
        .eq("file_path", path.display().to_string());
    vector_store
        .delete_by_filter(&collection, filter)
        .await
        .map_err(OrchestratorError::from)?;
    if !extraction.relations.is_empty() {
        let relation_points: Vec<Point> = extraction.relations.iter().map(relation_point).collect();
        vector_store
            .upsert(&collection, relation_points)
            .await
            .map_err(OrchestratorError::from)?;
    }

    let chunk_records = all_chunks
        .iter()
        .filter(|c| !matches!(diff.get(&c.id), Some(ChunkClassification::Removed)))
        .map(|c| ChunkRecord {
            chunk_id: c.id.clone(),
            content_hash: c.content_hash.clone(),
            chunk_type: c.chunk_kind.as_str().to_string(),
        })
        .collect();

    Ok(FileProcessSummary {
        upserted: points_to_upsert.len(),
        removed: removed_ids.len(),
        unchanged,
        chunk_records,
    })
}

fn enumerate_files(
    project_root: &Path,
    include_globs: &[String],
    exclude_globs: &[String],
) -> Result<Vec<FileObservation>> {
    let include = build_glob_set(include_globs, &["**/*"])?;
    let exclude = build_glob_set(exclude_globs, &[".indexer/**", ".git/**", "logs/**"])?;

    let mut observations = Vec::new();
    for entry in walkdir::WalkDir::new(project_root)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(project_root).unwrap_or(entry.path());
        if exclude.is_match(relative) {
            continue;
        }
        if !include.is_match(relative) {
            continue;
        }
        let metadata = current_file_metadata(entry.path())?;
        observations.push(FileObservation {
            path: entry.path().to_path_buf(),
            mtime_unix: metadata.mtime_unix,
            size_bytes: metadata.size_bytes,
        });
    }
    Ok(observations)
}

fn build_glob_set(patterns: &[String], defaults: &[&str]) -> Result<globset::GlobSet> {
    let mut builder = globset::GlobSetBuilder::new();
    let patterns: Vec<String> = if patterns.is_empty() {
        defaults.iter().map(|s| s.to_string()).collect()
    } else {
        patterns.to_vec()
    };
    for pattern in patterns {
        let glob = globset::Glob::new(&pattern).map_err(|e| OrchestratorError::config(e.to_string()))?;
        builder.add(glob);
    }
    builder.build().map_err(|e| OrchestratorError::config(e.to_string()))
}

fn classify_error_kind(err: &OrchestratorError) -> ErrorKind {
    match err {
        OrchestratorError::Indexer(inner) => inner.kind(),
        OrchestratorError::Store(_) => ErrorKind::StoreError,
        OrchestratorError::Config(_) => ErrorKind::ConfigError,
        OrchestratorError::Io(_) => ErrorKind::StoreError,
        OrchestratorError::Serialization(_) => ErrorKind::SnapshotCorrupt,
        OrchestratorError::Other(_) => ErrorKind::StoreError,
    }
}

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// One chunk produced by a file, as recorded in the last successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub chunk_id: String,
    pub content_hash: String,
    pub chunk_type: String,
}

/// Per-file state recorded at the end of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub mtime_unix: u64,
    pub size_bytes: u64,
    pub chunks: Vec<ChunkRecord>,
}

/// Persistent per-(collection, project) record of the last successful
/// indexing run. The sole source of truth the change detector (C6)
/// compares the current file set against.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub collection: String,
    pub files: HashMap<PathBuf, FileRecord>,
    /// Every entity name this collection has ever produced locally.
    /// Insert-only: a name is never removed, even once its owning file
    /// is deleted, so the orphan sweep (C9) can tell "used to resolve
    /// locally, now gone" apart from "never a local entity at all".
    #[serde(default)]
    pub known_entity_names: HashSet<String>,
}

impl Snapshot {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            files: HashMap::new(),
            known_entity_names: HashSet::new(),
        }
    }

    pub fn record_file(&mut self, path: PathBuf, record: FileRecord) {
        self.files.insert(path, record);
    }

    pub fn remove_file(&mut self, path: &Path) -> Option<FileRecord> {
        self.files.remove(path)
    }

    pub fn record_entity_names(&mut self, names: impl IntoIterator<Item = String>) {
        self.known_entity_names.extend(names);
    }
}

/// Loads and atomically persists a `Snapshot` under
/// `<project>/.indexer/<collection>.snapshot.json`.
///
/// Missing file is treated as "full index" (an empty snapshot), not an
/// error. A corrupt file is quarantined by rename rather than deleted,
/// so an operator can inspect what went wrong, and indexing proceeds as
/// a full index.
pub struct SnapshotStore {
    project_root: PathBuf,
}

impl SnapshotStore {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
        }
    }

    fn state_dir(&self) -> PathBuf {
        self.project_root.join(".indexer")
    }

    fn snapshot_path(&self, collection: &str) -> PathBuf {
        self.state_dir().join(format!("{collection}.snapshot.json"))
    }

    pub fn load(&self, collection: &str) -> Result<Snapshot> {
        let path = self.snapshot_path(collection);
        if !path.exists() {
            return Ok(Snapshot::new(collection));
        }
        let raw = std::fs::read_to_string(&path)?;
        match serde_json::from_str::<Snapshot>(&raw) {
            Ok(snapshot) => Ok(snapshot),
            Err(err) => {
                self.quarantine(&path)?;
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "snapshot corrupt, quarantined; falling back to full index"
                );
                Err(StoreError::SnapshotCorrupt {
                    path,
                    detail: err.to_string(),
                })
            }
        }
    }

    /// Same as `load`, but never returns an error: a corrupt snapshot is
    /// quarantined and an empty snapshot is returned so the caller can
    /// proceed as a full index, per the state-store invariant.
    pub fn load_or_full_index(&self, collection: &str) -> Snapshot {
        match self.load(collection) {
            Ok(snapshot) => snapshot,
            Err(_) => Snapshot::new(collection),
        }
    }

    fn quarantine(&self, path: &Path) -> Result<()> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let quarantined = path.with_file_name(format!(
            "{}.corrupt.{timestamp}",
            path.file_name().and_then(|n| n.to_str()).unwrap_or("snapshot.json")
        ));
        std::fs::rename(path, quarantined)?;
        Ok(())
    }

    /// Writes the snapshot via write-temp-then-rename so a crash mid-run
    /// never leaves a partially-written snapshot on disk.
    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let dir = self.state_dir();
        std::fs::create_dir_all(&dir)?;
        let final_path = self.snapshot_path(&snapshot.collection);
        let tmp_path = final_path.with_extension("json.tmp");

        let body = serde_json::to_string(snapshot)?;
        std::fs::write(&tmp_path, body)?;
        std::fs::rename(&tmp_path, &final_path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_snapshot_is_empty_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        let snapshot = store.load("default").unwrap();
        assert!(snapshot.files.is_empty());
    }

    #[test]
    fn round_trip_preserves_chunk_hashes() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        let mut snapshot = Snapshot::new("default");
        snapshot.record_file(
            PathBuf::from("a.py"),
            FileRecord {
                mtime_unix: 100,
                size_bytes: 42,
                chunks: vec![ChunkRecord {
                    chunk_id: "a::f::metadata".into(),
                    content_hash: "deadbeef".into(),
                    chunk_type: "metadata".into(),
                }],
            },
        );
        store.save(&snapshot).unwrap();

        let reloaded = store.load("default").unwrap();
        assert_eq!(reloaded.files, snapshot.files);
    }

    #[test]
    fn known_entity_names_survive_file_removal() {
        let mut snapshot = Snapshot::new("default");
        snapshot.record_entity_names(["a::f".to_string(), "a::g".to_string()]);
        snapshot.remove_file(&PathBuf::from("a.py"));
        assert!(snapshot.known_entity_names.contains("a::f"));
        assert!(snapshot.known_entity_names.contains("a::g"));
    }

    #[test]
    fn corrupt_snapshot_is_quarantined_not_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        std::fs::create_dir_all(dir.path().join(".indexer")).unwrap();
        let path = store.snapshot_path("default");
        std::fs::write(&path, "not json").unwrap();

        let err = store.load("default").unwrap_err();
        assert!(matches!(err, StoreError::SnapshotCorrupt { .. }));
        assert!(!path.exists());
        let quarantined: Vec<_> = std::fs::read_dir(dir.path().join(".indexer"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".corrupt."))
            .collect();
        assert_eq!(quarantined.len(), 1);
    }
}

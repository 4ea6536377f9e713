use std::collections::HashMap;
use std::path::PathBuf;

use indexer_storage::{ChunkRecord, Snapshot};

/// What the current file-system state says about one file relative to
/// its prior snapshot entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClassification {
    Unchanged,
    Modified,
    Created,
    Deleted,
}

#[derive(Debug, Clone)]
pub struct FileObservation {
    pub path: PathBuf,
    pub mtime_unix: u64,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub created: Vec<PathBuf>,
    pub modified: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
    pub deleted: Vec<PathBuf>,
}

impl Classification {
    pub fn of(&self, path: &std::path::Path) -> Option<FileClassification> {
        if self.created.iter().any(|p| p == path) {
            Some(FileClassification::Created)
        } else if self.modified.iter().any(|p| p == path) {
            Some(FileClassification::Modified)
        } else if self.unchanged.iter().any(|p| p == path) {
            Some(FileClassification::Unchanged)
        } else if self.deleted.iter().any(|p| p == path) {
            Some(FileClassification::Deleted)
        } else {
            None
        }
    }
}

/// Compares the current file list against the prior snapshot (C6).
///
/// Tie-break: equal mtime but differing size is `modified`; both equal
/// is `unchanged` unless `force` is set.
pub fn classify_files(current: &[FileObservation], snapshot: &Snapshot, force: bool) -> Classification {
    let mut result = Classification::default();
    let mut seen = std::collections::HashSet::new();

    for observation in current {
        seen.insert(observation.path.clone());
        match snapshot.files.get(&observation.path) {
            None => result.created.push(observation.path.clone()),
            Some(record) => {
                let changed = observation.mtime_unix != record.mtime_unix
                    || observation.size_bytes != record.size_bytes;
                if force || changed {
                    result.modified.push(observation.path.clone());
                } else {
                    result.unchanged.push(observation.path.clone());
                }
            }
        }
    }

    for path in snapshot.files.keys() {
        if !seen.contains(path) {
            result.deleted.push(path.clone());
        }
    }

    result
}

/// Per-chunk classification within a modified or created file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkClassification {
    Added,
    Removed,
    Modified,
    Unchanged,
}

/// Diffs the chunks a reparse produced (`new`) against the snapshot's
/// prior record (`old`) for the same file, keyed by chunk id.
pub fn classify_chunks(
    old: &[ChunkRecord],
    new: &[(String, String)],
) -> HashMap<String, ChunkClassification> {
    let old_by_id: HashMap<&str, &str> = old
        .iter()
        .map(|r| (r.chunk_id.as_str(), r.content_hash.as_str()))
        .collect();
    let new_by_id: HashMap<&str, &str> =
        new.iter().map(|(id, hash)| (id.as_str(), hash.as_str())).collect();

    let mut result = HashMap::new();
    for (id, hash) in &new_by_id {
        match old_by_id.get(id) {
            None => {
                result.insert(id.to_string(), ChunkClassification::Added);
            }
            Some(old_hash) if old_hash != hash => {
                result.insert(id.to_string(), ChunkClassification::Modified);
            }
            Some(_) => {
                result.insert(id.to_string(), ChunkClassification::Unchanged);
            }
        }
    }
    for id in old_by_id.keys() {
        if !new_by_id.contains_key(id) {
            result.insert(id.to_string(), ChunkClassification::Removed);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexer_storage::FileRecord;

    fn snapshot_with(path: &str, mtime: u64, size: u64) -> Snapshot {
        let mut snapshot = Snapshot::new("default");
        snapshot.record_file(
            PathBuf::from(path),
            FileRecord {
                mtime_unix: mtime,
                size_bytes: size,
                chunks: vec![],
            },
        );
        snapshot
    }

    #[test]
    fn equal_mtime_and_size_is_unchanged() {
        let snapshot = snapshot_with("a.py", 100, 10);
        let current = vec![FileObservation {
            path: PathBuf::from("a.py"),
            mtime_unix: 100,
            size_bytes: 10,
        }];
        let classification = classify_files(&current, &snapshot, false);
        assert_eq!(classification.unchanged, vec![PathBuf::from("a.py")]);
    }

    #[test]
    fn force_overrides_unchanged() {
        let snapshot = snapshot_with("a.py", 100, 10);
        let current = vec![FileObservation {
            path: PathBuf::from("a.py"),
            mtime_unix: 100,
            size_bytes: 10,
        }];
        let classification = classify_files(&current, &snapshot, true);
        assert_eq!(classification.modified, vec![PathBuf::from("a.py")]);
    }

    #[test]
    fn equal_mtime_differing_size_is_modified() {
        let snapshot = snapshot_with("a.py", 100, 10);
        let current = vec![FileObservation {
            path: PathBuf::from("a.py"),
            mtime_unix: 100,
            size_bytes: 99,
        }];
        let classification = classify_files(&current, &snapshot, false);
        assert_eq!(classification.modified, vec![PathBuf::from("a.py")]);
    }

    #[test]
    fn missing_from_current_is_deleted() {
        let snapshot = snapshot_with("gone.py", 1, 1);
        let classification = classify_files(&[], &snapshot, false);
        assert_eq!(classification.deleted, vec![PathBuf::from("gone.py")]);
    }

    #[test]
    fn chunk_diff_detects_all_four_kinds() {
        let old = vec![
            ChunkRecord {
                chunk_id: "keep".into(),
                content_hash: "h1".into(),
                chunk_type: "metadata".into(),
            },
            ChunkRecord {
                chunk_id: "removed".into(),
                content_hash: "h2".into(),
                chunk_type: "metadata".into(),
            },
            ChunkRecord {
                chunk_id: "changed".into(),
                content_hash: "h3".into(),
                chunk_type: "metadata".into(),
            },
        ];
        let new = vec![
            ("keep".to_string(), "h1".to_string()),
            ("changed".to_string(), "h3-new".to_string()),
            ("added".to_string(), "h4".to_string()),
        ];
        let diff = classify_chunks(&old, &new);
        assert_eq!(diff["keep"], ChunkClassification::Unchanged);
        assert_eq!(diff["changed"], ChunkClassification::Modified);
        assert_eq!(diff["added"], ChunkClassification::Added);
        assert_eq!(diff["removed"], ChunkClassification::Removed);
    }
}

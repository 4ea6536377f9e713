use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::entity::EntityType;
use crate::hashing::content_hash;
use crate::shared::span::LineSpan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    Metadata,
    Implementation,
}

impl ChunkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Metadata => "metadata",
            ChunkKind::Implementation => "implementation",
        }
    }
}

/// The unit actually embedded and stored.
///
/// Every entity has exactly one metadata chunk; entities with a body
/// (functions, classes, methods, large docs) additionally get an
/// implementation chunk carrying the verbatim span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub chunk_kind: ChunkKind,
    pub content: String,
    pub content_hash: String,
    pub entity_type: EntityType,
    pub entity_name: String,
    pub file_path: Option<PathBuf>,
    pub line_span: LineSpan,
    pub semantic_metadata: Option<String>,
    pub has_implementation: bool,
}

impl Chunk {
    /// Stable id derived from `(entity_name, chunk_kind)` — never from
    /// content, so a content edit replaces rather than orphans the chunk.
    pub fn generate_id(entity_name: &str, chunk_kind: ChunkKind) -> String {
        format!("{entity_name}::{}", chunk_kind.as_str())
    }

    pub fn new(
        entity_name: impl Into<String>,
        chunk_kind: ChunkKind,
        content: impl Into<String>,
        entity_type: EntityType,
        file_path: PathBuf,
        line_span: LineSpan,
    ) -> Self {
        let entity_name = entity_name.into();
        let content = content.into();
        let hash = content_hash(&content);
        Self {
            id: Self::generate_id(&entity_name, chunk_kind),
            chunk_kind,
            content_hash: hash,
            content,
            entity_type,
            entity_name,
            file_path: Some(file_path),
            line_span,
            semantic_metadata: None,
            has_implementation: false,
        }
    }

    pub fn with_has_implementation(mut self, has_implementation: bool) -> Self {
        self.has_implementation = has_implementation;
        self
    }

    pub fn with_semantic_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.semantic_metadata = Some(metadata.into());
        self
    }

    pub fn is_manual(&self) -> bool {
        self.file_path.is_none()
    }

    /// True when `other`'s content differs from this chunk's stored hash —
    /// the sole basis for change detection (C1).
    pub fn is_modified(&self, new_content_hash: &str) -> bool {
        self.content_hash != new_content_hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(content: &str) -> Chunk {
        Chunk::new(
            "mod::foo",
            ChunkKind::Metadata,
            content,
            EntityType::Function,
            PathBuf::from("mod.py"),
            LineSpan::new(1, 3),
        )
    }

    #[test]
    fn id_is_entity_and_kind_only() {
        let a = sample("one");
        let b = sample("two");
        assert_eq!(a.id, b.id);
        assert_ne!(a.content_hash, b.content_hash);
    }

    #[test]
    fn is_modified_compares_hash() {
        let chunk = sample("hello");
        assert!(!chunk.is_modified(&chunk.content_hash));
        assert!(chunk.is_modified("deadbeef"));
    }

    #[test]
    fn manual_chunk_has_no_file_path() {
        let mut c = sample("x");
        c.file_path = None;
        assert!(c.is_manual());
    }
}

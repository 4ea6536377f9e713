use indexer_ir::{Chunk, Relation};
use indexer_storage::Point;
use serde_json::json;

/// Converts a domain `Chunk` into the vector-store point payload
/// contract. `is_manual` mirrors `file_path.is_none()` at the moment of
/// writing — kept as its own field so filter-scoped deletes (orphan
/// sweep, clear/clear-all) never need an "absent field" predicate.
pub fn chunk_point(chunk: &Chunk, vector: Vec<f32>) -> Point {
    let payload = json!({
        "type": "chunk",
        "chunk_type": chunk.chunk_kind.as_str(),
        "entity_name": chunk.entity_name,
        "entity_type": chunk.entity_type.as_str(),
        "file_path": chunk.file_path.as_ref().map(|p| p.display().to_string()),
        "line_start": chunk.line_span.start,
        "line_end": chunk.line_span.end,
        "content": chunk.content,
        "content_hash": chunk.content_hash,
        "has_implementation": chunk.has_implementation,
        "semantic_metadata": chunk.semantic_metadata,
        "is_manual": chunk.is_manual(),
    });
    Point {
        id: chunk.id.clone(),
        vector: Some(vector),
        payload,
    }
}

pub fn relation_point(relation: &Relation) -> Point {
    let id = format!(
        "relation::{}::{}::{}::{}",
        relation.from_entity,
        relation.to_entity,
        relation.relation_type.as_str(),
        relation.file_path.display()
    );
    let payload = json!({
        "type": "relation",
        "relation_type": relation.relation_type.as_str(),
        "from_entity": relation.from_entity,
        "to_entity": relation.to_entity,
        "file_path": relation.file_path.display().to_string(),
        "content": format!("{} {} {}", relation.from_entity, relation.relation_type.as_str(), relation.to_entity),
        "content_hash": "",
        "is_manual": false,
    });
    Point { id, vector: None, payload }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexer_ir::{ChunkKind, EntityType, LineSpan, RelationType};
    use std::path::PathBuf;

    #[test]
    fn chunk_point_carries_content_hash() {
        let chunk = Chunk::new(
            "a::f",
            ChunkKind::Metadata,
            "def f(): pass",
            EntityType::Function,
            PathBuf::from("a.py"),
            LineSpan::new(1, 1),
        );
        let point = chunk_point(&chunk, vec![0.0]);
        assert_eq!(point.payload["content_hash"], chunk.content_hash);
        assert_eq!(point.payload["is_manual"], false);
    }

    #[test]
    fn relation_point_id_is_stable_for_same_key() {
        let relation = Relation::new("a", "b", RelationType::Calls, PathBuf::from("a.py"));
        let a = relation_point(&relation);
        let b = relation_point(&relation);
        assert_eq!(a.id, b.id);
    }
}

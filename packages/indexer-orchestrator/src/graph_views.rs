use std::collections::HashMap;

use indexer_storage::{Point, PointFilter, VectorStore};
use serde::Serialize;

use crate::error::Result;

const DEFAULT_PAGE_SIZE: usize = 100;
const NEIGHBOR_SCAN_LIMIT: usize = 512;

/// One page of the global graph view: every chunk and relation in a
/// collection, optionally narrowed to an entity/relation type.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GraphPage {
    pub points: Vec<Point>,
    pub next_cursor: Option<String>,
}

/// An entity's metadata chunk plus its immediate relational neighborhood.
#[derive(Debug, Clone, Serialize)]
pub struct EntityView {
    pub metadata_chunk: Option<Point>,
    pub outgoing: Vec<Point>,
    pub incoming: Vec<Point>,
    /// Metadata chunks for entities one or two hops away, deduplicated.
    pub neighbor_chunks: Vec<Point>,
}

/// Read-only graph queries over a `VectorStore` (C10). Neither method
/// mutates the store; both page through `scroll` under the hood.
pub struct GraphViews<'a, V: VectorStore> {
    vector_store: &'a V,
}

impl<'a, V: VectorStore> GraphViews<'a, V> {
    pub fn new(vector_store: &'a V) -> Self {
        Self { vector_store }
    }

    /// Pages through every point in `collection`, optionally filtered by
    /// `point_type` (`"chunk"` or `"relation"`) and, for chunks, by
    /// `entity_type`.
    pub async fn global_view(
        &self,
        collection: &str,
        point_type: Option<&str>,
        entity_type: Option<&str>,
        cursor: Option<String>,
        limit: Option<usize>,
    ) -> Result<GraphPage> {
        let mut filter = PointFilter::new();
        if let Some(point_type) = point_type {
            filter = filter.eq("type", point_type);
        }
        if let Some(entity_type) = entity_type {
            filter = filter.eq("entity_type", entity_type);
        }
        let page = self
            .vector_store
            .scroll(
                collection,
                filter,
                false,
                cursor,
                limit.unwrap_or(DEFAULT_PAGE_SIZE),
            )
            .await?;
        Ok(GraphPage {
            points: page.points,
            next_cursor: page.next_cursor,
        })
    }

    /// Looks up `entity_name`'s metadata chunk, every relation touching
    /// it, and the metadata chunks of entities one or two hops away.
    /// `depth` is clamped to `1..=2`, matching the CLI's `--depth` flag.
    pub async fn entity_view(&self, collection: &str, entity_name: &str, depth: u8) -> Result<EntityView> {
        let metadata_chunk = self
            .find_metadata_chunk(collection, entity_name)
            .await?;

        let outgoing = self
            .scan_relations(collection, "from_entity", entity_name)
            .await?;
        let incoming = self
            .scan_relations(collection, "to_entity", entity_name)
            .await?;

        let mut depth1: Vec<String> = Vec::new();
        for relation in outgoing.iter().chain(incoming.iter()) {
            if let Some(name) = other_endpoint(relation, entity_name) {
                depth1.push(name);
            }
        }
        depth1.sort();
        depth1.dedup();

        let mut neighbor_names: std::collections::HashSet<String> = depth1.iter().cloned().collect();
        if depth >= 2 {
            for name in &depth1 {
                let their_outgoing = self.scan_relations(collection, "from_entity", name).await?;
                let their_incoming = self.scan_relations(collection, "to_entity", name).await?;
                for relation in their_outgoing.iter().chain(their_incoming.iter()) {
                    if let Some(other) = other_endpoint(relation, name) {
                        if other != entity_name {
                            neighbor_names.insert(other);
                        }
                    }
                }
            }
        }

        let mut neighbor_chunks = Vec::new();
        let mut seen_chunks: HashMap<String, ()> = HashMap::new();
        for name in neighbor_names {
            if let Some(chunk) = self.find_metadata_chunk(collection, &name).await? {
                if seen_chunks.insert(chunk.id.clone(), ()).is_none() {
                    neighbor_chunks.push(chunk);
                }
            }
        }

        Ok(EntityView {
            metadata_chunk,
            outgoing,
            incoming,
            neighbor_chunks,
        })
    }

    async fn find_metadata_chunk(&self, collection: &str, entity_name: &str) -> Result<Option<Point>> {
        let filter = PointFilter::new()
            .eq("type", "chunk")
            .eq("chunk_type", "metadata")
            .eq("entity_name", entity_name);
        let page = self.vector_store.scroll(collection, filter, false, None, 1).await?;
        Ok(page.points.into_iter().next())
    }

    /// Scans relation points for ones where `field` equals `value`,
    /// bounded to `NEIGHBOR_SCAN_LIMIT` points since relations have no
    /// secondary index on either endpoint.
    async fn scan_relations(&self, collection: &str, field: &str, value: &str) -> Result<Vec<Point>> {
        let filter = PointFilter::new().eq("type", "relation").eq(field, value);
        let page = self
            .vector_store
            .scroll(collection, filter, false, None, NEIGHBOR_SCAN_LIMIT)
            .await?;
        Ok(page.points)
    }
}

fn other_endpoint(relation: &Point, known: &str) -> Option<String> {
    let from = relation.payload.get("from_entity").and_then(|v| v.as_str())?;
    let to = relation.payload.get("to_entity").and_then(|v| v.as_str())?;
    if from == known {
        Some(to.to_string())
    } else if to == known {
        Some(from.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexer_storage::{Distance, MemoryVectorStore};
    use serde_json::json;

    fn chunk(id: &str, entity_name: &str) -> Point {
        Point {
            id: id.to_string(),
            vector: Some(vec![0.0]),
            payload: json!({
                "type": "chunk",
                "chunk_type": "metadata",
                "entity_name": entity_name,
                "entity_type": "function",
            }),
        }
    }

    fn relation(id: &str, from: &str, to: &str) -> Point {
        Point {
            id: id.to_string(),
            vector: None,
            payload: json!({
                "type": "relation",
                "relation_type": "calls",
                "from_entity": from,
                "to_entity": to,
            }),
        }
    }

    #[tokio::test]
    async fn entity_view_collects_neighbors_two_hops_out() {
        let store = MemoryVectorStore::new();
        store.ensure_collection("c", 1, Distance::Cosine).await.unwrap();
        store
            .upsert(
                "c",
                vec![
                    chunk("a::metadata", "a"),
                    chunk("b::metadata", "b"),
                    chunk("c::metadata", "c"),
                    relation("r1", "a", "b"),
                    relation("r2", "b", "c"),
                ],
            )
            .await
            .unwrap();

        let views = GraphViews::new(&store);
        let view = views.entity_view("c", "a", 2).await.unwrap();

        assert!(view.metadata_chunk.is_some());
        assert_eq!(view.outgoing.len(), 1);
        assert_eq!(view.incoming.len(), 0);
        let neighbor_names: Vec<&str> = view
            .neighbor_chunks
            .iter()
            .filter_map(|p| p.payload.get("entity_name").and_then(|v| v.as_str()))
            .collect();
        assert!(neighbor_names.contains(&"b"));
        assert!(neighbor_names.contains(&"c"));
    }

    #[tokio::test]
    async fn global_view_filters_by_type() {
        let store = MemoryVectorStore::new();
        store.ensure_collection("c", 1, Distance::Cosine).await.unwrap();
        store
            .upsert("c", vec![chunk("a::metadata", "a"), relation("r1", "a", "b")])
            .await
            .unwrap();

        let views = GraphViews::new(&store);
        let page = views
            .global_view("c", Some("relation"), None, None, None)
            .await
            .unwrap();
        assert_eq!(page.points.len(), 1);
        assert_eq!(page.points[0].payload["type"], "relation");
    }
}

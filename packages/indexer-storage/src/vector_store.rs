use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Distance {
    Cosine,
    Dot,
    Euclidean,
}

/// One stored record: an id, an optional vector (omitted on
/// metadata-only reads), and the payload schema from the spec's vector
/// store contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub id: String,
    pub vector: Option<Vec<f32>>,
    pub payload: Value,
}

/// A conjunctive payload predicate, e.g. `file_path == X AND type == chunk`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PointFilter {
    must_equal: Vec<(String, Value)>,
}

impl PointFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.must_equal.push((field.into(), value.into()));
        self
    }

    pub fn matches(&self, payload: &Value) -> bool {
        self.must_equal
            .iter()
            .all(|(field, expected)| payload.get(field) == Some(expected))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScrollPage {
    pub points: Vec<Point>,
    pub next_cursor: Option<String>,
}

/// Typed key-value store over points with payload filters (C8).
///
/// Implementations must tolerate concurrent writers from other
/// processes: upserts are idempotent by id, deletes are filter-scoped.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn ensure_collection(&self, name: &str, vector_dim: usize, distance: Distance) -> Result<()>;
    async fn upsert(&self, name: &str, points: Vec<Point>) -> Result<()>;
    async fn delete(&self, name: &str, ids: Vec<String>) -> Result<()>;
    async fn delete_by_filter(&self, name: &str, filter: PointFilter) -> Result<u64>;
    async fn scroll(
        &self,
        name: &str,
        filter: PointFilter,
        with_vector: bool,
        cursor: Option<String>,
        limit: usize,
    ) -> Result<ScrollPage>;
    async fn count(&self, name: &str, filter: PointFilter) -> Result<u64>;
}

#[derive(Default)]
struct Collection {
    vector_dim: usize,
    points: HashMap<String, Point>,
}

/// In-process adapter used by tests and the `--store memory` CLI mode.
#[derive(Default)]
pub struct MemoryVectorStore {
    collections: Mutex<HashMap<String, Collection>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn ensure_collection(&self, name: &str, vector_dim: usize, _distance: Distance) -> Result<()> {
        let mut collections = self.collections.lock().unwrap();
        collections
            .entry(name.to_string())
            .or_insert_with(|| Collection {
                vector_dim,
                points: HashMap::new(),
            });
        Ok(())
    }

    async fn upsert(&self, name: &str, points: Vec<Point>) -> Result<()> {
        let mut collections = self.collections.lock().unwrap();
        let collection = collections.entry(name.to_string()).or_default();
        for point in points {
            collection.points.insert(point.id.clone(), point);
        }
        Ok(())
    }

    async fn delete(&self, name: &str, ids: Vec<String>) -> Result<()> {
        let mut collections = self.collections.lock().unwrap();
        if let Some(collection) = collections.get_mut(name) {
            for id in ids {
                collection.points.remove(&id);
            }
        }
        Ok(())
    }

    async fn delete_by_filter(&self, name: &str, filter: PointFilter) -> Result<u64> {
        let mut collections = self.collections.lock().unwrap();
        let Some(collection) = collections.get_mut(name) else {
            return Ok(0);
        };
        let to_remove: Vec<String> = collection
            .points
            .values()
            .filter(|p| filter.matches(&p.payload))
            .map(|p| p.id.clone())
            .collect();
        let removed = to_remove.len() as u64;
        for id in to_remove {
            collection.points.remove(&id);
        }
        Ok(removed)
    }

    async fn scroll(
        &self,
        name: &str,
        filter: PointFilter,
        with_vector: bool,
        cursor: Option<String>,
        limit: usize,
    ) -> Result<ScrollPage> {
        let collections = self.collections.lock().unwrap();
        let Some(collection) = collections.get(name) else {
            return Ok(ScrollPage::default());
        };
        let mut matching: Vec<&Point> = collection
            .points
            .values()
            .filter(|p| filter.matches(&p.payload))
            .collect();
        matching.sort_by(|a, b| a.id.cmp(&b.id));

        let start = cursor
            .and_then(|c| matching.iter().position(|p| p.id == c).map(|i| i + 1))
            .unwrap_or(0);
        let page: Vec<Point> = matching
            .iter()
            .skip(start)
            .take(limit)
            .map(|p| {
                let mut point = (*p).clone();
                if !with_vector {
                    point.vector = None;
                }
                point
            })
            .collect();
        let next_cursor = if start + page.len() < matching.len() {
            page.last().map(|p| p.id.clone())
        } else {
            None
        };
        Ok(ScrollPage { points: page, next_cursor })
    }

    async fn count(&self, name: &str, filter: PointFilter) -> Result<u64> {
        let collections = self.collections.lock().unwrap();
        let Some(collection) = collections.get(name) else {
            return Ok(0);
        };
        Ok(collection
            .points
            .values()
            .filter(|p| filter.matches(&p.payload))
            .count() as u64)
    }
}

/// Qdrant-like REST adapter: `PUT /collections/{name}/points`,
/// `POST /collections/{name}/points/scroll`,
/// `POST /collections/{name}/points/delete`.
pub struct HttpVectorStore {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpVectorStore {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self.client.request(method, url);
        if let Some(key) = &self.api_key {
            builder = builder.header("api-key", key.clone());
        }
        builder
    }
}

#[async_trait]
impl VectorStore for HttpVectorStore {
    async fn ensure_collection(&self, name: &str, vector_dim: usize, distance: Distance) -> Result<()> {
        let body = serde_json::json!({ "vectors": { "size": vector_dim, "distance": distance } });
        let response = self
            .request(reqwest::Method::PUT, &format!("/collections/{name}"))
            .json(&body)
            .send()
            .await?;
        ensure_success(response).await
    }

    async fn upsert(&self, name: &str, points: Vec<Point>) -> Result<()> {
        let body = serde_json::json!({ "points": points });
        let response = self
            .request(reqwest::Method::PUT, &format!("/collections/{name}/points"))
            .json(&body)
            .send()
            .await?;
        ensure_success(response).await
    }

    async fn delete(&self, name: &str, ids: Vec<String>) -> Result<()> {
        let body = serde_json::json!({ "points": ids });
        let response = self
            .request(reqwest::Method::POST, &format!("/collections/{name}/points/delete"))
            .json(&body)
            .send()
            .await?;
        ensure_success(response).await
    }

    async fn delete_by_filter(&self, name: &str, filter: PointFilter) -> Result<u64> {
        let body = serde_json::json!({ "filter": filter });
        let response = self
            .request(reqwest::Method::POST, &format!("/collections/{name}/points/delete"))
            .json(&body)
            .send()
            .await?;
        let parsed: serde_json::Value = ensure_success_json(response).await?;
        Ok(parsed
            .get("result")
            .and_then(|r| r.get("deleted"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0))
    }

    async fn scroll(
        &self,
        name: &str,
        filter: PointFilter,
        with_vector: bool,
        cursor: Option<String>,
        limit: usize,
    ) -> Result<ScrollPage> {
        let body = serde_json::json!({
            "filter": filter,
            "with_vector": with_vector,
            "offset": cursor,
            "limit": limit,
        });
        let response = self
            .request(reqwest::Method::POST, &format!("/collections/{name}/points/scroll"))
            .json(&body)
            .send()
            .await?;
        let parsed: serde_json::Value = ensure_success_json(response).await?;
        let points: Vec<Point> = parsed
            .get("result")
            .and_then(|r| r.get("points"))
            .cloned()
            .map(serde_json::from_value)
            .transpose()?
            .unwrap_or_default();
        let next_cursor = parsed
            .get("result")
            .and_then(|r| r.get("next_page_offset"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        Ok(ScrollPage { points, next_cursor })
    }

    async fn count(&self, name: &str, filter: PointFilter) -> Result<u64> {
        let body = serde_json::json!({ "filter": filter });
        let response = self
            .request(reqwest::Method::POST, &format!("/collections/{name}/points/count"))
            .json(&body)
            .send()
            .await?;
        let parsed: serde_json::Value = ensure_success_json(response).await?;
        Ok(parsed
            .get("result")
            .and_then(|r| r.get("count"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0))
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<()> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(StoreError::Adapter {
            detail: format!("status {}", response.status()),
        })
    }
}

async fn ensure_success_json(response: reqwest::Response) -> Result<serde_json::Value> {
    if !response.status().is_success() {
        return Err(StoreError::Adapter {
            detail: format!("status {}", response.status()),
        });
    }
    Ok(response.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: &str, file_path: &str) -> Point {
        Point {
            id: id.to_string(),
            vector: Some(vec![0.1, 0.2]),
            payload: serde_json::json!({ "type": "chunk", "file_path": file_path }),
        }
    }

    #[tokio::test]
    async fn upsert_then_scroll_round_trips() {
        let store = MemoryVectorStore::new();
        store.ensure_collection("c", 2, Distance::Cosine).await.unwrap();
        store.upsert("c", vec![point("1", "a.py")]).await.unwrap();
        let page = store
            .scroll("c", PointFilter::new(), false, None, 10)
            .await
            .unwrap();
        assert_eq!(page.points.len(), 1);
        assert!(page.points[0].vector.is_none());
    }

    #[tokio::test]
    async fn delete_by_filter_scopes_to_file() {
        let store = MemoryVectorStore::new();
        store.ensure_collection("c", 2, Distance::Cosine).await.unwrap();
        store
            .upsert("c", vec![point("1", "a.py"), point("2", "b.py")])
            .await
            .unwrap();
        let removed = store
            .delete_by_filter("c", PointFilter::new().eq("file_path", "a.py"))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.count("c", PointFilter::new()).await.unwrap(), 1);
    }
}

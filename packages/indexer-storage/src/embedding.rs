use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;

use crate::error::{Result, StoreError};

/// A text chunk queued for embedding.
#[derive(Debug, Clone)]
pub struct EmbeddingRequest {
    pub chunk_id: String,
    pub content_hash: String,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk_id: String,
    pub vector: Vec<f32>,
}

/// Optional capability: an exact tokenizer. A character-approximation
/// implementation is always available as fallback.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
    /// (token budget per batch, item budget per batch)
    fn limits(&self) -> (usize, usize);
}

pub struct ApproximateTokenCounter {
    token_limit: usize,
    item_limit: usize,
}

impl ApproximateTokenCounter {
    pub fn new(token_limit: usize, item_limit: usize) -> Self {
        Self { token_limit, item_limit }
    }
}

impl TokenCounter for ApproximateTokenCounter {
    fn count(&self, text: &str) -> usize {
        (text.len() / 4).max(1)
    }

    fn limits(&self) -> (usize, usize) {
        (self.token_limit, self.item_limit)
    }
}

/// A pluggable embedding backend: text in, vector out.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;
    fn model(&self) -> &str;
    fn dimension(&self) -> usize;
    async fn embed_batch(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, String>;
}

/// USD per 1,000 tokens, keyed by `(provider, model)`. Unknown models
/// fall back to a conservative default and log a warning — cost
/// accounting is advisory, not authoritative.
static PRICE_TABLE: Lazy<HashMap<(&'static str, &'static str), f64>> = Lazy::new(|| {
    let mut table = HashMap::new();
    table.insert(("openai", "text-embedding-3-small"), 0.00002);
    table.insert(("openai", "text-embedding-3-large"), 0.00013);
    table.insert(("voyage", "voyage-code-2"), 0.00012);
    table.insert(("voyage", "voyage-2"), 0.0001);
    table
});

const DEFAULT_PRICE_PER_1K_TOKENS: f64 = 0.0001;

fn price_per_token(provider: &str, model: &str) -> f64 {
    let per_1k = PRICE_TABLE.get(&(provider, model)).copied().unwrap_or_else(|| {
        tracing::warn!(provider, model, "no price entry, using conservative default");
        DEFAULT_PRICE_PER_1K_TOKENS
    });
    per_1k / 1000.0
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CostSummary {
    pub tokens_used: u64,
    pub usd_estimate: f64,
}

struct CostAccumulator {
    tokens_used: u64,
    usd_estimate: f64,
}

/// Batches texts under provider limits, retries transient failures with
/// backoff, deduplicates identical content within a batch, and tracks
/// cumulative token/cost usage under a single mutex (C7).
pub struct EmbeddingCoordinator<P: EmbeddingProvider> {
    provider: P,
    token_counter: Box<dyn TokenCounter>,
    max_retries: u32,
    cost: Mutex<CostAccumulator>,
}

impl<P: EmbeddingProvider> EmbeddingCoordinator<P> {
    pub fn new(provider: P, token_counter: Box<dyn TokenCounter>, max_retries: u32) -> Self {
        Self {
            provider,
            token_counter,
            max_retries,
            cost: Mutex::new(CostAccumulator {
                tokens_used: 0,
                usd_estimate: 0.0,
            }),
        }
    }

    pub fn cost_summary(&self) -> CostSummary {
        let cost = self.cost.lock().unwrap();
        CostSummary {
            tokens_used: cost.tokens_used,
            usd_estimate: cost.usd_estimate,
        }
    }

    /// Embeds every request, deduplicating identical `content_hash`
    /// values within the call and fanning the resulting vector out to
    /// every chunk that shared it.
    pub async fn embed_chunks(&self, requests: Vec<EmbeddingRequest>) -> Result<Vec<EmbeddedChunk>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let mut first_occurrence: HashMap<String, usize> = HashMap::new();
        let mut unique: Vec<&EmbeddingRequest> = Vec::new();
        let mut duplicate_of: HashMap<String, usize> = HashMap::new();
        for request in &requests {
            match first_occurrence.get(&request.content_hash) {
                Some(&index) => {
                    duplicate_of.insert(request.chunk_id.clone(), index);
                }
                None => {
                    first_occurrence.insert(request.content_hash.clone(), unique.len());
                    unique.push(request);
                }
            }
        }

        let (token_budget, item_budget) = self.token_counter.limits();
        let batches = pack_batches(&unique, token_budget, item_budget, self.token_counter.as_ref());

        let mut vectors_by_chunk: HashMap<String, Vec<f32>> = HashMap::new();
        for batch in batches {
            let texts: Vec<String> = batch
                .iter()
                .map(|r| {
                    if self.token_counter.count(&r.text) > token_budget {
                        truncate_to_budget(&r.text, token_budget, self.token_counter.as_ref())
                    } else {
                        r.text.clone()
                    }
                })
                .collect();
            let tokens: usize = texts.iter().map(|t| self.token_counter.count(t)).sum();
            let vectors = self.embed_with_retry(&texts, &batch).await?;
            for (request, vector) in batch.iter().zip(vectors) {
                vectors_by_chunk.insert(request.chunk_id.clone(), vector);
            }

            let mut cost = self.cost.lock().unwrap();
            cost.tokens_used += tokens as u64;
            cost.usd_estimate +=
                tokens as f64 * price_per_token(self.provider.provider_name(), self.provider.model());
        }

        let mut out = Vec::with_capacity(requests.len());
        for request in &requests {
            let vector = if let Some(&source_index) = duplicate_of.get(&request.chunk_id) {
                vectors_by_chunk
                    .get(&unique[source_index].chunk_id)
                    .cloned()
            } else {
                vectors_by_chunk.get(&request.chunk_id).cloned()
            };
            let vector = vector.ok_or_else(|| StoreError::Embedding {
                chunk_id: request.chunk_id.clone(),
                detail: "no vector produced for chunk".into(),
            })?;
            out.push(EmbeddedChunk {
                chunk_id: request.chunk_id.clone(),
                vector,
            });
        }
        Ok(out)
    }

    async fn embed_with_retry(
        &self,
        texts: &[String],
        batch: &[&EmbeddingRequest],
    ) -> Result<Vec<Vec<f32>>> {
        let mut attempt = 0;
        loop {
            match self.provider.embed_batch(texts).await {
                Ok(vectors) => return Ok(vectors),
                Err(detail) if attempt < self.max_retries => {
                    attempt += 1;
                    let jitter_ms = 10 + (rand::random::<u64>() % 50);
                    let backoff = Duration::from_millis(2u64.pow(attempt) * 100 + jitter_ms);
                    tracing::warn!(attempt, %detail, "embedding call failed, retrying");
                    tokio::time::sleep(backoff).await;
                }
                Err(detail) => {
                    let offending = batch.first().map(|r| r.chunk_id.clone()).unwrap_or_default();
                    return Err(StoreError::Embedding {
                        chunk_id: offending,
                        detail,
                    });
                }
            }
        }
    }
}

/// Greedy-first batch packing under simultaneous token and item limits.
/// A single text that alone exceeds the token budget is sent as its own
/// batch; `embed_chunks` truncates its text to fit before the call goes
/// out, since packing only decides grouping, not content.
fn pack_batches<'a>(
    requests: &[&'a EmbeddingRequest],
    token_budget: usize,
    item_budget: usize,
    counter: &dyn TokenCounter,
) -> Vec<Vec<&'a EmbeddingRequest>> {
    let mut batches: Vec<Vec<&EmbeddingRequest>> = Vec::new();
    let mut current: Vec<&EmbeddingRequest> = Vec::new();
    let mut current_tokens = 0usize;

    for request in requests {
        let tokens = counter.count(&request.text);
        if tokens > token_budget {
            if !current.is_empty() {
                batches.push(std::mem::take(&mut current));
                current_tokens = 0;
            }
            batches.push(vec![*request]);
            continue;
        }
        if current.len() + 1 > item_budget || current_tokens + tokens > token_budget {
            batches.push(std::mem::take(&mut current));
            current_tokens = 0;
        }
        current.push(*request);
        current_tokens += tokens;
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

/// Binary-searches the longest character prefix of `text` whose token
/// count fits `budget`, per `counter`. Works for any counter, exact or
/// approximate, as long as its count is non-decreasing in text length.
fn truncate_to_budget(text: &str, budget: usize, counter: &dyn TokenCounter) -> String {
    if counter.count(text) <= budget {
        return text.to_string();
    }
    let boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).chain([text.len()]).collect();
    let mut lo = 0usize;
    let mut hi = boundaries.len() - 1;
    while lo < hi {
        let mid = lo + (hi - lo + 1) / 2;
        if counter.count(&text[..boundaries[mid]]) <= budget {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    text[..boundaries[lo]].to_string()
}

/// Calls a hosted embeddings endpoint over HTTP. OpenAI and Voyage both
/// speak the same `{ "input": [...], "model": "..." }` request shape and
/// return `{ "data": [{ "embedding": [...] }, ...] }`, so one client
/// covers both providers.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    provider_name: &'static str,
    model: String,
    dimension: usize,
    endpoint: String,
    api_key: String,
}

impl HttpEmbeddingProvider {
    pub fn openai(model: impl Into<String>, dimension: usize, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            provider_name: "openai",
            model: model.into(),
            dimension,
            endpoint: "https://api.openai.com/v1/embeddings".to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn voyage(model: impl Into<String>, dimension: usize, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            provider_name: "voyage",
            model: model.into(),
            dimension,
            endpoint: "https://api.voyageai.com/v1/embeddings".to_string(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    fn provider_name(&self) -> &'static str {
        self.provider_name
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, String> {
        let body = serde_json::json!({ "input": texts, "model": self.model });
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("embedding endpoint returned status {}", response.status()));
        }

        let parsed: serde_json::Value = response.json().await.map_err(|e| e.to_string())?;
        let entries = parsed
            .get("data")
            .and_then(|d| d.as_array())
            .ok_or_else(|| "embedding response missing data array".to_string())?;

        entries
            .iter()
            .map(|entry| {
                entry
                    .get("embedding")
                    .and_then(|e| e.as_array())
                    .map(|values| {
                        values
                            .iter()
                            .filter_map(|v| v.as_f64())
                            .map(|v| v as f32)
                            .collect()
                    })
                    .ok_or_else(|| "embedding entry missing embedding array".to_string())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubProvider {
        calls: AtomicUsize,
        fail_first: bool,
    }

    #[async_trait]
    impl EmbeddingProvider for StubProvider {
        fn provider_name(&self) -> &'static str {
            "openai"
        }
        fn model(&self) -> &str {
            "text-embedding-3-small"
        }
        fn dimension(&self) -> usize {
            3
        }
        async fn embed_batch(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && call == 0 {
                return Err("transient timeout".into());
            }
            Ok(texts.iter().map(|_| vec![0.0, 1.0, 2.0]).collect())
        }
    }

    fn request(chunk_id: &str, hash: &str, text: &str) -> EmbeddingRequest {
        EmbeddingRequest {
            chunk_id: chunk_id.into(),
            content_hash: hash.into(),
            text: text.into(),
        }
    }

    #[tokio::test]
    async fn dedups_identical_content_hash() {
        let provider = StubProvider {
            calls: AtomicUsize::new(0),
            fail_first: false,
        };
        let coordinator = EmbeddingCoordinator::new(
            provider,
            Box::new(ApproximateTokenCounter::new(8192, 96)),
            3,
        );
        let requests = vec![
            request("a::f::metadata", "hash1", "same content"),
            request("a::g::metadata", "hash1", "same content"),
        ];
        let embedded = coordinator.embed_chunks(requests).await.unwrap();
        assert_eq!(embedded.len(), 2);
        assert_eq!(coordinator.provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_failure() {
        let provider = StubProvider {
            calls: AtomicUsize::new(0),
            fail_first: true,
        };
        let coordinator = EmbeddingCoordinator::new(
            provider,
            Box::new(ApproximateTokenCounter::new(8192, 96)),
            3,
        );
        let result = coordinator
            .embed_chunks(vec![request("a::f::metadata", "hash1", "text")])
            .await;
        assert!(result.is_ok());
    }

    #[test]
    fn packs_under_item_budget() {
        let counter = ApproximateTokenCounter::new(1_000_000, 2);
        let requests: Vec<EmbeddingRequest> = (0..5)
            .map(|i| request(&format!("c{i}"), &format!("h{i}"), "x"))
            .collect();
        let refs: Vec<&EmbeddingRequest> = requests.iter().collect();
        let batches = pack_batches(&refs, 1_000_000, 2, &counter);
        assert!(batches.iter().all(|b| b.len() <= 2));
        assert_eq!(batches.iter().map(|b| b.len()).sum::<usize>(), 5);
    }

    #[test]
    fn truncate_to_budget_fits_exactly() {
        let counter = ApproximateTokenCounter::new(100, 1);
        let text = "x".repeat(1000);
        let truncated = truncate_to_budget(&text, 10, &counter);
        assert!(counter.count(&truncated) <= 10);
        assert!(truncated.len() < text.len());
    }

    struct RecordingProvider {
        seen_lengths: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl EmbeddingProvider for RecordingProvider {
        fn provider_name(&self) -> &'static str {
            "openai"
        }
        fn model(&self) -> &str {
            "text-embedding-3-small"
        }
        fn dimension(&self) -> usize {
            3
        }
        async fn embed_batch(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, String> {
            self.seen_lengths.lock().unwrap().extend(texts.iter().map(|t| t.len()));
            Ok(texts.iter().map(|_| vec![0.0, 1.0, 2.0]).collect())
        }
    }

    #[tokio::test]
    async fn oversized_request_is_truncated_before_it_is_sent() {
        let provider = RecordingProvider {
            seen_lengths: Mutex::new(Vec::new()),
        };
        let counter = ApproximateTokenCounter::new(10, 96);
        let coordinator = EmbeddingCoordinator::new(provider, Box::new(counter), 0);
        let oversized = "y".repeat(1000);
        coordinator
            .embed_chunks(vec![request("a::f::metadata", "hash1", &oversized)])
            .await
            .unwrap();
        let seen = coordinator.provider.seen_lengths.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0] < oversized.len());
    }
}

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    Openai,
    Voyage,
}

impl EmbeddingProviderKind {
    pub fn default_dimension(&self) -> usize {
        match self {
            EmbeddingProviderKind::Openai => 1536,
            EmbeddingProviderKind::Voyage => 512,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingProviderKind::Openai => "openai",
            EmbeddingProviderKind::Voyage => "voyage",
        }
    }
}

impl std::str::FromStr for EmbeddingProviderKind {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(EmbeddingProviderKind::Openai),
            "voyage" => Ok(EmbeddingProviderKind::Voyage),
            other => Err(OrchestratorError::config(format!(
                "unknown EMBEDDING_PROVIDER {other:?}, expected openai or voyage"
            ))),
        }
    }
}

/// Project-local overrides read from `<project>/.indexer/config.json`.
/// Absence of the file is not an error — defaults apply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl ProjectConfig {
    pub fn load(project_root: &Path) -> Result<Self> {
        let path = project_root.join(".indexer").join("config.json");
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)?;
        serde_json::from_str(&raw).map_err(OrchestratorError::from)
    }
}

/// Environment-derived configuration for a single run. Missing
/// credentials or an endpoint is a fatal `ConfigError` (exit 2).
#[derive(Debug, Clone)]
pub struct Config {
    pub embedding_provider: EmbeddingProviderKind,
    pub embedding_model: String,
    pub embedding_api_key: String,
    pub vector_store_url: String,
    pub vector_store_api_key: Option<String>,
    pub vector_dimension: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let embedding_provider: EmbeddingProviderKind = std::env::var("EMBEDDING_PROVIDER")
            .map_err(|_| OrchestratorError::config("EMBEDDING_PROVIDER is required"))?
            .parse()?;
        let embedding_model = std::env::var("EMBEDDING_MODEL")
            .unwrap_or_else(|_| default_model(embedding_provider).to_string());
        let embedding_api_key = std::env::var("EMBEDDING_API_KEY")
            .map_err(|_| OrchestratorError::config("EMBEDDING_API_KEY is required"))?;
        let vector_store_url = std::env::var("VECTOR_STORE_URL")
            .map_err(|_| OrchestratorError::config("VECTOR_STORE_URL is required"))?;
        let vector_store_api_key = std::env::var("VECTOR_STORE_API_KEY").ok();

        Ok(Self {
            vector_dimension: embedding_provider.default_dimension(),
            embedding_provider,
            embedding_model,
            embedding_api_key,
            vector_store_url,
            vector_store_api_key,
        })
    }

    /// An in-memory configuration useful for tests and the
    /// `--store memory` CLI mode; never reads the environment.
    pub fn for_memory_store() -> Self {
        Self {
            embedding_provider: EmbeddingProviderKind::Openai,
            embedding_model: default_model(EmbeddingProviderKind::Openai).to_string(),
            embedding_api_key: String::new(),
            vector_store_url: String::new(),
            vector_store_api_key: None,
            vector_dimension: EmbeddingProviderKind::Openai.default_dimension(),
        }
    }
}

fn default_model(provider: EmbeddingProviderKind) -> &'static str {
    match provider {
        EmbeddingProviderKind::Openai => "text-embedding-3-small",
        EmbeddingProviderKind::Voyage => "voyage-code-2",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_project_config_is_default_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProjectConfig::load(dir.path()).unwrap();
        assert!(config.include_globs.is_empty());
    }

    #[test]
    fn unknown_provider_name_is_config_error() {
        let err = "unknown".parse::<EmbeddingProviderKind>().unwrap_err();
        assert!(err.is_fatal());
    }
}

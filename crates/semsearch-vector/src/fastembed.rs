//! FastEmbed embedding provider.
//!
//! Wraps the `fastembed` crate to provide local embedding generation
//! via pre-trained models (e.g., AllMiniLM, BGE-small).
//!
//! Asymmetric models expect different prefixes for stored passages and for
//! queries; configure them with `document_prompt` and `query_prompt`.
//!
//! # Thread Safety
//!
//! `fastembed::TextEmbedding` needs `&mut self` to embed, so we wrap it in
//! `Arc<Mutex<>>` and use `tokio::task::spawn_blocking` for embedding calls.
//!
//! # Feature Gate
//!
//! This module requires the `vector-fastembed` feature.

use crate::embedding::EmbeddingProvider;
use crate::types::Vector;
use async_trait::async_trait;
use semsearch_core::{EmbeddingConfig, Error, Result};
use std::sync::{Arc, Mutex};

/// Map a model name string to a fastembed `EmbeddingModel` enum variant.
fn resolve_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" | "AllMiniLML6V2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" | "BGESmallENV15" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" | "BGEBaseENV15" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" | "BGELargeENV15" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        other => Err(Error::config(format!(
            "Unknown embedding model: '{other}'. Supported: all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5"
        ))),
    }
}

/// Prepend an optional prompt to a text.
fn with_prompt(prompt: Option<&str>, text: &str) -> String {
    match prompt {
        Some(prompt) => format!("{prompt}{text}"),
        None => text.to_string(),
    }
}

/// FastEmbed-based embedding provider.
///
/// Uses locally-downloaded transformer models for embedding generation.
/// The model is loaded once and reused for all subsequent calls.
///
/// # Supported Models
///
/// | Name | Dimension | Size |
/// |------|-----------|------|
/// | `all-minilm-l6-v2` | 384 | ~80MB |
/// | `bge-small-en-v1.5` | 384 | ~50MB |
/// | `bge-base-en-v1.5` | 768 | ~130MB |
/// | `bge-large-en-v1.5` | 1024 | ~335MB |
pub struct FastEmbedProvider {
    model: Arc<Mutex<fastembed::TextEmbedding>>,
    dimension: usize,
    model_name: String,
    document_prompt: Option<String>,
    query_prompt: Option<String>,
}

impl FastEmbedProvider {
    /// Create a new FastEmbed provider with the given model name.
    ///
    /// Downloads the model if not cached locally.
    ///
    /// # Arguments
    ///
    /// * `model_name` - Model identifier (e.g., "all-minilm-l6-v2")
    /// * `cache_path` - Optional directory for model file caching
    pub fn new(model_name: &str, cache_path: Option<&str>) -> Result<Self> {
        let model_enum = resolve_model(model_name)?;

        let mut init = fastembed::InitOptions::new(model_enum);
        if let Some(path) = cache_path {
            init = init.with_cache_dir(std::path::PathBuf::from(path));
        }

        let mut text_embedding = fastembed::TextEmbedding::try_new(init)
            .map_err(|e| Error::embedding(format!("Failed to initialize fastembed model: {e}")))?;

        // Probe dimension via a test embedding
        let probe = text_embedding
            .embed(vec!["dimension probe"], None)
            .map_err(|e| Error::embedding(format!("Failed to probe embedding dimension: {e}")))?;

        let dimension = probe
            .first()
            .map(|v| v.len())
            .ok_or_else(|| Error::embedding("Empty probe embedding"))?;

        Ok(Self {
            model: Arc::new(Mutex::new(text_embedding)),
            dimension,
            model_name: model_name.to_string(),
            document_prompt: None,
            query_prompt: None,
        })
    }

    /// Create a provider from the `embeddings` configuration section.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let provider = Self::new(&config.model, config.cache_path.as_deref())?;
        if config.dimension != 0 && config.dimension != provider.dimension {
            return Err(Error::config(format!(
                "Model '{}' produces {}-dimensional vectors, but dimension = {} is configured",
                config.model, provider.dimension, config.dimension
            )));
        }

        let mut provider = provider;
        provider.document_prompt = config.document_prompt.clone();
        provider.query_prompt = config.query_prompt.clone();
        Ok(provider)
    }

    /// Prompt prepended to stored documents.
    pub fn with_document_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.document_prompt = Some(prompt.into());
        self
    }

    /// Prompt prepended to queries.
    pub fn with_query_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.query_prompt = Some(prompt.into());
        self
    }

    async fn embed_texts(&self, texts: Vec<String>) -> Result<Vec<Vector>> {
        let model = self.model.clone();

        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|e| Error::embedding(format!("Mutex poisoned: {e}")))?;
            model
                .embed(texts, None)
                .map_err(|e| Error::embedding(format!("Embedding failed: {e}")))
        })
        .await
        .map_err(|e| Error::embedding(format!("spawn_blocking failed: {e}")))?
    }

    async fn embed_one(&self, text: String) -> Result<Vector> {
        self.embed_texts(vec![text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::embedding("No embedding returned"))
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed_document(&self, text: &str) -> Result<Vector> {
        self.embed_one(with_prompt(self.document_prompt.as_deref(), text))
            .await
    }

    async fn embed_query(&self, text: &str) -> Result<Vector> {
        self.embed_one(with_prompt(self.query_prompt.as_deref(), text))
            .await
    }

    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vector>> {
        let prompt = self.document_prompt.as_deref();
        let texts = texts.iter().map(|t| with_prompt(prompt, t)).collect();
        self.embed_texts(texts).await
    }

    fn vector_size(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}

impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("model", &self.model_name)
            .field("dimension", &self.dimension)
            .field("document_prompt", &self.document_prompt)
            .field("query_prompt", &self.query_prompt)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_model_known() {
        assert!(resolve_model("all-minilm-l6-v2").is_ok());
        assert!(resolve_model("bge-small-en-v1.5").is_ok());
        assert!(resolve_model("bge-base-en-v1.5").is_ok());
        assert!(resolve_model("bge-large-en-v1.5").is_ok());
    }

    #[test]
    fn test_resolve_model_aliases() {
        assert!(resolve_model("BGESmallENV15").is_ok());
        assert!(resolve_model("AllMiniLML6V2").is_ok());
    }

    #[test]
    fn test_resolve_model_unknown() {
        let err = resolve_model("nonexistent-model").unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("Unknown embedding model"));
    }

    #[test]
    fn test_with_prompt() {
        assert_eq!(with_prompt(Some("query: "), "red shoes"), "query: red shoes");
        assert_eq!(with_prompt(None, "red shoes"), "red shoes");
    }

    // Integration tests requiring model download are gated with #[ignore]
    #[tokio::test]
    #[ignore = "requires model download (~80MB)"]
    async fn test_fastembed_provider_creation() {
        let provider = FastEmbedProvider::new("all-minilm-l6-v2", None).unwrap();
        assert_eq!(provider.vector_size(), 384);
        assert_eq!(provider.name(), "all-minilm-l6-v2");
    }

    #[tokio::test]
    #[ignore = "requires model download (~80MB)"]
    async fn test_fastembed_embed_document() {
        let provider = FastEmbedProvider::new("all-minilm-l6-v2", None).unwrap();
        let embedding = provider.embed_document("Hello world").await.unwrap();
        assert_eq!(embedding.len(), 384);

        // Should be normalized
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.1);
    }

    #[tokio::test]
    #[ignore = "requires model download (~80MB)"]
    async fn test_fastembed_prompts_change_embeddings() {
        let provider = FastEmbedProvider::new("all-minilm-l6-v2", None)
            .unwrap()
            .with_query_prompt("query: ");
        let doc = provider.embed_document("red shoes").await.unwrap();
        let query = provider.embed_query("red shoes").await.unwrap();
        assert_eq!(doc.len(), query.len());
        assert_ne!(doc, query);
    }

    #[tokio::test]
    #[ignore = "requires model download (~80MB)"]
    async fn test_fastembed_embed_documents() {
        let provider = FastEmbedProvider::new("all-minilm-l6-v2", None).unwrap();
        let texts = vec!["Hello", "World", "Test"];
        let embeddings = provider.embed_documents(&texts).await.unwrap();

        assert_eq!(embeddings.len(), 3);
        for emb in &embeddings {
            assert_eq!(emb.len(), 384);
        }
    }

    #[test]
    #[ignore = "requires model download (~80MB)"]
    fn test_from_config_dimension_mismatch() {
        let config = EmbeddingConfig {
            provider: "fastembed".to_string(),
            dimension: 768,
            ..Default::default()
        };
        let err = FastEmbedProvider::from_config(&config).unwrap_err();
        assert!(err.is_config());
    }
}

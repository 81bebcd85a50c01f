//! Embedding provider trait and mock implementation.
//!
//! This module defines the `EmbeddingProvider` trait that abstracts over
//! different embedding generation backends (fastembed, hosted APIs, etc.).
//! Providers distinguish document embeddings from query embeddings so that
//! asymmetric models can apply different prompts to each side.
//!
//! # Providers
//!
//! - `MockEmbeddingProvider`: Deterministic content-addressed vectors for testing
//! - `FastEmbedProvider`: Local embedding via fastembed (requires `vector-fastembed` feature)

use async_trait::async_trait;
use semsearch_core::{EmbeddingConfig, Error, Result};
use std::sync::Arc;

use crate::types::Vector;

/// Dimension used by the mock provider when none is configured.
pub const DEFAULT_MOCK_DIMENSION: usize = 384;

/// Trait for generating text embeddings.
///
/// Providers are expensive to build, so they are created once per process
/// and shared as `Arc<dyn EmbeddingProvider>`. Implementations must be safe
/// to call concurrently.
///
/// Both embedding modes must return vectors of exactly [`vector_size`]
/// elements.
///
/// [`vector_size`]: EmbeddingProvider::vector_size
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed text that will be stored in the vector index.
    async fn embed_document(&self, text: &str) -> Result<Vector>;

    /// Embed a search query.
    async fn embed_query(&self, text: &str) -> Result<Vector>;

    /// Embed a batch of documents.
    ///
    /// Default implementation calls `embed_document` for each text sequentially.
    /// Backends that support native batching should override this.
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vector>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed_document(text).await?);
        }
        Ok(results)
    }

    /// The embedding dimension. Stable for the provider's lifetime.
    fn vector_size(&self) -> usize;

    /// The provider name for diagnostics.
    fn name(&self) -> &str;
}

/// A mock embedding provider for testing.
///
/// Each vector is derived from the BLAKE3 hash of the input, so the same
/// text always maps to the same unit vector while different texts land far
/// apart. Queries and documents share one embedding space.
#[derive(Debug, Clone)]
pub struct MockEmbeddingProvider {
    dimension: usize,
}

impl MockEmbeddingProvider {
    /// Create a new mock provider with the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Generate a deterministic embedding from text.
    fn deterministic_embedding(&self, text: &str) -> Vector {
        let mut bytes = vec![0u8; self.dimension];
        blake3::Hasher::new()
            .update(text.as_bytes())
            .finalize_xof()
            .fill(&mut bytes);

        let mut embedding: Vector = bytes
            .iter()
            .map(|b| (*b as f32 - 127.5) / 127.5)
            .collect();

        // Normalize to unit vector
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for val in &mut embedding {
                *val /= norm;
            }
        }

        embedding
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new(DEFAULT_MOCK_DIMENSION)
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed_document(&self, text: &str) -> Result<Vector> {
        Ok(self.deterministic_embedding(text))
    }

    async fn embed_query(&self, text: &str) -> Result<Vector> {
        Ok(self.deterministic_embedding(text))
    }

    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vector>> {
        Ok(texts
            .iter()
            .map(|t| self.deterministic_embedding(t))
            .collect())
    }

    fn vector_size(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Build the embedding provider selected by configuration.
///
/// Known providers: `"mock"` and, with the `vector-fastembed` feature,
/// `"fastembed"`.
pub fn create_embedding_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.provider.as_str() {
        "mock" => {
            let dimension = if config.dimension == 0 {
                DEFAULT_MOCK_DIMENSION
            } else {
                config.dimension
            };
            Arc::new(MockEmbeddingProvider::new(dimension))
        }
        #[cfg(feature = "vector-fastembed")]
        "fastembed" => Arc::new(crate::fastembed::FastEmbedProvider::from_config(config)?),
        #[cfg(not(feature = "vector-fastembed"))]
        "fastembed" => {
            return Err(Error::config(
                "Embedding provider 'fastembed' requires the 'vector-fastembed' feature",
            ));
        }
        other => {
            return Err(Error::config(format!(
                "Unknown embedding provider: '{other}'. Supported: mock, fastembed"
            )));
        }
    };

    log::info!(
        "Initialized embedding provider '{}' (dimension {})",
        provider.name(),
        provider.vector_size()
    );

    Ok(provider)
}

// ============================================================================
// Tests
// ============================================================================

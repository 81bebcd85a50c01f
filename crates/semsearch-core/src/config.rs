//! Configuration for semsearch.
//!
//! Provides [`SemanticSearchConfig`], which selects the vector store backend
//! and the embedding provider, and carries per-entity-type overrides for
//! document registrations. It loads from TOML files, environment variables,
//! and defaults using the `confyg` crate.
//!
//! # Loading Priority
//!
//! 1. Explicit config path argument
//! 2. `SEMSEARCH_CONFIG` environment variable
//! 3. XDG default: `~/.config/semsearch/config.toml`
//! 4. Built-in defaults
//!
//! Environment variables prefixed with `SEMSEARCH_` overlay file values.
//!
//! # Example
//!
//! ```toml
//! [vector_store]
//! backend = "lancedb"
//! timeout_ms = 5000
//!
//! [vector_store.options]
//! uri = "/var/lib/semsearch/vectors"
//!
//! [vector_store.retry]
//! max_attempts = 3
//!
//! [embeddings]
//! provider = "fastembed"
//! model = "bge-small-en-v1.5"
//! query_prompt = "query: "
//!
//! [documents.Product]
//! namespace = "products"
//! include_fields = ["name", "price"]
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use confyg::{Confygery, env};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ============================================================================
// Configuration structs
// ============================================================================

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticSearchConfig {
    /// Vector store backend selection.
    pub vector_store: VectorStoreConfig,

    /// Embedding provider selection.
    pub embeddings: EmbeddingConfig,

    /// Per-entity-type registration overrides, keyed by entity type name.
    pub documents: BTreeMap<String, DocumentOverrides>,
}

/// Vector store backend configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    /// Backend key resolved through the backend factory ("memory", "lancedb", ...).
    pub backend: String,

    /// Backend-specific constructor parameters.
    pub options: toml::Table,

    /// Deadline applied to every backend call, in milliseconds.
    pub timeout_ms: Option<u64>,

    /// Bounded retry around retryable backend errors.
    pub retry: RetryConfig,
}

/// Retry policy for backend calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt. Zero disables retrying.
    pub max_attempts: u32,

    /// Delay before the first retry, in milliseconds.
    pub initial_delay_ms: u64,

    /// Upper bound for the exponential delay, in milliseconds.
    pub max_delay_ms: u64,
}

/// Embedding provider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider key ("mock", "fastembed").
    pub provider: String,

    /// Model name understood by the provider.
    pub model: String,

    /// Vector size. Zero lets the provider decide.
    pub dimension: usize,

    /// Prompt prepended to documents before embedding.
    pub document_prompt: Option<String>,

    /// Prompt prepended to queries before embedding.
    pub query_prompt: Option<String>,

    /// Directory for downloaded model files.
    pub cache_path: Option<String>,
}

/// Overrides applied on top of a document declaration at registration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentOverrides {
    /// Vector store namespace.
    pub namespace: Option<String>,

    /// Metadata include list; `["*"]` includes every scalar field.
    pub include_fields: Option<Vec<String>>,

    /// Skip subscribing to entity mutations.
    pub disable_signals: Option<bool>,
}

// ============================================================================
// Default implementations
// ============================================================================

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            options: toml::Table::new(),
            timeout_ms: None,
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            initial_delay_ms: 100,
            max_delay_ms: 2_000,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "mock".to_string(),
            model: "all-minilm-l6-v2".to_string(),
            dimension: 0,
            document_prompt: None,
            query_prompt: None,
            cache_path: None,
        }
    }
}

impl VectorStoreConfig {
    /// The configured deadline, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

impl RetryConfig {
    /// Whether retrying is enabled.
    pub fn is_enabled(&self) -> bool {
        self.max_attempts > 0
    }

    /// Delay before the first retry.
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Upper bound for the retry delay.
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

// ============================================================================
// Config loading
// ============================================================================

impl SemanticSearchConfig {
    /// Load configuration from file, environment, and defaults.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder =
            Confygery::new().map_err(|e| Error::config(format!("config init: {e}")))?;

        if let Some(path) = Self::resolve_config_path(config_path)
            && path.exists()
        {
            builder
                .add_file(&path.to_string_lossy())
                .map_err(|e| Error::config(format!("config file: {e}")))?;
        }

        let mut env_opts = env::Options::with_top_level("SEMSEARCH");
        env_opts.add_section("vector_store");
        env_opts.add_section("embeddings");
        builder
            .add_env(env_opts)
            .map_err(|e| Error::config(format!("config env: {e}")))?;

        let config: Self = builder
            .build()
            .map_err(|e| Error::config(format!("config build: {e}")))?;

        log::debug!(
            "Loaded semsearch config: backend={}, provider={}",
            config.vector_store.backend,
            config.embeddings.provider
        );

        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| Error::config(format!("config parse: {e}")))
    }

    /// Resolve the config file path from explicit argument, env var, or XDG default.
    pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(PathBuf::from(path));
        }

        if let Ok(path) = std::env::var("SEMSEARCH_CONFIG") {
            return Some(PathBuf::from(path));
        }

        Self::default_config_path()
    }

    /// Return the XDG default config path.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("semsearch").join("config.toml"))
    }

    /// Serialize this config to a pretty-printed TOML string.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }

    /// Overrides declared for an entity type, if any.
    pub fn document_overrides(&self, entity_type: &str) -> Option<&DocumentOverrides> {
        self.documents.get(entity_type)
    }
}

// ============================================================================
// Tests
// ============================================================================

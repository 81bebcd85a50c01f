//! Backend selection by configuration key.
//!
//! [`BackendFactory`] maps a backend key (`vector_store.backend` in the
//! configuration) to a constructor. Each registration gets its own backend
//! instance, built from the `vector_store.options` table and wrapped in a
//! [`RetryBackend`] when retry or a deadline is configured.

use futures::FutureExt;
use futures::future::BoxFuture;
use semsearch_core::{Error, Result, VectorStoreConfig};
use std::collections::HashMap;
use std::sync::Arc;

use crate::backend::{InMemoryBackend, InMemoryStore, VectorStoreBackend};
use crate::retry::RetryBackend;

/// Constructor for a backend, given its options table.
pub type BackendConstructor = Arc<
    dyn Fn(toml::Table) -> BoxFuture<'static, Result<Arc<dyn VectorStoreBackend>>> + Send + Sync,
>;

/// Registry of backend constructors keyed by name.
pub struct BackendFactory {
    constructors: HashMap<String, BackendConstructor>,
    memory_store: InMemoryStore,
}

impl BackendFactory {
    /// Creates a factory with no registered backends.
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
            memory_store: InMemoryStore::new(),
        }
    }

    /// Creates a factory with the built-in backends.
    ///
    /// - `memory`: every backend shares this factory's [`InMemoryStore`]
    /// - `lancedb`: requires the `vector-lancedb` feature and a `uri` option
    pub fn with_defaults() -> Self {
        let mut factory = Self::new();

        let store = factory.memory_store.clone();
        factory.register(
            "memory",
            Arc::new(move |_options: toml::Table| memory_backend(store.clone()).boxed()),
        );

        #[cfg(feature = "vector-lancedb")]
        factory.register(
            "lancedb",
            Arc::new(|options: toml::Table| lancedb_backend(options).boxed()),
        );

        factory
    }

    /// Registers a constructor, replacing any earlier one with the same key.
    pub fn register(&mut self, key: impl Into<String>, constructor: BackendConstructor) {
        self.constructors.insert(key.into(), constructor);
    }

    /// Returns whether a backend key is known.
    pub fn has_backend(&self, key: &str) -> bool {
        self.constructors.contains_key(key)
    }

    /// Registered backend keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// The store shared by all `memory` backends built by this factory.
    pub fn memory_store(&self) -> &InMemoryStore {
        &self.memory_store
    }

    /// Builds a new backend for `config`.
    pub async fn create(&self, config: &VectorStoreConfig) -> Result<Arc<dyn VectorStoreBackend>> {
        let constructor = self.constructors.get(&config.backend).ok_or_else(|| {
            Error::config(format!(
                "Unknown vector store backend: '{}'. Registered: {}",
                config.backend,
                self.keys().join(", ")
            ))
        })?;

        let backend = constructor(config.options.clone()).await?;

        if config.retry.is_enabled() || config.timeout_ms.is_some() {
            log::debug!(
                "Wrapping '{}' backend with retry (max_attempts={}, timeout={:?})",
                config.backend,
                config.retry.max_attempts,
                config.timeout()
            );
            return Ok(Arc::new(RetryBackend::from_config(backend, config)));
        }

        Ok(backend)
    }
}

async fn memory_backend(store: InMemoryStore) -> Result<Arc<dyn VectorStoreBackend>> {
    Ok(Arc::new(InMemoryBackend::new(store)))
}

#[cfg(feature = "vector-lancedb")]
async fn lancedb_backend(options: toml::Table) -> Result<Arc<dyn VectorStoreBackend>> {
    let uri = options
        .get("uri")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::config("lancedb backend requires a 'uri' option"))?;
    Ok(Arc::new(crate::lancedb::LancedbBackend::connect(uri).await?))
}

impl Default for BackendFactory {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for BackendFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendFactory")
            .field("backends", &self.keys())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Vector store backend trait and in-memory reference implementation.
//!
//! A [`VectorStoreBackend`] is bound to one collection: `configure` is called
//! once with the collection's [`IndexConfiguration`], after which records can
//! be saved, deleted, and searched by vector slot.
//!
//! # Backends
//!
//! - [`InMemoryBackend`]: Brute-force reference backend over an [`InMemoryStore`]
//! - `LancedbBackend`: Embedded LanceDB tables (requires `vector-lancedb` feature)

use async_trait::async_trait;
use semsearch_core::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::types::{DocumentId, DocumentRecord, FieldValue, IndexConfiguration, Vector};

/// Trait for vector store backends.
///
/// Implementations must be safe to share between tasks. Failures are
/// reported as backend errors; a search against a missing collection or an
/// unknown slot is an error, never an empty result.
#[async_trait]
pub trait VectorStoreBackend: Send + Sync {
    /// Provision the collection described by `config`.
    ///
    /// Idempotent: an existing collection is left untouched and is not
    /// re-validated against `config`.
    async fn configure(&self, config: &IndexConfiguration) -> Result<()>;

    /// Return up to `limit` identifiers, best match first, ranked using only
    /// the slot named `index_name`.
    async fn search(&self, index_name: &str, query: &[f32], limit: usize)
    -> Result<Vec<DocumentId>>;

    /// Insert or overwrite the record stored for `record.id`.
    async fn save(&self, record: &DocumentRecord) -> Result<()>;

    /// Remove every record stored for `id`. Removing nothing is not an error.
    async fn delete(&self, id: &DocumentId) -> Result<()>;

    /// Backend name for diagnostics.
    fn name(&self) -> &str;
}

// ============================================================================
// In-memory store
// ============================================================================

#[derive(Debug, Clone)]
struct StoredPoint {
    vectors: BTreeMap<String, Vector>,
    payload: BTreeMap<String, FieldValue>,
}

#[derive(Debug)]
struct Collection {
    config: IndexConfiguration,
    // Keyed by identifier, so repeated saves overwrite in place.
    points: BTreeMap<DocumentId, StoredPoint>,
}

/// Shared in-memory collections.
///
/// Cloning is cheap and every clone sees the same data, which lets tests
/// inspect or corrupt a collection behind a backend's back.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    collections: Arc<RwLock<HashMap<String, Collection>>>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a collection exists for `namespace`.
    pub fn collection_exists(&self, namespace: &str) -> bool {
        self.read(|collections| collections.contains_key(namespace))
    }

    /// Number of records in `namespace`; zero when the collection is missing.
    pub fn count(&self, namespace: &str) -> usize {
        self.read(|collections| collections.get(namespace).map_or(0, |c| c.points.len()))
    }

    /// Whether a record exists for `id` in `namespace`.
    pub fn contains(&self, namespace: &str, id: &DocumentId) -> bool {
        self.read(|collections| {
            collections
                .get(namespace)
                .is_some_and(|c| c.points.contains_key(id))
        })
    }

    /// Stored payload for `id`, including the identifier field.
    pub fn payload(&self, namespace: &str, id: &DocumentId) -> Option<BTreeMap<String, FieldValue>> {
        self.read(|collections| {
            collections
                .get(namespace)
                .and_then(|c| c.points.get(id))
                .map(|p| p.payload.clone())
        })
    }

    /// Remove one record without going through a backend.
    pub fn remove(&self, namespace: &str, id: &DocumentId) -> bool {
        self.write(|collections| {
            collections
                .get_mut(namespace)
                .is_some_and(|c| c.points.remove(id).is_some())
        })
    }

    /// Drop a whole collection without going through a backend.
    pub fn drop_collection(&self, namespace: &str) -> bool {
        self.write(|collections| collections.remove(namespace).is_some())
    }

    /// Names of all collections, sorted.
    pub fn namespaces(&self) -> Vec<String> {
        let mut names = self.read(|collections| collections.keys().cloned().collect::<Vec<_>>());
        names.sort();
        names
    }

    fn read<T>(&self, f: impl FnOnce(&HashMap<String, Collection>) -> T) -> T {
        let guard = self.collections.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn write<T>(&self, f: impl FnOnce(&mut HashMap<String, Collection>) -> T) -> T {
        let mut guard = self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

// ============================================================================
// In-memory backend
// ============================================================================

/// Brute-force reference backend.
///
/// Ranks every stored record with the slot's distance metric. Ties are
/// broken by identifier so results are deterministic.
#[derive(Debug)]
pub struct InMemoryBackend {
    store: InMemoryStore,
    config: OnceLock<IndexConfiguration>,
}

impl InMemoryBackend {
    /// Create a backend over `store`.
    pub fn new(store: InMemoryStore) -> Self {
        Self {
            store,
            config: OnceLock::new(),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &InMemoryStore {
        &self.store
    }

    fn bound(&self) -> Result<&IndexConfiguration> {
        self.config
            .get()
            .ok_or_else(|| Error::config("In-memory backend used before configure()"))
    }
}

#[async_trait]
impl VectorStoreBackend for InMemoryBackend {
    async fn configure(&self, config: &IndexConfiguration) -> Result<()> {
        let bound = self.config.get_or_init(|| config.clone());
        if bound != config {
            return Err(Error::config(format!(
                "Backend already bound to namespace '{}'; cannot rebind to '{}'",
                bound.namespace, config.namespace
            )));
        }

        let created = self.store.write(|collections| {
            if collections.contains_key(&config.namespace) {
                return false;
            }
            collections.insert(
                config.namespace.clone(),
                Collection {
                    config: config.clone(),
                    points: BTreeMap::new(),
                },
            );
            true
        });

        if created {
            log::info!(
                "Created in-memory collection '{}' with {} vector slot(s)",
                config.namespace,
                config.vector_slots.len()
            );
        } else {
            log::debug!("Collection '{}' already exists", config.namespace);
        }
        Ok(())
    }

    async fn search(
        &self,
        index_name: &str,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<DocumentId>> {
        let namespace = &self.bound()?.namespace;

        self.store.read(|collections| -> Result<Vec<DocumentId>> {
            let collection = collections
                .get(namespace)
                .ok_or_else(|| Error::collection_not_found(namespace.clone()))?;
            collection.config.check_vector(index_name, query)?;
            let distance = collection
                .config
                .slot(index_name)
                .map(|s| s.distance)
                .unwrap_or_default();

            let mut scored: Vec<(f32, &DocumentId)> = collection
                .points
                .iter()
                .filter_map(|(id, point)| {
                    point
                        .vectors
                        .get(index_name)
                        .map(|v| (distance.score(query, v), id))
                })
                .collect();

            scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1)));
            scored.truncate(limit);

            Ok(scored.into_iter().map(|(_, id)| id.clone()).collect())
        })
    }

    async fn save(&self, record: &DocumentRecord) -> Result<()> {
        let namespace = &self.bound()?.namespace;

        self.store.write(|collections| -> Result<()> {
            let collection = collections
                .get_mut(namespace)
                .ok_or_else(|| Error::collection_not_found(namespace.clone()))?;
            for (index_name, vector) in &record.vectors {
                collection.config.check_vector(index_name, vector)?;
            }
            let payload = record.payload(&collection.config.id_field);
            collection.points.insert(
                record.id.clone(),
                StoredPoint {
                    vectors: record.vectors.clone(),
                    payload,
                },
            );
            Ok(())
        })?;

        log::debug!("Saved record {} to '{}'", record.id, namespace);
        Ok(())
    }

    async fn delete(&self, id: &DocumentId) -> Result<()> {
        let namespace = &self.bound()?.namespace;

        let removed = self.store.write(|collections| {
            collections
                .get_mut(namespace)
                .ok_or_else(|| Error::collection_not_found(namespace.clone()))
                .map(|c| c.points.remove(id).is_some())
        })?;

        log::debug!("Deleted record {id} from '{namespace}' (existed: {removed})");
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Entity type registration.
//!
//! A [`Registry`] binds each entity type to exactly one [`Registration`]:
//! its index configuration, mapper, backend, and mutation subscription.
//! Registration either fully succeeds or leaves no trace; handlers are
//! connected only after the backend has been provisioned.

use semsearch_core::{Error, Result, SemanticSearchConfig};
use semsearch_vector::{
    BackendFactory, EmbeddingProvider, IndexConfiguration, VectorStoreBackend,
    create_embedding_provider,
};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::entity::{Entity, EntityStore};
use crate::index::{IndexDescriptor, build_index_configuration};
use crate::indexer::{BulkIndexer, IndexStats};
use crate::locks::IdLocks;
use crate::mapper::{DocumentMapper, DocumentSpec, IncludeFields};
use crate::search::{SearchQuery, find};
use crate::signals::{EntitySignals, SignalKind, Subscription};
use crate::sync::{DeleteHandler, SaveHandler, Synchronizer};

type AnyRegistration = Arc<dyn Any + Send + Sync>;

/// Registrations for every indexed entity type.
pub struct Registry {
    config: SemanticSearchConfig,
    factory: BackendFactory,
    provider: Arc<dyn EmbeddingProvider>,
    registrations: RwLock<HashMap<TypeId, AnyRegistration>>,
    register_lock: tokio::sync::Mutex<()>,
}

impl Registry {
    /// Create a registry from explicit parts.
    pub fn new(
        config: SemanticSearchConfig,
        factory: BackendFactory,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            config,
            factory,
            provider,
            registrations: RwLock::new(HashMap::new()),
            register_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Create a registry with the built-in backends and the configured
    /// embedding provider.
    pub fn from_config(config: SemanticSearchConfig) -> Result<Self> {
        let provider = create_embedding_provider(&config.embeddings)?;
        Ok(Self::new(config, BackendFactory::with_defaults(), provider))
    }

    /// The effective configuration.
    pub fn config(&self) -> &SemanticSearchConfig {
        &self.config
    }

    /// The backend factory.
    pub fn factory(&self) -> &BackendFactory {
        &self.factory
    }

    /// The embedding provider shared by every registration.
    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    /// Register entity type `E`.
    ///
    /// Configured overrides for the entity type are applied on top of
    /// `spec`. Fails with a configuration error when the type is already
    /// registered, when an index declaration is invalid, or when the
    /// backend cannot be provisioned.
    pub async fn register<E: Entity>(
        &self,
        spec: DocumentSpec,
        signals: &EntitySignals<E>,
    ) -> Result<Arc<Registration<E>>> {
        let _serialized = self.register_lock.lock().await;

        let schema = E::schema();
        if schema.name().is_empty() {
            return Err(Error::config("Document declaration has no entity type"));
        }
        let entity_type = schema.name().to_string();

        let spec = match self.config.document_overrides(&entity_type) {
            Some(overrides) => spec.with_overrides(overrides),
            None => spec,
        };

        if spec.indexes.is_empty() {
            return Err(Error::config(format!(
                "{entity_type} declares no vector index"
            )));
        }

        let descriptors = spec
            .indexes
            .iter()
            .map(|decl| {
                let descriptor = IndexDescriptor::for_fields(
                    &decl.fields,
                    decl.index_name.as_deref(),
                    decl.distance,
                    self.provider.clone(),
                )?;
                descriptor.validate(&schema)?;
                Ok(descriptor)
            })
            .collect::<Result<Vec<_>>>()?;

        if self.is_registered::<E>() {
            return Err(Error::config(format!("{entity_type} is already registered")));
        }

        let namespace = spec.resolve_namespace(&schema);
        let index_configuration = build_index_configuration(&namespace, &descriptors)?;
        let mapper = DocumentMapper::new(schema, descriptors, &spec.include_fields)?;

        let backend = self.factory.create(&self.config.vector_store).await?;
        backend.configure(&index_configuration).await?;

        let sync = Synchronizer::new(Arc::new(mapper), backend, IdLocks::new());

        let subscription = if spec.disable_signals {
            log::warn!(
                "Signals disabled for {entity_type}; the vector store will only change through reindex"
            );
            None
        } else {
            Some(subscribe(signals, &namespace, &sync))
        };

        let registration = Arc::new(Registration {
            entity_type: entity_type.clone(),
            namespace,
            index_configuration,
            sync,
            include_fields: spec.include_fields,
            signals_disabled: spec.disable_signals,
            subscription,
        });

        self.registrations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(TypeId::of::<E>(), registration.clone());

        log::info!(
            "Registered {entity_type} in '{}' on {} backend ({} index(es))",
            registration.namespace,
            registration.backend().name(),
            registration.descriptors().len()
        );
        Ok(registration)
    }

    /// The registration for entity type `E`, if any.
    pub fn registration<E: Entity>(&self) -> Option<Arc<Registration<E>>> {
        let registration = self
            .registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&TypeId::of::<E>())
            .cloned()?;
        registration.downcast::<Registration<E>>().ok()
    }

    /// Whether entity type `E` is registered.
    pub fn is_registered<E: Entity>(&self) -> bool {
        self.registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&TypeId::of::<E>())
    }

    /// Number of registered entity types.
    pub fn len(&self) -> usize {
        self.registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no entity type is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("backend", &self.config.vector_store.backend)
            .field("provider", &self.provider.name())
            .field("registrations", &self.len())
            .finish()
    }
}

fn subscribe<E: Entity>(
    signals: &EntitySignals<E>,
    namespace: &str,
    sync: &Synchronizer<E>,
) -> Subscription<E> {
    let save_key = format!("semsearch:{namespace}:saved");
    let delete_key = format!("semsearch:{namespace}:deleted");
    let mut entries = Vec::with_capacity(2);

    if signals.connect(
        SignalKind::Saved,
        save_key.clone(),
        Arc::new(SaveHandler(sync.clone())),
    ) {
        entries.push((SignalKind::Saved, save_key));
    }
    if signals.connect(
        SignalKind::Deleted,
        delete_key.clone(),
        Arc::new(DeleteHandler(sync.clone())),
    ) {
        entries.push((SignalKind::Deleted, delete_key));
    }

    Subscription::new(signals.clone(), entries)
}

// ============================================================================
// Registration
// ============================================================================

/// The binding of one entity type to its index, backend, and subscription.
pub struct Registration<E: Entity> {
    entity_type: String,
    namespace: String,
    index_configuration: IndexConfiguration,
    sync: Synchronizer<E>,
    include_fields: IncludeFields,
    signals_disabled: bool,
    subscription: Option<Subscription<E>>,
}

impl<E: Entity> Registration<E> {
    /// The entity type name.
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// The collection the records live in.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The backend-facing index configuration.
    pub fn index_configuration(&self) -> &IndexConfiguration {
        &self.index_configuration
    }

    /// Index descriptors in declaration order.
    pub fn descriptors(&self) -> &[IndexDescriptor] {
        self.sync.mapper().descriptors()
    }

    /// The document mapper.
    pub fn mapper(&self) -> &DocumentMapper<E> {
        self.sync.mapper()
    }

    /// The provisioned backend.
    pub fn backend(&self) -> &Arc<dyn VectorStoreBackend> {
        self.sync.backend()
    }

    /// The payload include policy.
    pub fn include_fields(&self) -> &IncludeFields {
        &self.include_fields
    }

    /// Whether mutation signals were disabled at registration.
    pub fn signals_disabled(&self) -> bool {
        self.signals_disabled
    }

    /// Whether the mutation handlers are currently connected.
    pub fn signals_connected(&self) -> bool {
        self.subscription
            .as_ref()
            .is_some_and(|s| s.is_connected() && !s.entries().is_empty())
    }

    /// The mutation subscription, unless signals are disabled.
    pub fn subscription(&self) -> Option<&Subscription<E>> {
        self.subscription.as_ref()
    }

    /// Disconnect the mutation handlers. Returns how many were removed.
    pub fn disconnect(&self) -> usize {
        self.subscription.as_ref().map_or(0, Subscription::disconnect)
    }

    /// Similarity search, re-materialized from `store` in rank order.
    pub async fn find(&self, store: &dyn EntityStore<E>, query: &SearchQuery) -> Result<Vec<E>> {
        find(self.mapper(), self.backend().as_ref(), store, query).await
    }

    /// Map and save `entities`, independent of the signal path.
    pub async fn reindex<I>(&self, entities: I) -> Result<IndexStats>
    where
        I: IntoIterator<Item = E>,
        I::IntoIter: Send,
    {
        self.indexer().reindex(entities).await
    }

    /// A bulk indexer sharing this registration's write locks.
    pub fn indexer(&self) -> BulkIndexer<E> {
        BulkIndexer::new(self.sync.clone())
    }
}

impl<E: Entity> fmt::Debug for Registration<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("entity_type", &self.entity_type)
            .field("namespace", &self.namespace)
            .field("backend", &self.backend().name())
            .field("indexes", &self.descriptors().len())
            .field("signals_connected", &self.signals_connected())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

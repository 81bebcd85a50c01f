//! Keeps relational entities and their vector documents in sync.
//!
//! Application entity types are registered once with a [`Registry`]. From
//! then on, every saved/deleted notification on the type's
//! [`EntitySignals`] is mirrored into the vector store, and
//! [`Registration::find`] answers similarity queries with fully
//! materialized entities in rank order.
//!
//! # Modules
//!
//! - [`entity`]: Entity schema, `Entity` and `EntityStore` traits
//! - [`index`]: Index descriptors and index configuration building
//! - [`mapper`]: `DocumentSpec` declarations and the document mapper
//! - [`signals`]: Saved/deleted notification channels and subscriptions
//! - [`sync`]: Save/delete mirroring, serialized per identifier
//! - [`registry`]: Entity type registration
//! - [`search`]: Single-field similarity queries
//! - [`indexer`]: Bulk (re)indexing
//!
//! # Example
//!
//! ```rust,ignore
//! use semsearch_documents::{DocumentSpec, EntitySignals, IndexDeclaration, Registry, SearchQuery};
//!
//! let registry = Registry::from_config(SemanticSearchConfig::load(None)?)?;
//! let signals = EntitySignals::<Product>::new();
//! let products = registry
//!     .register(DocumentSpec::new().index(IndexDeclaration::new("name")), &signals)
//!     .await?;
//!
//! store.insert(product.clone());
//! signals.notify_saved(&product).await?;
//!
//! let hits = products.find(&store, &SearchQuery::field("name", "shoes").top_k(5)).await?;
//! ```

pub mod entity;
pub mod index;
pub mod indexer;
pub mod locks;
pub mod mapper;
pub mod registry;
pub mod search;
pub mod signals;
pub mod sync;

pub use entity::{Entity, EntitySchema, EntityStore, FieldDef, FieldKind, InMemoryEntityStore};
pub use index::{IndexDescriptor, build_index_configuration};
pub use indexer::{BulkIndexer, DEFAULT_CONCURRENCY, IndexError, IndexStats};
pub use locks::IdLocks;
pub use mapper::{
    DocumentMapper, DocumentSpec, INCLUDE_ALL, IncludeFields, IndexDeclaration,
};
pub use registry::{Registration, Registry};
pub use search::{DEFAULT_TOP_K, SearchQuery, find, order_by_rank};
pub use signals::{EntitySignals, SignalHandler, SignalKind, Subscription};
pub use sync::{DeleteHandler, SaveHandler, Synchronizer};

//! Vector store and embedding infrastructure for semsearch.
//!
//! This crate isolates the document layer from any particular vector
//! database or embedding model. It defines the two leaf interfaces,
//! reference implementations that are always available, and LanceDB and
//! fastembed implementations behind feature flags.
//!
//! # Features
//!
//! - `vector-lancedb`: Enable LanceDB-based vector storage
//! - `vector-fastembed`: Enable local embedding generation via fastembed
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     semsearch-vector                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider trait                                    │
//! │  ├── MockEmbeddingProvider (always available)               │
//! │  └── FastEmbedProvider (feature: vector-fastembed)          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  VectorStoreBackend trait                                   │
//! │  ├── InMemoryBackend (always available)                     │
//! │  ├── LancedbBackend (feature: vector-lancedb)               │
//! │  └── RetryBackend (backoff + deadline around any backend)   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  BackendFactory / create_embedding_provider                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use semsearch_vector::{
//!     BackendFactory, DocumentRecord, EmbeddingProvider, IndexConfiguration,
//!     MockEmbeddingProvider, VectorSlot,
//! };
//!
//! let provider = MockEmbeddingProvider::new(384);
//! let factory = BackendFactory::with_defaults();
//! let backend = factory.create(&Default::default()).await?;
//!
//! let config = IndexConfiguration::new("Product")
//!     .with_slot("name", VectorSlot::new(384, Default::default()));
//! backend.configure(&config).await?;
//!
//! let vector = provider.embed_document("red shoes").await?;
//! backend.save(&DocumentRecord::new(1).with_vector("name", vector)).await?;
//!
//! let query = provider.embed_query("shoes").await?;
//! let ids = backend.search("name", &query, 10).await?;
//! ```

// Core modules (always available)
pub mod backend;
pub mod embedding;
pub mod factory;
pub mod retry;
pub mod types;

// Feature-gated backend modules
#[cfg(feature = "vector-fastembed")]
pub mod fastembed;

#[cfg(feature = "vector-lancedb")]
pub mod lancedb;

// Re-exports: core types
pub use types::{
    DEFAULT_ID_FIELD, Distance, DocumentId, DocumentRecord, FieldValue, IndexConfiguration,
    Vector, VectorSlot,
};

// Re-exports: traits and reference implementations
pub use backend::{InMemoryBackend, InMemoryStore, VectorStoreBackend};
pub use embedding::{EmbeddingProvider, MockEmbeddingProvider};
pub use retry::RetryBackend;

// Re-exports: factories
pub use embedding::create_embedding_provider;
pub use factory::{BackendConstructor, BackendFactory};

// Feature-gated re-exports
#[cfg(feature = "vector-fastembed")]
pub use fastembed::FastEmbedProvider;

#[cfg(feature = "vector-lancedb")]
pub use lancedb::LancedbBackend;

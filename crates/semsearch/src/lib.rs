//! Semsearch: similarity search over relational entities.
//!
//! This umbrella crate re-exports the component crates so applications can
//! depend on a single crate and pick backends with features.
//!
//! # Features
//!
//! - `vector-lancedb`: LanceDB vector store backend
//! - `vector-fastembed`: Local embeddings via fastembed
//! - `full`: Both of the above

pub use semsearch_core::{Error, ErrorKind, Result, SemanticSearchConfig, init_logging};
pub use semsearch_documents::{
    DocumentSpec, Entity, EntitySchema, EntitySignals, EntityStore, FieldDef, IndexDeclaration,
    IndexStats, Registration, Registry, SearchQuery,
};
pub use semsearch_vector::{
    BackendFactory, Distance, DocumentId, EmbeddingProvider, FieldValue, VectorStoreBackend,
};

/// Everything needed to declare, register, and query an entity type.
pub mod prelude {
    pub use semsearch_core::{Error, Result, SemanticSearchConfig};
    pub use semsearch_documents::{
        DocumentSpec, Entity, EntitySchema, EntitySignals, EntityStore, FieldDef, FieldKind,
        IndexDeclaration, Registration, Registry, SearchQuery,
    };
    pub use semsearch_vector::{Distance, DocumentId, FieldValue};
}

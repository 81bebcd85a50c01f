//! The relational side: entity schemas, entities, and entity stores.
//!
//! Semsearch never owns relational data. Application types implement
//! [`Entity`] to expose their identifier and field values, and an
//! [`EntityStore`] to re-materialize entities from identifiers returned by a
//! vector search.

use async_trait::async_trait;
use semsearch_core::Result;
use semsearch_vector::{DEFAULT_ID_FIELD, DocumentId, FieldValue};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

// ============================================================================
// Schema
// ============================================================================

/// Storage kind of an entity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// String-like column.
    Text,
    /// Integer column.
    Integer,
    /// Floating point column.
    Float,
    /// Boolean column.
    Boolean,
    /// Anything else (relations, blobs, JSON). Never part of the wildcard payload.
    Other,
}

impl FieldKind {
    /// Whether values of this kind can be stored as metadata.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Self::Other)
    }
}

/// One field of an entity type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldDef {
    /// Field name.
    pub name: String,
    /// Field kind.
    pub kind: FieldKind,
}

impl FieldDef {
    /// Create a field definition.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// A text field.
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    /// An integer field.
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    /// A float field.
    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Float)
    }

    /// A boolean field.
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Boolean)
    }
}

/// Description of an entity type: its name, primary identifier, and fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySchema {
    name: String,
    id_field: String,
    fields: Vec<FieldDef>,
}

impl EntitySchema {
    /// Create a schema with an `id` identifier field and no other fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id_field: DEFAULT_ID_FIELD.to_string(),
            fields: Vec::new(),
        }
    }

    /// Set the primary identifier field.
    pub fn with_id_field(mut self, id_field: impl Into<String>) -> Self {
        self.id_field = id_field.into();
        self
    }

    /// Append a field. Declaration order is kept.
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Entity type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Primary identifier field name.
    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    /// Declared fields in order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Whether the entity type has a field (or identifier) called `name`.
    pub fn has_field(&self, name: &str) -> bool {
        name == self.id_field || self.field(name).is_some()
    }

    /// Names of all scalar fields, in declaration order.
    pub fn scalar_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.kind.is_scalar())
            .map(|f| f.name.as_str())
    }
}

// ============================================================================
// Entity and store traits
// ============================================================================

/// A relational entity that can be projected into the vector store.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Schema of the entity type.
    fn schema() -> EntitySchema;

    /// Primary identifier; `None` while the entity is unsaved.
    fn id(&self) -> Option<DocumentId>;

    /// Current value of a field; `None` when the entity has no such field.
    fn field(&self, name: &str) -> Option<FieldValue>;
}

/// Lookup of entities by identifier in the relational store.
#[async_trait]
pub trait EntityStore<E: Entity>: Send + Sync {
    /// Entities that still exist among `ids`, in any order.
    async fn fetch_by_ids(&self, ids: &[DocumentId]) -> Result<Vec<E>>;
}

// ============================================================================
// In-memory entity store
// ============================================================================

/// Entity store kept in a map, for tests and small embedded uses.
#[derive(Debug)]
pub struct InMemoryEntityStore<E: Entity> {
    entities: RwLock<BTreeMap<DocumentId, E>>,
    fetches: AtomicUsize,
}

impl<E: Entity> InMemoryEntityStore<E> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(BTreeMap::new()),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Insert or replace an entity. Entities without an identifier are ignored.
    pub fn insert(&self, entity: E) -> bool {
        let Some(id) = entity.id() else {
            return false;
        };
        self.entities
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, entity);
        true
    }

    /// Remove an entity.
    pub fn remove(&self, id: &DocumentId) -> Option<E> {
        self.entities
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    /// Fetch one entity.
    pub fn get(&self, id: &DocumentId) -> Option<E> {
        self.entities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Number of stored entities.
    pub fn len(&self) -> usize {
        self.entities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `fetch_by_ids` calls served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl<E: Entity> Default for InMemoryEntityStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: Entity> EntityStore<E> for InMemoryEntityStore<E> {
    async fn fetch_by_ids(&self, ids: &[DocumentId]) -> Result<Vec<E>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let entities = self.entities.read().unwrap_or_else(PoisonError::into_inner);
        Ok(ids.iter().filter_map(|id| entities.get(id).cloned()).collect())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Tag {
        id: Option<i64>,
        label: String,
    }

    impl Entity for Tag {
        fn schema() -> EntitySchema {
            EntitySchema::new("Tag")
                .with_field(FieldDef::integer("id"))
                .with_field(FieldDef::text("label"))
                .with_field(FieldDef::new("owner", FieldKind::Other))
        }

        fn id(&self) -> Option<DocumentId> {
            self.id.map(DocumentId::Int)
        }

        fn field(&self, name: &str) -> Option<FieldValue> {
            match name {
                "id" => Some(self.id.into()),
                "label" => Some(self.label.clone().into()),
                _ => None,
            }
        }
    }

    fn tag(id: i64, label: &str) -> Tag {
        Tag {
            id: Some(id),
            label: label.to_string(),
        }
    }

    // ------------------------------------------------------------------------
    // Schema tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_schema_lookup() {
        let schema = Tag::schema();
        assert_eq!(schema.name(), "Tag");
        assert_eq!(schema.id_field(), "id");
        assert!(schema.has_field("label"));
        assert!(!schema.has_field("color"));
        assert_eq!(schema.field("owner").unwrap().kind, FieldKind::Other);
    }

    #[test]
    fn test_schema_scalar_fields() {
        let schema = Tag::schema();
        let scalars: Vec<&str> = schema.scalar_fields().collect();
        assert_eq!(scalars, vec!["id", "label"]);
    }

    #[test]
    fn test_schema_custom_id_field() {
        let schema = EntitySchema::new("Sku").with_id_field("code");
        assert!(schema.has_field("code"));
        assert!(!schema.has_field("id"));
    }

    // ------------------------------------------------------------------------
    // InMemoryEntityStore tests
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_store_fetch_existing_only() {
        let store = InMemoryEntityStore::new();
        store.insert(tag(1, "red"));
        store.insert(tag(3, "blue"));

        let found = store
            .fetch_by_ids(&[DocumentId::Int(3), DocumentId::Int(2), DocumentId::Int(1)])
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(store.fetch_count(), 1);
    }

    #[test]
    fn test_store_ignores_unsaved() {
        let store = InMemoryEntityStore::new();
        assert!(!store.insert(Tag {
            id: None,
            label: "draft".to_string(),
        }));
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_insert_remove() {
        let store = InMemoryEntityStore::new();
        store.insert(tag(1, "red"));
        store.insert(tag(1, "crimson"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&DocumentId::Int(1)).unwrap().label, "crimson");

        assert!(store.remove(&DocumentId::Int(1)).is_some());
        assert!(store.get(&DocumentId::Int(1)).is_none());
    }
}

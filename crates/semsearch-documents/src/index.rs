//! Index descriptors and the index configuration built from them.
//!
//! An [`IndexDescriptor`] binds exactly one entity field to a named vector
//! index. The descriptors of one entity type together determine the
//! [`IndexConfiguration`] used to provision its vector-store collection.

use semsearch_core::{Error, Result};
use semsearch_vector::{
    DEFAULT_ID_FIELD, Distance, EmbeddingProvider, IndexConfiguration, Vector, VectorSlot,
};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::entity::{Entity, EntitySchema};

/// One entity field embedded into one named vector index.
///
/// Immutable once constructed. The vector size comes from the embedding
/// provider and never changes.
#[derive(Clone)]
pub struct IndexDescriptor {
    field_name: String,
    index_name: String,
    distance: Distance,
    provider: Arc<dyn EmbeddingProvider>,
}

impl IndexDescriptor {
    /// Index `field_name` under its own name with cosine distance.
    pub fn new(field_name: impl Into<String>, provider: Arc<dyn EmbeddingProvider>) -> Self {
        let field_name = field_name.into();
        Self {
            index_name: field_name.clone(),
            field_name,
            distance: Distance::default(),
            provider,
        }
    }

    /// Build a descriptor from a declared field list.
    ///
    /// Exactly one field is supported; zero or several fields are a
    /// configuration error.
    pub fn for_fields(
        fields: &[String],
        index_name: Option<&str>,
        distance: Option<Distance>,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let field = match fields {
            [field] if !field.is_empty() => field,
            [] => return Err(Error::config("Index declaration names no field")),
            [field] => {
                return Err(Error::config(format!(
                    "Index declaration has an empty field name: '{field}'"
                )));
            }
            _ => {
                return Err(Error::config(format!(
                    "Only one field per index is supported, got [{}]",
                    fields.join(", ")
                )));
            }
        };

        let mut descriptor = Self::new(field.clone(), provider);
        if let Some(name) = index_name {
            if name.is_empty() {
                return Err(Error::config(format!(
                    "Index name for field '{field}' must not be empty"
                )));
            }
            descriptor = descriptor.with_index_name(name);
        }
        if let Some(distance) = distance {
            descriptor = descriptor.with_distance(distance);
        }
        Ok(descriptor)
    }

    /// Use an explicit index name.
    pub fn with_index_name(mut self, index_name: impl Into<String>) -> Self {
        self.index_name = index_name.into();
        self
    }

    /// Use a different distance metric.
    pub fn with_distance(mut self, distance: Distance) -> Self {
        self.distance = distance;
        self
    }

    /// The indexed field.
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// The vector slot name.
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// The ranking metric.
    pub fn distance(&self) -> Distance {
        self.distance
    }

    /// Vector size, as reported by the embedding provider.
    pub fn vector_size(&self) -> usize {
        self.provider.vector_size()
    }

    /// The slot this descriptor contributes to an index configuration.
    pub fn slot(&self) -> VectorSlot {
        VectorSlot::new(self.vector_size(), self.distance)
    }

    /// Whether this descriptor indexes `field_name`.
    pub fn is_for_field(&self, field_name: &str) -> bool {
        self.field_name == field_name
    }

    /// Check that the indexed field exists on the entity type.
    pub fn validate(&self, schema: &EntitySchema) -> Result<()> {
        if !schema.has_field(&self.field_name) {
            return Err(Error::config(format!(
                "Index '{}' refers to unknown field '{}' on {}",
                self.index_name,
                self.field_name,
                schema.name()
            )));
        }
        Ok(())
    }

    /// Embed the entity's field value for storage.
    pub async fn embed_for_storage<E: Entity>(&self, entity: &E) -> Result<Vector> {
        let text = entity
            .field(&self.field_name)
            .and_then(|v| v.to_text())
            .ok_or_else(|| {
                Error::validation(format!(
                    "Field '{}' of {} has no value to embed",
                    self.field_name,
                    E::schema().name()
                ))
            })?;
        let vector = self.provider.embed_document(&text).await?;
        self.check_size(vector)
    }

    /// Embed a query for this index.
    pub async fn embed_for_query(&self, text: &str) -> Result<Vector> {
        let vector = self.provider.embed_query(text).await?;
        self.check_size(vector)
    }

    fn check_size(&self, vector: Vector) -> Result<Vector> {
        if vector.len() != self.vector_size() {
            return Err(Error::embedding(format!(
                "Provider '{}' returned {} values for '{}', expected {}",
                self.provider.name(),
                vector.len(),
                self.index_name,
                self.vector_size()
            )));
        }
        Ok(vector)
    }
}

impl std::fmt::Debug for IndexDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexDescriptor")
            .field("field_name", &self.field_name)
            .field("index_name", &self.index_name)
            .field("distance", &self.distance)
            .field("provider", &self.provider.name())
            .finish()
    }
}

/// Build the collection layout for an entity type's descriptors.
///
/// The result does not depend on descriptor order. Two descriptors sharing
/// an index name are a configuration error.
pub fn build_index_configuration(
    namespace: &str,
    descriptors: &[IndexDescriptor],
) -> Result<IndexConfiguration> {
    let mut seen = BTreeSet::new();
    let mut config = IndexConfiguration::new(namespace).with_id_field(DEFAULT_ID_FIELD);

    for descriptor in descriptors {
        if !seen.insert(descriptor.index_name()) {
            return Err(Error::config(format!(
                "Duplicate index name '{}' in namespace '{namespace}'",
                descriptor.index_name()
            )));
        }
        config = config.with_slot(descriptor.index_name(), descriptor.slot());
    }

    Ok(config)
}

// ============================================================================
// Tests
// ============================================================================

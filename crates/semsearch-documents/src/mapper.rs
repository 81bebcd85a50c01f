//! Document declarations and the mapping from entities to vector records.
//!
//! A [`DocumentSpec`] declares how an entity type is indexed. At
//! registration it is resolved against the entity schema into a
//! [`DocumentMapper`], which turns entity instances into
//! [`DocumentRecord`]s.

use futures::future::try_join_all;
use semsearch_core::{DocumentOverrides, Error, Result};
use semsearch_vector::{Distance, DocumentId, DocumentRecord, FieldValue, Vector};
use std::collections::{BTreeMap, HashSet};
use std::marker::PhantomData;

use crate::entity::{Entity, EntitySchema};
use crate::index::IndexDescriptor;

/// Wildcard accepted in include lists.
pub const INCLUDE_ALL: &str = "*";

// ============================================================================
// Declarations
// ============================================================================

/// Which entity fields are copied into the vector payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IncludeFields {
    /// Every scalar field.
    #[default]
    All,
    /// Only the listed fields, in order.
    Only(Vec<String>),
}

impl IncludeFields {
    /// Interpret a configured list; `["*"]` means every scalar field.
    pub fn from_list<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        if fields.iter().any(|f| f == INCLUDE_ALL) {
            Self::All
        } else {
            Self::Only(fields)
        }
    }
}

/// Declaration of one vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDeclaration {
    /// Fields to embed. Exactly one is supported.
    pub fields: Vec<String>,
    /// Index name; defaults to the field name.
    pub index_name: Option<String>,
    /// Distance metric; defaults to cosine.
    pub distance: Option<Distance>,
}

impl IndexDeclaration {
    /// Declare an index over one field.
    pub fn new(field: impl Into<String>) -> Self {
        Self::over_fields([field])
    }

    /// Declare an index over several fields. Rejected at registration.
    pub fn over_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            index_name: None,
            distance: None,
        }
    }

    /// Set the index name.
    pub fn with_index_name(mut self, index_name: impl Into<String>) -> Self {
        self.index_name = Some(index_name.into());
        self
    }

    /// Set the distance metric.
    pub fn with_distance(mut self, distance: Distance) -> Self {
        self.distance = Some(distance);
        self
    }
}

/// Declarative description of how an entity type is indexed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentSpec {
    /// Collection name; defaults to the entity type name.
    pub namespace: Option<String>,
    /// Index declarations, in order.
    pub indexes: Vec<IndexDeclaration>,
    /// Payload fields.
    pub include_fields: IncludeFields,
    /// Skip subscribing to entity mutations.
    pub disable_signals: bool,
}

impl DocumentSpec {
    /// An empty declaration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the collection name.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Add an index declaration.
    pub fn index(mut self, declaration: IndexDeclaration) -> Self {
        self.indexes.push(declaration);
        self
    }

    /// Restrict the payload to the given fields (`["*"]` for all scalars).
    pub fn include_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_fields = IncludeFields::from_list(fields);
        self
    }

    /// Skip subscribing to entity mutations.
    pub fn disable_signals(mut self, disabled: bool) -> Self {
        self.disable_signals = disabled;
        self
    }

    /// Apply configured overrides on top of this declaration.
    pub fn with_overrides(mut self, overrides: &DocumentOverrides) -> Self {
        if let Some(namespace) = &overrides.namespace {
            self.namespace = Some(namespace.clone());
        }
        if let Some(fields) = &overrides.include_fields {
            self.include_fields = IncludeFields::from_list(fields.iter().cloned());
        }
        if let Some(disabled) = overrides.disable_signals {
            self.disable_signals = disabled;
        }
        self
    }

    /// The collection name for an entity type.
    pub fn resolve_namespace(&self, schema: &EntitySchema) -> String {
        self.namespace
            .clone()
            .unwrap_or_else(|| schema.name().to_string())
    }
}

// ============================================================================
// Mapper
// ============================================================================

/// Maps entities of one type to vector records.
pub struct DocumentMapper<E: Entity> {
    schema: EntitySchema,
    descriptors: Vec<IndexDescriptor>,
    metadata_fields: Vec<String>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> DocumentMapper<E> {
    /// Resolve the include list against the schema.
    ///
    /// Fields named in an explicit include list must exist on the entity
    /// type; the wildcard expands to every scalar field. Each field may be
    /// indexed at most once, since queries address indexes by field.
    pub fn new(
        schema: EntitySchema,
        descriptors: Vec<IndexDescriptor>,
        include: &IncludeFields,
    ) -> Result<Self> {
        let mut indexed = HashSet::new();
        if let Some(repeated) = descriptors
            .iter()
            .find(|d| !indexed.insert(d.field_name()))
        {
            return Err(Error::config(format!(
                "Field '{}' of {} is indexed more than once",
                repeated.field_name(),
                schema.name()
            )));
        }

        let metadata_fields = match include {
            IncludeFields::All => schema.scalar_fields().map(str::to_string).collect(),
            IncludeFields::Only(fields) => {
                if let Some(unknown) = fields.iter().find(|f| !schema.has_field(f)) {
                    return Err(Error::config(format!(
                        "include_fields names unknown field '{unknown}' on {}",
                        schema.name()
                    )));
                }
                fields.clone()
            }
        };

        Ok(Self {
            schema,
            descriptors,
            metadata_fields,
            _entity: PhantomData,
        })
    }

    /// The entity schema.
    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    /// Index descriptors in declaration order.
    pub fn descriptors(&self) -> &[IndexDescriptor] {
        &self.descriptors
    }

    /// The descriptor indexing `field_name`, if any.
    pub fn descriptor_for_field(&self, field_name: &str) -> Option<&IndexDescriptor> {
        self.descriptors.iter().find(|d| d.is_for_field(field_name))
    }

    /// Fields copied into the payload.
    pub fn metadata_fields(&self) -> &[String] {
        &self.metadata_fields
    }

    /// The entity's identifier; a validation error while it is unsaved.
    pub fn identifier(&self, entity: &E) -> Result<DocumentId> {
        entity.id().ok_or_else(|| {
            Error::validation(format!(
                "Cannot index {} without a primary key",
                self.schema.name()
            ))
        })
    }

    /// Embed every indexed field, keyed by index name.
    pub async fn vectors(&self, entity: &E) -> Result<BTreeMap<String, Vector>> {
        let vectors = try_join_all(
            self.descriptors
                .iter()
                .map(|descriptor| descriptor.embed_for_storage(entity)),
        )
        .await?;

        Ok(self
            .descriptors
            .iter()
            .map(|d| d.index_name().to_string())
            .zip(vectors)
            .collect())
    }

    /// Payload values of the included fields. Fields the entity cannot
    /// produce are left out; NULLs are kept.
    pub fn metadata(&self, entity: &E) -> BTreeMap<String, FieldValue> {
        self.metadata_fields
            .iter()
            .filter_map(|name| entity.field(name).map(|value| (name.clone(), value)))
            .collect()
    }

    /// Full vector record for an entity.
    pub async fn to_document(&self, entity: &E) -> Result<DocumentRecord> {
        let id = self.identifier(entity)?;
        let vectors = self.vectors(entity).await?;

        Ok(DocumentRecord {
            id,
            vectors,
            metadata: self.metadata(entity),
        })
    }
}

impl<E: Entity> std::fmt::Debug for DocumentMapper<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentMapper")
            .field("entity", &self.schema.name())
            .field("descriptors", &self.descriptors)
            .field("metadata_fields", &self.metadata_fields)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

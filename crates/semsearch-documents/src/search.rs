//! Similarity queries over one indexed field.
//!
//! A query is embedded, run against the field's vector index, and the
//! matching identifiers are re-materialized from the entity store in the
//! backend's rank order.

use semsearch_core::{Error, Result};
use semsearch_vector::{DocumentId, VectorStoreBackend};
use std::collections::HashMap;

use crate::entity::{Entity, EntityStore};
use crate::mapper::DocumentMapper;

/// Number of results returned when no `top_k` is given.
pub const DEFAULT_TOP_K: usize = 10;

/// A similarity query naming exactly one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    terms: Vec<(String, String)>,
    top_k: usize,
}

impl SearchQuery {
    /// Query `field` for entities similar to `value`.
    pub fn field(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            terms: vec![(field.into(), value.into())],
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Add another field term. Multi-field queries are rejected by `find`.
    pub fn and_field(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.terms.push((field.into(), value.into()));
        self
    }

    /// Maximum number of results.
    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// The requested result count.
    pub fn limit(&self) -> usize {
        self.top_k
    }

    /// The (field, value) terms as given.
    pub fn terms(&self) -> &[(String, String)] {
        &self.terms
    }

    /// The single (field, value) term, or a validation error.
    pub fn single_term(&self) -> Result<(&str, &str)> {
        match self.terms.as_slice() {
            [(field, value)] => Ok((field.as_str(), value.as_str())),
            [] => Err(Error::validation("Search query names no field")),
            terms => Err(Error::validation(format!(
                "Search query must name exactly one field, got {}: [{}]",
                terms.len(),
                terms
                    .iter()
                    .map(|(f, _)| f.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }
}

/// Run `query` and return matching entities, best first.
///
/// Identifiers the entity store no longer knows are dropped. An empty
/// search result returns without consulting the store.
pub async fn find<E: Entity>(
    mapper: &DocumentMapper<E>,
    backend: &dyn VectorStoreBackend,
    store: &dyn EntityStore<E>,
    query: &SearchQuery,
) -> Result<Vec<E>> {
    let (field, value) = query.single_term()?;

    let descriptor = mapper.descriptor_for_field(field).ok_or_else(|| {
        Error::config(format!(
            "No vector index on field '{field}' of {}",
            mapper.schema().name()
        ))
    })?;

    let vector = descriptor.embed_for_query(value).await?;
    let ids = backend
        .search(descriptor.index_name(), &vector, query.limit())
        .await?;

    log::debug!(
        "Search on {}.{} returned {} id(s)",
        mapper.schema().name(),
        field,
        ids.len()
    );

    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let entities = store.fetch_by_ids(&ids).await?;
    Ok(order_by_rank(&ids, entities))
}

/// Arrange `entities` in the order of `ids`.
///
/// Entities whose id is not in `ids` are dropped, as are ids with no
/// entity. Each entity appears at most once.
pub fn order_by_rank<E: Entity>(ids: &[DocumentId], entities: Vec<E>) -> Vec<E> {
    let mut by_id: HashMap<DocumentId, E> = entities
        .into_iter()
        .filter_map(|e| e.id().map(|id| (id, e)))
        .collect();

    ids.iter().filter_map(|id| by_id.remove(id)).collect()
}

// ============================================================================
// Tests
// ============================================================================

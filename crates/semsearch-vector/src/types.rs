//! Common types for the vector layer.
//!
//! These types are shared by every backend and embedding provider, and by
//! the document layer that maps relational entities onto vector records.
//! They are always available regardless of feature flags.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use semsearch_core::{Error, Result};

/// A fixed-length embedding.
pub type Vector = Vec<f32>;

/// Name of the payload field holding the entity identifier.
pub const DEFAULT_ID_FIELD: &str = "id";

// ============================================================================
// Identifiers and values
// ============================================================================

/// Identifier of a relational entity, as stored in the vector payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentId {
    /// Integer primary key.
    Int(i64),
    /// String primary key (UUIDs, slugs, ...).
    Str(String),
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for DocumentId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for DocumentId {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// A scalar field value carried in a document payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// SQL NULL.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Integer(i64),
    /// Floating point.
    Float(f64),
    /// Text.
    Text(String),
}

impl FieldValue {
    /// Whether the value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The text content, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Textual form used when the value is embedded. NULL has none.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(b.to_string()),
            Self::Integer(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::Text(s) => Some(s.clone()),
        }
    }

    /// Interpret the value as an identifier. NULL and floats are not identifiers.
    pub fn to_document_id(&self) -> Option<DocumentId> {
        match self {
            Self::Integer(i) => Some(DocumentId::Int(*i)),
            Self::Text(s) if !s.is_empty() => Some(DocumentId::Str(s.clone())),
            _ => None,
        }
    }
}

impl From<DocumentId> for FieldValue {
    fn from(id: DocumentId) -> Self {
        match id {
            DocumentId::Int(i) => Self::Integer(i),
            DocumentId::Str(s) => Self::Text(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

// ============================================================================
// Distance metrics
// ============================================================================

/// Similarity function used to rank a vector slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Distance {
    /// Cosine similarity.
    #[default]
    Cosine,
    /// Euclidean (L2) distance.
    Euclidean,
    /// Dot product.
    DotProduct,
}

impl Distance {
    /// Configuration name of the metric.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Euclidean => "euclidean",
            Self::DotProduct => "dot_product",
        }
    }

    /// Similarity score where higher always means closer.
    ///
    /// Euclidean distance is negated so all metrics sort the same way.
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Cosine => {
                let dot = dot(a, b);
                let norm = (dot_self(a) * dot_self(b)).sqrt();
                if norm > 0.0 { dot / norm } else { 0.0 }
            }
            Self::Euclidean => -a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt(),
            Self::DotProduct => dot(a, b),
        }
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Distance {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cosine" => Ok(Self::Cosine),
            "euclidean" | "euclid" | "l2" => Ok(Self::Euclidean),
            "dot_product" | "dot" => Ok(Self::DotProduct),
            other => Err(Error::config(format!(
                "Unknown distance metric: '{other}'. Supported: cosine, euclidean, dot_product"
            ))),
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn dot_self(a: &[f32]) -> f32 {
    dot(a, a)
}

// ============================================================================
// Index configuration
// ============================================================================

/// Size and metric of one named vector slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VectorSlot {
    /// Vector length.
    pub size: usize,
    /// Ranking metric.
    pub distance: Distance,
}

impl VectorSlot {
    /// Create a slot description.
    pub fn new(size: usize, distance: Distance) -> Self {
        Self { size, distance }
    }
}

/// Layout of one vector-store collection.
///
/// Slots are kept in a sorted map, so equality and hashing do not depend on
/// the order in which they were declared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexConfiguration {
    /// Collection name.
    pub namespace: String,

    /// Vector slots keyed by index name.
    pub vector_slots: BTreeMap<String, VectorSlot>,

    /// Payload field that holds the entity identifier.
    pub id_field: String,
}

impl IndexConfiguration {
    /// Create an empty configuration for a namespace.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            vector_slots: BTreeMap::new(),
            id_field: DEFAULT_ID_FIELD.to_string(),
        }
    }

    /// Add a vector slot. Re-declaring an index name replaces the earlier slot.
    pub fn with_slot(mut self, index_name: impl Into<String>, slot: VectorSlot) -> Self {
        self.vector_slots.insert(index_name.into(), slot);
        self
    }

    /// Set the identifier payload field.
    pub fn with_id_field(mut self, id_field: impl Into<String>) -> Self {
        self.id_field = id_field.into();
        self
    }

    /// Look up a slot by index name.
    pub fn slot(&self, index_name: &str) -> Option<&VectorSlot> {
        self.vector_slots.get(index_name)
    }

    /// Check a vector against the declared slot size.
    pub fn check_vector(&self, index_name: &str, vector: &[f32]) -> Result<()> {
        let slot = self.slot(index_name).ok_or_else(|| {
            Error::backend(format!(
                "Unknown vector slot '{index_name}' in namespace '{}'",
                self.namespace
            ))
        })?;
        if slot.size != vector.len() {
            return Err(Error::dimension_mismatch(index_name, slot.size, vector.len()));
        }
        Ok(())
    }
}

// ============================================================================
// Documents
// ============================================================================

/// The projection of one entity written to the vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Entity identifier.
    pub id: DocumentId,

    /// Vectors keyed by index name.
    pub vectors: BTreeMap<String, Vector>,

    /// Scalar payload for filtering; not a source of truth.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, FieldValue>,
}

impl DocumentRecord {
    /// Create a record with no vectors or metadata.
    pub fn new(id: impl Into<DocumentId>) -> Self {
        Self {
            id: id.into(),
            vectors: BTreeMap::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Add a vector for an index.
    pub fn with_vector(mut self, index_name: impl Into<String>, vector: Vector) -> Self {
        self.vectors.insert(index_name.into(), vector);
        self
    }

    /// Add a metadata field.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The payload written next to the vectors: metadata plus the identifier.
    pub fn payload(&self, id_field: &str) -> BTreeMap<String, FieldValue> {
        let mut payload = self.metadata.clone();
        payload.insert(id_field.to_string(), self.id.clone().into());
        payload
    }
}

// ============================================================================
// Tests
// ============================================================================

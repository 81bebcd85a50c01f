//! Error types for semsearch operations.
//!
//! A single [`Error`] enum is shared by every semsearch crate. Variants are
//! grouped into four categories, exposed through [`Error::kind`]:
//!
//! - [`ErrorKind::Configuration`]: bad or missing declarations, duplicate
//!   registration, unknown field or index
//! - [`ErrorKind::Validation`]: unsaved entity, malformed query
//! - [`ErrorKind::Backend`]: vector store unreachable, collection missing,
//!   dimension mismatch, deadline exceeded
//! - [`ErrorKind::Embedding`]: embedding provider failure
//!
//! Configuration and validation errors indicate programmer error and are
//! never retried. Only backend errors are considered retryable.

use thiserror::Error;

/// Errors that can occur in semsearch operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or missing declaration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input rejected before reaching a backend.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Vector store failure.
    #[error("Backend error: {0}")]
    Backend(String),

    /// The namespace has not been provisioned in the vector store.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    /// A vector did not match the size declared for its slot.
    #[error("Dimension mismatch for '{slot}': expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Vector slot name.
        slot: String,
        /// Size declared in the index configuration.
        expected: usize,
        /// Size of the offending vector.
        actual: usize,
    },

    /// A backend call exceeded its deadline.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Embedding provider failure.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Error category, as seen by callers deciding how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Programmer error in declarations.
    Configuration,
    /// Programmer error in inputs.
    Validation,
    /// Vector store failure.
    Backend,
    /// Embedding provider failure.
    Embedding,
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a backend error.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Create a collection-not-found error.
    pub fn collection_not_found(namespace: impl Into<String>) -> Self {
        Self::CollectionNotFound(namespace.into())
    }

    /// Create a dimension mismatch error.
    pub fn dimension_mismatch(slot: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            slot: slot.into(),
            expected,
            actual,
        }
    }

    /// Create a timeout error.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create an embedding error.
    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    /// The category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) | Self::Serialization(_) | Self::Io(_) => ErrorKind::Configuration,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Backend(_)
            | Self::CollectionNotFound(_)
            | Self::DimensionMismatch { .. }
            | Self::Timeout(_) => ErrorKind::Backend,
            Self::Embedding(_) => ErrorKind::Embedding,
        }
    }

    /// Whether this is a configuration error.
    pub fn is_config(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }

    /// Whether this is a validation error.
    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    /// Whether this is a backend error.
    pub fn is_backend(&self) -> bool {
        self.kind() == ErrorKind::Backend
    }

    /// Whether this is an embedding error.
    pub fn is_embedding(&self) -> bool {
        self.kind() == ErrorKind::Embedding
    }

    /// Whether retrying the same call may succeed.
    ///
    /// Missing collections and dimension mismatches will not fix themselves.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend(_) | Self::Timeout(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias using semsearch's Error type.
pub type Result<T> = std::result::Result<T, Error>;

// ============================================================================
// Tests
// ============================================================================

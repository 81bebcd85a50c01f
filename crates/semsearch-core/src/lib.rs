//! Semsearch Core: shared errors, configuration, and logging.
//!
//! This crate provides the foundational types used across all semsearch
//! crates. It has no internal semsearch dependencies.
//!
//! # Modules
//!
//! - [`error`]: Error type, error categories, and Result alias
//! - [`config`]: Backend/provider selection and per-document overrides
//! - [`logging`]: Subscriber setup for applications

pub mod config;
pub mod error;
pub mod logging;

// Re-export key types at crate root for convenience
pub use config::{
    DocumentOverrides, EmbeddingConfig, RetryConfig, SemanticSearchConfig, VectorStoreConfig,
};
pub use error::{Error, ErrorKind, Result};
pub use logging::init_logging;

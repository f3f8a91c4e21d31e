//! Versioned schema registry

pub mod schema_loader;
pub mod version_manager;

use crate::core::ValidationError;
use thiserror::Error;

pub use schema_loader::SchemaLoader;
pub use version_manager::{VersionInfo, VersionManager};

/// Error types for registry operations
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Version {version} of {pipeline_id} already exists")]
    VersionExists {
        pipeline_id: String,
        version: String,
    },

    #[error("Version {version} not found for {pipeline_id}")]
    VersionNotFound {
        pipeline_id: String,
        version: String,
    },

    #[error("Pipeline {0} not found")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

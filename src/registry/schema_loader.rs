//! Bulk-load schema files from a directory into the registry

use crate::core::PipelineSchema;
use crate::registry::VersionManager;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const DEFAULT_SCHEMA_DIR: &str = "schemas";

/// Loads `*.json` schemas from a directory and pushes them
pub struct SchemaLoader {
    schema_dir: PathBuf,
    versions: VersionManager,
}

impl SchemaLoader {
    pub fn new(schema_dir: impl Into<PathBuf>, versions: VersionManager) -> Self {
        Self {
            schema_dir: schema_dir.into(),
            versions,
        }
    }

    pub fn schema_dir(&self) -> &Path {
        &self.schema_dir
    }

    /// Parse, validate and push one file; failures are logged, not returned
    pub async fn load_from_file(&self, filename: &str) -> bool {
        let path = self.schema_dir.join(filename);
        if !path.exists() {
            error!("Schema file {} not found", path.display());
            return false;
        }

        let schema = match PipelineSchema::from_file(&path) {
            Ok(schema) => schema,
            Err(e) => {
                error!("Invalid schema in {}: {:#}", path.display(), e);
                return false;
            }
        };

        match self.versions.push_schema(&schema).await {
            Ok(version) => {
                info!(
                    "Loaded {} version {} from {}",
                    schema.pipeline_id,
                    version.schema_version,
                    path.display()
                );
                true
            }
            Err(e) => {
                error!("Error loading schema from {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Load every `*.json` file in name order; returns how many were pushed
    pub async fn load_all(&self) -> usize {
        let entries = match std::fs::read_dir(&self.schema_dir) {
            Ok(entries) => entries,
            Err(_) => {
                error!(
                    "Schema directory {} does not exist",
                    self.schema_dir.display()
                );
                return 0;
            }
        };

        let mut filenames: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.ends_with(".json"))
            .collect();
        filenames.sort();

        let mut loaded = 0;
        for filename in &filenames {
            if self.load_from_file(filename).await {
                loaded += 1;
            }
        }
        loaded
    }
}

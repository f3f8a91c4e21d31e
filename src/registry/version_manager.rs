//! Schema version manager backed by the `schema_registry` collection

use crate::core::{validate_schema, PipelineSchema};
use crate::persistence::{Store, StoredSchema};
use crate::registry::RegistryError;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Summary of one stored version
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionInfo {
    pub schema_version: String,
    pub is_latest: bool,
    pub created_at: String,
}

impl From<&StoredSchema> for VersionInfo {
    fn from(entry: &StoredSchema) -> Self {
        Self {
            schema_version: entry.schema_version.clone(),
            is_latest: entry.is_latest,
            created_at: entry.created_at.clone(),
        }
    }
}

/// Push, list, roll back and load schema versions
#[derive(Clone)]
pub struct VersionManager {
    store: Arc<dyn Store>,
}

impl VersionManager {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Validate and store a new version, making it the latest
    pub async fn push_schema(&self, schema: &PipelineSchema) -> Result<VersionInfo, RegistryError> {
        validate_schema(schema)?;

        let existing = self.store.find_schemas(&schema.pipeline_id).await?;
        if existing
            .iter()
            .any(|s| s.schema_version == schema.schema_version)
        {
            return Err(RegistryError::VersionExists {
                pipeline_id: schema.pipeline_id.clone(),
                version: schema.schema_version.clone(),
            });
        }

        let entry = StoredSchema::new(schema.clone());
        self.store.insert_schema(&entry).await?;
        self.store
            .set_latest(&schema.pipeline_id, &schema.schema_version)
            .await?;

        info!(
            "Pushed {} version {} ({} earlier versions)",
            schema.pipeline_id,
            schema.schema_version,
            existing.len()
        );
        Ok(VersionInfo::from(&entry))
    }

    /// Stored versions, oldest push first
    pub async fn list_versions(&self, pipeline_id: &str) -> Result<Vec<VersionInfo>, RegistryError> {
        let entries = self.store.find_schemas(pipeline_id).await?;
        Ok(entries.iter().map(VersionInfo::from).collect())
    }

    /// Keep only `version` and make it the latest
    pub async fn rollback_version(&self, pipeline_id: &str, version: &str) -> Result<u64, RegistryError> {
        let entries = self.store.find_schemas(pipeline_id).await?;
        if !entries.iter().any(|s| s.schema_version == version) {
            return Err(RegistryError::VersionNotFound {
                pipeline_id: pipeline_id.to_string(),
                version: version.to_string(),
            });
        }

        let removed = self.store.delete_other_versions(pipeline_id, version).await?;
        self.store.set_latest(pipeline_id, version).await?;

        info!(
            "Rolled back {} to {} ({} versions removed)",
            pipeline_id, version, removed
        );
        Ok(removed)
    }

    /// Load a version, or the latest when `version` is None
    pub async fn load_schema(
        &self,
        pipeline_id: &str,
        version: Option<&str>,
    ) -> Result<Option<PipelineSchema>, RegistryError> {
        let mut entries = self.store.find_schemas(pipeline_id).await?;

        let found = match version {
            Some(v) => entries.into_iter().find(|s| s.schema_version == v),
            None => match entries.iter().rposition(|s| s.is_latest) {
                Some(idx) => Some(entries.swap_remove(idx)),
                // Fall back to the most recent push
                None => entries.pop(),
            },
        };

        Ok(found.map(|s| s.schema))
    }

    /// Like `load_schema`, but a missing pipeline or version is an error
    pub async fn require_schema(
        &self,
        pipeline_id: &str,
        version: Option<&str>,
    ) -> Result<PipelineSchema, RegistryError> {
        match self.load_schema(pipeline_id, version).await? {
            Some(schema) => Ok(schema),
            None => match version {
                Some(v) => Err(RegistryError::VersionNotFound {
                    pipeline_id: pipeline_id.to_string(),
                    version: v.to_string(),
                }),
                None => Err(RegistryError::NotFound(pipeline_id.to_string())),
            },
        }
    }

    /// Distinct pipeline IDs, sorted
    pub async fn list_pipelines(&self) -> Result<Vec<String>, RegistryError> {
        Ok(self.store.distinct_pipelines().await?)
    }
}

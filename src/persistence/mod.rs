//! Persistence layer: the schema registry and result collections

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteStore;

use crate::core::config::AppConfig;
use crate::core::{now_rfc3339, OutputCollection, PipelineSchema, RecordStatus};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A schema document as stored in the `schema_registry` collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSchema {
    pub pipeline_id: String,
    pub schema_version: String,
    pub is_latest: bool,
    /// When the version was pushed
    pub created_at: String,
    pub schema: PipelineSchema,
}

impl StoredSchema {
    pub fn new(schema: PipelineSchema) -> Self {
        Self {
            pipeline_id: schema.pipeline_id.clone(),
            schema_version: schema.schema_version.clone(),
            is_latest: true,
            created_at: now_rfc3339(),
            schema,
        }
    }
}

/// A task result or pipeline log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub run_id: Uuid,
    pub pipeline_id: String,
    /// None for pipeline-level log entries
    pub task_id: Option<u32>,
    pub status: RecordStatus,
    pub output: Option<String>,
    pub error: Option<String>,
    pub attempts: u32,
    pub created_at: String,
}

impl ResultRecord {
    /// A pipeline-level log entry
    pub fn pipeline_event(
        run_id: Uuid,
        pipeline_id: &str,
        status: RecordStatus,
        message: Option<String>,
    ) -> Self {
        Self {
            run_id,
            pipeline_id: pipeline_id.to_string(),
            task_id: None,
            status,
            output: message,
            error: None,
            attempts: 0,
            created_at: now_rfc3339(),
        }
    }
}

/// Query filter over result records; unset fields match anything
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub pipeline_id: Option<String>,
    pub task_id: Option<u32>,
    pub status: Option<RecordStatus>,
}

impl RecordFilter {
    pub fn pipeline(pipeline_id: impl Into<String>) -> Self {
        Self {
            pipeline_id: Some(pipeline_id.into()),
            ..Self::default()
        }
    }

    pub fn task(task_id: u32) -> Self {
        Self {
            task_id: Some(task_id),
            ..Self::default()
        }
    }

    pub fn with_task(mut self, task_id: u32) -> Self {
        self.task_id = Some(task_id);
        self
    }

    pub fn with_status(mut self, status: RecordStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn matches(&self, record: &ResultRecord) -> bool {
        self.pipeline_id
            .as_ref()
            .map_or(true, |p| &record.pipeline_id == p)
            && self.task_id.map_or(true, |t| record.task_id == Some(t))
            && self.status.map_or(true, |s| record.status == s)
    }
}

/// Trait for storage backends
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    /// Insert a schema version
    async fn insert_schema(&self, entry: &StoredSchema) -> Result<()>;

    /// All stored versions of a pipeline, oldest push first
    async fn find_schemas(&self, pipeline_id: &str) -> Result<Vec<StoredSchema>>;

    /// Mark one version latest and clear the flag on the others
    async fn set_latest(&self, pipeline_id: &str, schema_version: &str) -> Result<()>;

    /// Delete every version of a pipeline except `keep_version`
    async fn delete_other_versions(&self, pipeline_id: &str, keep_version: &str) -> Result<u64>;

    /// Distinct pipeline IDs in the registry, sorted
    async fn distinct_pipelines(&self) -> Result<Vec<String>>;

    /// Append a record to a collection
    async fn insert_record(&self, collection: OutputCollection, record: &ResultRecord) -> Result<()>;

    /// Records of a collection matching a filter, oldest first
    async fn find_records(
        &self,
        collection: OutputCollection,
        filter: &RecordFilter,
    ) -> Result<Vec<ResultRecord>>;

    /// Check the backend is reachable
    async fn ping(&self) -> Result<()>;
}

/// In-memory store (for testing or ephemeral use)
pub struct InMemoryStore {
    schemas: RwLock<Vec<StoredSchema>>,
    records: RwLock<HashMap<OutputCollection, Vec<ResultRecord>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            schemas: RwLock::new(Vec::new()),
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Store for InMemoryStore {
    async fn insert_schema(&self, entry: &StoredSchema) -> Result<()> {
        let mut schemas = self.schemas.write().await;
        if schemas.iter().any(|s| {
            s.pipeline_id == entry.pipeline_id && s.schema_version == entry.schema_version
        }) {
            bail!(
                "Schema {} version {} already stored",
                entry.pipeline_id,
                entry.schema_version
            );
        }
        schemas.push(entry.clone());
        Ok(())
    }

    async fn find_schemas(&self, pipeline_id: &str) -> Result<Vec<StoredSchema>> {
        let schemas = self.schemas.read().await;
        Ok(schemas
            .iter()
            .filter(|s| s.pipeline_id == pipeline_id)
            .cloned()
            .collect())
    }

    async fn set_latest(&self, pipeline_id: &str, schema_version: &str) -> Result<()> {
        let mut schemas = self.schemas.write().await;
        for entry in schemas.iter_mut().filter(|s| s.pipeline_id == pipeline_id) {
            entry.is_latest = entry.schema_version == schema_version;
        }
        Ok(())
    }

    async fn delete_other_versions(&self, pipeline_id: &str, keep_version: &str) -> Result<u64> {
        let mut schemas = self.schemas.write().await;
        let before = schemas.len();
        schemas.retain(|s| s.pipeline_id != pipeline_id || s.schema_version == keep_version);
        Ok((before - schemas.len()) as u64)
    }

    async fn distinct_pipelines(&self) -> Result<Vec<String>> {
        let schemas = self.schemas.read().await;
        let mut ids: Vec<String> = schemas.iter().map(|s| s.pipeline_id.clone()).collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    async fn insert_record(&self, collection: OutputCollection, record: &ResultRecord) -> Result<()> {
        let mut records = self.records.write().await;
        records.entry(collection).or_default().push(record.clone());
        Ok(())
    }

    async fn find_records(
        &self,
        collection: OutputCollection,
        filter: &RecordFilter,
    ) -> Result<Vec<ResultRecord>> {
        let records = self.records.read().await;
        Ok(records
            .get(&collection)
            .map(|list| list.iter().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Resolve a connection URI and database name into an SQLite URL.
///
/// `sqlite::memory:` is used as-is; `sqlite://<dir>` and `sqlite:<dir>` map to
/// the file `<dir>/<db_name>.db`, which is created on first connect.
pub fn resolve_database_url(uri: &str, db_name: &str) -> Result<String> {
    let uri = uri.trim();
    if uri == "sqlite::memory:" {
        return Ok(uri.to_string());
    }

    let root = uri
        .strip_prefix("sqlite://")
        .or_else(|| uri.strip_prefix("sqlite:"))
        .with_context(|| {
            format!(
                "Unsupported database URI '{}': expected sqlite://<dir> or sqlite::memory:",
                uri
            )
        })?;

    if root.is_empty() {
        bail!("Database URI '{}' has no directory", uri);
    }
    if db_name.is_empty()
        || !db_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        bail!("Invalid database name '{}'", db_name);
    }

    let root = PathBuf::from(root);
    std::fs::create_dir_all(&root)
        .with_context(|| format!("Failed to create database directory {}", root.display()))?;

    let file = root.join(format!("{}.db", db_name));
    Ok(format!("sqlite://{}?mode=rwc", file.display()))
}

/// Open the configured store and make sure its collections exist
#[cfg(feature = "sqlite")]
pub async fn open_store(config: &AppConfig) -> Result<Arc<dyn Store>> {
    let url = resolve_database_url(&config.uri, &config.db_name)?;
    let store = SqliteStore::connect(&url).await?;
    Ok(Arc::new(store))
}

/// Without a database driver only an ephemeral store is available
#[cfg(not(feature = "sqlite"))]
pub async fn open_store(config: &AppConfig) -> Result<Arc<dyn Store>> {
    tracing::warn!(
        "Built without the sqlite feature; {} is ignored and data will not persist",
        config.uri
    );
    Ok(Arc::new(InMemoryStore::new()))
}

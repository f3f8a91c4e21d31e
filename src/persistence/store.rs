//! SQLite-based store

use crate::core::{OutputCollection, PipelineSchema, RecordStatus};
use crate::persistence::{RecordFilter, ResultRecord, Store, StoredSchema};
use anyhow::{Context, Result};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

/// SQLite-backed registry and result collections
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to a database URL and set up the collections
    pub async fn connect(url: &str) -> Result<Self> {
        let options = if url.contains(":memory:") {
            // The database lives only as long as its single connection
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = options
            .connect(url)
            .await
            .with_context(|| format!("Failed to connect to database {}", url))?;

        let store = Self { pool };
        store.setup_collections().await?;
        debug!("Connected to {}", url);

        Ok(store)
    }

    /// Create the collections and their indexes
    pub async fn setup_collections(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_registry (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                pipeline_id TEXT NOT NULL,
                schema_version TEXT NOT NULL,
                is_latest INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                document TEXT NOT NULL,
                UNIQUE (pipeline_id, schema_version)
            );

            CREATE INDEX IF NOT EXISTS idx_schema_registry_pipeline_id
                ON schema_registry(pipeline_id);
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create schema_registry")?;

        for (collection, indexed) in [
            (OutputCollection::TaskResults, "task_id"),
            (OutputCollection::TriggerLogs, "pipeline_id"),
        ] {
            let table = collection.as_str();
            sqlx::query(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    run_id TEXT NOT NULL,
                    pipeline_id TEXT NOT NULL,
                    task_id INTEGER,
                    status TEXT NOT NULL,
                    output TEXT,
                    error TEXT,
                    attempts INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_{table}_{indexed} ON {table}({indexed});
                "#
            ))
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to create {}", table))?;
        }

        Ok(())
    }

    fn schema_from_row(row: &SqliteRow) -> Result<StoredSchema> {
        let document: String = row.try_get("document")?;
        let schema: PipelineSchema =
            serde_json::from_str(&document).context("Corrupt schema document in registry")?;
        Ok(StoredSchema {
            pipeline_id: row.try_get("pipeline_id")?,
            schema_version: row.try_get("schema_version")?,
            is_latest: row.try_get("is_latest")?,
            created_at: row.try_get("created_at")?,
            schema,
        })
    }

    fn record_from_row(row: &SqliteRow) -> Result<ResultRecord> {
        let status: String = row.try_get("status")?;
        Ok(ResultRecord {
            run_id: Uuid::parse_str(&row.try_get::<String, _>("run_id")?)?,
            pipeline_id: row.try_get("pipeline_id")?,
            task_id: row
                .try_get::<Option<i64>, _>("task_id")?
                .map(u32::try_from)
                .transpose()?,
            status: status.parse::<RecordStatus>().map_err(anyhow::Error::msg)?,
            output: row.try_get("output")?,
            error: row.try_get("error")?,
            attempts: u32::try_from(row.try_get::<i64, _>("attempts")?)?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait::async_trait]
impl Store for SqliteStore {
    async fn insert_schema(&self, entry: &StoredSchema) -> Result<()> {
        let document = serde_json::to_string(&entry.schema)?;
        sqlx::query(
            r#"
            INSERT INTO schema_registry
            (pipeline_id, schema_version, is_latest, created_at, document)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&entry.pipeline_id)
        .bind(&entry.schema_version)
        .bind(entry.is_latest)
        .bind(&entry.created_at)
        .bind(document)
        .execute(&self.pool)
        .await
        .context("Failed to insert schema")?;

        Ok(())
    }

    async fn find_schemas(&self, pipeline_id: &str) -> Result<Vec<StoredSchema>> {
        let rows = sqlx::query(
            r#"
            SELECT pipeline_id, schema_version, is_latest, created_at, document
            FROM schema_registry
            WHERE pipeline_id = ?1
            ORDER BY seq ASC
            "#,
        )
        .bind(pipeline_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to query schema_registry")?;

        rows.iter().map(Self::schema_from_row).collect()
    }

    async fn set_latest(&self, pipeline_id: &str, schema_version: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE schema_registry
            SET is_latest = (schema_version = ?2)
            WHERE pipeline_id = ?1
            "#,
        )
        .bind(pipeline_id)
        .bind(schema_version)
        .execute(&self.pool)
        .await
        .context("Failed to update latest version")?;

        Ok(())
    }

    async fn delete_other_versions(&self, pipeline_id: &str, keep_version: &str) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM schema_registry WHERE pipeline_id = ?1 AND schema_version != ?2",
        )
        .bind(pipeline_id)
        .bind(keep_version)
        .execute(&self.pool)
        .await
        .context("Failed to delete schema versions")?;

        Ok(result.rows_affected())
    }

    async fn distinct_pipelines(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT pipeline_id
            FROM schema_registry
            ORDER BY pipeline_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list pipelines")?;

        rows.iter()
            .map(|row| row.try_get("pipeline_id").map_err(Into::into))
            .collect()
    }

    async fn insert_record(&self, collection: OutputCollection, record: &ResultRecord) -> Result<()> {
        sqlx::query(&format!(
            r#"
            INSERT INTO {}
            (run_id, pipeline_id, task_id, status, output, error, attempts, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            collection.as_str()
        ))
        .bind(record.run_id.to_string())
        .bind(&record.pipeline_id)
        .bind(record.task_id.map(i64::from))
        .bind(record.status.as_str())
        .bind(&record.output)
        .bind(&record.error)
        .bind(i64::from(record.attempts))
        .bind(&record.created_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to insert into {}", collection))?;

        Ok(())
    }

    async fn find_records(
        &self,
        collection: OutputCollection,
        filter: &RecordFilter,
    ) -> Result<Vec<ResultRecord>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT run_id, pipeline_id, task_id, status, output, error, attempts, created_at
            FROM {}
            WHERE (?1 IS NULL OR pipeline_id = ?1)
              AND (?2 IS NULL OR task_id = ?2)
              AND (?3 IS NULL OR status = ?3)
            ORDER BY seq ASC
            "#,
            collection.as_str()
        ))
        .bind(filter.pipeline_id.as_deref())
        .bind(filter.task_id.map(i64::from))
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to query {}", collection))?;

        rows.iter().map(Self::record_from_row).collect()
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("Database is not reachable")?;
        Ok(())
    }
}

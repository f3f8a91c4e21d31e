//! Test: Registry Versions - push, list, pull and roll back schemas

use crate::helpers::*;
use contextchain::core::{ExecutionStatus, OutputCollection, PipelineSchema};
use contextchain::persistence::{InMemoryStore, RecordFilter, Store};
use contextchain::registry::{RegistryError, SchemaLoader, VersionManager};
use contextchain::ExecutionEngine;
use std::sync::Arc;

fn report_schema(version: &str, description: &str) -> PipelineSchema {
    let mut schema = schema(
        r#"{
  "pipeline_id": "report",
  "tasks": [{"task_id": 1, "task_type": "LOCAL", "endpoint": "build"}]
}"#,
    );
    schema.schema_version = version.to_string();
    schema.description = description.to_string();
    schema
}

async fn registry_with(store: Arc<dyn Store>, versions: &[&str]) -> VersionManager {
    let registry = VersionManager::new(store);
    for version in versions {
        registry
            .push_schema(&report_schema(version, &format!("v{}", version)))
            .await
            .unwrap();
    }
    registry
}

#[tokio::test]
async fn test_latest_follows_each_push() {
    let registry = registry_with(Arc::new(InMemoryStore::new()), &["1.0.0", "1.1.0", "2.0.0"]).await;

    let versions = registry.list_versions("report").await.unwrap();
    let listed: Vec<(&str, bool)> = versions
        .iter()
        .map(|v| (v.schema_version.as_str(), v.is_latest))
        .collect();
    assert_eq!(
        listed,
        vec![("1.0.0", false), ("1.1.0", false), ("2.0.0", true)]
    );

    let latest = registry.load_schema("report", None).await.unwrap().unwrap();
    assert_eq!(latest.schema_version, "2.0.0");
    let pinned = registry
        .load_schema("report", Some("1.1.0"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pinned.description, "v1.1.0");
}

#[tokio::test]
async fn test_duplicate_and_invalid_pushes_rejected() {
    let registry = registry_with(Arc::new(InMemoryStore::new()), &["1.0.0"]).await;

    let err = registry
        .push_schema(&report_schema("1.0.0", "again"))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::VersionExists { .. }));

    let err = registry
        .push_schema(&report_schema("one", "bad version"))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::Validation(_)));
    assert_eq!(registry.list_versions("report").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_rollback_keeps_only_target() {
    let registry = registry_with(Arc::new(InMemoryStore::new()), &["1.0.0", "1.1.0", "2.0.0"]).await;

    let removed = registry.rollback_version("report", "1.1.0").await.unwrap();
    assert_eq!(removed, 2);

    let versions = registry.list_versions("report").await.unwrap();
    assert_eq!(versions.len(), 1);
    assert!(versions[0].is_latest);
    assert_eq!(
        registry.require_schema("report", None).await.unwrap().schema_version,
        "1.1.0"
    );

    let err = registry.rollback_version("report", "9.9.9").await.unwrap_err();
    assert!(matches!(err, RegistryError::VersionNotFound { .. }));
    assert!(matches!(
        registry.require_schema("missing", None).await,
        Err(RegistryError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_loader_pushes_valid_files_only() {
    let dir = tempfile::tempdir().unwrap();
    report_schema("1.0.0", "from disk")
        .write_to(dir.path().join("a_report.json"))
        .unwrap();
    std::fs::write(dir.path().join("b_broken.json"), "{not json").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let registry = VersionManager::new(Arc::new(InMemoryStore::new()));
    let loader = SchemaLoader::new(dir.path(), registry.clone());
    assert_eq!(loader.load_all().await, 1);

    // Pushing the same files again finds every version taken
    assert_eq!(loader.load_all().await, 0);
    assert_eq!(registry.list_pipelines().await.unwrap(), vec!["report"]);
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_sqlite_end_to_end() {
    use contextchain::persistence::SqliteStore;

    let store: Arc<dyn Store> = Arc::new(SqliteStore::connect("sqlite::memory:").await.unwrap());
    let registry = registry_with(store.clone(), &["1.0.0", "1.0.1"]).await;
    let schema = registry.require_schema("report", None).await.unwrap();
    assert_eq!(schema.schema_version, "1.0.1");

    let runner = MockRunner::new();
    let engine = ExecutionEngine::new(runner.clone(), store.clone());
    let report = engine.execute_pipeline(&schema).await.unwrap();
    assert_eq!(report.status, ExecutionStatus::Completed);

    let results = store
        .find_records(OutputCollection::TaskResults, &RecordFilter::task(1))
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].output.as_deref(), Some("1:"));
    assert_eq!(results[0].run_id, report.run_id);

    assert_eq!(registry.rollback_version("report", "1.0.0").await.unwrap(), 1);
    assert_eq!(registry.list_pipelines().await.unwrap(), vec!["report"]);
}

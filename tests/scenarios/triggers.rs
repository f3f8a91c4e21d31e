//! Test: Triggers - cron tasks of the latest schemas fire through the engine

use crate::helpers::*;
use chrono::{TimeZone, Utc};
use contextchain::core::{OutputCollection, RecordStatus, TaskStatus};
use contextchain::persistence::{InMemoryStore, RecordFilter};
use contextchain::registry::VersionManager;
use contextchain::{ExecutionEngine, TriggerHandler};
use std::sync::Arc;

fn digest(version: &str, cron: &str) -> String {
    format!(
        r#"{{
  "pipeline_id": "digest",
  "schema_version": "{version}",
  "tasks": [
    {{"task_id": 1, "task_type": "LOCAL", "endpoint": "collect", "cron": "{cron}"}},
    {{"task_id": 2, "task_type": "LOCAL", "endpoint": "send", "inputs": [1],
      "cron": "5 8 * * 1-5"}}
  ],
  "global_config": {{"retry_on_failure": false}}
}}"#
    )
}

async fn handler_for(
    schemas: &[String],
    runner: MockRunner,
) -> (TriggerHandler<MockRunner>, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    let registry = VersionManager::new(store.clone());
    for json in schemas {
        registry.push_schema(&schema(json)).await.unwrap();
    }
    let engine = Arc::new(ExecutionEngine::new(runner, store.clone()));
    (TriggerHandler::from_store(engine).await.unwrap(), store)
}

#[tokio::test]
async fn test_only_latest_schema_is_scheduled() {
    let (handler, _) = handler_for(
        &[digest("1.0.0", "*/15 * * * *"), digest("1.1.0", "0 8 * * *")],
        MockRunner::new(),
    )
    .await;

    let schedules: Vec<&str> = handler
        .entries()
        .iter()
        .map(|e| e.schedule.expression())
        .collect();
    assert_eq!(schedules, vec!["0 8 * * *", "5 8 * * 1-5"]);
}

#[tokio::test]
async fn test_chained_triggers_share_results() {
    let runner = MockRunner::new().reply(1, vec![Reply::Output("items".to_string())]);
    let (handler, store) = handler_for(&[digest("1.0.0", "0 8 * * *")], runner.clone()).await;

    // Monday 2025-06-02
    let collect_at = Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 0).unwrap();
    let send_at = Utc.with_ymd_and_hms(2025, 6, 2, 8, 5, 0).unwrap();
    assert_eq!(handler.next_fire(&collect_at), Some(send_at));

    let first = handler.fire(&collect_at).await.unwrap();
    assert_eq!(first.len(), 1);
    let second = handler.fire(&send_at).await.unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].status, TaskStatus::Completed);
    assert_eq!(second[0].output.as_deref(), Some("2:items"));

    let triggered = records(
        &store,
        OutputCollection::TriggerLogs,
        RecordFilter::pipeline("digest").with_status(RecordStatus::Triggered),
    )
    .await;
    let fired: Vec<Option<u32>> = triggered.iter().map(|r| r.task_id).collect();
    assert_eq!(fired, vec![Some(1), Some(2)]);
}

#[tokio::test]
async fn test_missing_input_is_logged_not_fatal() {
    let runner = MockRunner::new();
    let (handler, store) = handler_for(&[digest("1.0.0", "0 8 * * *")], runner.clone()).await;

    // Task 2 fires before task 1 ever ran
    let send_at = Utc.with_ymd_and_hms(2025, 6, 3, 8, 5, 0).unwrap();
    let outcomes = handler.fire(&send_at).await.unwrap();
    assert!(outcomes.is_empty());
    assert!(runner.calls().is_empty());

    let triggered = records(
        &store,
        OutputCollection::TriggerLogs,
        RecordFilter::task(2).with_status(RecordStatus::Triggered),
    )
    .await;
    assert_eq!(triggered.len(), 1);
}

#[tokio::test]
async fn test_weekend_skips_weekday_schedule() {
    let (handler, _) = handler_for(&[digest("1.0.0", "0 8 * * *")], MockRunner::new()).await;

    // Saturday 2025-06-07
    let saturday = Utc.with_ymd_and_hms(2025, 6, 7, 8, 5, 0).unwrap();
    assert!(handler.due_at(&saturday).is_empty());
    let sunday_eight = Utc.with_ymd_and_hms(2025, 6, 8, 8, 0, 0).unwrap();
    assert_eq!(handler.due_at(&sunday_eight).len(), 1);
}

//! Test: Failure Handling - the first failed task stops the run

use crate::helpers::*;
use contextchain::core::{ExecutionStatus, OutputCollection, RecordStatus, TaskStatus};
use contextchain::persistence::RecordFilter;

const CHAIN: &str = r#"{
  "pipeline_id": "chain",
  "tasks": [
    {"task_id": 1, "task_type": "LOCAL", "endpoint": "extract"},
    {"task_id": 2, "task_type": "LOCAL", "endpoint": "transform", "inputs": [1]},
    {"task_id": 3, "task_type": "LOCAL", "endpoint": "load", "inputs": [2]},
    {"task_id": 4, "task_type": "LOCAL", "endpoint": "notify"}
  ],
  "global_config": {"retry_on_failure": false}
}"#;

#[tokio::test]
async fn test_later_tasks_are_skipped() {
    let runner = MockRunner::new().reply(2, vec![Reply::Fail("bad row".to_string())]);
    let (report, _) = run_pipeline_with_mock(&schema(CHAIN), runner.clone()).await;

    assert_eq!(report.status, ExecutionStatus::Failed);
    assert_eq!(runner.call_order(), vec![1, 2]);
    assert_task_status(&report, 1, TaskStatus::Completed);
    assert_task_status(&report, 2, TaskStatus::Failed);
    // Independent tasks after the failure are skipped too
    assert_task_status(&report, 3, TaskStatus::Skipped);
    assert_task_status(&report, 4, TaskStatus::Skipped);
    assert_eq!(report.executed_order(), vec![1, 2]);
    assert_eq!(report.progress(), 0.25);
}

#[tokio::test]
async fn test_failure_is_logged_with_task_and_error() {
    let runner = MockRunner::new().reply(2, vec![Reply::Fail("bad row".to_string())]);
    let (report, store) = run_pipeline_with_mock(&schema(CHAIN), runner).await;

    let results = records(&store, OutputCollection::TaskResults, RecordFilter::pipeline("chain")).await;
    let stored: Vec<(Option<u32>, RecordStatus)> =
        results.iter().map(|r| (r.task_id, r.status)).collect();
    assert_eq!(
        stored,
        vec![(Some(1), RecordStatus::Completed), (Some(2), RecordStatus::Failed)]
    );
    assert!(results[1].error.as_deref().unwrap().contains("bad row"));

    let failed = records(
        &store,
        OutputCollection::TriggerLogs,
        RecordFilter::pipeline("chain").with_status(RecordStatus::Failed),
    )
    .await;
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].task_id, Some(2));
    assert_eq!(failed[0].run_id, report.run_id);
    assert!(failed[0].error.as_deref().unwrap().contains("bad row"));
}

#[tokio::test]
async fn test_invalid_schema_never_runs() {
    let cyclic = schema(
        r#"{
  "pipeline_id": "loop",
  "tasks": [
    {"task_id": 1, "task_type": "LOCAL", "endpoint": "a", "inputs": [2]},
    {"task_id": 2, "task_type": "LOCAL", "endpoint": "b", "inputs": [1]}
  ]
}"#,
    );
    let runner = MockRunner::new();
    let (engine, store) = engine_with(runner.clone());

    assert!(engine.execute_pipeline(&cyclic).await.is_err());
    assert!(runner.calls().is_empty());
    let logs = records(&store, OutputCollection::TriggerLogs, RecordFilter::pipeline("loop")).await;
    assert!(logs.is_empty());
}

#[tokio::test]
async fn test_disallowed_task_type_rejected() {
    let restricted = schema(
        r#"{
  "pipeline_id": "restricted",
  "tasks": [{"task_id": 1, "task_type": "LOCAL", "endpoint": "rm"}],
  "global_config": {"allowed_task_types": ["GET", "LLM"]}
}"#,
    );
    let runner = MockRunner::new();
    let (engine, _) = engine_with(runner.clone());

    let err = engine.execute_pipeline(&restricted).await.unwrap_err();
    assert!(err.to_string().contains("LOCAL"), "got {}", err);
    assert!(runner.calls().is_empty());
}

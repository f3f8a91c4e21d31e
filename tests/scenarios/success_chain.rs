//! Test: Success Chain - tasks run in dependency order and feed each other

use crate::helpers::*;
use contextchain::core::{ExecutionStatus, OutputCollection, RecordStatus};
use contextchain::persistence::RecordFilter;

const DIAMOND: &str = r#"{
  "pipeline_id": "diamond",
  "schema_version": "1.0.0",
  "tasks": [
    {"task_id": 3, "task_type": "LOCAL", "endpoint": "merge", "inputs": [1, 2]},
    {"task_id": 1, "task_type": "LOCAL", "endpoint": "fetch"},
    {"task_id": 2, "task_type": "LOCAL", "endpoint": "clean", "inputs": [1],
     "output_collection": "trigger_logs"}
  ]
}"#;

#[tokio::test]
async fn test_tasks_run_in_dependency_order() {
    let runner = MockRunner::new();
    let (report, _) = run_pipeline_with_mock(&schema(DIAMOND), runner.clone()).await;

    assert_eq!(report.status, ExecutionStatus::Completed);
    assert_eq!(runner.call_order(), vec![1, 2, 3]);
    assert_eq!(report.executed_order(), vec![1, 2, 3]);
    assert_eq!(report.progress(), 1.0);
}

#[tokio::test]
async fn test_outputs_flow_to_dependents() {
    let runner = MockRunner::new()
        .reply(1, vec![Reply::Output("raw".to_string())])
        .reply(2, vec![Reply::Output("clean".to_string())]);
    let (report, _) = run_pipeline_with_mock(&schema(DIAMOND), runner.clone()).await;

    assert_task_output(&report, 3, "3:raw\n\nclean");

    let merge = runner
        .calls()
        .into_iter()
        .find(|c| c.task_id == 3)
        .unwrap();
    assert_eq!(merge.context.input_outputs.get(&1).map(String::as_str), Some("raw"));
    assert_eq!(merge.context.input_outputs.get(&2).map(String::as_str), Some("clean"));
    assert_eq!(merge.context.run_id, report.run_id);
}

#[tokio::test]
async fn test_results_land_in_their_collections() {
    let (report, store) = run_pipeline_with_mock(&schema(DIAMOND), MockRunner::new()).await;

    let results = records(&store, OutputCollection::TaskResults, RecordFilter::pipeline("diamond")).await;
    let mut result_tasks: Vec<u32> = results.iter().filter_map(|r| r.task_id).collect();
    result_tasks.sort();
    assert_eq!(result_tasks, vec![1, 3]);
    assert!(results.iter().all(|r| r.status == RecordStatus::Completed));
    assert!(results.iter().all(|r| r.attempts == 1));

    let logs = records(&store, OutputCollection::TriggerLogs, RecordFilter::pipeline("diamond")).await;
    let statuses: Vec<(Option<u32>, RecordStatus)> =
        logs.iter().map(|r| (r.task_id, r.status)).collect();
    assert_eq!(
        statuses,
        vec![
            (None, RecordStatus::Started),
            (Some(2), RecordStatus::Completed),
            (None, RecordStatus::Completed),
        ]
    );
    assert!(logs.iter().all(|r| r.run_id == report.run_id));
}

#[tokio::test]
async fn test_empty_pipeline_completes() {
    let empty = schema(r#"{"pipeline_id": "empty", "tasks": []}"#);
    let (report, store) = run_pipeline_with_mock(&empty, MockRunner::new()).await;

    assert_eq!(report.status, ExecutionStatus::Completed);
    assert!(report.tasks.is_empty());
    let logs = records(&store, OutputCollection::TriggerLogs, RecordFilter::pipeline("empty")).await;
    assert_eq!(logs.len(), 2);
}

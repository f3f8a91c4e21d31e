//! Test: Input Chaining - input sources and stored results feed tasks

use crate::helpers::*;
use contextchain::core::{ExecutionStatus, OutputCollection, TaskStatus};
use contextchain::persistence::RecordFilter;
use contextchain::runners::TaskError;

fn with_source(wait_for_input: bool) -> String {
    format!(
        r#"{{
  "pipeline_id": "sourced",
  "tasks": [
    {{"task_id": 1, "task_type": "LOCAL", "endpoint": "summarise",
      "input_source": "https://feeds.example.com/today",
      "wait_for_input": {wait_for_input}}}
  ],
  "global_config": {{"retry_on_failure": false}}
}}"#
    )
}

#[tokio::test]
async fn test_input_source_is_fetched_into_context() {
    let runner = MockRunner::new().source("https://feeds.example.com/today", Ok("headline"));
    let (report, _) = run_pipeline_with_mock(&schema(&with_source(true)), runner.clone()).await;

    assert_eq!(report.status, ExecutionStatus::Completed);
    let call = &runner.calls()[0];
    assert_eq!(call.context.input_source.as_deref(), Some("headline"));
}

#[tokio::test]
async fn test_unreachable_source_fails_waiting_task() {
    let runner = MockRunner::new().source("https://feeds.example.com/today", Err("503"));
    let (report, _) = run_pipeline_with_mock(&schema(&with_source(true)), runner.clone()).await;

    assert_eq!(report.status, ExecutionStatus::Failed);
    assert!(runner.calls().is_empty());
    assert!(report.outcome(1).unwrap().error.as_deref().unwrap().contains("503"));
}

#[tokio::test]
async fn test_unreachable_source_is_optional_without_wait() {
    let runner = MockRunner::new().source("https://feeds.example.com/today", Err("503"));
    let (report, _) = run_pipeline_with_mock(&schema(&with_source(false)), runner.clone()).await;

    assert_eq!(report.status, ExecutionStatus::Completed);
    assert_eq!(runner.calls()[0].context.input_source, None);
}

#[tokio::test]
async fn test_templated_input_source_is_rendered() {
    let templated = schema(
        r#"{
  "pipeline_id": "weekly",
  "tasks": [
    {"task_id": 4, "task_type": "LOCAL", "endpoint": "summarise",
      "input_source": "https://feeds.example.com/{{ pipeline_id }}/{{ task_id }}"}
  ],
  "global_config": {"retry_on_failure": false}
}"#,
    );
    contextchain::validate_schema(&templated).unwrap();

    let runner = MockRunner::new().source("https://feeds.example.com/weekly/4", Ok("rendered"));
    let (report, _) = run_pipeline_with_mock(&templated, runner.clone()).await;

    assert_eq!(report.status, ExecutionStatus::Completed);
    assert_eq!(runner.fetched(), vec!["https://feeds.example.com/weekly/4"]);
    assert_eq!(runner.calls()[0].context.input_source.as_deref(), Some("rendered"));
}

const PAIR: &str = r#"{
  "pipeline_id": "pair",
  "tasks": [
    {"task_id": 1, "task_type": "LOCAL", "endpoint": "produce"},
    {"task_id": 2, "task_type": "LOCAL", "endpoint": "consume", "inputs": [1]}
  ]
}"#;

#[tokio::test]
async fn test_single_task_uses_latest_stored_result() {
    let runner = MockRunner::new()
        .reply(1, vec![Reply::Output("old".to_string()), Reply::Output("new".to_string())]);
    let (engine, store) = engine_with(runner.clone());
    let pair = schema(PAIR);

    engine.execute_single_task(&pair, 1).await.unwrap();
    engine.execute_single_task(&pair, 1).await.unwrap();
    let outcome = engine.execute_single_task(&pair, 2).await.unwrap();

    assert_eq!(outcome.status, TaskStatus::Completed);
    assert_eq!(outcome.output.as_deref(), Some("2:new"));

    let results = records(&store, OutputCollection::TaskResults, RecordFilter::pipeline("pair")).await;
    assert_eq!(results.len(), 3);
    // Each single-task run gets its own run ID
    assert_ne!(results[0].run_id, results[2].run_id);
}

#[tokio::test]
async fn test_single_task_refuses_missing_input() {
    let runner = MockRunner::new();
    let (engine, _) = engine_with(runner.clone());

    let err = engine.execute_single_task(&schema(PAIR), 2).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<TaskError>(),
        Some(TaskError::MissingInput { task: 2, input: 1 })
    ));
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_single_task_runs_without_input_when_not_waiting() {
    let mut pair = schema(PAIR);
    pair.tasks[1].wait_for_input = false;
    let runner = MockRunner::new();
    let (engine, _) = engine_with(runner.clone());

    let outcome = engine.execute_single_task(&pair, 2).await.unwrap();
    assert_eq!(outcome.output.as_deref(), Some("2:"));
}

#[tokio::test]
async fn test_unknown_task_is_an_error() {
    let (engine, _) = engine_with(MockRunner::new());
    let err = engine.execute_single_task(&schema(PAIR), 9).await.unwrap_err();
    assert!(err.to_string().contains("Task 9 not found"));
}

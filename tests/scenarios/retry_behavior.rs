//! Test: Retry Behavior - attempts follow retry_on_failure and max_retries

use crate::helpers::*;
use contextchain::core::{ExecutionStatus, OutputCollection, RecordStatus, TaskStatus};
use contextchain::persistence::RecordFilter;

fn single_task(retry_on_failure: bool, max_retries: u32, timeout: u64) -> String {
    format!(
        r#"{{
  "pipeline_id": "retries",
  "tasks": [
    {{"task_id": 1, "task_type": "LOCAL", "endpoint": "work", "parameters": {{"timeout": {timeout}}}}}
  ],
  "global_config": {{"retry_on_failure": {retry_on_failure}, "max_retries": {max_retries}}}
}}"#
    )
}

#[tokio::test]
async fn test_succeeds_on_last_allowed_attempt() {
    let runner = MockRunner::new().reply(
        1,
        vec![
            Reply::Fail("flaky".to_string()),
            Reply::Fail("flaky".to_string()),
            Reply::Output("done".to_string()),
        ],
    );
    let (report, store) =
        run_pipeline_with_mock(&schema(&single_task(true, 2, 30)), runner.clone()).await;

    assert_eq!(report.status, ExecutionStatus::Completed);
    assert_eq!(runner.attempts(1), 3);
    assert_task_output(&report, 1, "done");
    assert_eq!(report.outcome(1).unwrap().attempts, 3);

    // Only the final outcome is stored
    let results = records(&store, OutputCollection::TaskResults, RecordFilter::task(1)).await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, RecordStatus::Completed);
    assert_eq!(results[0].attempts, 3);
}

#[tokio::test]
async fn test_gives_up_after_max_retries() {
    let runner = MockRunner::new().reply(
        1,
        vec![
            Reply::Fail("first".to_string()),
            Reply::Fail("second".to_string()),
            Reply::Fail("third".to_string()),
            Reply::Output("too late".to_string()),
        ],
    );
    let (report, _) =
        run_pipeline_with_mock(&schema(&single_task(true, 2, 30)), runner.clone()).await;

    assert_eq!(report.status, ExecutionStatus::Failed);
    assert_eq!(runner.attempts(1), 3);
    assert_task_status(&report, 1, TaskStatus::Failed);
    assert!(report.outcome(1).unwrap().error.as_deref().unwrap().contains("third"));
}

#[tokio::test]
async fn test_no_retry_means_one_attempt() {
    let runner = MockRunner::new().reply(
        1,
        vec![Reply::Fail("boom".to_string()), Reply::Output("ok".to_string())],
    );
    let (report, _) =
        run_pipeline_with_mock(&schema(&single_task(false, 5, 30)), runner.clone()).await;

    assert_eq!(report.status, ExecutionStatus::Failed);
    assert_eq!(runner.attempts(1), 1);
}

#[tokio::test]
async fn test_timeout_counts_as_failed_attempt() {
    let runner = MockRunner::new().reply(1, vec![Reply::Hang, Reply::Output("quick".to_string())]);
    let (report, _) =
        run_pipeline_with_mock(&schema(&single_task(true, 1, 1)), runner.clone()).await;

    assert_eq!(report.status, ExecutionStatus::Completed);
    assert_eq!(runner.attempts(1), 2);
    assert_task_output(&report, 1, "quick");
}

#[tokio::test]
async fn test_timeout_error_is_reported() {
    let runner = MockRunner::new().reply(1, vec![Reply::Hang]);
    let (report, _) =
        run_pipeline_with_mock(&schema(&single_task(false, 0, 1)), runner).await;

    let error = report.outcome(1).unwrap().error.clone().unwrap();
    assert!(error.contains("Timeout after 1 seconds"), "got {}", error);
}

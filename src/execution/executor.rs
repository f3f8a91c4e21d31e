//! Task executor - runs a single attempt of a task with its runner

use crate::core::{Task, TaskContext};
use crate::runners::{TaskError, TaskRunner};
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, warn};

/// Executes one attempt of a task
pub struct TaskExecutor<R> {
    runner: R,
}

impl<R: TaskRunner> TaskExecutor<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Fetch the input source, then run the task within its timeout
    pub async fn execute(&self, task: &Task, context: &TaskContext) -> Result<String, TaskError> {
        info!("Executing task {} ({})", task.task_id, task.task_type);

        let mut context = context.clone();
        if let Some(raw) = task.input_source.as_deref().filter(|u| !u.trim().is_empty()) {
            let url = context.render(raw, task);
            match self.fetch_input_source(task, &url, &context).await {
                Ok(body) => context.input_source = Some(body),
                Err(e) if task.wait_for_input => return Err(e),
                Err(e) => warn!(
                    "Task {} continues without its input source: {}",
                    task.task_id, e
                ),
            }
        }

        let secs = task.timeout_secs();
        match timeout(Duration::from_secs(secs), self.runner.run(task, &context)).await {
            Ok(Ok(output)) => {
                debug!("Task {} returned {} bytes", task.task_id, output.len());
                Ok(output)
            }
            Ok(Err(e)) => {
                error!("Task {} failed: {}", task.task_id, e);
                Err(e)
            }
            Err(_) => {
                error!("Timeout for task {} after {}s", task.task_id, secs);
                Err(TaskError::Timeout(secs))
            }
        }
    }

    async fn fetch_input_source(
        &self,
        task: &Task,
        url: &str,
        context: &TaskContext,
    ) -> Result<String, TaskError> {
        let secs = task.max_wait_secs();
        timeout(
            Duration::from_secs(secs),
            self.runner.fetch_input_source(url, context),
        )
        .await
        .map_err(|_| TaskError::Timeout(secs))?
    }
}

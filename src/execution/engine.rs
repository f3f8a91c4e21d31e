//! Main execution engine - orchestrates a pipeline run and persists results

use crate::{
    core::{
        now_rfc3339, validate_schema, ExecutionStatus, OutputCollection, PipelineSchema,
        RecordStatus, RunReport, Task, TaskContext, TaskOutcome, TaskStatus,
    },
    execution::{ExecutionScheduler, TaskExecutor},
    persistence::{RecordFilter, ResultRecord, Store},
    runners::{TaskError, TaskRunner},
};
use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Events that can occur during pipeline execution
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    PipelineStarted {
        run_id: Uuid,
        pipeline_id: String,
        total_tasks: usize,
    },
    TaskStarted {
        task_id: u32,
        attempt: u32,
        max_attempts: u32,
    },
    TaskRetrying {
        task_id: u32,
        attempt: u32,
        max_attempts: u32,
        error: String,
    },
    TaskCompleted {
        task_id: u32,
        attempts: u32,
        output: String,
    },
    TaskFailed {
        task_id: u32,
        attempts: u32,
        error: String,
    },
    TaskSkipped {
        task_id: u32,
    },
    PipelineCompleted {
        run_id: Uuid,
        status: ExecutionStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Main pipeline execution engine
pub struct ExecutionEngine<R> {
    store: Arc<dyn Store>,
    executor: Arc<TaskExecutor<R>>,
    event_handlers: Arc<Mutex<Vec<EventHandler>>>,
}

impl<R: TaskRunner + 'static> ExecutionEngine<R> {
    pub fn new(runner: R, store: Arc<dyn Store>) -> Self {
        Self {
            store,
            executor: Arc::new(TaskExecutor::new(runner)),
            event_handlers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Add an event handler
    pub async fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.lock().await.push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    async fn emit_event(&self, event: ExecutionEvent) {
        let handlers = self.event_handlers.lock().await;
        for handler in handlers.iter() {
            handler(event.clone());
        }
    }

    /// Execute every task of a pipeline in dependency order.
    ///
    /// The first task to exhaust its attempts fails the run; tasks after it
    /// are reported as skipped and never executed.
    pub async fn execute_pipeline(&self, schema: &PipelineSchema) -> Result<RunReport> {
        validate_schema(schema)?;
        let plan = ExecutionScheduler::plan(schema)?;

        let run_id = Uuid::new_v4();
        let pipeline_id = schema.pipeline_id.clone();

        info!("Starting pipeline execution: {} ({})", pipeline_id, run_id);
        self.store
            .insert_record(
                OutputCollection::TriggerLogs,
                &ResultRecord::pipeline_event(
                    run_id,
                    &pipeline_id,
                    RecordStatus::Started,
                    Some(format!("{} tasks scheduled", plan.order().len())),
                ),
            )
            .await?;
        self.emit_event(ExecutionEvent::PipelineStarted {
            run_id,
            pipeline_id: pipeline_id.clone(),
            total_tasks: plan.order().len(),
        })
        .await;

        let (outcomes, failure) = match self.run_planned(schema, &plan, run_id).await {
            Ok(ran) => ran,
            Err(e) => {
                self.log_aborted(run_id, &pipeline_id, &e).await;
                return Err(e);
            }
        };

        let (status, log) = match &failure {
            None => {
                info!("Pipeline execution finished: {} - Completed", pipeline_id);
                let record = ResultRecord::pipeline_event(
                    run_id,
                    &pipeline_id,
                    RecordStatus::Completed,
                    Some(format!("{} tasks completed", outcomes.len())),
                );
                (ExecutionStatus::Completed, record)
            }
            Some((task_id, err)) => {
                error!("Pipeline {} failed at task {}: {}", pipeline_id, task_id, err);
                let mut record = ResultRecord::pipeline_event(
                    run_id,
                    &pipeline_id,
                    RecordStatus::Failed,
                    None,
                );
                record.task_id = Some(*task_id);
                record.error = Some(err.clone());
                (ExecutionStatus::Failed, record)
            }
        };

        if let Err(e) = self
            .store
            .insert_record(OutputCollection::TriggerLogs, &log)
            .await
        {
            self.log_aborted(run_id, &pipeline_id, &e).await;
            return Err(e);
        }
        self.emit_event(ExecutionEvent::PipelineCompleted { run_id, status })
            .await;

        Ok(RunReport {
            run_id,
            pipeline_id,
            status,
            tasks: outcomes,
        })
    }

    /// Run the planned tasks, stopping at the first failure.
    ///
    /// Errors only when a result cannot be stored.
    async fn run_planned(
        &self,
        schema: &PipelineSchema,
        plan: &ExecutionScheduler,
        run_id: Uuid,
    ) -> Result<(Vec<TaskOutcome>, Option<(u32, String)>)> {
        let mut outputs: HashMap<u32, String> = HashMap::new();
        let mut outcomes = Vec::with_capacity(plan.order().len());
        let mut failure: Option<(u32, String)> = None;

        for task_id in plan.order() {
            let task = schema
                .task(*task_id)
                .ok_or_else(|| anyhow!("Task {} not found in {}", task_id, schema.pipeline_id))?;

            if failure.is_some() {
                self.emit_event(ExecutionEvent::TaskSkipped { task_id: *task_id }).await;
                outcomes.push(TaskOutcome::skipped(*task_id));
                continue;
            }

            let mut context = self.context_for(schema, run_id);
            for input in &task.inputs {
                if let Some(output) = outputs.get(input) {
                    context.set_input_output(*input, output.clone());
                }
            }

            let outcome = self.run_with_retries(schema, task, &context).await;
            self.persist_outcome(schema, task, run_id, &outcome).await?;

            match outcome.status {
                TaskStatus::Completed => {
                    outputs.insert(*task_id, outcome.output.clone().unwrap_or_default());
                }
                _ => {
                    failure = Some((*task_id, outcome.error.clone().unwrap_or_default()));
                }
            }
            outcomes.push(outcome);
        }

        Ok((outcomes, failure))
    }

    /// Best-effort FAILED log for a run cut short by a storage error
    async fn log_aborted(&self, run_id: Uuid, pipeline_id: &str, err: &anyhow::Error) {
        error!("Pipeline {} aborted: {:#}", pipeline_id, err);
        let mut record =
            ResultRecord::pipeline_event(run_id, pipeline_id, RecordStatus::Failed, None);
        record.error = Some(format!("{:#}", err));
        if let Err(e) = self
            .store
            .insert_record(OutputCollection::TriggerLogs, &record)
            .await
        {
            warn!("Failed to log the aborted run {}: {:#}", run_id, e);
        }
        self.emit_event(ExecutionEvent::PipelineCompleted {
            run_id,
            status: ExecutionStatus::Failed,
        })
        .await;
    }

    /// Execute one task in isolation.
    ///
    /// Input outputs come from the most recent completed results stored for
    /// the input tasks.
    pub async fn execute_single_task(
        &self,
        schema: &PipelineSchema,
        task_id: u32,
    ) -> Result<TaskOutcome> {
        let task = schema
            .task(task_id)
            .ok_or_else(|| anyhow!("Task {} not found in {}", task_id, schema.pipeline_id))?;

        let run_id = Uuid::new_v4();
        let mut context = self.context_for(schema, run_id);

        for input in &task.inputs {
            let collection = schema
                .task(*input)
                .map(|t| t.output_collection)
                .unwrap_or_default();
            let filter = RecordFilter::pipeline(&schema.pipeline_id)
                .with_task(*input)
                .with_status(RecordStatus::Completed);
            let latest = self
                .store
                .find_records(collection, &filter)
                .await
                .with_context(|| format!("Failed to load results of task {}", input))?
                .pop();

            match latest {
                Some(record) => {
                    context.set_input_output(*input, record.output.unwrap_or_default())
                }
                None if task.wait_for_input => {
                    return Err(TaskError::MissingInput {
                        task: task_id,
                        input: *input,
                    }
                    .into());
                }
                None => warn!(
                    "Task {} runs without the output of task {}",
                    task_id, input
                ),
            }
        }

        info!("Running task {} of {} ({})", task_id, schema.pipeline_id, run_id);
        let outcome = self.run_with_retries(schema, task, &context).await;
        self.persist_outcome(schema, task, run_id, &outcome).await?;

        Ok(outcome)
    }

    fn context_for(&self, schema: &PipelineSchema, run_id: Uuid) -> TaskContext {
        TaskContext::new(&schema.pipeline_id, run_id)
            .with_allowed_domains(schema.global_config.allowed_domains.clone())
    }

    /// Run a task until it succeeds or runs out of attempts
    async fn run_with_retries(
        &self,
        schema: &PipelineSchema,
        task: &Task,
        context: &TaskContext,
    ) -> TaskOutcome {
        let max_attempts = schema.global_config.max_attempts();
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            self.emit_event(ExecutionEvent::TaskStarted {
                task_id: task.task_id,
                attempt,
                max_attempts,
            })
            .await;

            match self.executor.execute(task, context).await {
                Ok(output) => {
                    self.emit_event(ExecutionEvent::TaskCompleted {
                        task_id: task.task_id,
                        attempts: attempt,
                        output: output.clone(),
                    })
                    .await;
                    return TaskOutcome {
                        task_id: task.task_id,
                        status: TaskStatus::Completed,
                        output: Some(output),
                        error: None,
                        attempts: attempt,
                    };
                }
                Err(e) => {
                    last_error = e.to_string();
                    if attempt < max_attempts {
                        warn!(
                            "Task {} attempt {}/{} failed: {}",
                            task.task_id, attempt, max_attempts, last_error
                        );
                        self.emit_event(ExecutionEvent::TaskRetrying {
                            task_id: task.task_id,
                            attempt,
                            max_attempts,
                            error: last_error.clone(),
                        })
                        .await;
                    }
                }
            }
        }

        self.emit_event(ExecutionEvent::TaskFailed {
            task_id: task.task_id,
            attempts: max_attempts,
            error: last_error.clone(),
        })
        .await;

        TaskOutcome {
            task_id: task.task_id,
            status: TaskStatus::Failed,
            output: None,
            error: Some(last_error),
            attempts: max_attempts,
        }
    }

    /// Write a task outcome to the task's output collection
    async fn persist_outcome(
        &self,
        schema: &PipelineSchema,
        task: &Task,
        run_id: Uuid,
        outcome: &TaskOutcome,
    ) -> Result<()> {
        let record = ResultRecord {
            run_id,
            pipeline_id: schema.pipeline_id.clone(),
            task_id: Some(task.task_id),
            status: outcome.status.into(),
            output: outcome.output.clone(),
            error: outcome.error.clone(),
            attempts: outcome.attempts,
            created_at: now_rfc3339(),
        };
        self.store
            .insert_record(task.output_collection, &record)
            .await
            .with_context(|| format!("Failed to store the result of task {}", task.task_id))
    }
}

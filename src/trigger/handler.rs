//! Fires cron-scheduled tasks of the latest registered schemas

use crate::core::{now_rfc3339, OutputCollection, PipelineSchema, RecordStatus, TaskOutcome};
use crate::execution::ExecutionEngine;
use crate::persistence::ResultRecord;
use crate::registry::VersionManager;
use crate::runners::TaskRunner;
use crate::trigger::cron::{truncate_to_minute, CronSchedule};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

/// A task with a cron schedule
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub pipeline_id: String,
    pub task_id: u32,
    pub schedule: CronSchedule,
    pub schema: Arc<PipelineSchema>,
}

/// Collects scheduled tasks and runs them through the engine when due
pub struct TriggerHandler<R> {
    engine: Arc<ExecutionEngine<R>>,
    entries: Vec<ScheduledTask>,
}

impl<R: TaskRunner + 'static> TriggerHandler<R> {
    pub fn new(engine: Arc<ExecutionEngine<R>>, entries: Vec<ScheduledTask>) -> Self {
        Self { engine, entries }
    }

    /// Build from the latest version of every registered pipeline
    pub async fn from_store(engine: Arc<ExecutionEngine<R>>) -> Result<Self> {
        let versions = VersionManager::new(engine.store().clone());
        let entries = Self::collect(&versions).await?;
        Ok(Self::new(engine, entries))
    }

    /// Scheduled tasks across the latest schemas; unparsable crons are skipped
    pub async fn collect(versions: &VersionManager) -> Result<Vec<ScheduledTask>> {
        let mut entries = Vec::new();
        for pipeline_id in versions.list_pipelines().await? {
            let Some(schema) = versions.load_schema(&pipeline_id, None).await? else {
                continue;
            };
            let schema = Arc::new(schema);
            entries.extend(scheduled_tasks(&schema));
        }
        info!("{} scheduled tasks", entries.len());
        Ok(entries)
    }

    pub fn entries(&self) -> &[ScheduledTask] {
        &self.entries
    }

    /// Entries whose schedule matches the given minute
    pub fn due_at(&self, minute: &DateTime<Utc>) -> Vec<&ScheduledTask> {
        self.entries
            .iter()
            .filter(|e| e.schedule.matches(minute))
            .collect()
    }

    /// Earliest upcoming firing across all entries
    pub fn next_fire(&self, after: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.entries
            .iter()
            .filter_map(|e| e.schedule.next_after(after))
            .min()
    }

    /// Log and execute every entry due at `minute`
    pub async fn fire(&self, minute: &DateTime<Utc>) -> Result<Vec<TaskOutcome>> {
        let minute = truncate_to_minute(*minute);
        let mut outcomes = Vec::new();

        for entry in self.due_at(&minute) {
            let record = ResultRecord {
                run_id: Uuid::new_v4(),
                pipeline_id: entry.pipeline_id.clone(),
                task_id: Some(entry.task_id),
                status: RecordStatus::Triggered,
                output: Some(format!(
                    "cron '{}' fired for {}",
                    entry.schedule.expression(),
                    minute.to_rfc3339()
                )),
                error: None,
                attempts: 0,
                created_at: now_rfc3339(),
            };
            self.engine
                .store()
                .insert_record(OutputCollection::TriggerLogs, &record)
                .await?;

            info!("Triggered task {} of {}", entry.task_id, entry.pipeline_id);
            match self
                .engine
                .execute_single_task(&entry.schema, entry.task_id)
                .await
            {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => error!(
                    "Triggered task {} of {} did not run: {:#}",
                    entry.task_id, entry.pipeline_id, e
                ),
            }
        }

        Ok(outcomes)
    }

    /// Fire due entries at each minute boundary until `shutdown` resolves.
    ///
    /// A shutdown future that resolves to an error stops the loop with that error.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = std::io::Result<()>>,
    {
        tokio::pin!(shutdown);

        loop {
            let now = Utc::now();
            let next_minute = truncate_to_minute(now) + chrono::Duration::minutes(1);
            let wait = (next_minute - now)
                .to_std()
                .unwrap_or(Duration::from_secs(0));

            tokio::select! {
                signal = &mut shutdown => {
                    signal.context("Failed to wait for the shutdown signal")?;
                    info!("Trigger loop stopped");
                    return Ok(());
                }
                _ = tokio::time::sleep(wait) => {
                    if let Err(e) = self.fire(&next_minute).await {
                        warn!("Trigger tick for {} failed: {:#}", next_minute, e);
                    }
                }
            }
        }
    }
}

fn scheduled_tasks(schema: &Arc<PipelineSchema>) -> Vec<ScheduledTask> {
    schema
        .tasks
        .iter()
        .filter_map(|task| {
            let expr = task.cron.as_deref()?.trim();
            if expr.is_empty() {
                return None;
            }
            match CronSchedule::parse(expr) {
                Ok(schedule) => Some(ScheduledTask {
                    pipeline_id: schema.pipeline_id.clone(),
                    task_id: task.task_id,
                    schedule,
                    schema: schema.clone(),
                }),
                Err(reason) => {
                    warn!(
                        "Ignoring cron '{}' on task {} of {}: {}",
                        expr, task.task_id, schema.pipeline_id, reason
                    );
                    None
                }
            }
        })
        .collect()
}

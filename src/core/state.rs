//! Execution state models

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Overall pipeline execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Pipeline has not started
    Pending,
    /// Pipeline is currently running
    Running,
    /// Every task completed
    Completed,
    /// A task failed after its last attempt
    Failed,
}

/// Final status of a single task within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Completed,
    Failed,
    /// Not executed because an earlier task failed
    Skipped,
}

/// Status stored on a result or log record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    Started,
    Completed,
    Failed,
    Skipped,
    Triggered,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Started => "STARTED",
            RecordStatus::Completed => "COMPLETED",
            RecordStatus::Failed => "FAILED",
            RecordStatus::Skipped => "SKIPPED",
            RecordStatus::Triggered => "TRIGGERED",
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STARTED" => Ok(RecordStatus::Started),
            "COMPLETED" => Ok(RecordStatus::Completed),
            "FAILED" => Ok(RecordStatus::Failed),
            "SKIPPED" => Ok(RecordStatus::Skipped),
            "TRIGGERED" => Ok(RecordStatus::Triggered),
            other => Err(format!("Unknown record status: {}", other)),
        }
    }
}

impl From<TaskStatus> for RecordStatus {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Completed => RecordStatus::Completed,
            TaskStatus::Failed => RecordStatus::Failed,
            TaskStatus::Skipped => RecordStatus::Skipped,
        }
    }
}

/// Outcome of a single task in a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub task_id: u32,
    pub status: TaskStatus,
    pub output: Option<String>,
    pub error: Option<String>,
    /// Attempts made (0 for skipped tasks)
    pub attempts: u32,
}

impl TaskOutcome {
    pub fn skipped(task_id: u32) -> Self {
        Self {
            task_id,
            status: TaskStatus::Skipped,
            output: None,
            error: None,
            attempts: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}

/// Report of a full pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub pipeline_id: String,
    pub status: ExecutionStatus,
    /// Task outcomes in execution order
    pub tasks: Vec<TaskOutcome>,
}

impl RunReport {
    pub fn outcome(&self, task_id: u32) -> Option<&TaskOutcome> {
        self.tasks.iter().find(|t| t.task_id == task_id)
    }

    /// Task IDs in the order they were executed (skipped tasks excluded)
    pub fn executed_order(&self) -> Vec<u32> {
        self.tasks
            .iter()
            .filter(|t| t.status != TaskStatus::Skipped)
            .map(|t| t.task_id)
            .collect()
    }

    /// Fraction of tasks that completed (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.tasks.is_empty() {
            return 0.0;
        }
        let done = self.tasks.iter().filter(|t| t.is_success()).count();
        done as f64 / self.tasks.len() as f64
    }
}

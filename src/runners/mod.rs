//! Task runners for each task type

pub mod http;
pub mod llm;
pub mod local;

use crate::core::{Task, TaskContext, TaskType};
use async_trait::async_trait;
use thiserror::Error;

pub use http::HttpRunner;
pub use llm::{LlmConfig, LlmRunner};
pub use local::LocalRunner;

/// Error types for task execution
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("{url} returned status {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Process error: {0}")]
    Process(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Host '{0}' is not in allowed_domains")]
    DomainNotAllowed(String),

    #[error("Task {task} needs the output of task {input}, which has no completed result")]
    MissingInput { task: u32, input: u32 },
}

impl From<reqwest::Error> for TaskError {
    fn from(err: reqwest::Error) -> Self {
        TaskError::Http(err.to_string())
    }
}

/// Longest response excerpt kept in a status error
pub(crate) const ERROR_BODY_LIMIT: usize = 512;

/// Cut an error response body down to `ERROR_BODY_LIMIT` bytes on a char boundary
pub(crate) fn error_excerpt(mut body: String) -> String {
    if body.len() > ERROR_BODY_LIMIT {
        let mut cut = ERROR_BODY_LIMIT;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}

/// Trait for task execution - allows for different implementations
#[async_trait]
pub trait TaskRunner: Send + Sync {
    /// Run one attempt of a task and return its output
    async fn run(&self, task: &Task, context: &TaskContext) -> Result<String, TaskError>;

    /// Fetch a task's input source
    async fn fetch_input_source(
        &self,
        url: &str,
        context: &TaskContext,
    ) -> Result<String, TaskError> {
        let _ = (url, context);
        Err(TaskError::Config(
            "this runner cannot fetch input sources".to_string(),
        ))
    }
}

/// Routes each task to the runner for its task type
#[derive(Debug, Clone)]
pub struct Dispatcher {
    http: HttpRunner,
    llm: LlmRunner,
    local: LocalRunner,
}

impl Dispatcher {
    pub fn new(http: HttpRunner, llm: LlmRunner, local: LocalRunner) -> Self {
        Self { http, llm, local }
    }

    /// Dispatcher with the LLM settings taken from the environment
    pub fn from_env() -> Result<Self, TaskError> {
        Ok(Self::new(
            HttpRunner::new()?,
            LlmRunner::new(LlmConfig::from_env())?,
            LocalRunner::new(),
        ))
    }
}

#[async_trait]
impl TaskRunner for Dispatcher {
    async fn run(&self, task: &Task, context: &TaskContext) -> Result<String, TaskError> {
        match task.task_type {
            TaskType::Get | TaskType::Post | TaskType::Put => self.http.execute(task, context).await,
            TaskType::Llm => self.llm.execute(task, context).await,
            TaskType::Local => self.local.execute(task, context).await,
        }
    }

    async fn fetch_input_source(
        &self,
        url: &str,
        context: &TaskContext,
    ) -> Result<String, TaskError> {
        self.http.fetch(url, context).await
    }
}

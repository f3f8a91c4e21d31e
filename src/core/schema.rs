//! Pipeline schema documents

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;

/// Default per-attempt timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default bound on fetching a task's input source, in seconds
pub const DEFAULT_MAX_WAIT_SECS: u64 = 300;

/// Kind of work a task performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskType {
    Get,
    Post,
    Put,
    Llm,
    Local,
}

impl TaskType {
    pub const ALL: [TaskType; 5] = [
        TaskType::Get,
        TaskType::Post,
        TaskType::Put,
        TaskType::Llm,
        TaskType::Local,
    ];

    /// GET, POST and PUT tasks talk to an HTTP endpoint
    pub fn is_http(&self) -> bool {
        matches!(self, TaskType::Get | TaskType::Post | TaskType::Put)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Get => "GET",
            TaskType::Post => "POST",
            TaskType::Put => "PUT",
            TaskType::Llm => "LLM",
            TaskType::Local => "LOCAL",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Invalid task_type: {}", s))
    }
}

/// Collection a task's result is written to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputCollection {
    #[default]
    TaskResults,
    TriggerLogs,
}

impl OutputCollection {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputCollection::TaskResults => "task_results",
            OutputCollection::TriggerLogs => "trigger_logs",
        }
    }
}

impl fmt::Display for OutputCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single task in a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier within the pipeline
    pub task_id: u32,

    #[serde(default)]
    pub description: String,

    pub task_type: TaskType,

    /// URL for HTTP tasks, command for LOCAL tasks
    #[serde(default)]
    pub endpoint: String,

    /// Task IDs whose outputs feed this task
    #[serde(default)]
    pub inputs: Vec<u32>,

    /// URL fetched before the task runs
    #[serde(default)]
    pub input_source: Option<String>,

    /// Whether the task refuses to run without its inputs' outputs
    #[serde(default = "default_true")]
    pub wait_for_input: bool,

    #[serde(default)]
    pub output_collection: OutputCollection,

    /// Prompt template for LLM tasks
    #[serde(default)]
    pub prompt_template: Option<String>,

    /// Free-form task parameters (timeout, headers, body, args, model, ...)
    #[serde(default)]
    pub parameters: Map<String, Value>,

    /// Cron schedule for triggered execution
    #[serde(default)]
    pub cron: Option<String>,
}

impl Task {
    /// Create a task with the scaffold defaults used by `init`
    pub fn new(task_id: u32, task_type: TaskType) -> Self {
        Self {
            task_id,
            description: format!("Task {}", task_id),
            task_type,
            endpoint: "path.to.function".to_string(),
            inputs: Vec::new(),
            input_source: None,
            wait_for_input: true,
            output_collection: OutputCollection::TaskResults,
            prompt_template: None,
            parameters: Map::new(),
            cron: None,
        }
    }

    /// Per-attempt timeout in seconds
    pub fn timeout_secs(&self) -> u64 {
        self.parameters
            .get("timeout")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
    }

    /// Bound on fetching the input source, in seconds
    pub fn max_wait_secs(&self) -> u64 {
        self.parameters
            .get("max_wait_seconds")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_MAX_WAIT_SECS)
    }

    /// A string-valued parameter
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str)
    }
}

fn default_true() -> bool {
    true
}

/// Pipeline-wide execution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default = "default_output_db")]
    pub default_output_db: String,

    #[serde(default = "default_logging_level")]
    pub logging_level: String,

    #[serde(default = "default_true")]
    pub retry_on_failure: bool,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_allowed_task_types")]
    pub allowed_task_types: Vec<TaskType>,

    /// Hosts HTTP tasks may reach (empty allows any)
    #[serde(default)]
    pub allowed_domains: Vec<String>,
}

impl GlobalConfig {
    /// Total attempts a task gets, counting the first one
    pub fn max_attempts(&self) -> u32 {
        if self.retry_on_failure {
            self.max_retries + 1
        } else {
            1
        }
    }
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            default_output_db: default_output_db(),
            logging_level: default_logging_level(),
            retry_on_failure: true,
            max_retries: default_max_retries(),
            allowed_task_types: default_allowed_task_types(),
            allowed_domains: Vec::new(),
        }
    }
}

fn default_output_db() -> String {
    "contextchain_db".to_string()
}

fn default_logging_level() -> String {
    "INFO".to_string()
}

fn default_max_retries() -> u32 {
    2
}

fn default_allowed_task_types() -> Vec<TaskType> {
    TaskType::ALL.to_vec()
}

/// Descriptive metadata attached to a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default = "default_pipeline_type")]
    pub pipeline_type: String,

    #[serde(default)]
    pub linked_pipelines: Vec<String>,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            tags: Vec::new(),
            pipeline_type: default_pipeline_type(),
            linked_pipelines: Vec::new(),
        }
    }
}

fn default_pipeline_type() -> String {
    "fullstack-ai".to_string()
}

/// A versioned pipeline schema document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSchema {
    #[serde(default)]
    pub pipeline_id: String,

    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    #[serde(default)]
    pub description: String,

    #[serde(default = "default_created_by")]
    pub created_by: String,

    #[serde(default = "now_rfc3339")]
    pub created_at: String,

    #[serde(default)]
    pub tasks: Vec<Task>,

    #[serde(default)]
    pub global_config: GlobalConfig,

    #[serde(default)]
    pub metadata: Metadata,
}

fn default_schema_version() -> String {
    "1.0.0".to_string()
}

fn default_created_by() -> String {
    "user".to_string()
}

/// Current time in the fixed-width RFC 3339 form used across stored documents
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl PipelineSchema {
    /// Create an empty schema for a pipeline
    pub fn new(pipeline_id: impl Into<String>) -> Self {
        Self {
            pipeline_id: pipeline_id.into(),
            schema_version: default_schema_version(),
            description: String::new(),
            created_by: default_created_by(),
            created_at: now_rfc3339(),
            tasks: Vec::new(),
            global_config: GlobalConfig::default(),
            metadata: Metadata::default(),
        }
    }

    /// Parse a schema from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid pipeline schema JSON")
    }

    /// Load a schema from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_json_str(&content)
    }

    /// Serialize as indented JSON
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the schema to a file, creating parent directories
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.to_json_pretty()?)
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Get a task by ID
    pub fn task(&self, task_id: u32) -> Option<&Task> {
        self.tasks.iter().find(|t| t.task_id == task_id)
    }
}

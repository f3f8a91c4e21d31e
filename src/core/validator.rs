//! Schema validation

use crate::core::schema::{PipelineSchema, Task, TaskType};
use crate::trigger::CronSchedule;
use reqwest::Url;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::warn;

/// Reasons a pipeline schema is rejected
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing pipeline_id")]
    MissingPipelineId,

    #[error("Invalid schema_version '{0}': expected semantic version like 1.0.0")]
    InvalidVersion(String),

    #[error("Invalid task_type: {0}")]
    TaskTypeNotAllowed(TaskType),

    #[error("Task IDs must be >= 1 (found {0})")]
    InvalidTaskId(u32),

    #[error("Duplicate task_id: {0}")]
    DuplicateTaskId(u32),

    #[error("Task {task} lists input {input}, which does not exist")]
    UnknownInput { task: u32, input: u32 },

    #[error("Task {0} lists itself as an input")]
    SelfInput(u32),

    #[error("Cycle detected in task inputs involving task {0}")]
    InputCycle(u32),

    #[error("Task {task} has invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint {
        task: u32,
        endpoint: String,
        reason: String,
    },

    #[error("Task {task} targets '{host}', which is not in allowed_domains")]
    DomainNotAllowed { task: u32, host: String },

    #[error("Task {task} has invalid cron '{cron}': {reason}")]
    InvalidCron {
        task: u32,
        cron: String,
        reason: String,
    },

    #[error("Task {task} parameter '{name}' must be a positive integer")]
    InvalidParameter { task: u32, name: String },
}

/// Validate a pipeline schema
pub fn validate_schema(schema: &PipelineSchema) -> Result<(), ValidationError> {
    if schema.pipeline_id.trim().is_empty() {
        return Err(ValidationError::MissingPipelineId);
    }

    if semver::Version::parse(&schema.schema_version).is_err() {
        return Err(ValidationError::InvalidVersion(schema.schema_version.clone()));
    }

    let allowed = &schema.global_config.allowed_task_types;
    for task in &schema.tasks {
        if !allowed.contains(&task.task_type) {
            return Err(ValidationError::TaskTypeNotAllowed(task.task_type));
        }
    }

    let mut seen_ids = HashSet::new();
    for task in &schema.tasks {
        if task.task_id == 0 {
            return Err(ValidationError::InvalidTaskId(task.task_id));
        }
        if !seen_ids.insert(task.task_id) {
            return Err(ValidationError::DuplicateTaskId(task.task_id));
        }
    }

    for task in &schema.tasks {
        for input in &task.inputs {
            if *input == task.task_id {
                return Err(ValidationError::SelfInput(task.task_id));
            }
            if !seen_ids.contains(input) {
                return Err(ValidationError::UnknownInput {
                    task: task.task_id,
                    input: *input,
                });
            }
        }
        validate_task(task, &schema.global_config.allowed_domains)?;
    }

    check_cycles(schema)?;

    Ok(())
}

fn validate_task(task: &Task, allowed_domains: &[String]) -> Result<(), ValidationError> {
    match task.task_type {
        t if t.is_http() => check_url(task, &task.endpoint, allowed_domains)?,
        TaskType::Local => {
            if task.endpoint.trim().is_empty() {
                return Err(ValidationError::InvalidEndpoint {
                    task: task.task_id,
                    endpoint: task.endpoint.clone(),
                    reason: "LOCAL tasks need a command".to_string(),
                });
            }
        }
        TaskType::Llm => {
            if task.prompt_template.as_deref().unwrap_or("").trim().is_empty() {
                warn!("Task {} is an LLM task with an empty prompt_template", task.task_id);
            }
        }
        _ => {}
    }

    if let Some(source) = task.input_source.as_deref().filter(|s| !s.trim().is_empty()) {
        check_url(task, source, allowed_domains)?;
    }

    if let Some(cron) = task.cron.as_deref().filter(|c| !c.trim().is_empty()) {
        CronSchedule::parse(cron).map_err(|reason| ValidationError::InvalidCron {
            task: task.task_id,
            cron: cron.to_string(),
            reason,
        })?;
    }

    for name in ["timeout", "max_wait_seconds"] {
        if let Some(value) = task.parameters.get(name) {
            if !value.as_u64().is_some_and(|v| v > 0) {
                return Err(ValidationError::InvalidParameter {
                    task: task.task_id,
                    name: name.to_string(),
                });
            }
        }
    }

    Ok(())
}

fn check_url(task: &Task, raw: &str, allowed_domains: &[String]) -> Result<(), ValidationError> {
    // Templated URLs are only checked once rendered, at execution time
    if raw.contains("{{") {
        return Ok(());
    }

    let invalid = |reason: &str| ValidationError::InvalidEndpoint {
        task: task.task_id,
        endpoint: raw.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    let host = url.host_str().ok_or_else(|| invalid("missing host"))?;

    if !domain_allowed(host, allowed_domains) {
        return Err(ValidationError::DomainNotAllowed {
            task: task.task_id,
            host: host.to_string(),
        });
    }

    Ok(())
}

/// Whether `host` equals an allowed domain or is a subdomain of one.
/// An empty allow-list permits every host.
pub fn domain_allowed(host: &str, allowed_domains: &[String]) -> bool {
    if allowed_domains.is_empty() {
        return true;
    }
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    allowed_domains.iter().any(|domain| {
        let domain = domain.trim().trim_start_matches("*.").to_ascii_lowercase();
        host == domain || host.ends_with(&format!(".{}", domain))
    })
}

/// Check for cycles in the task input graph
fn check_cycles(schema: &PipelineSchema) -> Result<(), ValidationError> {
    let graph: HashMap<u32, &[u32]> = schema
        .tasks
        .iter()
        .map(|t| (t.task_id, t.inputs.as_slice()))
        .collect();

    let mut visited = HashSet::new();
    let mut recursion_stack = HashSet::new();

    let mut ids: Vec<u32> = graph.keys().copied().collect();
    ids.sort_unstable();

    for id in ids {
        if !visited.contains(&id) {
            dfs_check(id, &graph, &mut visited, &mut recursion_stack)?;
        }
    }

    Ok(())
}

fn dfs_check(
    task_id: u32,
    graph: &HashMap<u32, &[u32]>,
    visited: &mut HashSet<u32>,
    recursion_stack: &mut HashSet<u32>,
) -> Result<(), ValidationError> {
    visited.insert(task_id);
    recursion_stack.insert(task_id);

    for input in graph.get(&task_id).copied().unwrap_or(&[]) {
        if recursion_stack.contains(input) {
            return Err(ValidationError::InputCycle(*input));
        }
        if !visited.contains(input) {
            dfs_check(*input, graph, visited, recursion_stack)?;
        }
    }

    recursion_stack.remove(&task_id);
    Ok(())
}

//! Interactive questionnaires for `init` and the `.ccshare` commands

use crate::core::config::{default_uri, AppConfig, CcShare, Role, DEFAULT_CCSHARE_PATH, DEFAULT_DB_NAME};
use crate::core::{OutputCollection, PipelineSchema, Task, TaskType};
use anyhow::{bail, Context, Result};
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use serde_json::{Map, Value};
use std::path::Path;

const LOGGING_LEVELS: [&str; 4] = ["DEBUG", "INFO", "WARNING", "ERROR"];

/// Source of answers for a questionnaire
pub trait Prompter {
    fn text(&self, prompt: &str, default: &str) -> Result<String>;
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool>;
    fn select(&self, prompt: &str, items: &[&str], default: usize) -> Result<usize>;
    fn number(&self, prompt: &str, default: u64) -> Result<u64>;
}

/// Asks on the terminal
pub struct Interactive {
    theme: ColorfulTheme,
}

impl Interactive {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl Default for Interactive {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompter for Interactive {
    fn text(&self, prompt: &str, default: &str) -> Result<String> {
        let answer: String = Input::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(default.to_string())
            .allow_empty(true)
            .interact_text()?;
        Ok(answer.trim().to_string())
    }

    fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        Ok(Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(default)
            .interact()?)
    }

    fn select(&self, prompt: &str, items: &[&str], default: usize) -> Result<usize> {
        Ok(Select::with_theme(&self.theme)
            .with_prompt(prompt)
            .items(items)
            .default(default)
            .interact()?)
    }

    fn number(&self, prompt: &str, default: u64) -> Result<u64> {
        Ok(Input::<u64>::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(default)
            .interact_text()?)
    }
}

/// Accepts every default without asking
pub struct Defaults;

impl Prompter for Defaults {
    fn text(&self, _prompt: &str, default: &str) -> Result<String> {
        Ok(default.to_string())
    }

    fn confirm(&self, _prompt: &str, default: bool) -> Result<bool> {
        Ok(default)
    }

    fn select(&self, _prompt: &str, _items: &[&str], default: usize) -> Result<usize> {
        Ok(default)
    }

    fn number(&self, _prompt: &str, default: u64) -> Result<u64> {
        Ok(default)
    }
}

/// Ask for a new pipeline schema and the database connection
pub fn init_answers(prompter: &dyn Prompter) -> Result<(PipelineSchema, AppConfig)> {
    let pipeline_id = prompter.text("Pipeline ID", "new_pipeline")?;
    if pipeline_id.is_empty() {
        bail!("Pipeline ID cannot be empty");
    }
    let mut schema = PipelineSchema::new(pipeline_id);
    schema.description = prompter.text("Description", "")?;
    schema.created_by = prompter.text("Creator name", "user")?;
    let task_count = u32::try_from(prompter.number("Number of tasks", 1)?)
        .context("Number of tasks is too large")?;
    schema.metadata.tags = split_list(&prompter.text("Tags (comma-separated)", "")?);
    schema.metadata.pipeline_type = prompter.text("Pipeline type", "fullstack-ai")?;

    let global = &mut schema.global_config;
    global.default_output_db = prompter.text("Default output database", DEFAULT_DB_NAME)?;
    let level = prompter.select("Logging level", &LOGGING_LEVELS, 1)?;
    global.logging_level = LOGGING_LEVELS[level.min(LOGGING_LEVELS.len() - 1)].to_string();
    global.retry_on_failure = prompter.confirm("Retry failed tasks?", true)?;
    if global.retry_on_failure {
        global.max_retries = u32::try_from(prompter.number("Max retries", 2)?)
            .context("Max retries is too large")?;
    }
    let all_types = TaskType::ALL.map(|t| t.as_str()).join(",");
    global.allowed_task_types = split_list(&prompter.text("Allowed task types", &all_types)?)
        .iter()
        .map(|t| t.parse::<TaskType>().map_err(anyhow::Error::msg))
        .collect::<Result<_>>()?;
    global.allowed_domains = split_list(&prompter.text("Allowed domains (comma-separated)", "")?);

    let config = match prompter.select(
        "Database connection",
        &["Default local database", "Shared .ccshare file"],
        0,
    )? {
        0 => AppConfig {
            db_name: schema.global_config.default_output_db.clone(),
            ..AppConfig::default()
        },
        _ => {
            let path = prompter.text(".ccshare path", DEFAULT_CCSHARE_PATH)?;
            let path = Path::new(&path);
            let share = CcShare::load(path)?;
            let mut config = AppConfig::from_ccshare(&share, path);
            config.db_name = schema.global_config.default_output_db.clone();
            config
        }
    };

    for task_id in 1..=task_count {
        let task = task_answers(prompter, task_id, &schema.global_config.allowed_task_types)?;
        schema.tasks.push(task);
    }

    Ok((schema, config))
}

fn task_answers(prompter: &dyn Prompter, task_id: u32, allowed: &[TaskType]) -> Result<Task> {
    let types: &[TaskType] = if allowed.is_empty() {
        &TaskType::ALL
    } else {
        allowed
    };
    let names: Vec<&str> = types.iter().map(|t| t.as_str()).collect();
    let default_type = types
        .iter()
        .position(|t| *t == TaskType::Local)
        .unwrap_or(0);
    let picked = prompter.select(
        &format!("Task {} type", task_id),
        &names,
        default_type,
    )?;
    let task_type = types[picked.min(types.len() - 1)];

    let mut task = Task::new(task_id, task_type);
    task.description = prompter.text("Description", &task.description)?;
    task.endpoint = prompter.text("Endpoint", &task.endpoint)?;
    task.wait_for_input = prompter.confirm("Wait for input?", true)?;

    match task_type {
        TaskType::Llm => {
            task.prompt_template = non_empty(prompter.text("Prompt template", "")?);
        }
        t if t.is_http() => {
            task.input_source = non_empty(prompter.text("Input source URL", "")?);
        }
        _ => {
            if prompter.confirm("Write results to trigger_logs?", false)? {
                task.output_collection = OutputCollection::TriggerLogs;
            }
        }
    }

    task.inputs = split_list(&prompter.text("Input task IDs (comma-separated)", "")?)
        .iter()
        .map(|id| {
            id.parse::<u32>()
                .with_context(|| format!("Invalid input task ID '{}'", id))
        })
        .collect::<Result<_>>()?;

    task.parameters = parse_parameters(&prompter.text("Parameters (YAML)", "{}")?)?;
    let max_wait = prompter.number("Max wait seconds", 300)?;
    task.parameters
        .insert("max_wait_seconds".to_string(), Value::from(max_wait));
    let timeout = prompter.number("Timeout seconds", 30)?;
    task.parameters
        .insert("timeout".to_string(), Value::from(timeout));

    task.cron = non_empty(prompter.text("Cron schedule (blank for none)", "")?);
    Ok(task)
}

/// Ask for the shared database and the collaborator roles
pub fn ccshare_init(prompter: &dyn Prompter) -> Result<CcShare> {
    let uri = prompter.text("Database URI", &default_uri())?;
    let db_name = prompter.text("Database name", DEFAULT_DB_NAME)?;
    let mut share = CcShare::new(uri, db_name);

    while prompter.confirm("Add a collaborator role?", false)? {
        let user = prompter.text("User", "")?;
        if user.is_empty() {
            break;
        }
        let role = select_role(prompter, 1)?;
        share.add_role(user, role);
    }
    Ok(share)
}

/// Ask for this user's access to an existing shared database
pub fn ccshare_join(prompter: &dyn Prompter, uri: &str) -> Result<CcShare> {
    let db_name = prompter.text("Database name", DEFAULT_DB_NAME)?;
    let user = prompter.text("User", "user")?;
    let role = select_role(prompter, 0)?;
    let mut share = CcShare::new(uri, db_name);
    share.add_role(user, role);
    Ok(share)
}

fn select_role(prompter: &dyn Prompter, default: usize) -> Result<Role> {
    let names = Role::ALL.map(|r| r.as_str());
    let picked = prompter.select("Role", &names, default)?;
    Ok(Role::ALL[picked.min(Role::ALL.len() - 1)])
}

fn parse_parameters(yaml: &str) -> Result<Map<String, Value>> {
    if yaml.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_yaml::from_str::<Value>(yaml).context("Invalid parameters YAML")? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => bail!("Parameters must be a mapping, got {}", other),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

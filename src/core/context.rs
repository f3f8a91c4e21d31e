//! Task context - variables available while a task runs

use crate::core::schema::Task;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;
use uuid::Uuid;

/// Execution context for a single task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskContext {
    pub pipeline_id: String,

    pub run_id: Uuid,

    /// Outputs of the task's inputs (task_id -> output)
    pub input_outputs: BTreeMap<u32, String>,

    /// Body fetched from the task's input source
    pub input_source: Option<String>,

    /// Hosts HTTP requests may reach (empty allows any)
    #[serde(default)]
    pub allowed_domains: Vec<String>,
}

impl TaskContext {
    pub fn new(pipeline_id: impl Into<String>, run_id: Uuid) -> Self {
        Self {
            pipeline_id: pipeline_id.into(),
            run_id,
            input_outputs: BTreeMap::new(),
            input_source: None,
            allowed_domains: Vec::new(),
        }
    }

    pub fn with_allowed_domains(mut self, allowed_domains: Vec<String>) -> Self {
        self.allowed_domains = allowed_domains;
        self
    }

    /// Record the output of an input task
    pub fn set_input_output(&mut self, task_id: u32, output: String) {
        self.input_outputs.insert(task_id, output);
    }

    /// All input outputs joined by a blank line, in task ID order
    pub fn joined_inputs(&self) -> String {
        self.input_outputs
            .values()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Variables available for template rendering
    pub fn rendering_variables(&self, task: &Task) -> HashMap<String, String> {
        let mut vars = HashMap::new();

        // Scalar parameters first so built-in names win on collision
        for (key, value) in &task.parameters {
            let rendered = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => continue,
            };
            vars.insert(key.clone(), rendered);
        }

        vars.insert("pipeline_id".to_string(), self.pipeline_id.clone());
        vars.insert("run_id".to_string(), self.run_id.to_string());
        vars.insert("task_id".to_string(), task.task_id.to_string());
        vars.insert("inputs".to_string(), self.joined_inputs());
        vars.insert(
            "input_source".to_string(),
            self.input_source.clone().unwrap_or_default(),
        );

        for (task_id, output) in &self.input_outputs {
            vars.insert(format!("tasks.{}.output", task_id), output.clone());
        }

        vars
    }

    /// Render `{{ name }}` placeholders for a task
    pub fn render(&self, template: &str, task: &Task) -> String {
        render_template(template, &self.rendering_variables(task))
    }
}

fn placeholder_regex() -> Option<&'static Regex> {
    static PLACEHOLDER: OnceLock<Option<Regex>> = OnceLock::new();
    PLACEHOLDER
        .get_or_init(|| Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").ok())
        .as_ref()
}

/// Replace `{{ name }}` placeholders; unknown names are left untouched
pub fn render_template(template: &str, variables: &HashMap<String, String>) -> String {
    let Some(regex) = placeholder_regex() else {
        return template.to_string();
    };
    regex
        .replace_all(template, |caps: &Captures| match variables.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Render every string inside a JSON value
pub fn render_json(value: &Value, variables: &HashMap<String, String>) -> Value {
    match value {
        Value::String(s) => Value::String(render_template(s, variables)),
        Value::Array(items) => Value::Array(items.iter().map(|v| render_json(v, variables)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), render_json(v, variables)))
                .collect(),
        ),
        other => other.clone(),
    }
}

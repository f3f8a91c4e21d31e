//! LLM tasks over an OpenAI-compatible chat completions API

use crate::core::{Task, TaskContext};
use crate::runners::{error_excerpt, TaskError};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_BASE_URL: &str = "OPENAI_BASE_URL";
pub const ENV_MODEL: &str = "CONTEXTCHAIN_LLM_MODEL";

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Connection settings for the chat completions endpoint
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub default_model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl LlmConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: std::env::var(ENV_API_KEY).ok().filter(|k| !k.is_empty()),
            base_url: std::env::var(ENV_BASE_URL).unwrap_or(defaults.base_url),
            default_model: std::env::var(ENV_MODEL).unwrap_or(defaults.default_model),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Runner for LLM tasks
#[derive(Debug, Clone)]
pub struct LlmRunner {
    client: Client,
    config: LlmConfig,
}

impl LlmRunner {
    pub fn new(config: LlmConfig) -> Result<Self, TaskError> {
        let client = Client::builder()
            .build()
            .map_err(|e| TaskError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    pub fn with_client(client: Client, config: LlmConfig) -> Self {
        Self { client, config }
    }

    /// Send the rendered prompt and return the first choice's content
    pub async fn execute(&self, task: &Task, context: &TaskContext) -> Result<String, TaskError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| TaskError::Config(format!("{} is not set", ENV_API_KEY)))?;

        let template = match task.prompt_template.as_deref() {
            Some(t) if !t.trim().is_empty() => t,
            _ => {
                warn!("Task {} has no prompt_template; sending its inputs", task.task_id);
                "{{ inputs }}"
            }
        };
        let prompt = context.render(template, task);
        let model = task
            .param_str("model")
            .unwrap_or(&self.config.default_model)
            .to_string();

        let mut body = json!({
            "model": model,
            "messages": [{"role": "user", "content": prompt}],
        });
        if let Some(temperature) = task.parameters.get("temperature").and_then(Value::as_f64) {
            body["temperature"] = json!(temperature);
        }

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        debug!("LLM request for task {} using {}", task.task_id, model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TaskError::Status {
                url,
                status: status.as_u16(),
                body: error_excerpt(body),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| TaskError::Llm(format!("Malformed completion response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| TaskError::Llm("Completion response has no content".to_string()))
    }
}

//! GET, POST and PUT tasks

use crate::core::{domain_allowed, render_json, Task, TaskContext, TaskType};
use crate::runners::{error_excerpt, TaskError};
use reqwest::{Client, Method, Url};
use serde_json::{Map, Value};
use tracing::debug;

/// Runner for HTTP tasks
#[derive(Debug, Clone)]
pub struct HttpRunner {
    client: Client,
}

impl HttpRunner {
    pub fn new() -> Result<Self, TaskError> {
        let client = Client::builder()
            .user_agent(concat!("contextchain/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TaskError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Use a preconfigured client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Send the task's request and return the response body
    pub async fn execute(&self, task: &Task, context: &TaskContext) -> Result<String, TaskError> {
        let variables = context.rendering_variables(task);
        let url = self.checked_url(&context.render(&task.endpoint, task), context)?;

        let method = match task.task_type {
            TaskType::Get => Method::GET,
            TaskType::Post => Method::POST,
            TaskType::Put => Method::PUT,
            other => {
                return Err(TaskError::Config(format!(
                    "{} task {} is not an HTTP task",
                    other, task.task_id
                )))
            }
        };

        debug!("{} {} for task {}", method, url, task.task_id);
        let mut request = self.client.request(method.clone(), url.clone());

        if let Some(headers) = task.parameters.get("headers").and_then(Value::as_object) {
            for (name, value) in headers {
                let value = match value {
                    Value::String(s) => context.render(s, task),
                    other => other.to_string(),
                };
                request = request.header(name.as_str(), value);
            }
        }

        if method != Method::GET {
            let body = match task.parameters.get("body") {
                Some(body) => render_json(body, &variables),
                None => default_body(context),
            };
            request = request.json(&body);
        }

        let response = request.send().await?;
        read_body(url, response).await
    }

    /// GET a URL, subject to the context's allowed domains
    pub async fn fetch(&self, url: &str, context: &TaskContext) -> Result<String, TaskError> {
        let url = self.checked_url(url, context)?;
        debug!("Fetching input source {}", url);
        let response = self.client.get(url.clone()).send().await?;
        read_body(url, response).await
    }

    fn checked_url(&self, raw: &str, context: &TaskContext) -> Result<Url, TaskError> {
        let url = Url::parse(raw)
            .map_err(|e| TaskError::Config(format!("Invalid URL '{}': {}", raw, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(TaskError::Config(format!(
                "Unsupported URL scheme '{}' in {}",
                url.scheme(),
                raw
            )));
        }
        let host = url
            .host_str()
            .ok_or_else(|| TaskError::Config(format!("URL {} has no host", raw)))?;
        if !domain_allowed(host, &context.allowed_domains) {
            return Err(TaskError::DomainNotAllowed(host.to_string()));
        }
        Ok(url)
    }
}

/// `{"inputs": {"<task_id>": "<output>"}}`
fn default_body(context: &TaskContext) -> Value {
    let inputs: Map<String, Value> = context
        .input_outputs
        .iter()
        .map(|(id, output)| (id.to_string(), Value::String(output.clone())))
        .collect();
    let mut body = Map::new();
    body.insert("inputs".to_string(), Value::Object(inputs));
    Value::Object(body)
}

async fn read_body(url: Url, response: reqwest::Response) -> Result<String, TaskError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(TaskError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body: error_excerpt(body),
        });
    }
    Ok(body)
}

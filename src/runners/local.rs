//! LOCAL tasks - run a command as a subprocess

use crate::core::{Task, TaskContext};
use crate::runners::TaskError;
use serde_json::Value;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Runner for LOCAL tasks
///
/// The endpoint is the program, `parameters.args` its arguments. The outputs
/// of the task's inputs are written to stdin and stdout becomes the output.
#[derive(Debug, Clone, Default)]
pub struct LocalRunner;

impl LocalRunner {
    pub fn new() -> Self {
        Self
    }

    pub async fn execute(&self, task: &Task, context: &TaskContext) -> Result<String, TaskError> {
        let program = task.endpoint.trim();
        if program.is_empty() {
            return Err(TaskError::Config(format!(
                "LOCAL task {} has no endpoint",
                task.task_id
            )));
        }

        let args: Vec<String> = match task.parameters.get("args") {
            None => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => context.render(s, task),
                    other => other.to_string(),
                })
                .collect(),
            Some(_) => {
                return Err(TaskError::Config(format!(
                    "Task {} parameter 'args' must be an array",
                    task.task_id
                )))
            }
        };

        debug!("Spawning {} {:?} for task {}", program, args, task.task_id);

        let mut child = Command::new(program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TaskError::Process(format!("Failed to execute {}: {}", program, e)))?;

        // Written from a separate task so a full stdout pipe cannot stall us
        if let Some(mut stdin) = child.stdin.take() {
            let input = context.joined_inputs();
            let name = program.to_string();
            tokio::spawn(async move {
                // A program that ignores stdin may close it early
                if let Err(e) = stdin.write_all(input.as_bytes()).await {
                    debug!("Could not write stdin to {}: {}", name, e);
                }
            });
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| TaskError::Process(format!("Failed to wait for {}: {}", program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            warn!("{} exited with code {}: {}", program, exit_code, stderr.trim());
            return Err(TaskError::Process(format!(
                "{} exited with code {}: {}",
                program,
                exit_code,
                stderr.trim()
            )));
        }

        String::from_utf8(output.stdout)
            .map_err(|e| TaskError::Process(format!("Failed to decode output of {}: {}", program, e)))
    }
}

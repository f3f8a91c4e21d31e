//! CLI output formatting

use crate::{
    core::{ExecutionStatus, RecordStatus, RunReport, TaskOutcome, TaskStatus},
    execution::ExecutionEvent,
    persistence::ResultRecord,
    registry::VersionInfo,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static BULLET: Emoji<'_, '_> = Emoji("• ", "- ");

/// Plain banner, also shown above `--help`
pub const BANNER: &str = "\
=====================================
      ContextChain v1.0
   Orchestrating AI & Full-Stack Workflows
=====================================";

pub fn show_banner() {
    for line in BANNER.lines() {
        println!("{}", style(line).green().bold());
    }
}

/// Section heading printed at the start of a command
pub fn heading(text: &str) {
    println!("\n{}", style(text).yellow().bold());
}

/// Create a spinner for work of unknown length
pub fn create_spinner(message: impl Into<String>) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        spinner.set_style(spinner_style);
    }
    spinner.set_message(message.into());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Pending => style("PENDING").dim().to_string(),
        ExecutionStatus::Running => style("RUNNING").yellow().to_string(),
        ExecutionStatus::Completed => style("COMPLETED").green().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
    }
}

/// Format a record status for display
pub fn format_record_status(status: RecordStatus) -> String {
    match status {
        RecordStatus::Completed => style(status).green().to_string(),
        RecordStatus::Failed => style(status).red().to_string(),
        RecordStatus::Skipped => style(status).dim().to_string(),
        RecordStatus::Started | RecordStatus::Triggered => style(status).cyan().to_string(),
    }
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::PipelineStarted {
            run_id,
            pipeline_id,
            total_tasks,
        } => format!(
            "{} Starting pipeline {} ({}, {} tasks)",
            ROCKET,
            style(pipeline_id).bold(),
            style(short_id(&run_id.to_string())).dim(),
            total_tasks
        ),
        ExecutionEvent::TaskStarted {
            task_id,
            attempt,
            max_attempts,
        } => {
            if *attempt > 1 {
                format!(
                    "{} Task {} (attempt {}/{})",
                    SPINNER,
                    style(task_id).cyan(),
                    attempt,
                    max_attempts
                )
            } else {
                format!("{} Task {}", SPINNER, style(task_id).cyan())
            }
        }
        ExecutionEvent::TaskRetrying {
            task_id,
            attempt,
            max_attempts,
            error,
        } => format!(
            "{} Task {} attempt {}/{} failed: {}",
            WARN,
            style(task_id).yellow(),
            attempt,
            max_attempts,
            style(error).dim()
        ),
        ExecutionEvent::TaskCompleted {
            task_id, attempts, ..
        } => {
            if *attempts > 1 {
                format!(
                    "{} Task {} ({} attempts)",
                    CHECK,
                    style(task_id).green(),
                    attempts
                )
            } else {
                format!("{} Task {}", CHECK, style(task_id).green())
            }
        }
        ExecutionEvent::TaskFailed {
            task_id,
            attempts,
            error,
        } => format!(
            "{} Task {} failed after {} attempts: {}",
            CROSS,
            style(task_id).red(),
            attempts,
            style(error).dim()
        ),
        ExecutionEvent::TaskSkipped { task_id } => {
            format!("{} Task {} skipped", INFO, style(task_id).dim())
        }
        ExecutionEvent::PipelineCompleted { run_id, status } => format!(
            "{} Run {} {}",
            INFO,
            style(short_id(&run_id.to_string())).dim(),
            format_status(*status)
        ),
    }
}

/// One line per task outcome
pub fn format_outcome(outcome: &TaskOutcome) -> String {
    let icon = match outcome.status {
        TaskStatus::Completed => CHECK,
        TaskStatus::Failed => CROSS,
        TaskStatus::Skipped => INFO,
    };
    let mut line = format!(
        "{} Task {} {}",
        icon,
        outcome.task_id,
        format_record_status(outcome.status.into())
    );
    if let Some(error) = &outcome.error {
        line.push_str(&format!(": {}", style(error).dim()));
    }
    line
}

/// Summary line for a finished run
pub fn format_report(report: &RunReport) -> String {
    format!(
        "{} {} - {} - {}",
        style(short_id(&report.run_id.to_string())).dim(),
        style(&report.pipeline_id).bold(),
        format_status(report.status),
        style(format!("{:.0}%", report.progress() * 100.0)).cyan()
    )
}

/// A stored log or result entry
pub fn format_record(record: &ResultRecord) -> String {
    let task = record
        .task_id
        .map(|id| format!("task {}", id))
        .unwrap_or_else(|| "pipeline".to_string());
    let mut line = format!(
        "{}{} {} {} {} run {}",
        BULLET,
        style(&record.created_at).dim(),
        style(&record.pipeline_id).bold(),
        task,
        format_record_status(record.status),
        style(short_id(&record.run_id.to_string())).dim()
    );
    if record.attempts > 0 {
        line.push_str(&format!(" ({} attempts)", record.attempts));
    }
    if let Some(output) = &record.output {
        line.push_str(&format!("\n    {}", format_output(output, 5).replace('\n', "\n    ")));
    }
    if let Some(error) = &record.error {
        line.push_str(&format!("\n    {}", style(error).red()));
    }
    line
}

/// A stored schema version
pub fn format_version(version: &VersionInfo) -> String {
    let latest = if version.is_latest {
        style(" (latest)").green().to_string()
    } else {
        String::new()
    };
    format!(
        "{}Version {}{}: Created {}",
        BULLET,
        style(&version.schema_version).cyan(),
        latest,
        style(&version.created_at).dim()
    )
}

/// Format task output with truncation
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output.trim_end().to_string()
    } else {
        let truncated = lines[..max_lines].join("\n");
        format!(
            "{}\n{}... ({} more lines)",
            truncated,
            style("[truncated]").dim(),
            lines.len() - max_lines
        )
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

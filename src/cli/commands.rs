//! CLI command definitions

use crate::core::config::DEFAULT_CCSHARE_PATH;
use crate::registry::schema_loader::DEFAULT_SCHEMA_DIR;
use clap::Args;
use std::path::PathBuf;

/// Scaffold a pipeline schema and the connection config
#[derive(Debug, Args, Clone)]
pub struct InitCommand {
    /// Output path for the schema (default: schemas/<pipeline_id>.json)
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Prompt for every setting (default)
    #[arg(long, overrides_with = "no_interactive")]
    pub interactive: bool,

    /// Use defaults without prompting
    #[arg(long = "no-interactive", overrides_with = "interactive")]
    pub no_interactive: bool,
}

impl InitCommand {
    pub fn is_interactive(&self) -> bool {
        !self.no_interactive
    }
}

/// A command that takes a schema file
#[derive(Debug, Args, Clone)]
pub struct SchemaFileCommand {
    /// Path to schema file
    #[arg(short, long)]
    pub file: PathBuf,
}

/// Fetch a stored schema into a file
#[derive(Debug, Args, Clone)]
pub struct SchemaPullCommand {
    #[arg(long = "pipeline-id", alias = "pipeline_id")]
    pub pipeline_id: String,

    /// Schema version (default: latest)
    #[arg(long)]
    pub version: Option<String>,

    /// Where to write the schema (default: schemas/<pipeline_id>.json)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Push every schema in a directory
#[derive(Debug, Args, Clone)]
pub struct SchemaLoadCommand {
    #[arg(long, default_value = DEFAULT_SCHEMA_DIR)]
    pub dir: PathBuf,
}

/// Run an entire pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    #[arg(long = "pipeline-id", alias = "pipeline_id")]
    pub pipeline_id: String,

    /// Schema version (default: latest)
    #[arg(long)]
    pub version: Option<String>,
}

/// Run a single task
#[derive(Debug, Args, Clone)]
pub struct RunTaskCommand {
    #[arg(long = "pipeline-id", alias = "pipeline_id")]
    pub pipeline_id: String,

    #[arg(long = "task-id", alias = "task_id")]
    pub task_id: u32,

    /// Schema version (default: latest)
    #[arg(long)]
    pub version: Option<String>,
}

/// A command scoped to one pipeline
#[derive(Debug, Args, Clone)]
pub struct PipelineCommand {
    #[arg(long = "pipeline-id", alias = "pipeline_id")]
    pub pipeline_id: String,
}

/// Roll back to a stored version
#[derive(Debug, Args, Clone)]
pub struct VersionRollbackCommand {
    #[arg(long = "pipeline-id", alias = "pipeline_id")]
    pub pipeline_id: String,

    /// Version to keep
    #[arg(long)]
    pub version: String,
}

/// A `.ccshare` file location
#[derive(Debug, Args, Clone)]
pub struct CcShareCommand {
    #[arg(long, default_value = DEFAULT_CCSHARE_PATH)]
    pub file: PathBuf,
}

/// Join an existing shared database
#[derive(Debug, Args, Clone)]
pub struct CcShareJoinCommand {
    /// Shared database URI
    #[arg(long)]
    pub uri: String,

    #[arg(long, default_value = DEFAULT_CCSHARE_PATH)]
    pub file: PathBuf,
}

/// Show stored results of a task
#[derive(Debug, Args, Clone)]
pub struct ResultsCommand {
    #[arg(long = "task-id", alias = "task_id")]
    pub task_id: u32,
}

/// Run cron-scheduled tasks
#[derive(Debug, Args, Clone)]
pub struct TriggersCommand {
    /// Fire the tasks due this minute and exit
    #[arg(long)]
    pub once: bool,
}

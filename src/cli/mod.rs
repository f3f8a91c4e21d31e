//! Command-line interface

pub mod commands;
pub mod output;
pub mod prompts;

use clap::{Parser, Subcommand};
use commands::{
    CcShareCommand, CcShareJoinCommand, InitCommand, PipelineCommand, ResultsCommand,
    RunCommand, RunTaskCommand, SchemaFileCommand, SchemaLoadCommand, SchemaPullCommand,
    TriggersCommand, VersionRollbackCommand,
};
use std::ffi::OsString;
use std::path::PathBuf;

/// ContextChain v1.0 CLI: Orchestrate AI and Full-Stack Workflows
#[derive(Debug, Parser, Clone)]
#[command(name = "contextchain")]
#[command(version)]
#[command(about = "Orchestrate AI and full-stack workflows", long_about = None)]
#[command(before_help = output::BANNER)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the connection config (default: config/default_config.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Initialize a new pipeline schema and database connection
    Init(InitCommand),

    /// Validate a schema file
    SchemaCompile(SchemaFileCommand),

    /// Push a schema to the registry as a new version
    SchemaPush(SchemaFileCommand),

    /// Pull a schema from the registry
    SchemaPull(SchemaPullCommand),

    /// Push every schema file in a directory
    SchemaLoad(SchemaLoadCommand),

    /// Run an entire pipeline
    Run(RunCommand),

    /// Run a single task for development
    RunTask(RunTaskCommand),

    /// List schema versions for a pipeline
    VersionList(PipelineCommand),

    /// Roll back to a previous schema version
    VersionRollback(VersionRollbackCommand),

    /// Create a .ccshare file for a shared database
    CcshareInit(CcShareCommand),

    /// Join an existing .ccshare collaboration
    CcshareJoin(CcShareJoinCommand),

    /// Check the .ccshare connection
    CcshareStatus(CcShareCommand),

    /// Display trigger logs for a pipeline
    Logs(PipelineCommand),

    /// Display results for a task
    Results(ResultsCommand),

    /// List all registered pipelines
    ListPipelines,

    /// Run tasks that declare a cron schedule
    Triggers(TriggersCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}

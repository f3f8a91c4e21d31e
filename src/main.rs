use anyhow::{bail, Context, Result};
use chrono::Utc;
use contextchain::cli::commands::{
    CcShareCommand, CcShareJoinCommand, InitCommand, PipelineCommand, ResultsCommand,
    RunCommand, RunTaskCommand, SchemaFileCommand, SchemaLoadCommand, SchemaPullCommand,
    TriggersCommand, VersionRollbackCommand,
};
use contextchain::cli::output::*;
use contextchain::cli::prompts::{self, Defaults, Interactive, Prompter};
use contextchain::cli::{Cli, Command};
use contextchain::core::config::{AppConfig, CcShare, DEFAULT_CONFIG_PATH};
use contextchain::core::{validate_schema, ExecutionStatus, OutputCollection, PipelineSchema};
use contextchain::execution::ExecutionEngine;
use contextchain::persistence::{open_store, RecordFilter, Store};
use contextchain::registry::schema_loader::DEFAULT_SCHEMA_DIR;
use contextchain::registry::{SchemaLoader, VersionManager};
use contextchain::runners::Dispatcher;
use contextchain::trigger::TriggerHandler;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() {
    let cli = Cli::from_args();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" }));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set logging subscriber: {}", e);
    }

    if let Err(e) = dispatch(&cli).await {
        eprintln!("{}{}", CROSS, style(format!("{:#}", e)).red());
        std::process::exit(1);
    }
}

async fn dispatch(cli: &Cli) -> Result<()> {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    match &cli.command {
        Command::Init(cmd) => init(cmd, &config_path).await,
        Command::SchemaCompile(cmd) => schema_compile(cmd),
        Command::SchemaPush(cmd) => schema_push(cmd, &config_path).await,
        Command::SchemaPull(cmd) => schema_pull(cmd, &config_path).await,
        Command::SchemaLoad(cmd) => schema_load(cmd, &config_path).await,
        Command::Run(cmd) => run_pipeline(cmd, &config_path).await,
        Command::RunTask(cmd) => run_task(cmd, &config_path).await,
        Command::VersionList(cmd) => version_list(cmd, &config_path).await,
        Command::VersionRollback(cmd) => version_rollback(cmd, &config_path).await,
        Command::CcshareInit(cmd) => ccshare_init(cmd),
        Command::CcshareJoin(cmd) => ccshare_join(cmd, &config_path),
        Command::CcshareStatus(cmd) => ccshare_status(cmd).await,
        Command::Logs(cmd) => show_logs(cmd, &config_path).await,
        Command::Results(cmd) => show_results(cmd, &config_path).await,
        Command::ListPipelines => list_pipelines(&config_path).await,
        Command::Triggers(cmd) => run_triggers(cmd, &config_path).await,
    }
}

/// Open the configured database
async fn connect(config_path: &Path) -> Result<Arc<dyn Store>> {
    let config = AppConfig::load(config_path)?;
    open_store(&config).await
}

async fn engine(config_path: &Path) -> Result<ExecutionEngine<Dispatcher>> {
    let store = connect(config_path).await?;
    Ok(ExecutionEngine::new(Dispatcher::from_env()?, store))
}

fn default_schema_path(pipeline_id: &str) -> PathBuf {
    Path::new(DEFAULT_SCHEMA_DIR).join(format!("{}.json", pipeline_id))
}

async fn init(cmd: &InitCommand, config_path: &Path) -> Result<()> {
    show_banner();
    heading("Initializing new pipeline");

    let prompter: Box<dyn Prompter> = if cmd.is_interactive() {
        Box::new(Interactive::new())
    } else {
        Box::new(Defaults)
    };
    let (schema, config) = prompts::init_answers(prompter.as_ref())?;

    config
        .save(config_path)
        .context("Failed to write the connection config")?;
    println!("{}Config written to {}", CHECK, config_path.display());

    let spinner = create_spinner("Setting up collections...");
    let store = open_store(&config).await;
    spinner.finish_and_clear();
    store?.ping().await?;
    println!(
        "{}Database {} ready at {}",
        CHECK,
        style(&config.db_name).bold(),
        style(&config.uri).dim()
    );

    if let Err(e) = validate_schema(&schema) {
        println!("{}Schema needs attention before it can run: {}", WARN, e);
    }

    let path = cmd
        .file
        .clone()
        .unwrap_or_else(|| default_schema_path(&schema.pipeline_id));
    schema.write_to(&path)?;
    println!(
        "{}Pipeline {} initialized at {}",
        CHECK,
        style(&schema.pipeline_id).bold(),
        path.display()
    );
    Ok(())
}

fn load_valid_schema(path: &Path) -> Result<PipelineSchema> {
    let schema = PipelineSchema::from_file(path)?;
    validate_schema(&schema)
        .with_context(|| format!("Schema {} is invalid", path.display()))?;
    Ok(schema)
}

fn schema_compile(cmd: &SchemaFileCommand) -> Result<()> {
    let schema = load_valid_schema(&cmd.file)?;
    println!(
        "{}Schema {} version {} validated ({} tasks)",
        CHECK,
        style(&schema.pipeline_id).bold(),
        style(&schema.schema_version).cyan(),
        schema.tasks.len()
    );
    Ok(())
}

async fn schema_push(cmd: &SchemaFileCommand, config_path: &Path) -> Result<()> {
    let schema = load_valid_schema(&cmd.file)?;
    let versions = VersionManager::new(connect(config_path).await?);
    let pushed = versions.push_schema(&schema).await?;
    println!(
        "{}Pushed {} version {}",
        CHECK,
        style(&schema.pipeline_id).bold(),
        style(&pushed.schema_version).cyan()
    );
    Ok(())
}

async fn schema_pull(cmd: &SchemaPullCommand, config_path: &Path) -> Result<()> {
    let versions = VersionManager::new(connect(config_path).await?);
    let schema = versions
        .require_schema(&cmd.pipeline_id, cmd.version.as_deref())
        .await?;
    let path = cmd
        .output
        .clone()
        .unwrap_or_else(|| default_schema_path(&cmd.pipeline_id));
    schema.write_to(&path)?;
    println!(
        "{}Pulled {} version {} to {}",
        CHECK,
        style(&schema.pipeline_id).bold(),
        style(&schema.schema_version).cyan(),
        path.display()
    );
    Ok(())
}

async fn schema_load(cmd: &SchemaLoadCommand, config_path: &Path) -> Result<()> {
    let versions = VersionManager::new(connect(config_path).await?);
    let loader = SchemaLoader::new(&cmd.dir, versions);
    let loaded = loader.load_all().await;
    println!(
        "{}Loaded {} schemas from {}",
        if loaded > 0 { CHECK } else { INFO },
        loaded,
        loader.schema_dir().display()
    );
    Ok(())
}

async fn run_pipeline(cmd: &RunCommand, config_path: &Path) -> Result<()> {
    let engine = engine(config_path).await?;
    let schema = VersionManager::new(engine.store().clone())
        .require_schema(&cmd.pipeline_id, cmd.version.as_deref())
        .await?;

    println!(
        "{}Loaded pipeline: {} (version {})",
        INFO,
        style(&schema.pipeline_id).bold(),
        style(&schema.schema_version).cyan()
    );

    engine
        .add_event_handler(|event| println!("{}", format_execution_event(&event)))
        .await;

    println!();
    let report = engine.execute_pipeline(&schema).await?;
    println!("\n{}", format_report(&report));

    if report.status == ExecutionStatus::Failed {
        bail!("Pipeline {} failed", schema.pipeline_id);
    }
    println!(
        "{}{} completed {}",
        CHECK,
        style(&schema.pipeline_id).bold(),
        style("successfully").green()
    );
    Ok(())
}

async fn run_task(cmd: &RunTaskCommand, config_path: &Path) -> Result<()> {
    let engine = engine(config_path).await?;
    let schema = VersionManager::new(engine.store().clone())
        .require_schema(&cmd.pipeline_id, cmd.version.as_deref())
        .await?;

    let spinner = create_spinner(format!("Running task {}...", cmd.task_id));
    let outcome = engine.execute_single_task(&schema, cmd.task_id).await;
    spinner.finish_and_clear();
    let outcome = outcome?;

    println!("{}", format_outcome(&outcome));
    if let Some(output) = &outcome.output {
        println!("{}", format_output(output, 20));
    }
    if !outcome.is_success() {
        bail!("Task {} failed", cmd.task_id);
    }
    Ok(())
}

async fn version_list(cmd: &PipelineCommand, config_path: &Path) -> Result<()> {
    let versions = VersionManager::new(connect(config_path).await?);
    let list = versions.list_versions(&cmd.pipeline_id).await?;
    if list.is_empty() {
        println!("{}No versions found for {}", INFO, cmd.pipeline_id);
        return Ok(());
    }

    heading(&format!("Versions for {}", cmd.pipeline_id));
    for version in &list {
        println!("{}", format_version(version));
    }
    Ok(())
}

async fn version_rollback(cmd: &VersionRollbackCommand, config_path: &Path) -> Result<()> {
    let versions = VersionManager::new(connect(config_path).await?);
    let removed = versions
        .rollback_version(&cmd.pipeline_id, &cmd.version)
        .await?;
    println!(
        "{}Rolled back {} to version {} ({} other versions removed)",
        CHECK,
        style(&cmd.pipeline_id).bold(),
        style(&cmd.version).cyan(),
        removed
    );
    Ok(())
}

fn ccshare_init(cmd: &CcShareCommand) -> Result<()> {
    heading("Creating .ccshare file");
    let share = prompts::ccshare_init(&Interactive::new())?;
    share.save(&cmd.file)?;
    println!(
        "{}Wrote {} ({} roles)",
        CHECK,
        cmd.file.display(),
        share.roles.len()
    );
    Ok(())
}

fn ccshare_join(cmd: &CcShareJoinCommand, config_path: &Path) -> Result<()> {
    heading("Joining shared database");
    let share = prompts::ccshare_join(&Interactive::new(), &cmd.uri)?;
    share.save(&cmd.file)?;
    AppConfig::from_ccshare(&share, &cmd.file).save(config_path)?;
    println!(
        "{}Joined {} as {}",
        CHECK,
        style(&share.uri).bold(),
        share.roles_summary()
    );
    Ok(())
}

async fn ccshare_status(cmd: &CcShareCommand) -> Result<()> {
    let share = CcShare::load(&cmd.file)?;
    let config = AppConfig::from_ccshare(&share, &cmd.file);
    let store = open_store(&config).await?;
    store
        .ping()
        .await
        .with_context(|| format!("Cannot reach {}", share.uri))?;

    println!("{}Connected to {}", CHECK, style(&share.uri).bold());
    println!("  Database: {}", style(&share.db_name).cyan());
    println!("  Roles: {}", share.roles_summary());
    Ok(())
}

async fn show_logs(cmd: &PipelineCommand, config_path: &Path) -> Result<()> {
    let store = connect(config_path).await?;
    let records = store
        .find_records(
            OutputCollection::TriggerLogs,
            &RecordFilter::pipeline(&cmd.pipeline_id),
        )
        .await?;
    if records.is_empty() {
        println!("{}No logs found for {}", INFO, cmd.pipeline_id);
        return Ok(());
    }

    heading(&format!("Logs for {}", cmd.pipeline_id));
    for record in &records {
        println!("{}", format_record(record));
    }
    Ok(())
}

async fn show_results(cmd: &ResultsCommand, config_path: &Path) -> Result<()> {
    let store = connect(config_path).await?;
    let records = store
        .find_records(OutputCollection::TaskResults, &RecordFilter::task(cmd.task_id))
        .await?;
    if records.is_empty() {
        println!("{}No results found for task {}", INFO, cmd.task_id);
        return Ok(());
    }

    heading(&format!("Results for task {}", cmd.task_id));
    for record in &records {
        println!("{}", format_record(record));
    }
    Ok(())
}

async fn list_pipelines(config_path: &Path) -> Result<()> {
    let versions = VersionManager::new(connect(config_path).await?);
    let pipelines = versions.list_pipelines().await?;
    if pipelines.is_empty() {
        println!("{}No pipelines registered", INFO);
        return Ok(());
    }

    heading("Pipelines");
    for pipeline_id in &pipelines {
        println!("{}{}", BULLET, style(pipeline_id).bold());
    }
    Ok(())
}

async fn run_triggers(cmd: &TriggersCommand, config_path: &Path) -> Result<()> {
    let engine = Arc::new(engine(config_path).await?);
    let handler = TriggerHandler::from_store(engine.clone()).await?;
    if handler.entries().is_empty() {
        println!("{}No tasks declare a cron schedule", INFO);
        return Ok(());
    }

    for entry in handler.entries() {
        println!(
            "{}{} task {} on '{}'",
            BULLET,
            style(&entry.pipeline_id).bold(),
            entry.task_id,
            entry.schedule.expression()
        );
    }

    if cmd.once {
        let outcomes = handler.fire(&Utc::now()).await?;
        if outcomes.is_empty() {
            println!("{}Nothing due this minute", INFO);
        }
        for outcome in &outcomes {
            println!("{}", format_outcome(outcome));
        }
        return Ok(());
    }

    engine
        .add_event_handler(|event| println!("{}", format_execution_event(&event)))
        .await;
    if let Some(next) = handler.next_fire(&Utc::now()) {
        println!("{}Next trigger at {}", INFO, style(next.to_rfc3339()).cyan());
    }
    println!("{}Waiting for triggers (Ctrl-C to stop)", ROCKET);

    handler.run_until(tokio::signal::ctrl_c()).await
}

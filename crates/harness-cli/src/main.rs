//! Command-line surface for the Harness resource dispatcher.
//!
//! Usage:
//! ```bash
//! harness describe                            # Every toolset and resource
//! harness describe --search pipeline          # Ranked resource search
//! harness list pipeline --input '{"project_id":"p"}'
//! harness get service --input @service.json
//! harness execute pipeline run --input '{"pipeline_id":"build"}'
//! harness search deploy --types pipeline,service
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use harness_core::{Config, Operation, config::LogLevel};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "harness", author, version, about)]
struct Cli {
    /// TOML configuration file. The environment is read when absent.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Describe toolsets and resource types
    Describe(commands::describe::DescribeArgs),

    /// List resources of a type
    List(commands::call::ListArgs),

    /// Get one resource
    Get(commands::call::CallArgs),

    /// Create a resource
    Create(commands::call::CallArgs),

    /// Update a resource
    Update(commands::call::CallArgs),

    /// Delete a resource
    Delete(commands::call::CallArgs),

    /// Run a resource's execute action
    Execute(commands::execute::ExecuteArgs),

    /// Search across resource types
    Search(commands::search::SearchArgs),
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Config::from_env().context("failed to read config from environment"),
    }
}

fn init_tracing(level: LogLevel) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level.as_str()).context("failed to parse log directive")?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref());
    init_tracing(config.as_ref().map_or(LogLevel::default(), |c| c.log_level))?;
    let config = config?;

    match cli.command {
        Command::Describe(args) => commands::describe::run(&args, &config),
        Command::List(args) => commands::call::run_list(&args, &config).await,
        Command::Get(args) => commands::call::run(Operation::Get, &args, &config).await,
        Command::Create(args) => commands::call::run(Operation::Create, &args, &config).await,
        Command::Update(args) => commands::call::run(Operation::Update, &args, &config).await,
        Command::Delete(args) => commands::call::run(Operation::Delete, &args, &config).await,
        Command::Execute(args) => commands::execute::run(&args, &config).await,
        Command::Search(args) => commands::search::run(&args, &config).await,
    }
}

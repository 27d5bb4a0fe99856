//! `harness execute <type> <action>`: run a non-CRUD action.

use anyhow::Result;
use clap::Args;
use console::style;
use harness_core::Config;
use serde_json::Value;

use super::{call::describe_failure, connect, parse_input, print_json};

#[derive(Debug, Args)]
pub struct ExecuteArgs {
    /// Resource type (e.g., "pipeline").
    pub resource_type: String,

    /// Action name (e.g., "run").
    pub action: String,

    /// Input JSON (inline or @file.json).
    #[arg(short, long)]
    pub input: Option<String>,
}

pub async fn run(args: &ExecuteArgs, config: &Config) -> Result<()> {
    let input = parse_input(args.input.as_deref())?;
    let (client, registry) = connect(config)?;

    eprintln!(
        "{} {} {}",
        style("→").cyan(),
        style(&args.action).bold(),
        style(&args.resource_type).bold()
    );

    let result = registry
        .dispatch_execute(&client, &args.resource_type, &args.action, &input)
        .await
        .map_err(|err| describe_failure(err, &args.action, &args.resource_type))?;

    // Streamed answers arrive as one string; print them as text.
    match result {
        Value::String(text) => {
            println!("{text}");
            Ok(())
        }
        other => print_json(&other),
    }
}

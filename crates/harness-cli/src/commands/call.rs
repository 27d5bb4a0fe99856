//! `harness list|get|create|update|delete`: one CRUD dispatch.

use anyhow::Result;
use clap::Args;
use console::style;
use harness_core::{
    Config, DispatchError, HarnessClient, Input, Operation, Registry,
    client::{DEFAULT_MAX_ITEMS, DEFAULT_PAGE_SIZE},
    compact::compact_items,
};
use serde_json::Value;

use super::{connect, parse_input, print_json};

#[derive(Debug, Args)]
pub struct CallArgs {
    /// Resource type (e.g., "pipeline").
    pub resource_type: String,

    /// Input JSON (inline or @file.json).
    #[arg(short, long)]
    pub input: Option<String>,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Resource type (e.g., "pipeline").
    pub resource_type: String,

    /// Input JSON (inline or @file.json).
    #[arg(short, long)]
    pub input: Option<String>,

    /// Strip verbose metadata from listed items.
    #[arg(long)]
    pub compact: bool,

    /// Follow pages until `--max-items` items are collected. Items still get
    /// deep links; the result is always `{items, total}`.
    #[arg(long)]
    pub all: bool,

    #[arg(long, default_value_t = DEFAULT_MAX_ITEMS, requires = "all")]
    pub max_items: usize,

    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE, requires = "all")]
    pub page_size: usize,
}

pub async fn run(operation: Operation, args: &CallArgs, config: &Config) -> Result<()> {
    let input = parse_input(args.input.as_deref())?;
    let (client, registry) = connect(config)?;

    eprintln!(
        "{} {} {}",
        style("→").cyan(),
        operation,
        style(&args.resource_type).bold()
    );

    let result = registry
        .dispatch(&client, &args.resource_type, operation, &input)
        .await
        .map_err(|err| describe_failure(err, operation.as_str(), &args.resource_type))?;
    print_json(&result)
}

pub async fn run_list(args: &ListArgs, config: &Config) -> Result<()> {
    let input = parse_input(args.input.as_deref())?;
    let (client, registry) = connect(config)?;

    eprintln!("{} list {}", style("→").cyan(), style(&args.resource_type).bold());

    let result = list(&registry, &client, args, &input).await?;
    print_json(&result)
}

pub(crate) async fn list(
    registry: &Registry,
    client: &HarnessClient,
    args: &ListArgs,
    input: &Input,
) -> Result<Value> {
    let mut result = if args.all {
        registry
            .dispatch_all_pages(
                client,
                &args.resource_type,
                input,
                args.max_items,
                args.page_size,
            )
            .await
            .map_err(|err| describe_failure(err, "list", &args.resource_type))?
    } else {
        registry
            .dispatch(client, &args.resource_type, Operation::List, input)
            .await
            .map_err(|err| describe_failure(err, "list", &args.resource_type))?
    };

    if args.compact
        && let Some(Value::Array(items)) = result.get_mut("items")
    {
        *items = compact_items(std::mem::take(items));
    }

    Ok(result)
}

/// Caller errors already name the alternatives; remote failures get the
/// attempted call as context.
pub(crate) fn describe_failure(
    err: DispatchError,
    action: &str,
    resource_type: &str,
) -> anyhow::Error {
    if err.is_caller_error() {
        anyhow::Error::new(err)
    } else {
        anyhow::Error::new(err).context(format!("{action} {resource_type} failed"))
    }
}

//! `harness describe`: registry metadata without any network call.

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use harness_core::{Config, Registry};

use super::print_json;

#[derive(Debug, Args)]
pub struct DescribeArgs {
    /// Describe one resource type.
    #[arg(long, conflicts_with_all = ["toolset", "search", "summary"])]
    pub resource_type: Option<String>,

    /// Describe one toolset.
    #[arg(long, conflicts_with_all = ["search", "summary"])]
    pub toolset: Option<String>,

    /// Rank resource types matching a term.
    #[arg(long, conflicts_with = "summary")]
    pub search: Option<String>,

    /// One line per resource type.
    #[arg(long)]
    pub summary: bool,
}

pub fn run(args: &DescribeArgs, config: &Config) -> Result<()> {
    let registry = Registry::new(config).context("failed to load toolsets")?;

    if let Some(resource_type) = &args.resource_type {
        return print_json(&registry.describe_resource(resource_type)?);
    }

    if let Some(name) = &args.toolset {
        let description = registry.describe();
        let toolset = description
            .toolsets
            .iter()
            .find(|t| t.name == *name)
            .with_context(|| {
                let names: Vec<_> = description.toolsets.iter().map(|t| t.name.as_str()).collect();
                format!("unknown toolset \"{name}\". Enabled: {}", names.join(", "))
            })?;
        return print_json(toolset);
    }

    if let Some(term) = &args.search {
        let matches = registry.search_resources(term);
        if matches.is_empty() {
            eprintln!("{} No resource types match \"{term}\"", style("?").yellow().bold());
        }
        return print_json(&matches);
    }

    if args.summary {
        return print_json(&registry.describe_summary());
    }

    print_json(&registry.describe())
}

//! `harness search <query>`: fan a query out across resource types.

use anyhow::Result;
use clap::Args;
use console::style;
use harness_core::{
    Config, SearchOptions,
    fanout::{DEFAULT_BATCH_SIZE, DEFAULT_MAX_PER_TYPE},
    search,
};

use super::{connect, print_json};

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Search term.
    pub query: String,

    /// Resource types to search; all listable types when omitted.
    #[arg(long, value_delimiter = ',')]
    pub types: Vec<String>,

    #[arg(long, default_value_t = DEFAULT_MAX_PER_TYPE)]
    pub max_per_type: u32,

    /// List calls in flight at once.
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Keep full item payloads.
    #[arg(long)]
    pub no_compact: bool,

    #[arg(long)]
    pub org_id: Option<String>,

    #[arg(long)]
    pub project_id: Option<String>,
}

impl SearchArgs {
    fn options(&self) -> SearchOptions {
        SearchOptions {
            resource_types: self.types.clone(),
            max_per_type: self.max_per_type,
            batch_size: self.batch_size,
            compact: !self.no_compact,
            org_id: self.org_id.clone(),
            project_id: self.project_id.clone(),
        }
    }
}

pub async fn run(args: &SearchArgs, config: &Config) -> Result<()> {
    let (client, registry) = connect(config)?;

    eprintln!("{} Searching for {}", style("→").cyan(), style(&args.query).bold());

    let report = search(&registry, &client, &args.query, &args.options()).await;

    if !report.errors.is_empty() {
        eprintln!(
            "{} {} of {} resource types failed",
            style("!").yellow().bold(),
            report.errors.len(),
            report.searched_types
        );
    }
    if !report.unavailable.is_empty() {
        eprintln!(
            "{} Not enabled on this account: {}",
            style("?").yellow().bold(),
            report.unavailable.join(", ")
        );
    }

    print_json(&report)
}

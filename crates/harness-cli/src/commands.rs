//! CLI command implementations.
//!
//! Each subcommand lives in its own module. Results are printed as pretty
//! JSON on stdout; progress lines and logs go to stderr.

pub mod call;
pub mod describe;
pub mod execute;
pub mod search;

use std::path::PathBuf;

use anyhow::{Context, Result};
use harness_core::{Config, HarnessClient, Input, Registry};
use serde::Serialize;

/// Parses `--input`: inline JSON, `@file.json`, or nothing.
pub(crate) fn parse_input(raw: Option<&str>) -> Result<Input> {
    let Some(raw) = raw else {
        return Ok(Input::new());
    };

    let text = match raw.strip_prefix('@') {
        Some(path) => {
            let path = PathBuf::from(path);
            std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read input file: {}", path.display()))?
        }
        None => raw.to_string(),
    };

    match serde_json::from_str(&text).context("invalid input JSON")? {
        serde_json::Value::Object(map) => Ok(map),
        _ => anyhow::bail!("input must be a JSON object"),
    }
}

/// Builds the HTTP client and registry for `config`.
pub(crate) fn connect(config: &Config) -> Result<(HarnessClient, Registry)> {
    let client = HarnessClient::new(config).context("failed to build HTTP client")?;
    let registry = Registry::new(config).context("failed to load toolsets")?;
    Ok((client, registry))
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

//! Resource dispatch engine for the Harness platform API.
//!
//! A caller names a resource type, an operation and loosely typed input; the
//! [`Registry`] resolves that against declarative toolset tables into one
//! HTTP request, sends it through a rate-limited, retrying
//! [`HarnessClient`], and normalizes the response.
//!
//! ```no_run
//! # async fn run() -> anyhow::Result<()> {
//! use harness_core::{Config, HarnessClient, Input, Operation, Registry};
//!
//! let config = Config::from_env()?;
//! let client = HarnessClient::new(&config)?;
//! let registry = Registry::new(&config)?;
//!
//! let mut input = Input::new();
//! input.insert("project_id".into(), "my_project".into());
//! let pipelines = registry
//!     .dispatch(&client, "pipeline", Operation::List, &input)
//!     .await?;
//! println!("{pipelines}");
//! # Ok(())
//! # }
//! ```

pub mod body;
pub mod client;
pub mod compact;
pub mod config;
pub mod deep_link;
pub mod error;
pub mod extract;
pub mod fanout;
pub mod registry;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{HarnessClient, HttpMethod, RequestOptions, Transport};
pub use config::{Config, ConfigError};
pub use error::{ApiError, DispatchError, ErrorKind, TransportError};
pub use fanout::{SearchOptions, SearchReport, search};
pub use registry::{Operation, Registry, RegistryError, input_from_value};

/// Loosely typed caller input: field name to JSON value.
pub type Input = serde_json::Map<String, serde_json::Value>;

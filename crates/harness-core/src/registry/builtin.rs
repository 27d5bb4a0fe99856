//! Toolset tables shipped with the library.

use super::{RegistryError, types::ToolsetDefinition};

const BUILTIN_SOURCES: &[(&str, &str)] = &[
    ("pipelines", include_str!("../../toolsets/pipelines.toml")),
    ("services", include_str!("../../toolsets/services.toml")),
    ("environments", include_str!("../../toolsets/environments.toml")),
    ("connectors", include_str!("../../toolsets/connectors.toml")),
    ("ccm", include_str!("../../toolsets/ccm.toml")),
    ("devops-agent", include_str!("../../toolsets/devops-agent.toml")),
];

/// Names of the builtin toolsets, in load order.
#[must_use]
pub fn builtin_toolset_names() -> Vec<&'static str> {
    BUILTIN_SOURCES.iter().map(|(name, _)| *name).collect()
}

/// Parses every builtin toolset table.
///
/// # Errors
///
/// Returns [`RegistryError::InvalidToolset`] if a table does not parse.
pub fn builtin_toolsets() -> Result<Vec<ToolsetDefinition>, RegistryError> {
    BUILTIN_SOURCES
        .iter()
        .map(|(name, source)| parse_toolset(name, source))
        .collect()
}

/// Parses one toolset table and stamps its name on every resource.
///
/// # Errors
///
/// Returns [`RegistryError::InvalidToolset`] if `source` is not a valid
/// toolset table.
pub fn parse_toolset(origin: &str, source: &str) -> Result<ToolsetDefinition, RegistryError> {
    let mut toolset: ToolsetDefinition =
        toml::from_str(source).map_err(|err| RegistryError::InvalidToolset {
            toolset: origin.to_string(),
            reason: err.to_string(),
        })?;

    for resource in &mut toolset.resources {
        resource.toolset.clone_from(&toolset.name);
    }

    Ok(toolset)
}

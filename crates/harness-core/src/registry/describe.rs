//! Metadata introspection over the registry. Nothing here touches the
//! network.

use serde::Serialize;

use super::{
    Registry,
    types::{BodySchema, EndpointSpec, Operation, ResourceDefinition, Scope},
};
use crate::{client::HttpMethod, error::DispatchError};

/// Full registry metadata.
#[derive(Debug, Clone, Serialize)]
pub struct Description {
    pub total_resource_types: usize,
    pub total_toolsets: usize,
    pub toolsets: Vec<ToolsetDescription>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolsetDescription {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub resources: Vec<ResourceDescription>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceDescription {
    pub resource_type: String,
    pub display_name: String,
    pub description: String,
    pub toolset: String,
    pub scope: Scope,
    pub operations: Vec<OperationDescription>,
    pub execute_actions: Vec<ActionDescription>,
    pub identifier_fields: Vec<String>,
    pub list_filter_fields: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deep_link: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OperationDescription {
    pub operation: Operation,
    pub method: HttpMethod,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_schema: Option<BodySchema>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub streaming: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionDescription {
    pub action: String,
    pub method: HttpMethod,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_schema: Option<BodySchema>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub streaming: bool,
}

/// Compact registry overview.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub total_resource_types: usize,
    pub total_toolsets: usize,
    pub resources: Vec<SummaryEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryEntry {
    pub resource_type: String,
    pub toolset: String,
    pub operations: Vec<Operation>,
    pub execute_actions: Vec<String>,
}

/// One [`Registry::search_resources`] hit.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceMatch {
    pub resource_type: String,
    pub display_name: String,
    pub toolset: String,
    pub description: String,
    pub score: u8,
}

impl ResourceDescription {
    fn from_definition(resource: &ResourceDefinition) -> Self {
        Self {
            resource_type: resource.resource_type.clone(),
            display_name: resource.display_name.clone(),
            description: resource.description.clone(),
            toolset: resource.toolset.clone(),
            scope: resource.scope,
            operations: resource
                .operations
                .iter()
                .map(|(operation, spec)| OperationDescription::new(*operation, spec))
                .collect(),
            execute_actions: resource
                .execute_actions
                .iter()
                .map(|(action, spec)| ActionDescription::new(action, spec))
                .collect(),
            identifier_fields: resource.identifier_fields.clone(),
            list_filter_fields: resource.list_filter_fields.clone(),
            deep_link: resource.deep_link.clone(),
        }
    }
}

impl OperationDescription {
    fn new(operation: Operation, spec: &EndpointSpec) -> Self {
        Self {
            operation,
            method: spec.method,
            description: spec.description.clone(),
            body_schema: spec.body_schema.clone(),
            streaming: spec.streaming,
        }
    }
}

impl ActionDescription {
    fn new(action: &str, spec: &EndpointSpec) -> Self {
        Self {
            action: action.to_string(),
            method: spec.method,
            description: spec.description.clone(),
            body_schema: spec.body_schema.clone(),
            streaming: spec.streaming,
        }
    }
}

/// Relevance of `resource` to a lowercase `term`, or `None`.
fn score(resource: &ResourceDefinition, term: &str) -> Option<u8> {
    let resource_type = resource.resource_type.to_lowercase();
    if resource_type == term {
        Some(5)
    } else if resource_type.contains(term) {
        Some(4)
    } else if resource.display_name.to_lowercase().contains(term) {
        Some(3)
    } else if resource.toolset.to_lowercase().contains(term) {
        Some(2)
    } else if resource.description.to_lowercase().contains(term) {
        Some(1)
    } else {
        None
    }
}

impl Registry {
    /// Full metadata for every enabled toolset and resource.
    #[must_use]
    pub fn describe(&self) -> Description {
        Description {
            total_resource_types: self.len(),
            total_toolsets: self.toolsets().len(),
            toolsets: self
                .toolsets()
                .iter()
                .map(|toolset| ToolsetDescription {
                    name: toolset.name.clone(),
                    display_name: toolset.display_name.clone(),
                    description: toolset.description.clone(),
                    resources: toolset
                        .resources
                        .iter()
                        .map(ResourceDescription::from_definition)
                        .collect(),
                })
                .collect(),
        }
    }

    /// Metadata for one resource type.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::UnknownResource`] for an unknown type.
    pub fn describe_resource(
        &self,
        resource_type: &str,
    ) -> Result<ResourceDescription, DispatchError> {
        self.get_resource(resource_type)
            .map(ResourceDescription::from_definition)
    }

    /// Totals plus one line per resource type.
    #[must_use]
    pub fn describe_summary(&self) -> Summary {
        let mut resources: Vec<SummaryEntry> = self
            .resources()
            .map(|resource| SummaryEntry {
                resource_type: resource.resource_type.clone(),
                toolset: resource.toolset.clone(),
                operations: resource.supported_operations(),
                execute_actions: resource.action_names(),
            })
            .collect();
        resources.sort_by(|a, b| a.resource_type.cmp(&b.resource_type));

        Summary {
            total_resource_types: self.len(),
            total_toolsets: self.toolsets().len(),
            resources,
        }
    }

    /// Case-insensitive ranked search over type, display name, toolset and
    /// description. A blank term matches nothing.
    #[must_use]
    pub fn search_resources(&self, term: &str) -> Vec<ResourceMatch> {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return Vec::new();
        }

        let mut matches: Vec<ResourceMatch> = self
            .resources()
            .filter_map(|resource| {
                score(resource, &term).map(|score| ResourceMatch {
                    resource_type: resource.resource_type.clone(),
                    display_name: resource.display_name.clone(),
                    toolset: resource.toolset.clone(),
                    description: resource.description.clone(),
                    score,
                })
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.resource_type.cmp(&b.resource_type))
        });
        matches
    }
}

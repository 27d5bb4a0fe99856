//! Declarative resource and toolset definitions.
//!
//! These types are plain data deserialized from the toolset tables. Strategy
//! fields ([`BodyBuilder`], [`ResponseExtractor`]) are closed enums, so a
//! definition can be validated once at load time.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{body::BodyBuilder, client::HttpMethod, extract::ResponseExtractor};

/// Identifier hierarchy a resource lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Requires `orgIdentifier` and `projectIdentifier`.
    Project,
    /// Requires `orgIdentifier`.
    Org,
    Account,
}

impl Scope {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Org => "org",
            Self::Account => "account",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The canonical CRUD verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    List,
    Get,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub const ALL: [Self; 5] = [
        Self::List,
        Self::Get,
        Self::Create,
        Self::Update,
        Self::Delete,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Get => "get",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown operation \"{0}\"; expected one of list, get, create, update, delete")]
pub struct ParseOperationError(pub String);

impl FromStr for Operation {
    type Err = ParseOperationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseOperationError(s.to_string()))
    }
}

/// Value type hint for a body field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Object,
    Array,
    Yaml,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyFieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: String,
    /// Nested fields of an object.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<BodyFieldSpec>,
    /// Element description of an array.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,
}

/// Advisory description of a request body; used for pre-flight checks of
/// required fields and for self-description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodySchema {
    pub description: String,
    pub fields: Vec<BodyFieldSpec>,
}

impl BodySchema {
    /// Names of required fields, in declaration order.
    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|field| field.required)
            .map(|field| field.name.as_str())
    }
}

/// How one operation or action maps onto an HTTP call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointSpec {
    pub method: HttpMethod,
    /// Path template with `{placeholder}` tokens.
    pub path: String,
    /// Input field -> path placeholder. Every entry is required.
    #[serde(default)]
    pub path_params: BTreeMap<String, String>,
    /// Input field -> query key. Absent or empty inputs are omitted.
    #[serde(default)]
    pub query_params: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Option<BodyBuilder>,
    #[serde(default)]
    pub extractor: Option<ResponseExtractor>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub body_schema: Option<BodySchema>,
    #[serde(default)]
    pub streaming: bool,
}

/// A family of platform entities and its endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDefinition {
    pub resource_type: String,
    pub display_name: String,
    pub description: String,
    /// Owning toolset; filled in when the toolset is loaded.
    #[serde(default)]
    pub toolset: String,
    pub scope: Scope,
    /// Input fields that identify an instance, most general first.
    #[serde(default)]
    pub identifier_fields: Vec<String>,
    #[serde(default)]
    pub list_filter_fields: Vec<String>,
    /// UI path template for deep links.
    #[serde(default)]
    pub deep_link: Option<String>,
    #[serde(default)]
    pub operations: BTreeMap<Operation, EndpointSpec>,
    #[serde(default)]
    pub execute_actions: BTreeMap<String, EndpointSpec>,
}

impl ResourceDefinition {
    /// Supported operations in canonical order.
    #[must_use]
    pub fn supported_operations(&self) -> Vec<Operation> {
        self.operations.keys().copied().collect()
    }

    #[must_use]
    pub fn action_names(&self) -> Vec<String> {
        self.execute_actions.keys().cloned().collect()
    }

    /// Every endpoint of the resource, CRUD operations first.
    pub fn endpoints(&self) -> impl Iterator<Item = &EndpointSpec> {
        self.operations.values().chain(self.execute_actions.values())
    }

    /// The path placeholder an identifier field fills, or the field name
    /// itself when no endpoint maps it.
    #[must_use]
    pub fn placeholder_for<'a>(&'a self, field: &'a str) -> &'a str {
        self.endpoints()
            .find_map(|spec| spec.path_params.get(field))
            .map_or(field, String::as_str)
    }
}

/// A named group of resources enabled or disabled together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolsetDefinition {
    pub name: String,
    pub display_name: String,
    pub description: String,
    #[serde(default)]
    pub resources: Vec<ResourceDefinition>,
}

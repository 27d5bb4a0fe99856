//! Request body construction.
//!
//! A [`BodyBuilder`] is a named strategy selected per endpoint in the toolset
//! tables; it turns loose caller input into the JSON payload the platform
//! expects. Builders return `None` when there is nothing to send.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Input;

/// Strategy for building a request body from caller input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BodyBuilder {
    /// Pass one input field through unchanged.
    Input {
        #[serde(default = "default_body_field")]
        field: String,
        /// Sent when the field is absent.
        #[serde(default)]
        default: Option<Value>,
    },

    /// Always send `{}`.
    Empty,

    /// Assemble an object from individual input fields.
    Object { fields: Vec<FieldMapping> },

    /// Take an entity from an input field and clean it up; see
    /// [`NormalizeOptions`].
    Normalized(NormalizeOptions),

    /// A GraphQL envelope `{query, operationName, variables}`.
    #[serde(rename = "graphql")]
    GraphQl {
        query: String,
        operation_name: String,
        #[serde(default)]
        variables: Vec<FieldMapping>,
    },
}

/// One output key of an [`BodyBuilder::Object`] or GraphQL variables object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Key in the produced object.
    pub to: String,
    /// Input field to read. Defaults to `to`.
    #[serde(default)]
    pub from: Option<String>,
    /// Used when the input field is absent or null.
    #[serde(default)]
    pub default: Option<Value>,
    /// Wrap the value in a single-element array.
    #[serde(default)]
    pub wrap_array: bool,
}

/// Unwrap, inject, then strip nulls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizeOptions {
    #[serde(default = "default_body_field")]
    pub field: String,
    /// Wrapper key to unwrap when the caller sent `{key: {...}}`.
    #[serde(default)]
    pub unwrap_key: Option<String>,
    #[serde(default)]
    pub inject_identifier: Option<IdentifierInjection>,
    #[serde(default)]
    pub inject_fields: Vec<FieldInjection>,
}

/// Copies an input field into the body when the body lacks it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierInjection {
    pub input_field: String,
    pub body_field: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInjection {
    pub from: String,
    pub to: String,
    /// Leave an existing body value alone.
    #[serde(default)]
    pub only_if_missing: bool,
}

fn default_body_field() -> String {
    "body".to_string()
}

impl BodyBuilder {
    /// Builds the body for `input`, or `None` if nothing should be sent.
    #[must_use]
    pub fn build(&self, input: &Input) -> Option<Value> {
        match self {
            Self::Input { field, default } => {
                present(input, field).cloned().or_else(|| default.clone())
            }
            Self::Empty => Some(Value::Object(Map::new())),
            Self::Object { fields } => Some(Value::Object(map_fields(fields, input))),
            Self::Normalized(options) => options.apply(input),
            Self::GraphQl {
                query,
                operation_name,
                variables,
            } => {
                let mut envelope = Map::new();
                envelope.insert("query".to_string(), Value::String(query.clone()));
                envelope.insert(
                    "operationName".to_string(),
                    Value::String(operation_name.clone()),
                );
                envelope.insert(
                    "variables".to_string(),
                    Value::Object(map_fields(variables, input)),
                );
                Some(Value::Object(envelope))
            }
        }
    }
}

impl NormalizeOptions {
    /// Reads the entity from `input[field]`, unwraps it, injects identifier
    /// and derived fields, and strips nulls.
    #[must_use]
    pub fn apply(&self, input: &Input) -> Option<Value> {
        let raw = present(input, &self.field)?.clone();
        let mut body = match &self.unwrap_key {
            Some(key) => unwrap_body(raw, key),
            None => raw,
        };

        if let Value::Object(record) = &mut body {
            if let Some(injection) = &self.inject_identifier {
                let missing = record.get(&injection.body_field).is_none_or(Value::is_null);
                if missing && let Some(value) = truthy(input, &injection.input_field) {
                    record.insert(injection.body_field.clone(), value.clone());
                }
            }

            for injection in &self.inject_fields {
                if injection.only_if_missing
                    && record.get(&injection.to).is_some_and(|v| !v.is_null())
                {
                    continue;
                }
                if let Some(value) = present(input, &injection.from) {
                    record.insert(injection.to.clone(), value.clone());
                }
            }
        }

        Some(strip_nulls(body))
    }
}

/// Recursively drops null object values and null array elements.
///
/// A top-level null stays null.
#[must_use]
pub fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, strip_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .filter(|v| !v.is_null())
                .map(strip_nulls)
                .collect(),
        ),
        other => other,
    }
}

/// Returns `body[key]` when `body` is an object holding a non-null `key`,
/// otherwise `body` unchanged.
#[must_use]
pub fn unwrap_body(body: Value, key: &str) -> Value {
    match body {
        Value::Object(mut map) if map.get(key).is_some_and(|inner| !inner.is_null()) => {
            map.remove(key).unwrap_or_default()
        }
        other => other,
    }
}

fn map_fields(fields: &[FieldMapping], input: &Input) -> Map<String, Value> {
    fields
        .iter()
        .filter_map(|mapping| {
            let source = mapping.from.as_deref().unwrap_or(&mapping.to);
            let value = present(input, source)
                .cloned()
                .or_else(|| mapping.default.clone())?;
            let value = if mapping.wrap_array {
                Value::Array(vec![value])
            } else {
                value
            };
            Some((mapping.to.clone(), value))
        })
        .collect()
}

/// The input value for `key`, treating null as absent.
fn present<'a>(input: &'a Input, key: &str) -> Option<&'a Value> {
    input.get(key).filter(|v| !v.is_null())
}

/// The input value for `key` if it is neither null, false, zero nor empty.
fn truthy<'a>(input: &'a Input, key: &str) -> Option<&'a Value> {
    present(input, key).filter(|value| match value {
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f.abs() > 0.0),
        _ => true,
    })
}

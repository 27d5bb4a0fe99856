//! Response envelope normalization.
//!
//! Each endpoint names the one extractor that matches the envelope it
//! returns; nothing here guesses at shapes.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Strategy for turning a raw response into the canonical result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponseExtractor {
    /// Return the payload unchanged.
    #[default]
    Passthrough,
    /// Unwrap `{data: ...}`.
    Data,
    /// Unwrap `{data: {content, totalElements}}` into `{items, total}`.
    Page,
    /// Unwrap `{data: {<field>: ...}}` from a GraphQL response.
    #[serde(rename = "graphql")]
    GraphQl { field: String },
}

impl ResponseExtractor {
    #[must_use]
    pub fn extract(&self, raw: Value) -> Value {
        match self {
            Self::Passthrough => raw,
            Self::Data => data(raw),
            Self::Page => page(&raw),
            Self::GraphQl { field } => graphql_field(raw, field),
        }
    }
}

/// `raw.data`, or `raw` itself when there is no non-null `data`.
#[must_use]
pub fn data(raw: Value) -> Value {
    match raw {
        Value::Object(mut map) if map.get("data").is_some_and(|d| !d.is_null()) => {
            map.remove("data").unwrap_or_default()
        }
        other => other,
    }
}

/// `{items: data.content, total: data.totalElements}` with `[]` and `0` for
/// missing parts.
#[must_use]
pub fn page(raw: &Value) -> Value {
    let data = raw.get("data");
    let items = data
        .and_then(|d| d.get("content"))
        .filter(|content| content.is_array())
        .cloned()
        .unwrap_or_else(|| Value::Array(Vec::new()));
    let total = data
        .and_then(|d| d.get("totalElements"))
        .and_then(Value::as_u64)
        .unwrap_or(0);
    json!({ "items": items, "total": total })
}

/// `raw.data[field]`, or `raw` when the field is absent or null.
#[must_use]
pub fn graphql_field(raw: Value, field: &str) -> Value {
    match raw.get("data").and_then(|d| d.get(field)) {
        Some(value) if !value.is_null() => value.clone(),
        _ => raw,
    }
}

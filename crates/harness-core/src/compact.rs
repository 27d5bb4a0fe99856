//! Slimming of list items for summary output.

use serde_json::{Map, Value};

use crate::deep_link::DEEP_LINK_KEY;

const KEPT_FIELDS: &[&str] = &[
    // identity
    "identifier",
    "name",
    "displayName",
    "description",
    "slug",
    // status
    "status",
    "state",
    "enabled",
    "health",
    // type
    "type",
    "kind",
    "category",
    "module",
    // ownership
    "tags",
    "labels",
    "owner",
    DEEP_LINK_KEY,
];

const TIMESTAMP_SUFFIXES: &[&str] = &["At", "Ts", "Time", "Date"];
const IDENTIFIER_SUFFIXES: &[&str] = &["Identifier", "Id", "_id"];

fn is_kept(key: &str) -> bool {
    KEPT_FIELDS.contains(&key)
        || TIMESTAMP_SUFFIXES
            .iter()
            .chain(IDENTIFIER_SUFFIXES)
            .any(|suffix| key.ends_with(suffix))
}

/// Keeps only the identity, status, type, ownership, timestamp-like,
/// identifier-like and deep-link keys of each object item.
///
/// Non-object items pass through untouched.
#[must_use]
pub fn compact_items(items: Vec<Value>) -> Vec<Value> {
    items
        .into_iter()
        .map(|item| match item {
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .filter(|(key, _)| is_kept(key))
                    .collect::<Map<String, Value>>(),
            ),
            other => other,
        })
        .collect()
}

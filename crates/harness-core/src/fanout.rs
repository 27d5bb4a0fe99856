//! Fan-out search across resource types.
//!
//! One logical search issues a `list` per resource type in fixed-size
//! batches. A failing type never fails the search: its error lands in
//! [`SearchReport::errors`] and the remaining results are still returned.

use std::collections::BTreeMap;

use futures::future::join_all;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::{
    Input,
    client::Transport,
    compact::compact_items,
    deep_link::DEEP_LINK_KEY,
    error::ApiError,
    registry::{Operation, Registry},
};

pub const DEFAULT_MAX_PER_TYPE: u32 = 5;
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Input fields the query is copied into; each resource reads whichever its
/// list endpoint maps.
const QUERY_FIELDS: &[&str] = &["search_term", "name", "query", "search"];

/// Tuning for one [`search`] call.
///
/// # Fields
///
/// - `resource_types`: Which types to query
/// - `max_per_type`: Page size requested from each type
/// - `batch_size`: Upper bound on concurrent list calls
/// - `compact`: Whether listed items are compacted
/// - `org_id` / `project_id`: Scope overrides for every list call
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Types to search; empty means every type that supports `list`.
    pub resource_types: Vec<String>,
    /// Items requested per type, sent as both `size` and `limit`.
    pub max_per_type: u32,
    /// Number of list calls in flight at once.
    ///
    /// Types are queried in consecutive batches of this size; the next
    /// batch starts only after every call of the previous one finished. Zero
    /// is treated as one.
    pub batch_size: usize,
    /// Strip verbose metadata from items (see [`compact_items`]).
    pub compact: bool,
    /// Organization scope; the configured default applies when `None`.
    pub org_id: Option<String>,
    /// Project scope; the configured default applies when `None`.
    pub project_id: Option<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            resource_types: Vec::new(),
            max_per_type: DEFAULT_MAX_PER_TYPE,
            batch_size: DEFAULT_BATCH_SIZE,
            compact: true,
            org_id: None,
            project_id: None,
        }
    }
}

/// Matches from one resource type.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub resource_type: String,
    /// Relevance tier, lower first (see [`relevance_tier`]).
    pub tier: u8,
    /// Number of items returned for this type.
    pub match_count: usize,
    pub items: Vec<Value>,
    /// Total matches the platform reported, which can exceed `match_count`.
    pub total: u64,
    /// Link to the resource type's listing page, when one could be built.
    #[serde(rename = "_deepLink", skip_serializing_if = "Option::is_none")]
    pub deep_link: Option<String>,
}

/// Outcome of a fan-out search.
///
/// A search never fails as a whole; per-type failures are reported in
/// `errors` alongside the hits of the types that answered.
#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    pub query: String,
    /// Sum of `match_count` over `results`.
    pub total_matches: usize,
    /// Number of resource types queried, including failed ones.
    pub searched_types: usize,
    /// Non-empty hits ordered by tier, then by match count descending.
    pub results: Vec<SearchHit>,
    /// Resource type -> error message.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, String>,
    /// Failed types whose error suggests the module is not enabled on the
    /// account, as opposed to a broken request.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unavailable: Vec<String>,
}

/// Relevance tier of a resource type: core delivery types first, then common
/// supporting types, then everything else.
#[must_use]
pub fn relevance_tier(resource_type: &str) -> u8 {
    match resource_type {
        "pipeline" | "service" | "environment" | "connector" | "execution" => 1,
        "template" | "trigger" | "input_set" | "secret" | "feature_flag" | "repository"
        | "infrastructure" => 2,
        _ => 3,
    }
}

fn search_input(query: &str, options: &SearchOptions) -> Input {
    let mut input = Input::new();
    for field in QUERY_FIELDS {
        input.insert((*field).to_string(), json!(query));
    }
    input.insert("size".to_string(), json!(options.max_per_type));
    input.insert("limit".to_string(), json!(options.max_per_type));
    input.insert("page".to_string(), json!(0));
    if let Some(org_id) = &options.org_id {
        input.insert("org_id".to_string(), json!(org_id));
    }
    if let Some(project_id) = &options.project_id {
        input.insert("project_id".to_string(), json!(project_id));
    }
    input
}

fn into_hit(resource_type: String, result: Value, compact: bool) -> Option<SearchHit> {
    let Value::Object(mut object) = result else {
        return None;
    };
    let Some(Value::Array(items)) = object.remove("items") else {
        return None;
    };
    if items.is_empty() {
        return None;
    }

    let match_count = items.len();
    let total = object
        .get("total")
        .and_then(Value::as_u64)
        .unwrap_or_else(|| u64::try_from(match_count).unwrap_or(u64::MAX));
    let deep_link = object
        .get(DEEP_LINK_KEY)
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(SearchHit {
        tier: relevance_tier(&resource_type),
        resource_type,
        match_count,
        items: if compact { compact_items(items) } else { items },
        total,
        deep_link,
    })
}

/// Runs `query` against every requested resource type.
pub async fn search<T>(
    registry: &Registry,
    client: &T,
    query: &str,
    options: &SearchOptions,
) -> SearchReport
where
    T: Transport + ?Sized,
{
    let targets: Vec<String> = if options.resource_types.is_empty() {
        registry
            .resource_types()
            .into_iter()
            .filter(|rt| registry.supports_operation(rt, Operation::List))
            .collect()
    } else {
        options.resource_types.clone()
    };

    let input = &search_input(query, options);
    let mut results = Vec::new();
    let mut errors = BTreeMap::new();
    let mut unavailable = Vec::new();

    for batch in targets.chunks(options.batch_size.max(1)) {
        let outcomes = join_all(batch.iter().map(|resource_type| async move {
            let outcome = registry
                .dispatch(client, resource_type, Operation::List, input)
                .await;
            (resource_type.clone(), outcome)
        }))
        .await;

        for (resource_type, outcome) in outcomes {
            match outcome {
                Ok(result) => {
                    results.extend(into_hit(resource_type, result, options.compact));
                }
                Err(err) => {
                    debug!(resource_type = %resource_type, error = %err, "search failed");
                    if err.as_api().is_some_and(ApiError::looks_unavailable) {
                        unavailable.push(resource_type.clone());
                    }
                    errors.insert(resource_type, err.to_string());
                }
            }
        }
    }

    results.sort_by(|a, b| {
        a.tier
            .cmp(&b.tier)
            .then_with(|| b.match_count.cmp(&a.match_count))
    });

    SearchReport {
        query: query.to_string(),
        total_matches: results.iter().map(|hit| hit.match_count).sum(),
        searched_types: targets.len(),
        results,
        errors,
        unavailable,
    }
}

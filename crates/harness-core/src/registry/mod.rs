//! Resource registry and dispatch engine.
//!
//! The [`Registry`] holds the enabled [`ResourceDefinition`]s and turns an
//! abstract `(resource_type, operation, input)` tuple into one request:
//!
//! 1. Path placeholders are filled from required input fields.
//! 2. Scope identifiers (`orgIdentifier`, `projectIdentifier`) are added
//!    from input or configured defaults.
//! 3. Optional query parameters are copied from non-empty input fields.
//! 4. The body is built and checked against the endpoint's body schema.
//! 5. The request goes through a [`Transport`] and the response is
//!    normalized by the endpoint's extractor.
//! 6. When the resource has a deep-link template, links are attached to the
//!    result and to each listed item. Link failures never fail the dispatch.
//!
//! Definitions are immutable after construction; duplicate resource types
//! across toolsets are rejected at load time.

mod builtin;
mod describe;
mod types;

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

pub use self::{
    builtin::{builtin_toolset_names, builtin_toolsets, parse_toolset},
    describe::{
        ActionDescription, Description, OperationDescription, ResourceDescription,
        ResourceMatch, Summary, SummaryEntry, ToolsetDescription,
    },
    types::{
        BodyFieldSpec, BodySchema, EndpointSpec, FieldType, Operation, ParseOperationError,
        ResourceDefinition, Scope, ToolsetDefinition,
    },
};
use crate::{
    Input,
    client::{RequestOptions, Transport, paginate},
    config::Config,
    deep_link::{DEEP_LINK_KEY, build_deep_link, template_tokens},
    error::DispatchError,
};

/// Problems found while loading toolset tables.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RegistryError {
    #[error("duplicate resource type \"{resource_type}\" in toolsets \"{first}\" and \"{second}\"")]
    DuplicateResourceType {
        resource_type: String,
        first: String,
        second: String,
    },

    #[error("invalid toolset table \"{toolset}\": {reason}")]
    InvalidToolset { toolset: String, reason: String },
}

/// Account-level values dispatch fills in when the caller does not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchDefaults {
    /// Origin used for deep links.
    pub base_url: String,
    pub account_id: String,
    pub default_org_id: String,
    pub default_project_id: Option<String>,
}

impl From<&Config> for DispatchDefaults {
    fn from(config: &Config) -> Self {
        Self {
            base_url: config.base_url.clone(),
            account_id: config.account_id.clone(),
            default_org_id: config.default_org_id.clone(),
            default_project_id: config.default_project_id.clone(),
        }
    }
}

/// Immutable lookup of enabled resources.
#[derive(Debug)]
pub struct Registry {
    toolsets: Vec<ToolsetDefinition>,
    /// resource type -> (toolset index, resource index)
    index: HashMap<String, (usize, usize)>,
    defaults: DispatchDefaults,
}

impl Registry {
    /// Loads the builtin toolsets enabled by `config.toolsets`.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistryError`] if a builtin table is malformed or two
    /// enabled toolsets define the same resource type.
    pub fn new(config: &Config) -> Result<Self, RegistryError> {
        let mut toolsets = builtin_toolsets()?;

        if let Some(enabled) = &config.toolsets {
            for name in enabled {
                if !toolsets.iter().any(|t| t.name == *name) {
                    warn!(toolset = %name, "ignoring unknown toolset");
                }
            }
            toolsets.retain(|t| enabled.contains(&t.name));
        }

        Self::from_toolsets(toolsets, DispatchDefaults::from(config))
    }

    /// Builds a registry from explicit toolsets.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateResourceType`] if a resource type is
    /// defined more than once.
    pub fn from_toolsets(
        toolsets: Vec<ToolsetDefinition>,
        defaults: DispatchDefaults,
    ) -> Result<Self, RegistryError> {
        let mut index = HashMap::new();

        for (toolset_idx, toolset) in toolsets.iter().enumerate() {
            for (resource_idx, resource) in toolset.resources.iter().enumerate() {
                if let Some(&(first_idx, _)) = index.get(&resource.resource_type) {
                    let first: &ToolsetDefinition = &toolsets[first_idx];
                    return Err(RegistryError::DuplicateResourceType {
                        resource_type: resource.resource_type.clone(),
                        first: first.name.clone(),
                        second: toolset.name.clone(),
                    });
                }
                index.insert(resource.resource_type.clone(), (toolset_idx, resource_idx));
            }
        }

        info!(
            resource_types = index.len(),
            toolsets = toolsets.len(),
            "registry loaded"
        );

        Ok(Self {
            toolsets,
            index,
            defaults,
        })
    }

    /// Number of enabled resource types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[must_use]
    pub fn defaults(&self) -> &DispatchDefaults {
        &self.defaults
    }

    /// Enabled toolsets in load order.
    #[must_use]
    pub fn toolsets(&self) -> &[ToolsetDefinition] {
        &self.toolsets
    }

    /// Every enabled resource, in toolset order.
    pub fn resources(&self) -> impl Iterator<Item = &ResourceDefinition> {
        self.toolsets.iter().flat_map(|t| t.resources.iter())
    }

    /// Enabled resource types, sorted.
    #[must_use]
    pub fn resource_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.index.keys().cloned().collect();
        types.sort();
        types
    }

    /// Looks up a resource definition.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::UnknownResource`] listing every enabled type.
    pub fn get_resource(&self, resource_type: &str) -> Result<&ResourceDefinition, DispatchError> {
        self.lookup(resource_type)
            .ok_or_else(|| DispatchError::UnknownResource {
                resource_type: resource_type.to_string(),
                available: self.resource_types(),
            })
    }

    fn lookup(&self, resource_type: &str) -> Option<&ResourceDefinition> {
        let &(toolset_idx, resource_idx) = self.index.get(resource_type)?;
        self.toolsets
            .get(toolset_idx)
            .and_then(|t| t.resources.get(resource_idx))
    }

    #[must_use]
    pub fn supports_operation(&self, resource_type: &str, operation: Operation) -> bool {
        self.lookup(resource_type)
            .is_some_and(|r| r.operations.contains_key(&operation))
    }

    /// Execute actions of a resource, or `None` for an unknown type.
    #[must_use]
    pub fn execute_actions(&self, resource_type: &str) -> Option<&BTreeMap<String, EndpointSpec>> {
        self.lookup(resource_type).map(|r| &r.execute_actions)
    }

    /// Runs a CRUD operation.
    ///
    /// # Errors
    ///
    /// Returns a caller error ([`DispatchError::UnknownResource`],
    /// [`DispatchError::UnsupportedOperation`],
    /// [`DispatchError::MissingRequiredField`],
    /// [`DispatchError::MissingBodyFields`]) before any request is sent, or
    /// [`DispatchError::Transport`] if the request fails.
    pub async fn dispatch<T>(
        &self,
        client: &T,
        resource_type: &str,
        operation: Operation,
        input: &Input,
    ) -> Result<Value, DispatchError>
    where
        T: Transport + ?Sized,
    {
        let (resource, spec) = self.operation_spec(resource_type, operation)?;
        self.execute_spec(client, resource, spec, input).await
    }

    /// Runs `list` page by page until `max_items` items are collected, then
    /// attaches deep links the way [`Registry::dispatch`] does.
    ///
    /// The result is `{items, total}`; the endpoint's extractor is replaced
    /// by page normalization.
    ///
    /// # Errors
    ///
    /// Same as [`Registry::dispatch`]; the first failed page aborts.
    pub async fn dispatch_all_pages<T>(
        &self,
        client: &T,
        resource_type: &str,
        input: &Input,
        max_items: usize,
        page_size: usize,
    ) -> Result<Value, DispatchError>
    where
        T: Transport + ?Sized,
    {
        let (resource, spec) = self.operation_spec(resource_type, Operation::List)?;
        let request = self.build_request(resource, spec, input)?;
        let scope = scope_params(&request);

        let page = paginate(client, &request, max_items, page_size).await?;
        let mut result = json!({"items": page.items, "total": page.total});

        if let Some(template) = &resource.deep_link {
            self.attach_deep_links(resource, template, scope, input, &mut result);
        }

        Ok(result)
    }

    fn operation_spec(
        &self,
        resource_type: &str,
        operation: Operation,
    ) -> Result<(&ResourceDefinition, &EndpointSpec), DispatchError> {
        let resource = self.get_resource(resource_type)?;
        let spec = resource.operations.get(&operation).ok_or_else(|| {
            DispatchError::UnsupportedOperation {
                resource_type: resource_type.to_string(),
                operation: operation.to_string(),
                supported: resource
                    .supported_operations()
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
            }
        })?;
        Ok((resource, spec))
    }

    /// Runs a named execute action.
    ///
    /// # Errors
    ///
    /// Same as [`Registry::dispatch`], with
    /// [`DispatchError::UnknownAction`] in place of `UnsupportedOperation`.
    pub async fn dispatch_execute<T>(
        &self,
        client: &T,
        resource_type: &str,
        action: &str,
        input: &Input,
    ) -> Result<Value, DispatchError>
    where
        T: Transport + ?Sized,
    {
        let resource = self.get_resource(resource_type)?;
        let spec = resource
            .execute_actions
            .get(action)
            .ok_or_else(|| DispatchError::UnknownAction {
                resource_type: resource_type.to_string(),
                action: action.to_string(),
                available: resource.action_names(),
            })?;

        self.execute_spec(client, resource, spec, input).await
    }

    async fn execute_spec<T>(
        &self,
        client: &T,
        resource: &ResourceDefinition,
        spec: &EndpointSpec,
        input: &Input,
    ) -> Result<Value, DispatchError>
    where
        T: Transport + ?Sized,
    {
        let request = self.build_request(resource, spec, input)?;
        let scope = scope_params(&request);

        debug!(
            resource_type = %resource.resource_type,
            method = %request.method,
            path = %request.path,
            "dispatching"
        );
        let raw = client.request(request).await?;

        let mut result = match &spec.extractor {
            Some(extractor) => extractor.extract(raw),
            None => raw,
        };

        if let Some(template) = &resource.deep_link {
            self.attach_deep_links(resource, template, scope, input, &mut result);
        }

        Ok(result)
    }

    /// Resolves `spec` against `input` without sending anything.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::MissingRequiredField`] for an absent path
    /// parameter or [`DispatchError::MissingBodyFields`] when the body lacks
    /// schema-required fields.
    pub fn build_request(
        &self,
        resource: &ResourceDefinition,
        spec: &EndpointSpec,
        input: &Input,
    ) -> Result<RequestOptions, DispatchError> {
        let mut path = spec.path.clone();
        for (field, placeholder) in &spec.path_params {
            let value = input_string(input, field).ok_or_else(|| {
                DispatchError::MissingRequiredField {
                    field: field.clone(),
                    placeholder: placeholder.clone(),
                }
            })?;
            path = path.replace(&format!("{{{placeholder}}}"), &urlencoding::encode(&value));
        }

        let mut request = RequestOptions::new(spec.method, path).streaming(spec.streaming);

        if matches!(resource.scope, Scope::Org | Scope::Project) {
            let org = input_string(input, "org_id")
                .unwrap_or_else(|| self.defaults.default_org_id.clone());
            request.params.insert("orgIdentifier".to_string(), org);
        }
        if resource.scope == Scope::Project {
            let project = input_string(input, "project_id")
                .or_else(|| self.defaults.default_project_id.clone());
            if let Some(project) = project {
                request.params.insert("projectIdentifier".to_string(), project);
            }
        }

        for (field, query_key) in &spec.query_params {
            if let Some(value) = input_string(input, field) {
                request.params.insert(query_key.clone(), value);
            }
        }

        request.body = spec.body.as_ref().and_then(|builder| builder.build(input));

        if let (Some(schema), Some(Value::Object(body))) = (&spec.body_schema, &request.body) {
            let missing: Vec<String> = schema
                .required_fields()
                .filter(|name| body.get(*name).is_none_or(Value::is_null))
                .map(str::to_string)
                .collect();
            if !missing.is_empty() {
                return Err(DispatchError::MissingBodyFields { fields: missing });
            }
        }

        Ok(request)
    }

    fn attach_deep_links(
        &self,
        resource: &ResourceDefinition,
        template: &str,
        mut params: BTreeMap<String, String>,
        input: &Input,
        result: &mut Value,
    ) {
        for field in &resource.identifier_fields {
            if let Some(value) = input_string(input, field) {
                params.insert(resource.placeholder_for(field).to_string(), value.clone());
                params.insert(field.clone(), value);
            }
        }

        let Value::Object(object) = result else {
            return;
        };

        if let Some(link) = self.try_link(template, &params) {
            object.insert(DEEP_LINK_KEY.to_string(), Value::String(link));
        }

        let Some(Value::Array(items)) = object.get_mut("items") else {
            return;
        };

        let tokens = template_tokens(template);
        let primary = resource
            .identifier_fields
            .last()
            .map(|field| resource.placeholder_for(field));

        for item in items {
            let Value::Object(record) = item else {
                continue;
            };

            let mut item_params = params.clone();
            if let (Some(primary), Some(id)) = (primary, record.get("identifier").and_then(scalar)) {
                item_params.insert(primary.to_string(), id);
            }
            for token in &tokens {
                if let Some(value) = record.get(*token).and_then(scalar) {
                    item_params.insert((*token).to_string(), value);
                }
            }

            if let Some(link) = self.try_link(template, &item_params) {
                record.insert(DEEP_LINK_KEY.to_string(), Value::String(link));
            }
        }
    }

    fn try_link(&self, template: &str, params: &BTreeMap<String, String>) -> Option<String> {
        match build_deep_link(
            &self.defaults.base_url,
            &self.defaults.account_id,
            template,
            params,
        ) {
            Ok(link) => Some(link),
            Err(err) => {
                debug!(error = %err, "skipping deep link");
                None
            }
        }
    }
}

fn scope_params(request: &RequestOptions) -> BTreeMap<String, String> {
    request
        .params
        .iter()
        .filter(|(key, _)| matches!(key.as_str(), "orgIdentifier" | "projectIdentifier"))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Non-empty scalar input coerced to a string.
fn input_string(input: &Input, field: &str) -> Option<String> {
    input.get(field).and_then(scalar)
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Builds an [`Input`] from a JSON value; non-objects yield an empty input.
#[must_use]
pub fn input_from_value(value: Value) -> Input {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_json, method, path, query_param},
    };

    use super::*;
    use crate::{
        client::HarnessClient,
        error::ApiError,
        testing::{RecordingTransport, test_config},
    };

    fn registry() -> Registry {
        Registry::new(&test_config("https://app.harness.io")).unwrap()
    }

    fn input(value: Value) -> Input {
        input_from_value(value)
    }

    #[test]
    fn test_loads_all_builtin_toolsets() {
        let registry = registry();
        assert_eq!(registry.toolsets().len(), builtin_toolset_names().len());
        assert!(registry.resource_types().contains(&"pipeline".to_string()));
        assert!(registry.supports_operation("pipeline", Operation::List));
        assert!(!registry.supports_operation("pipeline_summary", Operation::Delete));
        assert!(!registry.supports_operation("nonexistent", Operation::Get));
        assert!(registry.execute_actions("pipeline").unwrap().contains_key("run"));
    }

    #[test]
    fn test_toolset_filter_limits_resources() {
        let mut config = test_config("https://app.harness.io");
        config.toolsets = Some(vec!["services".to_string(), "bogus".to_string()]);
        let registry = Registry::new(&config).unwrap();

        assert_eq!(registry.resource_types(), vec!["service".to_string()]);
    }

    #[test]
    fn test_duplicate_resource_type_rejected() {
        let first = parse_toolset(
            "a",
            r#"
name = "alpha"
display_name = "Alpha"
description = "first"

[[resources]]
resource_type = "widget"
display_name = "Widget"
description = "w"
scope = "account"
"#,
        )
        .unwrap();
        let mut second = first.clone();
        second.name = "beta".to_string();

        let err = Registry::from_toolsets(
            vec![first, second],
            DispatchDefaults::from(&test_config("https://app.harness.io")),
        )
        .unwrap_err();

        assert_eq!(
            err.to_string(),
            "duplicate resource type \"widget\" in toolsets \"alpha\" and \"beta\""
        );
    }

    #[tokio::test]
    async fn test_unknown_resource_lists_available_types() {
        let transport = RecordingTransport::new();
        let err = registry()
            .dispatch(&transport, "nonexistent", Operation::List, &Input::new())
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.starts_with("Unknown resource_type \"nonexistent\". Available: "));
        assert!(message.contains("pipeline"));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_operation_lists_supported() {
        let transport = RecordingTransport::new();
        let err = registry()
            .dispatch(&transport, "pipeline_summary", Operation::Delete, &Input::new())
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Resource \"pipeline_summary\" does not support \"delete\". Supported: get"
        );
    }

    #[tokio::test]
    async fn test_unknown_action_lists_available() {
        let transport = RecordingTransport::new();
        let err = registry()
            .dispatch_execute(&transport, "pipeline", "explode", &Input::new())
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Resource \"pipeline\" has no execute action \"explode\". Available: retry, run"
        );
    }

    #[tokio::test]
    async fn test_missing_path_param_names_field_and_placeholder() {
        let transport = RecordingTransport::new();
        let err = registry()
            .dispatch(&transport, "pipeline", Operation::Get, &Input::new())
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Missing required field \"pipeline_id\" for path parameter \"pipelineIdentifier\""
        );
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_empty_path_param_is_missing() {
        let transport = RecordingTransport::new();
        let err = registry()
            .dispatch(
                &transport,
                "service",
                Operation::Delete,
                &input(json!({"service_id": ""})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::MissingRequiredField { .. }));
    }

    #[test]
    fn test_every_path_param_resolves_when_supplied() {
        let registry = registry();
        for resource in registry.resources() {
            for spec in resource.endpoints() {
                let mut fields = Map::new();
                for field in spec.path_params.keys() {
                    fields.insert(field.clone(), json!("some id"));
                }
                fields.insert("body".to_string(), json!({"identifier": "x", "name": "x", "type": "x"}));
                fields.insert("prompt".to_string(), json!("hello"));

                let request = registry.build_request(resource, spec, &fields).unwrap();
                assert!(
                    template_tokens(&request.path).is_empty(),
                    "{} left tokens in {}",
                    resource.resource_type,
                    request.path
                );
                assert!(request.path.contains("some%20id") || spec.path_params.is_empty());
            }
        }
    }

    #[tokio::test]
    async fn test_list_injects_scope_and_filters() {
        let transport = RecordingTransport::with_response(json!({
            "data": {"content": [], "totalElements": 0}
        }));
        let result = registry()
            .dispatch(
                &transport,
                "pipeline",
                Operation::List,
                &input(json!({"project_id": "proj1", "search_term": "deploy", "module": ""})),
            )
            .await
            .unwrap();

        assert_eq!(result["items"], json!([]));
        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.path, "/pipeline/api/pipelines/list");
        assert_eq!(request.params["orgIdentifier"], "default");
        assert_eq!(request.params["projectIdentifier"], "proj1");
        assert_eq!(request.params["searchTerm"], "deploy");
        assert!(!request.params.contains_key("module"));
        assert_eq!(request.body, Some(json!({"filterType": "PipelineSetup"})));
    }

    #[tokio::test]
    async fn test_account_scope_sends_no_scope_identifiers() {
        let transport = RecordingTransport::with_response(json!({"data": []}));
        registry()
            .dispatch(&transport, "connector_catalogue", Operation::List, &Input::new())
            .await
            .unwrap();

        let request = &transport.requests()[0];
        assert!(!request.params.contains_key("orgIdentifier"));
        assert!(!request.params.contains_key("projectIdentifier"));
    }

    #[tokio::test]
    async fn test_numeric_inputs_are_coerced_to_query_strings() {
        let transport = RecordingTransport::with_response(json!({"data": {"content": []}}));
        registry()
            .dispatch(
                &transport,
                "service",
                Operation::List,
                &input(json!({"page": 2, "size": 10})),
            )
            .await
            .unwrap();

        let request = &transport.requests()[0];
        assert_eq!(request.params["page"], "2");
        assert_eq!(request.params["size"], "10");
    }

    #[tokio::test]
    async fn test_body_schema_reports_all_missing_fields() {
        let transport = RecordingTransport::new();
        let err = registry()
            .dispatch(
                &transport,
                "environment",
                Operation::Create,
                &input(json!({"body": {"description": "no names"}})),
            )
            .await
            .unwrap_err();

        match err {
            DispatchError::MissingBodyFields { fields } => {
                assert_eq!(fields, vec!["identifier", "name", "type"]);
            }
            other => panic!("unexpected error {other}"),
        }
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_body_schema_passes_with_injected_identifier() {
        let transport = RecordingTransport::with_response(json!({"data": {"identifier": "svc1"}}));
        let result = registry()
            .dispatch(
                &transport,
                "service",
                Operation::Create,
                &input(json!({
                    "service_id": "svc1",
                    "project_id": "proj1",
                    "body": {"service": {"name": "Service One", "tags": null}}
                })),
            )
            .await
            .unwrap();

        let request = &transport.requests()[0];
        assert_eq!(
            request.body,
            Some(json!({
                "identifier": "svc1",
                "name": "Service One",
                "projectIdentifier": "proj1"
            }))
        );
        assert_eq!(
            result["_deepLink"],
            "https://app.harness.io/ng/account/acct1/home/orgs/default/projects/proj1/services/svc1"
        );
    }

    #[tokio::test]
    async fn test_streaming_action_validates_prompt() {
        let transport = RecordingTransport::with_response(json!("answer"));
        let registry = registry();

        let err = registry
            .dispatch_execute(&transport, "devops_agent", "ask", &Input::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing required body fields: prompt");

        let result = registry
            .dispatch_execute(
                &transport,
                "devops_agent",
                "ask",
                &input(json!({"prompt": "why did my build fail?"})),
            )
            .await
            .unwrap();
        assert_eq!(result, json!("answer"));

        let request = &transport.requests()[0];
        assert!(request.streaming);
        assert_eq!(request.body, Some(json!({"prompt": "why did my build fail?"})));
    }

    #[tokio::test]
    async fn test_get_attaches_deep_link() {
        let transport = RecordingTransport::with_response(json!({"data": {"identifier": "p1"}}));
        let result = registry()
            .dispatch(
                &transport,
                "pipeline",
                Operation::Get,
                &input(json!({"pipeline_id": "p1", "project_id": "proj"})),
            )
            .await
            .unwrap();

        assert_eq!(
            result[DEEP_LINK_KEY],
            "https://app.harness.io/ng/account/acct1/home/orgs/default/projects/proj/pipelines/p1/pipeline-studio"
        );
    }

    #[tokio::test]
    async fn test_unresolvable_deep_link_is_skipped() {
        let transport = RecordingTransport::with_response(json!({"data": {"identifier": "p1"}}));
        let result = registry()
            .dispatch(
                &transport,
                "pipeline",
                Operation::Get,
                &input(json!({"pipeline_id": "p1"})),
            )
            .await
            .unwrap();

        assert_eq!(result, json!({"identifier": "p1"}));
    }

    #[tokio::test]
    async fn test_list_items_get_their_own_deep_links() {
        let transport = RecordingTransport::with_response(json!({
            "data": {
                "content": [
                    {"identifier": "alpha", "name": "Alpha"},
                    {"identifier": "beta", "orgIdentifier": "other", "name": "Beta"},
                    "not-an-object"
                ],
                "totalElements": 3
            }
        }));
        let result = registry()
            .dispatch(
                &transport,
                "pipeline",
                Operation::List,
                &input(json!({"project_id": "proj"})),
            )
            .await
            .unwrap();

        assert_eq!(result["total"], 3);
        assert!(result.get(DEEP_LINK_KEY).is_none());
        assert_eq!(
            result["items"][0][DEEP_LINK_KEY],
            "https://app.harness.io/ng/account/acct1/home/orgs/default/projects/proj/pipelines/alpha/pipeline-studio"
        );
        assert_eq!(
            result["items"][1][DEEP_LINK_KEY],
            "https://app.harness.io/ng/account/acct1/home/orgs/other/projects/proj/pipelines/beta/pipeline-studio"
        );
        assert_eq!(result["items"][2], "not-an-object");
    }

    #[tokio::test]
    async fn test_all_pages_attach_item_deep_links() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ng/api/environmentsV2"))
            .and(query_param("projectIdentifier", "proj"))
            .and(query_param("page", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"identifier": "dev"}, {"identifier": "qa"}]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ng/api/environmentsV2"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"identifier": "prod"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = test_config(&server.uri());
        let client = HarnessClient::new(&config).unwrap();
        let registry = Registry::new(&config).unwrap();

        let result = registry
            .dispatch_all_pages(
                &client,
                "environment",
                &input(json!({"project_id": "proj"})),
                10,
                2,
            )
            .await
            .unwrap();

        assert_eq!(result["total"], 3);
        assert_eq!(result["items"].as_array().map(Vec::len), Some(3));
        assert_eq!(
            result["items"][2][DEEP_LINK_KEY],
            format!(
                "{}/ng/account/acct1/home/orgs/default/projects/proj/environments/prod",
                server.uri()
            )
        );
    }

    #[tokio::test]
    async fn test_all_pages_rejects_types_without_list() {
        let transport = RecordingTransport::new();
        let err = registry()
            .dispatch_all_pages(&transport, "devops_agent", &Input::new(), 10, 5)
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::UnsupportedOperation { .. }));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_transport_errors_propagate() {
        let transport = RecordingTransport::with_error(ApiError::new("Forbidden", 403));
        let err = registry()
            .dispatch(&transport, "service", Operation::List, &Input::new())
            .await
            .unwrap_err();

        assert!(!err.is_caller_error());
        assert_eq!(err.as_api().map(|e| e.status), Some(403));
    }

    #[tokio::test]
    async fn test_graphql_dispatch_end_to_end() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ccm/api/graphql"))
            .and(query_param("accountIdentifier", "acct1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"budgetSummaryList": [{"id": "b1", "budgetAmount": 100}]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = test_config(&server.uri());
        let client = HarnessClient::new(&config).unwrap();
        let registry = Registry::new(&config).unwrap();

        let result = registry
            .dispatch(
                &client,
                "cost_budget",
                Operation::Get,
                &input(json!({"perspective_id": "persp1"})),
            )
            .await
            .unwrap();

        assert_eq!(result, json!([{"id": "b1", "budgetAmount": 100}]));
    }

    #[tokio::test]
    async fn test_pipeline_run_end_to_end() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/pipeline/api/pipeline/execute/my%20pipe"))
            .and(query_param("orgIdentifier", "default"))
            .and(query_param("projectIdentifier", "proj1"))
            .and(body_json(json!({})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "SUCCESS",
                "data": {"planExecution": {"uuid": "exec-1"}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = test_config(&server.uri());
        let client = HarnessClient::new(&config).unwrap();
        let registry = Registry::new(&config).unwrap();

        let result = registry
            .dispatch_execute(
                &client,
                "pipeline",
                "run",
                &input(json!({"pipeline_id": "my pipe", "project_id": "proj1"})),
            )
            .await
            .unwrap();

        assert_eq!(result["planExecution"]["uuid"], "exec-1");
        assert!(
            result[DEEP_LINK_KEY]
                .as_str()
                .unwrap()
                .ends_with("/pipelines/my%20pipe/pipeline-studio")
        );
    }
}

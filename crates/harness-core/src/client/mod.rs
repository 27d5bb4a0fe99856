//! Authenticated, rate-limited, retrying HTTP transport.
//!
//! [`HarnessClient`] turns a [`RequestOptions`] into exactly one logical
//! request:
//!
//! 1. One token is taken from the client's [`RateLimiter`] (per logical
//!    request, not per attempt).
//! 2. The URL is built from the base URL and path; `accountIdentifier` is
//!    always present in the query string.
//! 3. Attempts are retried on transient failures (see
//!    [`ApiError::is_retryable`]) following a [`BackoffPolicy`]. A timed-out
//!    attempt counts as a synthetic 408.
//!
//! Everything above the transport talks to it through the [`Transport`]
//! trait, so registry logic can be exercised without a network.

mod backoff;
mod pagination;
mod rate_limiter;

use std::{collections::BTreeMap, fmt, time::Duration};

use async_trait::async_trait;
use backon::Retryable;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

pub use self::{
    backoff::{BackoffPolicy, JitteredBackoff, delay_for},
    pagination::{DEFAULT_MAX_ITEMS, DEFAULT_PAGE_SIZE, Page, normalize_page, paginate},
    rate_limiter::RateLimiter,
};
use crate::{
    config::Config,
    error::{ApiError, TransportError},
};

/// HTTP verbs used by the platform API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Self::GET,
            HttpMethod::Post => Self::POST,
            HttpMethod::Put => Self::PUT,
            HttpMethod::Patch => Self::PATCH,
            HttpMethod::Delete => Self::DELETE,
        }
    }
}

/// One logical request.
///
/// Query parameters with empty values are dropped when the URL is built.
///
/// # Fields
///
/// - `method` / `path`: Target endpoint relative to the base URL
/// - `params`: Query string, before `accountIdentifier` is added
/// - `body`: JSON body, sent with `Content-Type: application/json`
/// - `headers`: Extra headers on top of the authentication headers
/// - `streaming`: Whether the response is a server-sent event stream
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    pub method: HttpMethod,
    /// Path relative to the base URL, starting with `/`.
    pub path: String,
    /// Query parameters, sorted by key.
    ///
    /// An empty `accountIdentifier` is replaced by the client's account id.
    pub params: BTreeMap<String, String>,
    /// JSON body; `None` sends no body at all.
    pub body: Option<Value>,
    /// Additional headers. They are applied after `x-api-key` and
    /// `Harness-Account`, so an entry with the same name is sent alongside
    /// them.
    pub headers: BTreeMap<String, String>,
    /// The response is a `text/event-stream`; its `data:` payloads are
    /// concatenated into one string value.
    pub streaming: bool,
}

impl RequestOptions {
    #[must_use]
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: BTreeMap::new(),
            body: None,
            headers: BTreeMap::new(),
            streaming: false,
        }
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }
}

/// Executes requests against the platform.
///
/// Implementations are responsible for authentication, rate limiting and
/// retries; callers see one result per logical request.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `options` and returns the parsed response body.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Api`] for non-2xx responses and timeouts that
    /// survived every retry, or another [`TransportError`] variant when no
    /// usable response was obtained.
    async fn request(&self, options: RequestOptions) -> Result<Value, TransportError>;
}

/// The production [`Transport`].
pub struct HarnessClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    account_id: String,
    timeout: Duration,
    backoff: BackoffPolicy,
    rate_limiter: RateLimiter,
}

impl fmt::Debug for HarnessClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HarnessClient")
            .field("base_url", &self.base_url)
            .field("account_id", &self.account_id)
            .field("timeout", &self.timeout)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl HarnessClient {
    /// Builds a client from resolved configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Network`] if the underlying HTTP client
    /// cannot be constructed.
    pub fn new(config: &Config) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(TransportError::Network)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            account_id: config.account_id.clone(),
            timeout: config.timeout,
            backoff: BackoffPolicy::new(config.base_backoff, config.max_retries),
            rate_limiter: RateLimiter::per_second(config.rate_limit_per_sec),
        })
    }

    #[must_use]
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Builds the full URL for `options`, always including
    /// `accountIdentifier`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidUrl`] if base URL and path do not
    /// form a valid URL.
    pub fn build_url(&self, options: &RequestOptions) -> Result<reqwest::Url, TransportError> {
        let raw = format!("{}{}", self.base_url, options.path);
        let mut url =
            reqwest::Url::parse(&raw).map_err(|err| TransportError::InvalidUrl(format!("{raw}: {err}")))?;

        {
            let mut query = url.query_pairs_mut();
            if options
                .params
                .get("accountIdentifier")
                .is_none_or(String::is_empty)
            {
                query.append_pair("accountIdentifier", &self.account_id);
            }
            for (key, value) in &options.params {
                if !value.is_empty() {
                    query.append_pair(key, value);
                }
            }
        }

        Ok(url)
    }

    async fn send_once(
        &self,
        options: &RequestOptions,
        url: &reqwest::Url,
    ) -> Result<Value, TransportError> {
        debug!(method = %options.method, path = %options.path, "sending request");

        let mut request = self
            .http
            .request(options.method.into(), url.clone())
            .timeout(self.timeout)
            .header("x-api-key", &self.api_key)
            .header("Harness-Account", &self.account_id);
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &options.body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(classify)?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ApiError::from_response(status.as_u16(), &text).into());
        }

        if options.streaming {
            let text = response.text().await.map_err(classify)?;
            return Ok(Value::String(collect_event_stream(&text)));
        }

        let bytes = response.bytes().await.map_err(classify)?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(TransportError::Decode)
    }
}

#[async_trait]
impl Transport for HarnessClient {
    async fn request(&self, options: RequestOptions) -> Result<Value, TransportError> {
        self.rate_limiter.acquire().await;
        let url = self.build_url(&options)?;

        (|| self.send_once(&options, &url))
            .retry(self.backoff)
            .when(TransportError::is_retryable)
            .notify(|err, delay| {
                let status = err.as_api().map(|api| api.status);
                warn!(
                    method = %options.method,
                    path = %options.path,
                    ?status,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "retrying request"
                );
            })
            .await
    }
}

/// Maps a reqwest failure, treating timeouts as a synthetic 408.
fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Api(ApiError::timeout())
    } else {
        TransportError::Network(err)
    }
}

/// Concatenates the `data:` payloads of a server-sent event stream.
///
/// A `[DONE]` sentinel is dropped. A body with no `data:` lines is returned
/// unchanged.
fn collect_event_stream(text: &str) -> String {
    let mut found = false;
    let mut collected = String::new();
    for line in text.lines() {
        if let Some(payload) = line.strip_prefix("data:") {
            found = true;
            let payload = payload.strip_prefix(' ').unwrap_or(payload);
            if payload != "[DONE]" {
                collected.push_str(payload);
            }
        }
    }
    if found { collected } else { text.to_string() }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_json, header, method, path, query_param},
    };

    use super::*;
    use crate::{error::ErrorKind, testing::test_config};

    #[tokio::test]
    async fn test_request_sends_auth_headers_and_account_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pipeline/api/pipelines/p1"))
            .and(header("x-api-key", "pat.acct1.tok.secret"))
            .and(header("Harness-Account", "acct1"))
            .and(query_param("accountIdentifier", "acct1"))
            .and(query_param("orgIdentifier", "default"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(r#"{"data":{"identifier":"p1"}}"#, "application/json"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = HarnessClient::new(&test_config(&server.uri())).unwrap();
        let value = client
            .request(
                RequestOptions::new(HttpMethod::Get, "/pipeline/api/pipelines/p1")
                    .with_param("orgIdentifier", "default"),
            )
            .await
            .unwrap();

        assert_eq!(value, json!({"data": {"identifier": "p1"}}));
    }

    #[tokio::test]
    async fn test_request_sends_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ng/api/services"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({"identifier": "svc"})))
            .respond_with(ResponseTemplate::new(200).set_body_raw("{}", "application/json"))
            .expect(1)
            .mount(&server)
            .await;

        let client = HarnessClient::new(&test_config(&server.uri())).unwrap();
        client
            .request(
                RequestOptions::new(HttpMethod::Post, "/ng/api/services")
                    .with_body(json!({"identifier": "svc"})),
            )
            .await
            .unwrap();
    }

    #[test]
    fn test_build_url_skips_empty_params() {
        let client = HarnessClient::new(&test_config("https://app.example.io")).unwrap();
        let url = client
            .build_url(
                &RequestOptions::new(HttpMethod::Get, "/ng/api/services")
                    .with_param("searchTerm", "")
                    .with_param("page", "0"),
            )
            .unwrap();

        assert_eq!(
            url.as_str(),
            "https://app.example.io/ng/api/services?accountIdentifier=acct1&page=0"
        );
    }

    #[test]
    fn test_build_url_replaces_empty_account_identifier() {
        let client = HarnessClient::new(&test_config("https://app.example.io")).unwrap();
        let url = client
            .build_url(
                &RequestOptions::new(HttpMethod::Get, "/ng/api/services")
                    .with_param("accountIdentifier", ""),
            )
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://app.example.io/ng/api/services?accountIdentifier=acct1"
        );

        let url = client
            .build_url(
                &RequestOptions::new(HttpMethod::Get, "/ng/api/services")
                    .with_param("accountIdentifier", "other"),
            )
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://app.example.io/ng/api/services?accountIdentifier=other"
        );
    }

    #[tokio::test]
    async fn test_retries_do_not_take_rate_limit_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/busy"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/busy"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(r#"{"ok":true}"#, "application/json"))
            .expect(1)
            .mount(&server)
            .await;

        // One token per second: a second acquire would wait a full second.
        let mut config = test_config(&server.uri());
        config.rate_limit_per_sec = 1;
        config.base_backoff = Duration::from_millis(1);
        let client = HarnessClient::new(&config).unwrap();

        let start = Instant::now();
        let value = client
            .request(RequestOptions::new(HttpMethod::Get, "/busy"))
            .await
            .unwrap();

        assert_eq!(value, json!({"ok": true}));
        assert!(start.elapsed() < Duration::from_millis(800), "{:?}", start.elapsed());
    }

    #[tokio::test]
    async fn test_retries_transient_errors_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(r#"{"ok":true}"#, "application/json"))
            .expect(1)
            .mount(&server)
            .await;

        let client = HarnessClient::new(&test_config(&server.uri())).unwrap();
        let start = Instant::now();
        let value = client
            .request(RequestOptions::new(HttpMethod::Get, "/flaky"))
            .await
            .unwrap();

        assert_eq!(value, json!({"ok": true}));
        // Two sleeps: at least 20ms * 0.5 and 40ms * 0.5.
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_non_retryable_status_fails_after_one_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_raw(
                r#"{"code":"RESOURCE_NOT_FOUND","message":"Pipeline not found","correlationId":"c-9"}"#,
                "application/json",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = test_config(&server.uri());
        config.base_backoff = Duration::from_secs(5);
        let client = HarnessClient::new(&config).unwrap();

        let start = Instant::now();
        let err = client
            .request(RequestOptions::new(HttpMethod::Get, "/missing"))
            .await
            .unwrap_err();

        assert!(start.elapsed() < Duration::from_secs(2));
        let api = err.as_api().unwrap();
        assert_eq!(api.status, 404);
        assert_eq!(api.kind(), ErrorKind::NotFound);
        assert_eq!(api.code.as_deref(), Some("RESOURCE_NOT_FOUND"));
        assert_eq!(api.correlation_id.as_deref(), Some("c-9"));
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_last_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .expect(3)
            .mount(&server)
            .await;

        let mut config = test_config(&server.uri());
        config.max_retries = 2;
        config.base_backoff = Duration::from_millis(1);
        let client = HarnessClient::new(&config).unwrap();

        let err = client
            .request(RequestOptions::new(HttpMethod::Get, "/down"))
            .await
            .unwrap_err();
        let api = err.as_api().unwrap();
        assert_eq!(api.status, 502);
        assert_eq!(api.message, "HTTP 502: bad gateway");
    }

    #[tokio::test]
    async fn test_timeout_becomes_retryable_408() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .expect(2)
            .mount(&server)
            .await;

        let mut config = test_config(&server.uri());
        config.timeout = Duration::from_millis(50);
        config.max_retries = 1;
        config.base_backoff = Duration::from_millis(1);
        let client = HarnessClient::new(&config).unwrap();

        let err = client
            .request(RequestOptions::new(HttpMethod::Get, "/slow"))
            .await
            .unwrap_err();
        let api = err.as_api().unwrap();
        assert_eq!(api.status, 408);
        assert_eq!(api.kind(), ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_empty_success_body_is_null() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/ng/api/services/svc"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = HarnessClient::new(&test_config(&server.uri())).unwrap();
        let value = client
            .request(RequestOptions::new(HttpMethod::Delete, "/ng/api/services/svc"))
            .await
            .unwrap();
        assert_eq!(value, Value::Null);
    }

    #[tokio::test]
    async fn test_invalid_json_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/html"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<html>", "text/html"))
            .expect(1)
            .mount(&server)
            .await;

        let client = HarnessClient::new(&test_config(&server.uri())).unwrap();
        let err = client
            .request(RequestOptions::new(HttpMethod::Get, "/html"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Decode(_)));
    }

    #[tokio::test]
    async fn test_streaming_response_concatenates_event_data() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gateway/aida/api/v1/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                "data: Hello\n\ndata: , world\n\ndata: [DONE]\n\n",
                "text/event-stream",
            ))
            .mount(&server)
            .await;

        let client = HarnessClient::new(&test_config(&server.uri())).unwrap();
        let value = client
            .request(
                RequestOptions::new(HttpMethod::Post, "/gateway/aida/api/v1/chat")
                    .with_body(json!({"prompt": "hi"}))
                    .streaming(true),
            )
            .await
            .unwrap();
        assert_eq!(value, json!("Hello, world"));
    }

    #[test]
    fn test_collect_event_stream_without_data_lines_returns_text() {
        assert_eq!(collect_event_stream("plain text"), "plain text");
        assert_eq!(collect_event_stream("data:a\ndata:b\n"), "ab");
    }
}

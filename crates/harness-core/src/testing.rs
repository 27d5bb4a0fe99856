//! Test doubles shared by the unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    client::{RequestOptions, Transport},
    config::Config,
    error::{ApiError, TransportError},
};

/// Config pointing at `base_url` with a PAT for account `acct1`, short
/// backoff and a generous rate limit.
pub(crate) fn test_config(base_url: &str) -> Config {
    Config::from_lookup(|key| match key {
        "HARNESS_API_KEY" => Some("pat.acct1.tok.secret".to_string()),
        "HARNESS_BASE_URL" => Some(base_url.to_string()),
        "HARNESS_BASE_BACKOFF_MS" => Some("20".to_string()),
        "HARNESS_RATE_LIMIT_PER_SEC" => Some("100".to_string()),
        _ => None,
    })
    .unwrap()
}

/// Records every request and answers each with the same canned outcome.
pub(crate) struct RecordingTransport {
    requests: Mutex<Vec<RequestOptions>>,
    outcome: Result<Value, ApiError>,
}

impl RecordingTransport {
    pub(crate) fn new() -> Self {
        Self::with_response(Value::Null)
    }

    pub(crate) fn with_response(response: Value) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            outcome: Ok(response),
        }
    }

    pub(crate) fn with_error(error: ApiError) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            outcome: Err(error),
        }
    }

    pub(crate) fn requests(&self) -> Vec<RequestOptions> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn request(&self, options: RequestOptions) -> Result<Value, TransportError> {
        self.requests.lock().unwrap().push(options);
        self.outcome.clone().map_err(TransportError::Api)
    }
}

//! Error taxonomy for remote calls and request dispatch.
//!
//! Failures fall into a few classes that callers handle differently:
//!
//! - **Caller errors** ([`DispatchError`] variants other than `Transport`):
//!   unknown resource types, unsupported operations, missing path or body
//!   fields. They fail before any network traffic and are never retried.
//! - **Remote errors** ([`ApiError`]): non-2xx responses and timeouts. The
//!   transient subset ([`ApiError::is_retryable`]) is retried with backoff by
//!   the client before it surfaces here.
//! - **Transport errors** ([`TransportError`]): connection failures, bodies
//!   that are not JSON, unbuildable URLs.

use std::fmt;

use serde::Deserialize;

/// Longest slice of a raw error body quoted in an [`ApiError`] message.
const MAX_QUOTED_BODY: usize = 500;

/// Closed classification of remote failures, derived from the HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Timeout,
    RateLimited,
    ServerError,
    Unknown,
}

impl ErrorKind {
    /// Maps an HTTP status code to its error kind.
    #[must_use]
    pub fn from_status(status: u16) -> Self {
        match status {
            400 | 422 => Self::BadRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            408 => Self::Timeout,
            429 => Self::RateLimited,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }
}

/// A failed call against the platform API.
///
/// Carries the HTTP status plus the vendor error code and correlation id when
/// the platform returned a structured error body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub message: String,
    pub status: u16,
    pub code: Option<String>,
    pub correlation_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    message: Option<String>,
    code: Option<String>,
    correlation_id: Option<String>,
}

impl ApiError {
    #[must_use]
    pub fn new(message: impl Into<String>, status: u16) -> Self {
        Self {
            message: message.into(),
            status,
            code: None,
            correlation_id: None,
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// The synthetic error recorded when an attempt exceeds its timeout.
    #[must_use]
    pub fn timeout() -> Self {
        Self::new("Request timed out", 408)
    }

    /// Builds an error from a non-2xx response.
    ///
    /// A JSON body of the shape `{message, code, correlationId}` supplies the
    /// message and vendor fields; anything else is quoted (truncated) in the
    /// message.
    #[must_use]
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed = serde_json::from_str::<ErrorBody>(body).ok();
        let (message, code, correlation_id) = match parsed {
            Some(ErrorBody {
                message,
                code,
                correlation_id,
            }) => (message, code, correlation_id),
            None => (None, None, None),
        };

        let message = message.unwrap_or_else(|| {
            let quoted: String = body.chars().take(MAX_QUOTED_BODY).collect();
            format!("HTTP {status}: {quoted}")
        });

        Self {
            message,
            status,
            code,
            correlation_id,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::from_status(self.status)
    }

    /// Whether the failure is transient: rate limiting, gateway and server
    /// overload statuses, or a timed-out attempt.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self.status, 408 | 429 | 500 | 502 | 503 | 504)
    }

    /// Heuristic: does this look like the feature or module is not available
    /// on the account?
    ///
    /// The status code decides first (404, 405, 501). Message inspection is a
    /// best-effort secondary signal only; platform error texts are not a
    /// stable contract.
    #[must_use]
    pub fn looks_unavailable(&self) -> bool {
        if matches!(self.status, 404 | 405 | 501) {
            return true;
        }
        let message = self.message.to_ascii_lowercase();
        ["not found", "not enabled", "something went wrong"]
            .iter()
            .any(|needle| message.contains(needle))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(correlation_id) = &self.correlation_id {
            write!(f, " (correlationId: {correlation_id})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

/// Failure of a single logical request issued through a transport.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The platform answered with an error, or every attempt timed out.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The request never produced an HTTP response.
    #[error("request failed: {0}")]
    Network(#[source] reqwest::Error),

    /// A 2xx response whose body was not valid JSON.
    #[error("invalid response body: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("invalid request URL: {0}")]
    InvalidUrl(String),
}

impl TransportError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Api(err) if err.is_retryable())
    }

    #[must_use]
    pub fn as_api(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err) => Some(err),
            _ => None,
        }
    }
}

/// Failure of a registry dispatch.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DispatchError {
    #[error("Unknown resource_type \"{resource_type}\". Available: {}", .available.join(", "))]
    UnknownResource {
        resource_type: String,
        available: Vec<String>,
    },

    #[error(
        "Resource \"{resource_type}\" does not support \"{operation}\". Supported: {}",
        .supported.join(", ")
    )]
    UnsupportedOperation {
        resource_type: String,
        operation: String,
        supported: Vec<String>,
    },

    #[error(
        "Resource \"{resource_type}\" has no execute action \"{action}\". Available: {}",
        list_or_none(.available)
    )]
    UnknownAction {
        resource_type: String,
        action: String,
        available: Vec<String>,
    },

    #[error("Missing required field \"{field}\" for path parameter \"{placeholder}\"")]
    MissingRequiredField { field: String, placeholder: String },

    #[error("Missing required body fields: {}", .fields.join(", "))]
    MissingBodyFields { fields: Vec<String> },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl DispatchError {
    /// Whether the error was raised before any request was sent.
    #[must_use]
    pub fn is_caller_error(&self) -> bool {
        !matches!(self, Self::Transport(_))
    }

    #[must_use]
    pub fn as_api(&self) -> Option<&ApiError> {
        match self {
            Self::Transport(err) => err.as_api(),
            _ => None,
        }
    }
}

impl From<ApiError> for DispatchError {
    fn from(err: ApiError) -> Self {
        Self::Transport(TransportError::Api(err))
    }
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value as JsonValue;

use crate::ResolvedRequest;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum HttpCallError {
    /// A request was issued before [`crate::HttpClient::setup_instance`].
    #[error("client instance used before setup_instance")]
    NotConfigured,
    /// `setup_instance` was called on an already configured client.
    #[error("client instance is already configured")]
    AlreadyConfigured,
    /// The configuration passed to `setup_instance` was rejected.
    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),
    /// A settings key was missing or held an unusable value.
    #[error("settings error for '{key}': {reason}")]
    Settings { key: String, reason: String },
    /// Request or response payload could not be encoded or decoded.
    #[error("encode error: {0}")]
    Encode(String),
    /// The call reached the transport and failed there.
    #[error(transparent)]
    Request(Box<NormalizedError>),
}

impl HttpCallError {
    /// Failure category for request errors; `None` for setup/programmer errors.
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            Self::Request(err) => Some(err.category),
            _ => None,
        }
    }

    /// Returns the normalized request error, if this is one.
    pub fn as_request(&self) -> Option<&NormalizedError> {
        match self {
            Self::Request(err) => Some(err),
            _ => None,
        }
    }

    pub(crate) fn settings(key: &str, reason: impl Into<String>) -> Self {
        Self::Settings {
            key: key.to_owned(),
            reason: reason.into(),
        }
    }
}

impl From<NormalizedError> for HttpCallError {
    fn from(err: NormalizedError) -> Self {
        Self::Request(Box::new(err))
    }
}

/// Why a request failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The timer won the race, or the transport reported a timeout.
    Timeout,
    /// A response arrived but the status validator rejected it.
    ValidationFailure,
    /// Any other transport failure (DNS, connection reset, TLS, ...).
    TransportException,
}

impl ErrorCategory {
    /// Human-readable prefix used in error messages.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Timeout => "Request timeout",
            Self::ValidationFailure => "Request failed",
            Self::TransportException => "Request exception",
        }
    }
}

/// A failed call, with enough context to debug it without re-running.
///
/// `status`, `headers` and `body` are only populated for
/// [`ErrorCategory::ValidationFailure`]; timeouts and transport exceptions
/// never carry a response.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedError {
    pub category: ErrorCategory,
    pub message: String,
    pub request: ResolvedRequest,
    pub status: Option<u16>,
    pub headers: Option<BTreeMap<String, String>>,
    pub body: Option<JsonValue>,
}

impl NormalizedError {
    pub(crate) fn timeout(request: ResolvedRequest, detail: impl fmt::Display) -> Self {
        Self::without_response(ErrorCategory::Timeout, request, detail)
    }

    pub(crate) fn exception(request: ResolvedRequest, detail: impl fmt::Display) -> Self {
        Self::without_response(ErrorCategory::TransportException, request, detail)
    }

    pub(crate) fn rejected(
        request: ResolvedRequest,
        status: u16,
        headers: BTreeMap<String, String>,
        body: JsonValue,
    ) -> Self {
        let category = ErrorCategory::ValidationFailure;
        Self {
            message: format!(
                "{}: {} {} returned status {status}",
                category.prefix(),
                request.method,
                request.url
            ),
            category,
            request,
            status: Some(status),
            headers: Some(headers),
            body: Some(body),
        }
    }

    fn without_response(
        category: ErrorCategory,
        request: ResolvedRequest,
        detail: impl fmt::Display,
    ) -> Self {
        Self {
            message: format!("{}: {detail}", category.prefix()),
            category,
            request,
            status: None,
            headers: None,
            body: None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        self.category
    }
}

impl fmt::Display for NormalizedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for NormalizedError {}

#[cfg(test)]
mod tests {
    use reqwest::Method;
    use serde_json::json;

    use super::*;

    fn snapshot() -> ResolvedRequest {
        ResolvedRequest {
            method: Method::GET,
            url: "https://api.test/users/7".to_owned(),
            headers: BTreeMap::new(),
            query: Vec::new(),
            body: None,
        }
    }

    #[test]
    fn timeout_has_no_response_fields() {
        let err = NormalizedError::timeout(snapshot(), "no response within 5 ms");
        assert_eq!(err.category(), ErrorCategory::Timeout);
        assert_eq!(err.message, "Request timeout: no response within 5 ms");
        assert!(err.status.is_none() && err.headers.is_none() && err.body.is_none());
    }

    #[test]
    fn rejected_carries_response_snapshot() {
        let err = NormalizedError::rejected(snapshot(), 404, BTreeMap::new(), json!({"e": 1}));
        assert_eq!(err.category, ErrorCategory::ValidationFailure);
        assert!(err.message.starts_with("Request failed: GET https://api.test/users/7"));
        assert_eq!(err.status, Some(404));
        assert_eq!(err.body, Some(json!({"e": 1})));
    }

    #[test]
    fn call_error_exposes_category() {
        let err: HttpCallError = NormalizedError::exception(snapshot(), "reset").into();
        assert_eq!(err.category(), Some(ErrorCategory::TransportException));
        assert_eq!(err.to_string(), "Request exception: reset");
        assert_eq!(HttpCallError::NotConfigured.category(), None);
    }
}

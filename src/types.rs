use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Method;
use serde_json::{Map, Value as JsonValue};

use crate::{ReturnMode, StatusValidator};

/// One logical call, before it is merged with the client configuration.
#[derive(Clone, Debug)]
pub struct RequestDescriptor {
    pub method: Method,
    /// Relative to the base URL when one is configured.
    pub url: String,
    pub query: Option<Map<String, JsonValue>>,
    /// JSON body.
    pub body: Option<JsonValue>,
    /// Sent URL-encoded; takes precedence over `body`.
    pub form: Option<Map<String, JsonValue>>,
    pub headers: BTreeMap<String, String>,
    /// Values substituted for `:name` markers in the URL.
    pub url_vars: Map<String, JsonValue>,
    pub timeout: Option<Duration>,
    pub validator: Option<StatusValidator>,
    pub return_mode: Option<ReturnMode>,
}

impl RequestDescriptor {
    /// Bare descriptor; every optional part unset.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: None,
            body: None,
            form: None,
            headers: BTreeMap::new(),
            url_vars: Map::new(),
            timeout: None,
            validator: None,
            return_mode: None,
        }
    }

    /// Adds a query parameter.
    ///
    /// Parameters go on the wire sorted by name, not in insertion order.
    pub fn query_param(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.query
            .get_or_insert_with(Map::new)
            .insert(name.into(), value.into());
        self
    }

    /// Sets the JSON body.
    pub fn json(mut self, body: impl Into<JsonValue>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Adds a URL-encoded form field. Any form overrides a JSON body.
    pub fn form_field(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.form
            .get_or_insert_with(Map::new)
            .insert(name.into(), value.into());
        self
    }

    /// Adds a header; wins over a base header of the same name, in any case.
    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Value for the `:name` marker in the URL.
    pub fn url_var(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.url_vars.insert(name.into(), value.into());
        self
    }

    /// Overrides the instance timeout for this call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Overrides the instance status check for this call.
    pub fn validator(mut self, validator: StatusValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Overrides the instance return mode for this call.
    pub fn return_mode(mut self, mode: ReturnMode) -> Self {
        self.return_mode = Some(mode);
        self
    }
}

/// Request body as handed to the transport.
#[derive(Clone, Debug, PartialEq)]
pub enum ResolvedBody {
    Json(JsonValue),
    /// Already URL-encoded.
    Form(String),
}

/// A fully merged request, consumed once by the transport.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedRequest {
    pub method: Method,
    pub url: String,
    /// Lowercase names.
    pub headers: BTreeMap<String, String>,
    pub query: Vec<(String, String)>,
    pub body: Option<ResolvedBody>,
}

/// Full response envelope.
#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: JsonValue,
}

/// Result of a successful call, shaped by its [`ReturnMode`].
#[derive(Clone, Debug, PartialEq)]
pub enum CallOutput {
    Data(JsonValue),
    Full(Response),
}

impl CallOutput {
    /// The body, whatever the mode.
    pub fn data(&self) -> &JsonValue {
        match self {
            Self::Data(body) => body,
            Self::Full(response) => &response.body,
        }
    }

    /// Consumes the output, keeping only the body.
    pub fn into_data(self) -> JsonValue {
        match self {
            Self::Data(body) => body,
            Self::Full(response) => response.body,
        }
    }

    /// The envelope, or `None` when the call ran in data mode.
    pub fn into_full(self) -> Option<Response> {
        match self {
            Self::Full(response) => Some(response),
            Self::Data(_) => None,
        }
    }
}

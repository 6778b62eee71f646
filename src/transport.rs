use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde_json::Value as JsonValue;

use crate::{HttpCallError, ResolvedBody, ResolvedRequest, Result, TlsIdentity};

/// Raw response as reported by a transport.
#[derive(Clone, Debug, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    /// Lowercase names.
    pub headers: BTreeMap<String, String>,
    pub body: JsonValue,
}

/// A transport-level failure (no response was produced).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportFailure {
    pub message: String,
    /// Set when the transport itself knows the failure was a timeout.
    pub timed_out: bool,
}

impl TransportFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: true,
        }
    }

    /// True when flagged as a timeout or when the message reads like one.
    pub fn is_timeout(&self) -> bool {
        if self.timed_out {
            return true;
        }
        let message = self.message.to_ascii_lowercase();
        message.contains("timeout") || message.contains("timed out")
    }
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Performs the network I/O for a resolved request.
///
/// Dropping the returned future must abandon the request; this is how the
/// client cancels a call whose timer fired first.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(
        &self,
        request: &ResolvedRequest,
    ) -> std::result::Result<TransportResponse, TransportFailure>;
}

/// [`Transport`] backed by `reqwest`.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Builds a client honouring the TLS pass-through options.
    ///
    /// `identity` must hold PEM text; encrypted keys are rejected because
    /// rustls cannot decrypt them.
    pub fn from_tls_options(
        ignore_tls_errors: bool,
        identity: Option<&TlsIdentity>,
    ) -> Result<Self> {
        let mut builder =
            reqwest::Client::builder().danger_accept_invalid_certs(ignore_tls_errors);

        if let Some(identity) = identity {
            if identity.passphrase.is_some() {
                return Err(HttpCallError::InvalidConfig(
                    "encrypted TLS keys are not supported; provide an unencrypted PEM key"
                        .to_owned(),
                ));
            }
            let mut pem = identity.cert.clone().into_bytes();
            pem.push(b'\n');
            pem.extend_from_slice(identity.key.as_bytes());
            let identity = reqwest::Identity::from_pem(&pem)
                .map_err(|err| HttpCallError::InvalidConfig(format!("tls identity: {err}")))?;
            builder = builder.identity(identity);
        }

        let http = builder
            .build()
            .map_err(|err| HttpCallError::InvalidConfig(format!("http client: {err}")))?;
        Ok(Self::new(http))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(
        &self,
        request: &ResolvedRequest,
    ) -> std::result::Result<TransportResponse, TransportFailure> {
        let mut builder = self
            .http
            .request(request.method.clone(), &request.url)
            .headers(header_map(&request.headers)?);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        builder = match &request.body {
            Some(ResolvedBody::Json(body)) => builder.json(body),
            Some(ResolvedBody::Form(encoded)) => builder.body(encoded.clone()),
            None => builder,
        };

        let response = builder.send().await.map_err(failure_from)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_owned(), value.to_owned()))
            })
            .collect::<BTreeMap<_, _>>();
        let is_json = headers
            .get(CONTENT_TYPE.as_str())
            .is_some_and(|value| value.contains("json"));
        let text = response.text().await.map_err(failure_from)?;

        Ok(TransportResponse {
            status,
            headers,
            body: decode_body(&text, is_json),
        })
    }
}

fn header_map(
    headers: &BTreeMap<String, String>,
) -> std::result::Result<HeaderMap, TransportFailure> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
            TransportFailure::new(format!("invalid header name '{name}': {err}"))
        })?;
        let value = HeaderValue::from_str(value).map_err(|err| {
            TransportFailure::new(format!("invalid value for header '{name}': {err}"))
        })?;
        map.insert(name, value);
    }
    Ok(map)
}

fn failure_from(err: reqwest::Error) -> TransportFailure {
    if err.is_timeout() {
        TransportFailure::timeout(err.to_string())
    } else {
        TransportFailure::new(err.to_string())
    }
}

/// Empty text → `null`; JSON content types are parsed when valid; anything
/// else is kept as a string.
pub(crate) fn decode_body(text: &str, is_json: bool) -> JsonValue {
    if text.is_empty() {
        return JsonValue::Null;
    }
    if is_json {
        if let Ok(value) = serde_json::from_str(text) {
            return value;
        }
    }
    JsonValue::String(text.to_owned())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::{decode_body, header_map, TransportFailure};

    #[test]
    fn timeout_detection_uses_flag_or_message() {
        assert!(TransportFailure::timeout("boom").is_timeout());
        assert!(TransportFailure::new("operation timed out").is_timeout());
        assert!(TransportFailure::new("Connect Timeout after 3s").is_timeout());
        assert!(!TransportFailure::new("connection reset by peer").is_timeout());
    }

    #[test]
    fn body_decoding() {
        assert_eq!(decode_body("", true), json!(null));
        assert_eq!(decode_body(r#"{"a":1}"#, true), json!({"a": 1}));
        assert_eq!(decode_body(r#"{"a":1}"#, false), json!(r#"{"a":1}"#));
        assert_eq!(decode_body("not json", true), json!("not json"));
    }

    #[test]
    fn invalid_header_is_a_transport_failure() {
        let headers = BTreeMap::from([("bad header".to_owned(), "v".to_owned())]);
        let err = header_map(&headers).expect_err("space is not allowed in names");
        assert!(err.message.contains("bad header"));
        assert!(!err.is_timeout());
    }
}

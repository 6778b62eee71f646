use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value as JsonValue};

/// Shape of a successful call's result.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ReturnMode {
    /// Only the response body.
    #[default]
    Data,
    /// Status, headers and body.
    Full,
}

/// Decides whether a response status counts as success.
#[derive(Clone)]
pub struct StatusValidator(Arc<dyn Fn(u16) -> bool + Send + Sync>);

impl StatusValidator {
    /// Wraps an arbitrary status check.
    pub fn new(check: impl Fn(u16) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(check))
    }

    /// Accepts every status strictly below `limit`.
    pub fn below(limit: u16) -> Self {
        Self::new(move |status| status < limit)
    }

    /// Accepts 2xx only.
    pub fn success() -> Self {
        Self::new(|status| (200..300).contains(&status))
    }

    /// Accepts any status.
    pub fn any() -> Self {
        Self::new(|_| true)
    }

    /// Runs the check against `status`.
    pub fn accepts(&self, status: u16) -> bool {
        (self.0)(status)
    }
}

impl Default for StatusValidator {
    fn default() -> Self {
        Self::below(400)
    }
}

impl fmt::Debug for StatusValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StatusValidator(<fn>)")
    }
}

/// Client certificate presented during the TLS handshake.
///
/// `cert` and `key` are PEM text.
#[derive(Clone, Eq, PartialEq)]
pub struct TlsIdentity {
    pub cert: String,
    pub key: String,
    pub passphrase: Option<String>,
}

impl fmt::Debug for TlsIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsIdentity")
            .field("cert", &format_args!("<{} bytes>", self.cert.len()))
            .field("key", &"<redacted>")
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Instance-level configuration, applied once through
/// [`crate::HttpClient::setup_instance`].
///
/// Header names are lowercased at setup, so `base_headers` may be filled
/// directly or through [`ClientConfiguration::with_header`].
#[derive(Clone, Debug, Default)]
pub struct ClientConfiguration {
    pub base_url: Option<String>,
    pub base_headers: BTreeMap<String, String>,
    pub base_data: Option<Map<String, JsonValue>>,
    /// Falls back to the settings default when `None`.
    pub default_timeout: Option<Duration>,
    /// Falls back to the settings validation mode when `None`.
    pub default_validator: Option<StatusValidator>,
    /// Falls back to the settings return mode when `None`.
    pub default_return_mode: Option<ReturnMode>,
    pub randomize_user_agent: bool,
    pub ignore_tls_errors: bool,
    pub tls_identity: Option<TlsIdentity>,
}

impl ClientConfiguration {
    /// Empty configuration; every default comes from settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix prepended verbatim to every call URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Adds a header sent with every call; the name is lowercased.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.base_headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Data merged into every body, query and form a call uses.
    pub fn with_base_data(mut self, data: Map<String, JsonValue>) -> Self {
        self.base_data = Some(data);
        self
    }

    /// Instance timeout, used when a call sets none.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Instance status check, used when a call sets none.
    pub fn with_validator(mut self, validator: StatusValidator) -> Self {
        self.default_validator = Some(validator);
        self
    }

    /// Instance return mode, used when a call sets none.
    pub fn with_return_mode(mut self, mode: ReturnMode) -> Self {
        self.default_return_mode = Some(mode);
        self
    }

    /// Picks a browser user agent once, at setup.
    pub fn with_random_user_agent(mut self) -> Self {
        self.randomize_user_agent = true;
        self
    }

    /// Accept invalid server certificates.
    pub fn with_ignore_tls_errors(mut self, ignore: bool) -> Self {
        self.ignore_tls_errors = ignore;
        self
    }

    /// Client certificate for mutual TLS.
    pub fn with_tls_identity(mut self, identity: TlsIdentity) -> Self {
        self.tls_identity = Some(identity);
        self
    }
}

/// Configuration after setup: every default resolved, immutable.
#[derive(Clone, Debug)]
pub(crate) struct ResolvedConfiguration {
    pub base_url: Option<String>,
    pub base_headers: BTreeMap<String, String>,
    pub base_data: Option<Map<String, JsonValue>>,
    pub default_timeout: Duration,
    pub default_validator: StatusValidator,
    pub default_return_mode: ReturnMode,
}

#[cfg(test)]
mod tests {
    use super::{ClientConfiguration, StatusValidator, TlsIdentity};

    #[test]
    fn default_validator_rejects_client_and_server_errors() {
        let validator = StatusValidator::default();
        assert!(validator.accepts(200));
        assert!(validator.accepts(304));
        assert!(!validator.accepts(400));
        assert!(!validator.accepts(503));
    }

    #[test]
    fn success_validator_rejects_redirects() {
        assert!(!StatusValidator::success().accepts(301));
        assert!(StatusValidator::any().accepts(599));
    }

    #[test]
    fn header_names_are_lowercased() {
        let config = ClientConfiguration::new().with_header("X-Api-Key", "k");
        assert_eq!(config.base_headers.get("x-api-key").map(String::as_str), Some("k"));
    }

    #[test]
    fn debug_redacts_tls_key() {
        let identity = TlsIdentity {
            cert: "CERT".to_owned(),
            key: "super-secret-key".to_owned(),
            passphrase: Some("hunter2".to_owned()),
        };
        let debug = format!("{identity:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("super-secret-key"));
        assert!(!debug.contains("hunter2"));
    }
}

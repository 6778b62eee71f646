use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use reqwest::header::{HeaderName, HeaderValue, USER_AGENT};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::{
    compose::compose,
    options::ResolvedConfiguration,
    settings::HttpDefaults,
    user_agent::random_user_agent,
    CallOutput, ClientConfiguration, HttpCallError, Logger, NormalizedError, ReqwestTransport,
    RequestDescriptor, Response, Result, ReturnMode, Settings, Transport,
};

/// Configured, reusable HTTP client.
///
/// A fresh client is unconfigured; [`HttpClient::setup_instance`] must run
/// once before any call. After setup the configuration is read-only, so the
/// client can be shared across tasks behind an `Arc`.
pub struct HttpClient {
    defaults: HttpDefaults,
    logger: Arc<dyn Logger>,
    injected_transport: Option<Arc<dyn Transport>>,
    ready: OnceLock<Ready>,
}

struct Ready {
    config: ResolvedConfiguration,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("defaults", &self.defaults)
            .field("config", &self.ready.get().map(|ready| &ready.config))
            .finish()
    }
}

impl HttpClient {
    /// Creates an unconfigured client that will use `reqwest` for I/O.
    ///
    /// Fails when `settings` lacks a required key; see [`HttpDefaults`].
    ///
    /// # Example
    ///
    /// ```no_run
    /// use std::collections::HashMap;
    /// use std::sync::Arc;
    ///
    /// use remotecall_http::{ClientConfiguration, HttpClient, TracingLogger};
    ///
    /// # async fn run() -> remotecall_http::Result<()> {
    /// let settings = HashMap::from([("http.timeout_ms".to_owned(), "5000".to_owned())]);
    /// let client = HttpClient::new(&settings, Arc::new(TracingLogger))?;
    /// client.setup_instance(ClientConfiguration::new().with_base_url("https://api.example.com"))?;
    ///
    /// let user = client.get("/users/42").await?.into_data();
    /// println!("{user}");
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(settings: &dyn Settings, logger: Arc<dyn Logger>) -> Result<Self> {
        Ok(Self {
            defaults: HttpDefaults::from_settings(settings)?,
            logger,
            injected_transport: None,
            ready: OnceLock::new(),
        })
    }

    /// Creates an unconfigured client that sends through `transport`.
    ///
    /// TLS options in the configuration are ignored; they belong to the
    /// transport.
    pub fn with_transport(
        settings: &dyn Settings,
        logger: Arc<dyn Logger>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let mut client = Self::new(settings, logger)?;
        client.injected_transport = Some(transport);
        Ok(client)
    }

    /// True once [`HttpClient::setup_instance`] has succeeded.
    pub fn is_ready(&self) -> bool {
        self.ready.get().is_some()
    }

    /// Validates and stores the configuration. Allowed exactly once.
    ///
    /// Header names are lowercased here, whichever way they were inserted.
    pub fn setup_instance(&self, config: ClientConfiguration) -> Result<()> {
        if self.is_ready() {
            return Err(HttpCallError::AlreadyConfigured);
        }
        validate(&config)?;

        let mut base_headers: BTreeMap<String, String> = config
            .base_headers
            .into_iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value))
            .collect();
        if config.randomize_user_agent {
            base_headers.insert(USER_AGENT.as_str().to_owned(), random_user_agent());
        }

        let transport = match &self.injected_transport {
            Some(transport) => Arc::clone(transport),
            None => Arc::new(ReqwestTransport::from_tls_options(
                config.ignore_tls_errors || self.defaults.ignore_tls_errors,
                config.tls_identity.as_ref(),
            )?),
        };

        let resolved = ResolvedConfiguration {
            base_url: config.base_url,
            base_headers,
            base_data: config.base_data,
            default_timeout: config.default_timeout.unwrap_or(self.defaults.timeout),
            default_validator: config
                .default_validator
                .unwrap_or_else(|| self.defaults.validator.clone()),
            default_return_mode: config
                .default_return_mode
                .unwrap_or(self.defaults.return_mode),
        };

        self.ready
            .set(Ready {
                config: resolved,
                transport,
            })
            .map_err(|_| HttpCallError::AlreadyConfigured)
    }

    /// Composes, sends and validates one call.
    ///
    /// The transport call races a timer for the effective timeout. When the
    /// timer wins the transport future is dropped, which abandons the
    /// in-flight request.
    pub async fn request(&self, descriptor: RequestDescriptor) -> Result<CallOutput> {
        let ready = self.ready.get().ok_or(HttpCallError::NotConfigured)?;
        let timeout = descriptor.timeout.unwrap_or(ready.config.default_timeout);
        let request = compose(&descriptor, &ready.config)?;

        self.logger.debug(&format!("{} {}", request.method, request.url));

        let outcome = tokio::select! {
            result = ready.transport.execute(&request) => Some(result),
            _ = tokio::time::sleep(timeout) => None,
        };

        let response = match outcome {
            None => {
                return Err(self.fail(NormalizedError::timeout(
                    request,
                    format!("no response within {} ms", timeout.as_millis()),
                )))
            }
            Some(Err(failure)) if failure.is_timeout() => {
                return Err(self.fail(NormalizedError::timeout(request, failure)))
            }
            Some(Err(failure)) => {
                return Err(self.fail(NormalizedError::exception(request, failure)))
            }
            Some(Ok(response)) => response,
        };

        let validator = descriptor
            .validator
            .as_ref()
            .unwrap_or(&ready.config.default_validator);
        if !validator.accepts(response.status) {
            return Err(self.fail(NormalizedError::rejected(
                request,
                response.status,
                response.headers,
                response.body,
            )));
        }

        let mode = descriptor
            .return_mode
            .unwrap_or(ready.config.default_return_mode);
        Ok(match mode {
            ReturnMode::Data => CallOutput::Data(response.body),
            ReturnMode::Full => CallOutput::Full(Response {
                status: response.status,
                headers: response.headers,
                body: response.body,
            }),
        })
    }

    /// Runs the call and deserializes the response body into `T`.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        descriptor: RequestDescriptor,
    ) -> Result<T> {
        let body = self.request(descriptor).await?.into_data();
        serde_json::from_value(body)
            .map_err(|err| HttpCallError::Encode(format!("unexpected response body: {err}")))
    }

    /// `GET url`.
    pub async fn get(&self, url: impl Into<String>) -> Result<CallOutput> {
        self.request(RequestDescriptor::new(Method::GET, url)).await
    }

    /// `HEAD url`. The body is `null` in data mode.
    pub async fn head(&self, url: impl Into<String>) -> Result<CallOutput> {
        self.request(RequestDescriptor::new(Method::HEAD, url)).await
    }

    /// `DELETE url`.
    pub async fn delete(&self, url: impl Into<String>) -> Result<CallOutput> {
        self.request(RequestDescriptor::new(Method::DELETE, url)).await
    }

    /// `POST url` with a JSON body.
    pub async fn post(
        &self,
        url: impl Into<String>,
        body: impl Into<JsonValue>,
    ) -> Result<CallOutput> {
        self.request(RequestDescriptor::new(Method::POST, url).json(body))
            .await
    }

    /// `PUT url` with a JSON body.
    pub async fn put(
        &self,
        url: impl Into<String>,
        body: impl Into<JsonValue>,
    ) -> Result<CallOutput> {
        self.request(RequestDescriptor::new(Method::PUT, url).json(body))
            .await
    }

    /// `PATCH url` with a JSON body.
    pub async fn patch(
        &self,
        url: impl Into<String>,
        body: impl Into<JsonValue>,
    ) -> Result<CallOutput> {
        self.request(RequestDescriptor::new(Method::PATCH, url).json(body))
            .await
    }

    fn fail(&self, err: NormalizedError) -> HttpCallError {
        self.logger.error("remote call failed", &err);
        err.into()
    }
}

fn validate(config: &ClientConfiguration) -> Result<()> {
    if let Some(base_url) = &config.base_url {
        let trimmed = base_url.trim();
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(HttpCallError::InvalidConfig(format!(
                "base url must start with http:// or https://, got '{base_url}'"
            )));
        }
    }

    if config.default_timeout.is_some_and(|timeout| timeout.is_zero()) {
        return Err(HttpCallError::InvalidConfig(
            "default timeout must be greater than zero".to_owned(),
        ));
    }

    for (name, value) in &config.base_headers {
        HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
            HttpCallError::InvalidConfig(format!("header name '{name}': {err}"))
        })?;
        HeaderValue::from_str(value).map_err(|err| {
            HttpCallError::InvalidConfig(format!("header '{name}' value: {err}"))
        })?;
    }

    Ok(())
}

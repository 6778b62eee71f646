//! Read-only settings lookup and the defaults derived from it.

use std::collections::HashMap;
use std::time::Duration;

use crate::{HttpCallError, Result, ReturnMode, StatusValidator};

/// Key holding the default request timeout in milliseconds. Required.
pub const TIMEOUT_MS_KEY: &str = "http.timeout_ms";
/// Status validation mode: `default` (< 400), `success` (2xx) or `any`.
pub const VALIDATION_KEY: &str = "http.validation";
/// Default return mode: `data` or `full`.
pub const RETURN_MODE_KEY: &str = "http.return_mode";
/// Accept invalid TLS certificates on every client built from these settings.
pub const IGNORE_TLS_ERRORS_KEY: &str = "http.ignore_tls_errors";
pub const RETRY_MAX_RETRIES_KEY: &str = "retry.max_retries";
pub const RETRY_TIME_BUDGET_MS_KEY: &str = "retry.time_budget_ms";
pub const RETRY_DELAY_MS_KEY: &str = "retry.delay_ms";

/// Synchronous, read-only key/value source.
pub trait Settings: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

impl Settings for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Settings backed by process environment variables.
///
/// A key such as `http.timeout_ms` is looked up as `HTTP_TIMEOUT_MS`, after
/// the optional prefix (`MYAPP_HTTP_TIMEOUT_MS` with prefix `MYAPP_`).
#[derive(Clone, Debug, Default)]
pub struct EnvSettings {
    prefix: String,
}

impl EnvSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn variable_name(&self, key: &str) -> String {
        let mut name = self.prefix.clone();
        name.extend(key.chars().map(|c| match c {
            '.' | '-' => '_',
            other => other.to_ascii_uppercase(),
        }));
        name
    }
}

impl Settings for EnvSettings {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(self.variable_name(key))
            .ok()
            .filter(|value| !value.trim().is_empty())
    }
}

/// Client defaults read from [`Settings`] when the client is constructed.
#[derive(Clone, Debug)]
pub struct HttpDefaults {
    pub timeout: Duration,
    pub validator: StatusValidator,
    pub return_mode: ReturnMode,
    pub ignore_tls_errors: bool,
}

impl HttpDefaults {
    /// Reads the defaults; a missing timeout or a malformed value is an error.
    pub fn from_settings(settings: &dyn Settings) -> Result<Self> {
        let timeout_ms: u64 = parse_optional(settings, TIMEOUT_MS_KEY)?
            .ok_or_else(|| HttpCallError::settings(TIMEOUT_MS_KEY, "required key is missing"))?;
        if timeout_ms == 0 {
            return Err(HttpCallError::settings(
                TIMEOUT_MS_KEY,
                "timeout must be greater than zero",
            ));
        }

        let validator = match settings.get(VALIDATION_KEY) {
            None => StatusValidator::default(),
            Some(mode) => parse_validation_mode(&mode).ok_or_else(|| {
                HttpCallError::settings(VALIDATION_KEY, format!("unknown mode '{mode}'"))
            })?,
        };

        let return_mode = match settings.get(RETURN_MODE_KEY) {
            None => ReturnMode::default(),
            Some(mode) => parse_return_mode(&mode).ok_or_else(|| {
                HttpCallError::settings(RETURN_MODE_KEY, format!("unknown mode '{mode}'"))
            })?,
        };

        let ignore_tls_errors = match settings.get(IGNORE_TLS_ERRORS_KEY) {
            None => false,
            Some(flag) => parse_flag(&flag).ok_or_else(|| {
                HttpCallError::settings(
                    IGNORE_TLS_ERRORS_KEY,
                    format!("expected a boolean, got '{flag}'"),
                )
            })?,
        };

        Ok(Self {
            timeout: Duration::from_millis(timeout_ms),
            validator,
            return_mode,
            ignore_tls_errors,
        })
    }
}

pub(crate) fn parse_optional<T>(settings: &dyn Settings, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    settings
        .get(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|err| HttpCallError::settings(key, format!("'{raw}': {err}")))
        })
        .transpose()
}

fn parse_validation_mode(mode: &str) -> Option<StatusValidator> {
    match mode.trim().to_ascii_lowercase().as_str() {
        "default" | "strict" => Some(StatusValidator::default()),
        "success" => Some(StatusValidator::success()),
        "any" | "none" => Some(StatusValidator::any()),
        _ => None,
    }
}

fn parse_return_mode(mode: &str) -> Option<ReturnMode> {
    match mode.trim().to_ascii_lowercase().as_str() {
        "data" => Some(ReturnMode::Data),
        "full" => Some(ReturnMode::Full),
        _ => None,
    }
}

fn parse_flag(flag: &str) -> Option<bool> {
    match flag.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

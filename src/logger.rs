use std::error::Error as StdError;
use std::time::Duration;

/// Optional structured context attached to a log line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LogOptions<'a> {
    pub operation: Option<&'a str>,
    pub elapsed: Option<Duration>,
}

impl<'a> LogOptions<'a> {
    pub fn operation(operation: Option<&'a str>) -> Self {
        Self {
            operation,
            elapsed: None,
        }
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = Some(elapsed);
        self
    }
}

/// Progress and error sink. Fire-and-forget: nothing it does feeds back into
/// control flow.
pub trait Logger: Send + Sync {
    fn debug(&self, message: &str);
    fn warning(&self, message: &str, opts: LogOptions<'_>);
    fn error(&self, message: &str, error: &(dyn StdError + 'static));
    fn success(&self, message: &str, opts: LogOptions<'_>);
}

/// Forwards to the `tracing` macros under the `remotecall_http` target.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn debug(&self, message: &str) {
        tracing::debug!(target: "remotecall_http", "{message}");
    }

    fn warning(&self, message: &str, opts: LogOptions<'_>) {
        tracing::warn!(
            target: "remotecall_http",
            operation = opts.operation,
            elapsed_ms = opts.elapsed.map(|d| d.as_millis() as u64),
            "{message}"
        );
    }

    fn error(&self, message: &str, error: &(dyn StdError + 'static)) {
        tracing::error!(target: "remotecall_http", error = %error, "{message}");
    }

    fn success(&self, message: &str, opts: LogOptions<'_>) {
        tracing::info!(
            target: "remotecall_http",
            outcome = "success",
            operation = opts.operation,
            elapsed_ms = opts.elapsed.map(|d| d.as_millis() as u64),
            "{message}"
        );
    }
}

/// Discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn debug(&self, _message: &str) {}
    fn warning(&self, _message: &str, _opts: LogOptions<'_>) {}
    fn error(&self, _message: &str, _error: &(dyn StdError + 'static)) {}
    fn success(&self, _message: &str, _opts: LogOptions<'_>) {}
}

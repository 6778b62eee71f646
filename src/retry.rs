//! Generic retry loop for any fallible async operation.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::{
    settings::{
        parse_optional, RETRY_DELAY_MS_KEY, RETRY_MAX_RETRIES_KEY, RETRY_TIME_BUDGET_MS_KEY,
    },
    LogOptions, Logger, Result, Settings,
};

type AbortPredicate<E> = Box<dyn Fn(&E) -> bool + Send + Sync>;

/// Bounds and pacing for one [`RetryExecutor::run`] invocation.
///
/// With no `max_retries`, no `time_budget` and no `abort_if`, the executor
/// retries every failure forever. Callers own termination.
pub struct RetryPolicy<E> {
    operation_name: Option<String>,
    max_retries: Option<u32>,
    time_budget: Option<Duration>,
    delay_between: Duration,
    abort_if: Option<AbortPredicate<E>>,
}

impl<E> Default for RetryPolicy<E> {
    fn default() -> Self {
        Self {
            operation_name: None,
            max_retries: None,
            time_budget: None,
            delay_between: Duration::ZERO,
            abort_if: None,
        }
    }
}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("operation_name", &self.operation_name)
            .field("max_retries", &self.max_retries)
            .field("time_budget", &self.time_budget)
            .field("delay_between", &self.delay_between)
            .field("abort_if", &self.abort_if.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl<E> RetryPolicy<E> {
    /// Unbounded policy: no limit, no budget, no delay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `retry.max_retries`, `retry.time_budget_ms` and `retry.delay_ms`;
    /// each is optional.
    pub fn from_settings(settings: &dyn Settings) -> Result<Self> {
        let mut policy = Self::new();
        policy.max_retries = parse_optional(settings, RETRY_MAX_RETRIES_KEY)?;
        policy.time_budget =
            parse_optional::<u64>(settings, RETRY_TIME_BUDGET_MS_KEY)?.map(Duration::from_millis);
        if let Some(delay) = parse_optional::<u64>(settings, RETRY_DELAY_MS_KEY)? {
            policy.delay_between = Duration::from_millis(delay);
        }
        Ok(policy)
    }

    /// Label used in log lines.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    /// Retries allowed after the first attempt.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Give up once this much time has passed since the first attempt.
    pub fn time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    /// Pause between a failure and the next attempt.
    pub fn delay_between(mut self, delay: Duration) -> Self {
        self.delay_between = delay;
        self
    }

    /// Stop immediately on errors for which `predicate` returns true.
    pub fn abort_if(mut self, predicate: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        self.abort_if = Some(Box::new(predicate));
        self
    }

    fn should_stop(&self, failures: u32, elapsed: Duration, error: &E) -> bool {
        self.max_retries.is_some_and(|max| failures > max)
            || self.time_budget.is_some_and(|budget| elapsed > budget)
            || self.abort_if.as_ref().is_some_and(|abort| abort(error))
    }

    fn budget_ratio(&self, elapsed: Duration) -> String {
        match self.time_budget {
            Some(budget) => format!("{}/{} ms", elapsed.as_millis(), budget.as_millis()),
            None => format!("{} ms/unbounded", elapsed.as_millis()),
        }
    }
}

/// Re-runs an operation until it succeeds or its policy says stop.
#[derive(Clone)]
pub struct RetryExecutor {
    logger: Arc<dyn Logger>,
}

impl fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor").finish_non_exhaustive()
    }
}

impl RetryExecutor {
    /// Executor that reports progress to `logger`.
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self { logger }
    }

    /// Runs `operation` under `policy`.
    ///
    /// The error returned on giving up is the last one produced, unchanged;
    /// earlier errors are only logged.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use std::sync::Arc;
    /// use std::time::Duration;
    ///
    /// use remotecall_http::{HttpClient, RetryExecutor, RetryPolicy, TracingLogger};
    ///
    /// # async fn run(client: &HttpClient) -> remotecall_http::Result<()> {
    /// let retry = RetryExecutor::new(Arc::new(TracingLogger));
    /// let output = retry
    ///     .run(
    ///         || client.get("/health"),
    ///         RetryPolicy::new()
    ///             .named("health")
    ///             .max_retries(3)
    ///             .delay_between(Duration::from_millis(200)),
    ///     )
    ///     .await?;
    /// println!("{}", output.data());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run<F, Fut, T, E>(
        &self,
        mut operation: F,
        policy: RetryPolicy<E>,
    ) -> std::result::Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: fmt::Display,
    {
        let started = Instant::now();
        let name = policy.operation_name.as_deref();
        let label = name.unwrap_or("operation");
        let mut attempt: u32 = 0;

        loop {
            attempt = attempt.saturating_add(1);
            match operation().await {
                Ok(value) => {
                    let elapsed = started.elapsed();
                    self.logger.success(
                        &format!("{label} succeeded on attempt {attempt}"),
                        LogOptions::operation(name).with_elapsed(elapsed),
                    );
                    return Ok(value);
                }
                Err(error) => {
                    let elapsed = started.elapsed();
                    if policy.should_stop(attempt, elapsed, &error) {
                        self.logger.debug(&format!(
                            "{label} giving up after {attempt} attempt(s) ({}): {error}",
                            policy.budget_ratio(elapsed)
                        ));
                        return Err(error);
                    }

                    self.logger.warning(
                        &format!(
                            "{label} attempt {attempt} failed ({}): {error}; retrying in {} ms",
                            policy.budget_ratio(elapsed),
                            policy.delay_between.as_millis()
                        ),
                        LogOptions::operation(name).with_elapsed(elapsed),
                    );
                    if !policy.delay_between.is_zero() {
                        tokio::time::sleep(policy.delay_between).await;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::{RetryExecutor, RetryPolicy};
    use crate::logger::testing::{Level, RecordingLogger};
    use crate::settings::{RETRY_DELAY_MS_KEY, RETRY_MAX_RETRIES_KEY};
    use crate::NoopLogger;

    #[derive(Debug, PartialEq, Eq)]
    struct OpError {
        code: &'static str,
        attempt: usize,
    }

    impl std::fmt::Display for OpError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{} on attempt {}", self.code, self.attempt)
        }
    }

    fn executor() -> RetryExecutor {
        RetryExecutor::new(Arc::new(NoopLogger))
    }

    #[tokio::test]
    async fn success_on_first_attempt() {
        let result = executor()
            .run(|| async { Ok::<_, OpError>(42) }, RetryPolicy::new().max_retries(3))
            .await;
        assert_eq!(result, Ok(42));
    }

    #[tokio::test]
    async fn max_retries_bounds_invocations_and_returns_last_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let result = executor()
            .run(
                || {
                    let counter = Arc::clone(&counter);
                    async move {
                        let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
                        Err::<(), _>(OpError {
                            code: "BUSY",
                            attempt,
                        })
                    }
                },
                RetryPolicy::new().max_retries(3),
            )
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(
            result,
            Err(OpError {
                code: "BUSY",
                attempt: 4
            })
        );
    }

    #[tokio::test]
    async fn zero_retries_means_single_attempt() {
        let calls = AtomicUsize::new(0);
        let result = executor()
            .run(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>("nope") }
                },
                RetryPolicy::new().max_retries(0),
            )
            .await;
        assert_eq!(result, Err("nope"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn abort_predicate_stops_immediately() {
        let calls = AtomicUsize::new(0);
        let result = executor()
            .run(
                || {
                    let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    async move {
                        Err::<(), _>(OpError {
                            code: "FATAL",
                            attempt,
                        })
                    }
                },
                RetryPolicy::new()
                    .max_retries(10)
                    .abort_if(|err: &OpError| err.code == "FATAL"),
            )
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.map_err(|e| e.code), Err("FATAL"));
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let calls = AtomicUsize::new(0);
        let logger = Arc::new(RecordingLogger::default());
        let result = RetryExecutor::new(logger.clone())
            .run(
                || {
                    let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    async move {
                        if attempt < 3 {
                            Err(format!("connection reset #{attempt}"))
                        } else {
                            Ok("done")
                        }
                    }
                },
                RetryPolicy::new().named("sync-users").max_retries(5),
            )
            .await;

        assert_eq!(result, Ok("done"));
        let warnings = logger.at(Level::Warning);
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].starts_with("sync-users attempt 1 failed"));
        assert!(warnings[1].contains("connection reset #2"));
        assert_eq!(
            logger.at(Level::Success),
            vec!["sync-users succeeded on attempt 3".to_owned()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn time_budget_stops_retrying() {
        let calls = AtomicUsize::new(0);
        let result = executor()
            .run(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>("slow down") }
                },
                RetryPolicy::new()
                    .time_budget(Duration::from_millis(250))
                    .delay_between(Duration::from_millis(100)),
            )
            .await;

        assert_eq!(result, Err("slow down"));
        // Failures at 0, 100, 200 and 300 ms; the last one is past the budget.
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_policy_keeps_retrying() {
        let calls = AtomicUsize::new(0);
        let executor = executor();
        let run = executor.run(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>("down") }
            },
            RetryPolicy::new().delay_between(Duration::from_millis(10)),
        );

        let outcome = tokio::time::timeout(Duration::from_secs(1), run).await;
        assert!(outcome.is_err(), "an unbounded policy never gives up on its own");
        assert!(calls.load(Ordering::SeqCst) >= 50);
    }

    #[test]
    fn policy_from_settings() {
        let settings = HashMap::from([
            (RETRY_MAX_RETRIES_KEY.to_owned(), "2".to_owned()),
            (RETRY_DELAY_MS_KEY.to_owned(), "25".to_owned()),
        ]);
        let policy = RetryPolicy::<String>::from_settings(&settings).expect("valid settings");
        assert_eq!(policy.max_retries, Some(2));
        assert_eq!(policy.time_budget, None);
        assert_eq!(policy.delay_between, Duration::from_millis(25));

        let bad = HashMap::from([(RETRY_MAX_RETRIES_KEY.to_owned(), "-1".to_owned())]);
        assert!(RetryPolicy::<String>::from_settings(&bad).is_err());
    }
}

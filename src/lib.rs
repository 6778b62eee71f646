//! `remotecall-http` is an async HTTP call layer with a generic retry executor.
//!
//! - [`HttpClient`] composes requests from a per-instance
//!   [`ClientConfiguration`], races each call against its timeout and turns
//!   every failure into a [`NormalizedError`].
//! - [`RetryExecutor`] re-runs any fallible async operation under a
//!   [`RetryPolicy`] (attempt limit, time budget, abort predicate, delay).
//!
//! Settings and logging are injected through the [`Settings`] and
//! [`Logger`] traits; network I/O goes through [`Transport`].

mod client;
mod compose;
mod error;
mod logger;
mod options;
mod retry;
pub mod settings;
mod transport;
mod types;
pub mod user_agent;

pub use client::HttpClient;
pub use error::{ErrorCategory, HttpCallError, NormalizedError};
pub use logger::{LogOptions, Logger, NoopLogger, TracingLogger};
pub use options::{ClientConfiguration, ReturnMode, StatusValidator, TlsIdentity};
pub use retry::{RetryExecutor, RetryPolicy};
pub use settings::{EnvSettings, HttpDefaults, Settings};
pub use transport::{ReqwestTransport, Transport, TransportFailure, TransportResponse};
pub use types::{CallOutput, RequestDescriptor, ResolvedBody, ResolvedRequest, Response};

pub type Result<T> = std::result::Result<T, HttpCallError>;

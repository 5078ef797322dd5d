//! `guarded-fetch` wraps an async request/response transport with a
//! per-attempt deadline, caller-driven cancellation and status-aware
//! retries.
//!
//! Entry points:
//! - [`execute`] for one-off calls over the default reqwest transport
//! - [`Fetcher`] / [`create_executor`] for calls sharing instance defaults
//!
//! Both return a [`FetchCall`]; awaiting one of its accessors
//! ([`FetchCall::json`], [`FetchCall::text`], [`FetchCall::form_data`],
//! [`FetchCall::array_buffer`], [`FetchCall::binary`]) runs the attempts
//! and decodes the final body.

mod body;
mod client;
mod decode;
mod error;
mod executor;
mod guard;
mod options;
mod request;
mod response;
mod retry;
mod transport;

pub use body::Body;
pub use client::{create_executor, Fetcher, FetcherDefaults};
pub use error::{BoxError, ErrorKind, FetchError, TransportError};
pub use executor::{execute, FetchCall};
pub use guard::run_with_deadline;
pub use options::{FetchOptions, Retry, RetryPolicy, DEFAULT_RETRYABLE_STATUSES, DEFAULT_TIMEOUT_MS};
pub use request::{PreparedRequest, RequestInit};
pub use response::{BinaryBody, FormData, FormValue, Response};
pub use retry::should_retry;
pub use transport::{ReqwestTransport, Transport};

pub use reqwest::{header, Method, StatusCode};
pub use tokio_util::sync::CancellationToken;

pub type Result<T> = std::result::Result<T, FetchError>;

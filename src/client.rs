use std::fmt;
use std::sync::Arc;

use reqwest::header::{self, HeaderValue};

use crate::{
    FetchCall, FetchOptions, ReqwestTransport, RequestInit, Retry, RetryPolicy, Transport,
};

/// Instance-level defaults applied under every call made by a [`Fetcher`].
#[derive(Clone, Debug, Default)]
pub struct FetcherDefaults {
    /// Method, headers (credentials included) and body used when a call
    /// leaves them unset.
    pub init: RequestInit,
    pub options: FetchOptions,
}

impl FetcherDefaults {
    pub fn with_base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.options.base_uri = Some(base_uri.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.options.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_retry(mut self, retry: impl Into<Retry>) -> Self {
        self.options.retry = Some(retry.into());
        self
    }

    pub fn with_init(mut self, init: RequestInit) -> Self {
        self.init = init;
        self
    }
}

/// Returns a [`Fetcher`] over the default reqwest transport.
pub fn create_executor(defaults: FetcherDefaults) -> Fetcher {
    Fetcher::new(defaults)
}

/// Pre-configured executor: layers per-call init and options over instance
/// defaults and hands the result to [`FetchCall`].
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    defaults: FetcherDefaults,
}

impl fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut headers = self.defaults.init.headers.clone();
        if headers.contains_key(header::AUTHORIZATION) {
            headers.insert(header::AUTHORIZATION, HeaderValue::from_static("<redacted>"));
        }
        f.debug_struct("Fetcher")
            .field("method", &self.defaults.init.method)
            .field("headers", &headers)
            .field("options", &self.defaults.options)
            .finish()
    }
}

impl Fetcher {
    pub fn new(defaults: FetcherDefaults) -> Self {
        Self::with_transport(Arc::new(ReqwestTransport::new()), defaults)
    }

    /// Creates a fetcher over a caller-provided transport.
    pub fn with_transport(transport: Arc<dyn Transport>, defaults: FetcherDefaults) -> Self {
        Self {
            transport,
            defaults,
        }
    }

    /// Creates a fetcher from environment variables.
    ///
    /// Reads:
    /// - `FETCH_BASE_URI`: prefix for every request target (optional)
    /// - `FETCH_TIMEOUT_MS`: per-attempt deadline (optional)
    /// - `FETCH_MAX_RETRIES`: retries after the first attempt with the
    ///   default retryable statuses; `0` disables retrying (optional)
    ///
    /// Returns an error if a numeric variable does not parse.
    pub fn from_env() -> std::result::Result<Self, String> {
        Ok(Self::new(defaults_from_lookup(|key| std::env::var(key).ok())?))
    }

    pub fn defaults(&self) -> &FetcherDefaults {
        &self.defaults
    }

    /// Prepares a call to `target`; nothing is sent until an accessor of the
    /// returned [`FetchCall`] is awaited.
    pub fn execute(&self, target: &str, init: RequestInit, options: FetchOptions) -> FetchCall {
        let init = init.merged_over(&self.defaults.init);
        let options = options.merged_over(&self.defaults.options);
        FetchCall::new(self.transport.clone(), target, init, options)
    }

    pub fn get(&self, target: &str) -> FetchCall {
        self.execute(target, RequestInit::get(), FetchOptions::default())
    }
}

fn defaults_from_lookup<F>(lookup: F) -> std::result::Result<FetcherDefaults, String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut defaults = FetcherDefaults::default();

    if let Some(base_uri) = lookup("FETCH_BASE_URI").filter(|value| !value.trim().is_empty()) {
        defaults = defaults.with_base_uri(base_uri.trim());
    }
    if let Some(timeout) = lookup("FETCH_TIMEOUT_MS") {
        let timeout_ms = timeout
            .trim()
            .parse::<u64>()
            .map_err(|err| format!("invalid FETCH_TIMEOUT_MS '{timeout}': {err}"))?;
        defaults = defaults.with_timeout_ms(timeout_ms);
    }
    if let Some(retries) = lookup("FETCH_MAX_RETRIES") {
        let max_attempts = retries
            .trim()
            .parse::<u32>()
            .map_err(|err| format!("invalid FETCH_MAX_RETRIES '{retries}': {err}"))?;
        defaults = if max_attempts == 0 {
            defaults.with_retry(Retry::Disabled)
        } else {
            defaults.with_retry(RetryPolicy {
                max_attempts,
                ..RetryPolicy::default()
            })
        };
    }

    Ok(defaults)
}

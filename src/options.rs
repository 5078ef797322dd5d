use std::collections::BTreeSet;

use serde::Deserialize;

/// Deadline applied to each attempt when none is configured.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Statuses retried by [`RetryPolicy::default`]:
/// 408, 429, 500, 502, 503 and 504.
pub const DEFAULT_RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Configures which failures are retried and how often.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt.
    pub max_attempts: u32,
    /// Status codes that make a failed response eligible for a retry.
    pub retryable_statuses: BTreeSet<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            retryable_statuses: DEFAULT_RETRYABLE_STATUSES.into_iter().collect(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, retryable_statuses: impl IntoIterator<Item = u16>) -> Self {
        Self {
            max_attempts,
            retryable_statuses: retryable_statuses.into_iter().collect(),
        }
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }
}

/// Retry switch: either disabled outright or governed by a [`RetryPolicy`].
///
/// Deserializes from a boolean (`false` disables, `true` selects the default
/// policy) or from a policy table.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Retry {
    Disabled,
    Enabled(RetryPolicy),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RetryRepr {
    Flag(bool),
    Policy(RetryPolicy),
}

impl<'de> Deserialize<'de> for Retry {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(match RetryRepr::deserialize(deserializer)? {
            RetryRepr::Flag(false) => Self::Disabled,
            RetryRepr::Flag(true) => Self::default(),
            RetryRepr::Policy(policy) => Self::Enabled(policy),
        })
    }
}

impl Default for Retry {
    fn default() -> Self {
        Self::Enabled(RetryPolicy::default())
    }
}

impl From<RetryPolicy> for Retry {
    fn from(policy: RetryPolicy) -> Self {
        Self::Enabled(policy)
    }
}

impl Retry {
    pub fn policy(&self) -> Option<&RetryPolicy> {
        match self {
            Self::Disabled => None,
            Self::Enabled(policy) => Some(policy),
        }
    }
}

/// Per-call or per-instance execution options.
///
/// Every field is optional so that per-call options can be layered over
/// instance defaults with [`FetchOptions::merged_over`]; unset fields fall
/// back to [`DEFAULT_TIMEOUT_MS`] and [`RetryPolicy::default`].
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchOptions {
    /// Prefix concatenated in front of every request target.
    pub base_uri: Option<String>,
    /// Per-attempt deadline in milliseconds.
    pub timeout_ms: Option<u64>,
    pub retry: Option<Retry>,
}

impl FetchOptions {
    pub fn with_base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.base_uri = Some(base_uri.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_retry(mut self, retry: impl Into<Retry>) -> Self {
        self.retry = Some(retry.into());
        self
    }

    pub fn without_retry(mut self) -> Self {
        self.retry = Some(Retry::Disabled);
        self
    }

    /// Layers `self` over `defaults`: fields set here win.
    pub fn merged_over(self, defaults: &FetchOptions) -> FetchOptions {
        FetchOptions {
            base_uri: self.base_uri.or_else(|| defaults.base_uri.clone()),
            timeout_ms: self.timeout_ms.or(defaults.timeout_ms),
            retry: self.retry.or_else(|| defaults.retry.clone()),
        }
    }

    pub fn effective_timeout_ms(&self) -> u64 {
        self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)
    }

    pub fn effective_retry(&self) -> Retry {
        self.retry.clone().unwrap_or_default()
    }

    /// Resolves a request target against [`FetchOptions::base_uri`].
    ///
    /// Plain concatenation; no slash or path normalization happens.
    pub fn resolve_target(&self, target: &str) -> String {
        match &self.base_uri {
            Some(base) => format!("{base}{target}"),
            None => target.to_owned(),
        }
    }
}

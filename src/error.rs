use crate::{PreparedRequest, Response};

/// Boxed error produced by a transport implementation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Coarse classification of a [`FetchError`], for callers that only care
/// about which kind of failure happened.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorKind {
    Status,
    Timeout,
    Aborted,
    Transport,
    Decode,
}

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The server answered with a status outside the success range.
    ///
    /// Carries the request that was sent and the buffered response so the
    /// caller can inspect both.
    #[error("server responded with status {}", .response.status())]
    Status {
        request: Box<PreparedRequest>,
        response: Box<Response>,
    },
    /// The deadline elapsed before the transport settled.
    #[error("no response within {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
    /// The caller's cancellation signal fired, or the transport aborted.
    #[error("the operation was aborted")]
    Aborted,
    /// Network-level failure (DNS, connection refused, reset, ...).
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),
    /// The final response body could not be decoded as requested.
    #[error("decode error: {0}")]
    Decode(String),
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Status { .. } => ErrorKind::Status,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Aborted => ErrorKind::Aborted,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Decode(_) => ErrorKind::Decode,
        }
    }

    /// Status code of the failed response, for [`FetchError::Status`] only.
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            Self::Status { response, .. } => Some(response.status()),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }

    pub fn is_aborted(&self) -> bool {
        self.kind() == ErrorKind::Aborted
    }
}

/// Rejection reported by a [`Transport`](crate::Transport).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The attempt's cancellation token fired while the call was in flight.
    #[error("the operation was aborted")]
    Aborted,
    #[error("network error: {0}")]
    Network(#[source] BoxError),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(Box::new(err))
    }
}

impl From<TransportError> for FetchError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Aborted => Self::Aborted,
            TransportError::Network(inner) => Self::Transport(inner),
        }
    }
}

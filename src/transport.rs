use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{PreparedRequest, Response, TransportError};

/// The request/response primitive wrapped by the executor.
///
/// Implementations perform exactly one exchange per call and should stop
/// work and return [`TransportError::Aborted`] once `cancel` fires.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: PreparedRequest,
        cancel: CancellationToken,
    ) -> Result<Response, TransportError>;
}

/// [`Transport`] backed by a [`reqwest::Client`].
///
/// The whole body is buffered before the response is returned, so the
/// attempt deadline covers both the headers and the payload.
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport").finish_non_exhaustive()
    }
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an already configured client (proxies, TLS roots, pools).
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Builds a client whose connect phase is bounded by `connect_timeout_ms`.
    pub fn with_connect_timeout(connect_timeout_ms: u64) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(connect_timeout_ms))
            .build()?;
        Ok(Self { http })
    }

    async fn exchange(&self, request: PreparedRequest) -> Result<Response, TransportError> {
        let mut builder = self
            .http
            .request(request.method().clone(), request.uri())
            .headers(request.headers().clone());
        if let Some(body) = request.body() {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        Ok(Response::with_headers(status, headers, body))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: PreparedRequest,
        cancel: CancellationToken,
    ) -> Result<Response, TransportError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(TransportError::Aborted),
            result = self.exchange(request) => result,
        }
    }
}

use std::fmt;
use std::sync::{Arc, OnceLock};

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::{
    guard::run_with_deadline, retry::should_retry, BinaryBody, FetchError, FetchOptions, FormData,
    PreparedRequest, ReqwestTransport, RequestInit, Response, Result, Retry, Transport,
};

const ACCEPT_JSON: &str = "application/json";
const ACCEPT_TEXT: &str = "text/*";
const ACCEPT_FORM_DATA: &str = "multipart/form-data";
const ACCEPT_ANY: &str = "*/*";

/// Executes a request over a process-wide [`ReqwestTransport`].
///
/// Nothing is sent until one of the [`FetchCall`] accessors is awaited.
///
/// ```no_run
/// # async fn run() -> guarded_fetch::Result<()> {
/// use guarded_fetch::{execute, FetchOptions, RequestInit};
///
/// let users: serde_json::Value = execute(
///     "/api/v1/users/1",
///     RequestInit::get(),
///     FetchOptions::default().with_base_uri("https://example.com"),
/// )
/// .json()
/// .await?;
/// # let _ = users;
/// # Ok(())
/// # }
/// ```
pub fn execute(target: &str, init: RequestInit, options: FetchOptions) -> FetchCall {
    static SHARED: OnceLock<Arc<ReqwestTransport>> = OnceLock::new();
    let transport = SHARED.get_or_init(|| Arc::new(ReqwestTransport::new()));
    FetchCall::new(transport.clone(), target, init, options)
}

/// A prepared request whose accessors each drive one logical call: attempts
/// under a deadline, retries per policy, then decoding of the final body.
///
/// Every accessor invocation is an independent logical call with its own
/// attempt counter and cancellation token; nothing carries over between
/// them except the request template.
#[derive(Clone)]
pub struct FetchCall {
    transport: Arc<dyn Transport>,
    template: PreparedRequest,
    signal: Option<CancellationToken>,
    timeout_ms: u64,
    retry: Retry,
}

impl fmt::Debug for FetchCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchCall")
            .field("method", self.template.method())
            .field("uri", &self.template.uri())
            .field("timeout_ms", &self.timeout_ms)
            .field("retry", &self.retry)
            .field("has_signal", &self.signal.is_some())
            .finish()
    }
}

impl FetchCall {
    pub fn new(
        transport: Arc<dyn Transport>,
        target: &str,
        init: RequestInit,
        options: FetchOptions,
    ) -> Self {
        let uri = options.resolve_target(target);
        let (template, signal) = PreparedRequest::from_init(uri, init);
        Self {
            transport,
            template,
            signal,
            timeout_ms: options.effective_timeout_ms(),
            retry: options.effective_retry(),
        }
    }

    /// Request template every attempt is cloned from.
    pub fn request(&self) -> &PreparedRequest {
        &self.template
    }

    /// Runs the call with `accept: application/json` and decodes the body.
    pub async fn json<T: DeserializeOwned>(&self) -> Result<T> {
        self.run(Some(ACCEPT_JSON)).await?.json()
    }

    /// Runs the call with `accept: text/*` and decodes the body as text.
    pub async fn text(&self) -> Result<String> {
        Ok(self.run(Some(ACCEPT_TEXT)).await?.text())
    }

    /// Runs the call with `accept: multipart/form-data` and decodes a form.
    pub async fn form_data(&self) -> Result<FormData> {
        self.run(Some(ACCEPT_FORM_DATA)).await?.form_data()
    }

    pub async fn array_buffer(&self) -> Result<Vec<u8>> {
        Ok(self.run(Some(ACCEPT_ANY)).await?.array_buffer())
    }

    pub async fn binary(&self) -> Result<BinaryBody> {
        Ok(self.run(Some(ACCEPT_ANY)).await?.binary())
    }

    /// Runs the call without touching the `accept` header and returns the
    /// raw response.
    pub async fn send(&self) -> Result<Response> {
        self.run(None).await
    }

    async fn run(&self, accept: Option<&'static str>) -> Result<Response> {
        let mut template = self.template.clone();
        if let Some(accept) = accept {
            template.set_accept(accept);
        }

        // Linking through a child token subscribes to the caller's signal
        // once for the whole call; dropping it unsubscribes.
        let call_token = match &self.signal {
            Some(signal) => signal.child_token(),
            None => CancellationToken::new(),
        };

        let mut attempts_made = 0u32;
        loop {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                method = %template.method(),
                uri = template.uri(),
                attempt = attempts_made + 1,
                "sending request"
            );

            let request = template.clone();
            // Cancelling the call token reaches this attempt; a timeout only
            // cancels the attempt, leaving later attempts usable.
            let attempt = call_token.child_token();
            let error = match run_with_deadline(
                self.transport.as_ref(),
                request.clone(),
                self.timeout_ms,
                &attempt,
            )
            .await
            {
                Ok(response) if response.is_success() => return Ok(response),
                Ok(response) => FetchError::Status {
                    request: Box::new(request),
                    response: Box::new(response),
                },
                Err(err) => err,
            };

            if !should_retry(&error, &self.retry, attempts_made) {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    kind = ?error.kind(),
                    attempts = attempts_made + 1,
                    "request failed: {error}"
                );
                return Err(error);
            }

            attempts_made += 1;
            #[cfg(feature = "tracing")]
            tracing::debug!(retry = attempts_made, "retrying request after {error}");
        }
    }
}

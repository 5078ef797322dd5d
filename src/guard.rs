//! Per-attempt deadline enforcement.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::{FetchError, PreparedRequest, Response, Result, Transport};

/// Runs one attempt against `transport`, bounded by `timeout_ms`.
///
/// `attempt` must be a token dedicated to this attempt, usually a child of
/// the call token. The three outcomes race:
/// - the transport settles first: its result is returned unchanged and the
///   timer is dropped with the losing branch;
/// - the deadline elapses first: `attempt` is cancelled so the transport can
///   stop, and [`FetchError::Timeout`] is returned;
/// - `attempt` is cancelled from outside first (the caller's signal fired):
///   [`FetchError::Aborted`] is returned, never reclassified as a timeout.
pub async fn run_with_deadline(
    transport: &dyn Transport,
    request: PreparedRequest,
    timeout_ms: u64,
    attempt: &CancellationToken,
) -> Result<Response> {
    let deadline = tokio::time::sleep(Duration::from_millis(timeout_ms));
    let call = transport.send(request, attempt.clone());

    tokio::select! {
        biased;

        _ = attempt.cancelled() => {
            #[cfg(feature = "tracing")]
            tracing::debug!("attempt aborted by cancellation signal");
            Err(FetchError::Aborted)
        }
        result = call => result.map_err(FetchError::from),
        _ = deadline => {
            attempt.cancel();
            #[cfg(feature = "tracing")]
            tracing::debug!(timeout_ms, "attempt deadline elapsed");
            Err(FetchError::Timeout { timeout_ms })
        }
    }
}

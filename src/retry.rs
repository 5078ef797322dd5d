//! Decides whether a failed attempt is worth repeating.

use crate::{FetchError, Retry};

/// Returns `true` when `error` may be retried given `attempts_made` retries
/// so far.
///
/// Timeouts are always eligible and status failures are eligible when the
/// policy lists their code. Aborts, network failures and decode errors never
/// are. A disabled policy or an exhausted budget short-circuits to `false`.
pub fn should_retry(error: &FetchError, retry: &Retry, attempts_made: u32) -> bool {
    let Some(policy) = retry.policy() else {
        return false;
    };
    if attempts_made >= policy.max_attempts {
        return false;
    }

    match error {
        FetchError::Timeout { .. } => true,
        FetchError::Status { response, .. } => {
            policy.is_retryable_status(response.status().as_u16())
        }
        FetchError::Aborted | FetchError::Transport(_) | FetchError::Decode(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use reqwest::{Method, StatusCode};

    use super::should_retry;
    use crate::{FetchError, PreparedRequest, Response, Retry, RetryPolicy};

    fn status_error(status: StatusCode) -> FetchError {
        FetchError::Status {
            request: Box::new(PreparedRequest::new(Method::GET, "https://x/")),
            response: Box::new(Response::new(status, "")),
        }
    }

    #[test]
    fn disabled_policy_never_retries() {
        let timeout = FetchError::Timeout { timeout_ms: 1 };
        assert!(!should_retry(&timeout, &Retry::Disabled, 0));
        assert!(!should_retry(
            &status_error(StatusCode::INTERNAL_SERVER_ERROR),
            &Retry::Disabled,
            0
        ));
    }

    #[test]
    fn timeout_is_retried_while_budget_remains() {
        let retry = Retry::Enabled(RetryPolicy::new(2, []));
        let timeout = FetchError::Timeout { timeout_ms: 1 };
        assert!(should_retry(&timeout, &retry, 0));
        assert!(should_retry(&timeout, &retry, 1));
        assert!(!should_retry(&timeout, &retry, 2));
    }

    #[test]
    fn status_retry_follows_policy_set() {
        let retry = Retry::default();
        for status in [408, 429, 500, 502, 503, 504] {
            let status = StatusCode::from_u16(status).unwrap();
            assert!(should_retry(&status_error(status), &retry, 0), "{status}");
        }
        assert!(!should_retry(&status_error(StatusCode::NOT_FOUND), &retry, 0));
        assert!(!should_retry(&status_error(StatusCode::NOT_IMPLEMENTED), &retry, 0));
    }

    #[test]
    fn aborts_and_network_failures_are_never_retried() {
        let retry = Retry::default();
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(!should_retry(&FetchError::Aborted, &retry, 0));
        assert!(!should_retry(&FetchError::Transport(Box::new(io)), &retry, 0));
        assert!(!should_retry(&FetchError::Decode("x".to_owned()), &retry, 0));
    }

    #[test]
    fn zero_max_attempts_disables_retries() {
        let retry = Retry::Enabled(RetryPolicy::new(0, [500]));
        assert!(!should_retry(
            &status_error(StatusCode::INTERNAL_SERVER_ERROR),
            &retry,
            0
        ));
    }
}

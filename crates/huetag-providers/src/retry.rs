//! Retry with exponential back-off for provider calls.
//!
//! [`retry_with_backoff`] wraps any fallible async operation. Every failure is
//! treated as transient (network errors, 5xx, timeouts, malformed model
//! output) except credential failures, which stop after the first attempt.

use std::future::Future;
use std::time::Duration;

use crate::error::ProviderError;

/// Substrings that mark an error as a credential problem.
/// Status codes are matched on [`ProviderError::Status`] only; these are
/// searched for in the error text.
const PERMANENT_MARKERS: &[&str] = &[
    "unauthorized",
    "forbidden",
    "invalid api key",
    "invalid x-api-key",
];

const MAX_DELAY_MS: u64 = 60_000;

/// Attempt budget and first back-off delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_base_ms: 1_000,
        }
    }
}

impl RetryPolicy {
    /// Delay slept after failed attempt `attempt` (1-based): base × 2^(attempt-1),
    /// capped at 60 s.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(
            self.backoff_base_ms
                .saturating_mul(factor)
                .min(MAX_DELAY_MS),
        )
    }
}

/// Returns `true` for authorization/credential failures that retrying cannot fix.
#[must_use]
pub fn is_permanent(err: &ProviderError) -> bool {
    if matches!(err, ProviderError::MissingApiKey(_)) {
        return true;
    }
    if let ProviderError::Status { status, .. } = err {
        if *status == 401 || *status == 403 {
            return true;
        }
    }
    let message = err.to_string().to_lowercase();
    PERMANENT_MARKERS.iter().any(|m| message.contains(m))
}

/// Runs `operation` up to `policy.max_attempts` times.
///
/// Back-off schedule with the default policy:
///
/// | Failed attempt | Sleep before next attempt |
/// |----------------|---------------------------|
/// | 1              | 1 000 ms                  |
/// | 2              | 2 000 ms                  |
/// | 3              | 4 000 ms                  |
/// | 4              | 8 000 ms                  |
/// | 5              | (gives up)                |
///
/// Permanent errors are returned immediately.
///
/// # Errors
///
/// Returns the last error once the budget is spent, or the first permanent error.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: RetryPolicy,
    label: &str,
    mut operation: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if is_permanent(&err) {
                    tracing::warn!(provider = label, attempt, error = %err, "permanent provider error, not retrying");
                    return Err(err);
                }
                if attempt >= policy.max_attempts {
                    tracing::warn!(provider = label, attempt, error = %err, "provider retry budget exhausted");
                    return Err(err);
                }
                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    provider = label,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "transient provider error, retrying after back-off"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    const FAST: RetryPolicy = RetryPolicy {
        max_attempts: 5,
        backoff_base_ms: 0,
    };

    fn server_error() -> ProviderError {
        ProviderError::Status {
            status: 503,
            body: "overloaded".to_owned(),
        }
    }

    #[test]
    fn delay_doubles_from_base() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_millis(1_000));
        assert_eq!(policy.delay_after(2), Duration::from_millis(2_000));
        assert_eq!(policy.delay_after(4), Duration::from_millis(8_000));
        assert_eq!(policy.delay_after(30), Duration::from_millis(MAX_DELAY_MS));
    }

    #[test]
    fn auth_failures_are_permanent() {
        assert!(is_permanent(&ProviderError::Status {
            status: 401,
            body: String::new(),
        }));
        assert!(is_permanent(&ProviderError::Status {
            status: 400,
            body: "Invalid API Key provided".to_owned(),
        }));
        assert!(is_permanent(&ProviderError::EmptyResponse(
            "Forbidden by upstream".to_owned()
        )));
        assert!(is_permanent(&ProviderError::MissingApiKey(
            huetag_core::ProviderFamily::Groq
        )));
    }

    #[test]
    fn missing_key_is_permanent_by_variant() {
        let err = ProviderError::MissingApiKey(huetag_core::ProviderFamily::Groq);
        assert_eq!(err.to_string(), "no API key configured for groq");
        assert!(is_permanent(&err));
    }

    #[test]
    fn status_codes_in_body_text_stay_transient() {
        assert!(!is_permanent(&ProviderError::Status {
            status: 502,
            body: "upstream failed, request id req_40135".to_owned(),
        }));
        assert!(!is_permanent(&ProviderError::EmptyResponse(
            "trace 4031".to_owned()
        )));
        assert!(is_permanent(&ProviderError::Status {
            status: 403,
            body: String::new(),
        }));
    }

    #[test]
    fn server_and_parse_failures_are_transient() {
        assert!(!is_permanent(&server_error()));
        assert!(!is_permanent(&ProviderError::Output(
            huetag_core::TagParseError::NoJsonObject
        )));
    }

    #[tokio::test]
    async fn succeeds_immediately_on_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(FAST, "test", || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, ProviderError>(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(FAST, "test", || {
            let c = Arc::clone(&c);
            async move {
                let attempt = c.fetch_add(1, Ordering::SeqCst) + 1;
                if attempt < 3 {
                    Err(server_error())
                } else {
                    Ok(99)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 99);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(FAST, "test", || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(server_error())
            }
        })
        .await;
        assert!(matches!(result, Err(ProviderError::Status { status: 503, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn does_not_retry_unauthorized() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(FAST, "test", || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(ProviderError::Status {
                    status: 401,
                    body: "unauthorized".to_owned(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(
            calls.load(Ordering::SeqCst),
            1,
            "credential errors must not be retried"
        );
    }
}

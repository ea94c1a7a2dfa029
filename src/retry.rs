//! Exponential backoff for throttled calls to external services.
//!
//! Only throttling is retried. Any other failure is returned on the spot.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::MonitorError;
use crate::types::config::MonitorConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            base_delay: config.base_delay(),
        }
    }

    /// `base_delay * 2^attempt`, attempt counted from 0.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.min(20))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&MonitorConfig::default())
    }
}

/// Outcome of a single failed attempt.
#[derive(Debug)]
pub enum AttemptError {
    Throttled(String),
    Fatal(MonitorError),
}

/// Whether a response looks like a rate-limit rejection.
pub fn is_throttling(status: u16, body: &str) -> bool {
    status == 429 || body.to_ascii_lowercase().contains("resource exhausted")
}

pub async fn with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    service: &str,
    mut operation: F,
) -> Result<T, MonitorError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut last_error = String::new();

    for attempt in 0..attempts {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(AttemptError::Fatal(e)) => return Err(e),
            Err(AttemptError::Throttled(message)) => {
                last_error = message;
                if attempt + 1 < attempts {
                    let delay = policy.delay_for(attempt);
                    warn!(
                        service,
                        attempt = attempt + 1,
                        delay_secs = delay.as_secs_f64(),
                        "Throttled, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    Err(MonitorError::ExternalServiceFailure {
        service: service.to_string(),
        attempts,
        message: last_error,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn instant(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::ZERO,
        }
    }

    #[test]
    fn delay_doubles_from_base() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(10),
        };
        assert_eq!(policy.delay_for(0), Duration::from_secs(10));
        assert_eq!(policy.delay_for(1), Duration::from_secs(20));
        assert_eq!(policy.delay_for(3), Duration::from_secs(80));
    }

    #[test]
    fn default_policy_matches_config_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_delay, Duration::from_secs(10));
    }

    #[test]
    fn throttling_detection() {
        assert!(is_throttling(429, ""));
        assert!(is_throttling(500, "Resource exhausted, try later"));
        assert!(!is_throttling(400, "error 429 quota"));
        assert!(!is_throttling(502, "request id 84291 failed"));
        assert!(!is_throttling(503, "unavailable"));
    }

    #[tokio::test]
    async fn succeeds_after_throttling() {
        let calls = AtomicU32::new(0);
        let result = with_backoff(&instant(5), "profiles", |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(AttemptError::Throttled("429".into()))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_backoff(&instant(5), "advisor", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AttemptError::Throttled("Resource exhausted".into())) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        match result {
            Err(MonitorError::ExternalServiceFailure { attempts, message, .. }) => {
                assert_eq!(attempts, 5);
                assert_eq!(message, "Resource exhausted");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_backoff(&instant(5), "profiles", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(AttemptError::Fatal(MonitorError::ProfileNotFound {
                    source_id: "s1".into(),
                }))
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(MonitorError::ProfileNotFound { .. })));
    }
}

//! Fixed-count retry with exponential backoff.
//!
//! Both signaling channels run through [`invoke_with_retry`]: every attempt
//! is bounded by the per-call timeout, and the delay before attempt `n + 1`
//! is `base_delay * multiplier^(n - 1)`. No sleep follows the last attempt.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use sipdrain_core::config::RetryConfig;

use crate::error::{SignalError, SignalResult};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_multiplier: f64,
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            call_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            base_delay: cfg.base_delay(),
            backoff_multiplier: cfg.backoff_multiplier,
            call_timeout: cfg.call_timeout(),
        }
    }
}

impl RetryPolicy {
    /// Backoff after the given (1-based) failed attempt. Saturates at
    /// `Duration::MAX`; a NaN multiplier means no backoff.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.backoff_multiplier.powi(exp);
        if secs.is_nan() || secs <= 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

/// Run `call` until it succeeds or the policy's attempts are exhausted.
///
/// `call` receives the 1-based attempt number. The last error is carried
/// inside [`SignalError::Exhausted`].
pub async fn invoke_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut call: F,
) -> SignalResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = SignalResult<T>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut last = None;

    for attempt in 1..=attempts {
        let result = match tokio::time::timeout(policy.call_timeout, call(attempt)).await {
            Ok(result) => result,
            Err(_) => Err(SignalError::Timeout(policy.call_timeout)),
        };

        match result {
            Ok(value) => {
                debug!(operation, attempt, "signaling call succeeded");
                return Ok(value);
            }
            Err(e) => {
                warn!(
                    operation,
                    attempt,
                    max_attempts = attempts,
                    error = %e,
                    "signaling call failed"
                );
                last = Some(e);
                if attempt < attempts {
                    tokio::time::sleep(policy.delay_after(attempt)).await;
                }
            }
        }
    }

    Err(SignalError::Exhausted {
        operation: operation.to_string(),
        attempts,
        last: Box::new(last.unwrap_or(SignalError::Transport("no attempt made".to_string()))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            backoff_multiplier: 2.0,
            call_timeout: Duration::from_millis(200),
        }
    }

    #[test]
    fn delay_doubles_per_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(2), Duration::from_secs(2));
        assert_eq!(policy.delay_after(3), Duration::from_secs(4));
    }

    #[test]
    fn delay_never_panics_on_extreme_multipliers() {
        let huge = RetryPolicy {
            backoff_multiplier: 1e300,
            ..RetryPolicy::default()
        };
        assert_eq!(huge.delay_after(3), Duration::MAX);

        let nan = RetryPolicy {
            backoff_multiplier: f64::NAN,
            ..RetryPolicy::default()
        };
        assert_eq!(nan.delay_after(2), Duration::ZERO);
    }

    #[test]
    fn policy_from_config() {
        let cfg = RetryConfig {
            max_attempts: 5,
            base_delay_ms: 250,
            backoff_multiplier: 3.0,
            call_timeout_ms: 2000,
        };
        let policy = RetryPolicy::from(&cfg);
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_delay, Duration::from_millis(250));
        assert_eq!(policy.delay_after(2), Duration::from_millis(750));
        assert_eq!(policy.call_timeout, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn succeeds_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let out = invoke_with_retry(&fast_policy(3), "test", |_| {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<_, SignalError>(7)
            }
        })
        .await
        .unwrap();

        assert_eq!(out, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recovers_on_third_attempt() {
        let out = invoke_with_retry(&fast_policy(3), "test", |attempt| async move {
            if attempt < 3 {
                Err(SignalError::Status(503))
            } else {
                Ok(attempt)
            }
        })
        .await
        .unwrap();

        assert_eq!(out, 3);
    }

    #[tokio::test]
    async fn exhaustion_reports_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let err = invoke_with_retry(&fast_policy(3), "drain_start", |_| {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(SignalError::Status(500))
            }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match err {
            SignalError::Exhausted { operation, attempts, last } => {
                assert_eq!(operation, "drain_start");
                assert_eq!(attempts, 3);
                assert!(matches!(*last, SignalError::Status(500)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn slow_attempt_times_out() {
        let policy = RetryPolicy {
            call_timeout: Duration::from_millis(10),
            ..fast_policy(2)
        };
        let err = invoke_with_retry(&policy, "slow", |_| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, SignalError>(())
        })
        .await
        .unwrap_err();

        match err {
            SignalError::Exhausted { last, .. } => {
                assert!(matches!(*last, SignalError::Timeout(_)))
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

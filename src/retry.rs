/// Bounded retry for gateway requests
///
/// Gateway calls may fail transiently (timeouts, transport resets). Each call
/// site wraps the request with a fixed small attempt count and a fixed pause;
/// on exhaustion the error is returned so the caller can skip the tick for
/// that ticket without terminating its loop.
use crate::domain::repositories::execution_gateway::{GatewayError, GatewayResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    /// Fixed pause between attempts
    pub pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            pause: Duration::from_millis(250),
        }
    }
}

/// Run `call` until it succeeds, a permanent error is hit, or the attempt
/// budget is exhausted.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut call: F,
) -> GatewayResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = GatewayResult<T>>,
{
    let attempts = policy.attempts.max(1);
    let mut last_error: Option<GatewayError> = None;

    for attempt in 1..=attempts {
        match call().await {
            Ok(value) => {
                if attempt > 1 {
                    warn!("'{}' recovered on attempt {}/{}", operation, attempt, attempts);
                }
                return Ok(value);
            }
            Err(error) if !error.is_recoverable() => return Err(error),
            Err(error) => {
                warn!(
                    "'{}' failed (attempt {}/{}): {}",
                    operation, attempt, attempts, error
                );
                last_error = Some(error);
                if attempt < attempts {
                    sleep(policy.pause).await;
                }
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| GatewayError::Transport(format!("'{}' retries exhausted", operation))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            pause: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_recovers_from_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result = with_retry(&fast_policy(), "modify_stop", || {
            let count = calls_clone.fetch_add(1, Ordering::SeqCst);
            async move {
                if count < 2 {
                    Err(GatewayError::Timeout("simulated".to_string()))
                } else {
                    Ok(42u64)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_attempt_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: GatewayResult<()> = with_retry(&fast_policy(), "close_position", || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            async { Err(GatewayError::Transport("down".to_string())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: GatewayResult<()> = with_retry(&fast_policy(), "place_order", || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            async { Err(GatewayError::OrderRejected("not enough money".to_string())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

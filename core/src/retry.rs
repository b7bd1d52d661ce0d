use std::future::Future;
use std::time::Duration;

use crate::errors::{AssistantError, AssistantResult};

/// Invoke `operation`, retrying on rate-limit errors with doubling delay.
///
/// Only `RateLimited` errors are retried; anything else propagates
/// immediately, as does exhaustion of the retry budget. The delay doubles on
/// each attempt with no jitter and no cap, so callers keep `max_retries`
/// small (2-3) to bound worst-case latency. This wraps exactly one
/// request/response exchange shape; the streaming voice session never goes
/// through it.
pub async fn call_with_retry<T, F, Fut>(
    mut operation: F,
    max_retries: u32,
    initial_delay: Duration,
) -> AssistantResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AssistantResult<T>>,
{
    let mut retries_left = max_retries;
    let mut delay = initial_delay;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_rate_limited() && retries_left > 0 => {
                tracing::warn!(
                    retries_left,
                    delay_ms = delay.as_millis() as u64,
                    "rate limited, backing off before retry"
                );
                tokio::time::sleep(delay).await;
                retries_left -= 1;
                delay *= 2;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn rate_limit_err() -> AssistantError {
        AssistantError::RateLimited {
            message: "quota".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_first_try_calls_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result = call_with_retry(
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, AssistantError>(42)
                }
            },
            2,
            Duration::from_millis(100),
        )
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_rate_limit_calls_at_most_retries_plus_one() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result: AssistantResult<()> = call_with_retry(
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(rate_limit_err())
                }
            },
            2,
            Duration::from_millis(100),
        )
        .await;
        assert!(result.unwrap_err().is_rate_limited());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_rate_limit() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result = call_with_retry(
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(rate_limit_err())
                    } else {
                        Ok("ok")
                    }
                }
            },
            3,
            Duration::from_millis(50),
        )
        .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_rate_limit_errors_propagate_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result: AssistantResult<()> = call_with_retry(
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(AssistantError::Transport("refused".to_string()))
                }
            },
            5,
            Duration::from_millis(100),
        )
        .await;
        assert!(matches!(result, Err(AssistantError::Transport(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_fails_after_single_call() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result: AssistantResult<()> = call_with_retry(
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(rate_limit_err())
                }
            },
            0,
            Duration::from_millis(100),
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

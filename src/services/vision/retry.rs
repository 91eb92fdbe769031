//! Retry of throttled provider calls

use std::{future::Future, time::Duration};

use crate::error::AppResult;

/// Run `op` up to `max_attempts` times. Only throttling errors are retried,
/// waiting `base_delay * attempt` before the next try.
pub async fn with_linear_backoff<T, F, Fut>(
    max_attempts: u32,
    base_delay: Duration,
    mut op: F,
) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Err(e) if e.is_throttled() && attempt < max_attempts => {
                let delay = base_delay * attempt;
                tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, "Throttled, retrying: {}", e);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    };

    const TICK: Duration = Duration::from_millis(1);

    #[tokio::test]
    async fn test_retries_throttled_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = with_linear_backoff(3, TICK, || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(AppError::throttled("test", "slow down"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: AppResult<()> = with_linear_backoff(2, TICK, || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(AppError::throttled("test", "slow down")) }
        })
        .await;

        assert!(result.unwrap_err().is_throttled());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: AppResult<()> = with_linear_backoff(5, TICK, || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(AppError::upstream("test", "HTTP 500")) }
        })
        .await;

        assert!(matches!(result, Err(AppError::Upstream { throttled: false, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let result = with_linear_backoff(0, TICK, || async { Ok::<_, AppError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}

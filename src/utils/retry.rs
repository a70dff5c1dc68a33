// src/utils/retry.rs

use std::time::Duration;

use crate::store::StoreError;

#[derive(Clone)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub base_backoff: Duration,
    pub jitter_max: Option<Duration>,
}

impl Default for RetryConfig {
    /// One transparent retry: enough to ride out a lock conflict.
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_backoff: Duration::from_millis(20),
            jitter_max: Some(Duration::from_millis(30)),
        }
    }
}

/// Re-runs `f` while it fails with a transient store error.
/// Any other error is returned immediately.
pub async fn retry_transient<F, Fut, T>(config: RetryConfig, mut f: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, StoreError>>,
{
    let mut attempts_left = config.max_attempts;
    let mut backoff = config.base_backoff;

    loop {
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient() => {
                attempts_left = attempts_left.saturating_sub(1);
                if attempts_left == 0 {
                    return Err(e);
                }
                tracing::debug!("Retrying after transient store failure: {}", e);

                let extra = match config.jitter_max {
                    Some(jitter) if !jitter.is_zero() => {
                        rand::random::<u64>() % (jitter.as_millis() as u64 + 1)
                    }
                    _ => 0,
                };
                tokio::time::sleep(backoff + Duration::from_millis(extra)).await;
                backoff *= 2;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn quick() -> RetryConfig {
        RetryConfig {
            max_attempts: 2,
            base_backoff: Duration::from_millis(1),
            jitter_max: None,
        }
    }

    #[tokio::test]
    async fn retries_once_then_succeeds() {
        let counter = AtomicUsize::new(0);
        let res = retry_transient(quick(), || async {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(StoreError::Transient("deadlock".into()))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(res, Ok(7));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_second_transient_failure() {
        let counter = AtomicUsize::new(0);
        let res: Result<(), _> = retry_transient(quick(), || async {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Transient("deadlock".into()))
        })
        .await;
        assert!(res.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn conflicts_are_not_retried() {
        let counter = AtomicUsize::new(0);
        let res: Result<(), _> = retry_transient(quick(), || async {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Conflict("dup".into()))
        })
        .await;
        assert_eq!(res, Err(StoreError::Conflict("dup".into())));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}

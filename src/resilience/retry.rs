use std::fmt::Display;
use tokio::time::{sleep, Duration};
use tracing::{error, warn};

#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetrySettings {
    /// Run `operation` until it succeeds, the error is not `retryable`,
    /// or `attempts` are exhausted. Delay doubles up to `max_delay_ms`.
    pub async fn run_with_retry<F, Fut, T, E, R>(&self, retryable: R, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: Display,
        R: Fn(&E) -> bool,
    {
        let attempts = self.attempts.max(1);
        let mut delay = self.base_delay_ms;
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts && retryable(&e) => {
                    warn!("Attempt {attempt}/{} failed: {e}", attempts);
                    sleep(Duration::from_millis(delay)).await;
                    delay = (delay * 2).min(self.max_delay_ms);
                    attempt += 1;
                }
                Err(e) => {
                    error!("giving up after {attempt} attempt(s): {e}");
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn settings(attempts: u32) -> RetrySettings {
        RetrySettings { attempts, base_delay_ms: 1, max_delay_ms: 4 }
    }

    #[tokio::test]
    async fn retries_transient_failures_until_success() {
        let calls = AtomicU32::new(0);
        let result: Result<&str, String> = settings(3)
            .run_with_retry(|_| true, || async {
                match calls.fetch_add(1, Ordering::SeqCst) {
                    0 | 1 => Err("transient".to_string()),
                    _ => Ok("done"),
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = settings(5)
            .run_with_retry(|e: &String| e != "permanent", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("permanent".to_string())
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn single_attempt_means_no_retry() {
        let calls = AtomicU32::new(0);
        let _: Result<(), String> = settings(1)
            .run_with_retry(|_| true, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("transient".to_string())
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::FluxgateError;

/// Exponential-backoff retry policy for store calls (spec.md §4.8). Retries
/// only errors that self-identify as retryable (`FluxgateError::is_retryable`).
/// Generalized from the teacher's bounded-deadline retry loop in
/// `proxy/handler.rs::phase_upstream` into a configurable attempt/backoff
/// policy decoupled from any particular upstream-selection concern.
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
    multiplier: f64,
    max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: if cfg.enabled { cfg.max_attempts.max(1) } else { 1 },
            initial_backoff: Duration::from_millis(cfg.initial_backoff_ms),
            multiplier: cfg.multiplier,
            max_backoff: Duration::from_millis(cfg.max_backoff_ms),
        }
    }

    /// Runs `op`, retrying on a retryable error up to `max_attempts` total
    /// attempts. The sleep between attempts is a plain `tokio::time::sleep`
    /// future, which is cancel-safe: dropping the call (e.g. because the
    /// caller's own future was dropped) aborts the wait without side effects.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, FluxgateError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FluxgateError>>,
    {
        let mut backoff = self.initial_backoff;
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_attempts && err.is_retryable() => {
                    tracing::warn!("resilience: attempt {} failed, retrying in {:?}: {}", attempt, backoff, err);
                    metrics::counter!("fluxgate_store_retry_total").increment(1);
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                    let next = (backoff.as_secs_f64() * self.multiplier).min(self.max_backoff.as_secs_f64());
                    backoff = Duration::from_secs_f64(next);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy() -> RetryPolicy {
        RetryPolicy::from_config(&RetryConfig {
            enabled: true,
            max_attempts: 3,
            initial_backoff_ms: 1,
            multiplier: 2.0,
            max_backoff_ms: 10,
        })
    }

    #[tokio::test]
    async fn retries_retryable_errors_until_success() {
        let calls = AtomicU32::new(0);
        let result = policy()
            .run(|| async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(FluxgateError::Connection("transient".to_string()))
                } else {
                    Ok(42)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_non_retryable_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<(), FluxgateError> = policy()
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FluxgateError::Config("bad rule".to_string()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), FluxgateError> = policy()
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FluxgateError::Timeout)
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}

pub mod circuit_breaker;
pub mod retry;

use std::sync::Arc;
use std::time::Duration;

use circuit_breaker::{BreakerCheck, CircuitBreaker};
use retry::RetryPolicy;

use crate::config::{CircuitBreakerConfig, FallbackStrategy, RetryConfig};
use crate::error::FluxgateError;
use crate::store::{BandSpec, BucketState, TokenBucketStore};

/// Wraps store calls only (spec.md §4.8) — per-attempt timeout, retry, then
/// circuit breaker. In-process logic (key resolution, band combination) is
/// never wrapped.
pub struct ResilienceEnvelope {
    store: Arc<dyn TokenBucketStore>,
    retry: RetryPolicy,
    breaker: CircuitBreaker,
    breaker_enabled: bool,
    fallback_strategy: FallbackStrategy,
    call_timeout: Duration,
}

impl ResilienceEnvelope {
    pub fn new(
        store: Arc<dyn TokenBucketStore>,
        retry_cfg: &RetryConfig,
        breaker_cfg: &CircuitBreakerConfig,
        call_timeout_ms: u64,
    ) -> Self {
        Self {
            store,
            retry: RetryPolicy::from_config(retry_cfg),
            breaker: CircuitBreaker::new(breaker_cfg.clone()),
            breaker_enabled: breaker_cfg.enabled,
            fallback_strategy: breaker_cfg.fallback_strategy,
            call_timeout: Duration::from_millis(call_timeout_ms),
        }
    }

    pub async fn try_consume_bands(
        &self,
        specs: &[BandSpec<'_>],
        permits: u64,
    ) -> Result<Vec<BucketState>, FluxgateError> {
        if self.breaker_enabled {
            match self.breaker.check() {
                BreakerCheck::Rejected => {
                    metrics::counter!("fluxgate_circuit_breaker_rejected_total").increment(1);
                    return match self.fallback_strategy {
                        FallbackStrategy::FailOpen => Ok(allow_all(specs, permits)),
                        FallbackStrategy::FailClosed => Err(FluxgateError::CircuitOpen),
                    };
                }
                BreakerCheck::Allowed | BreakerCheck::Probe => {}
            }
        }

        let result = self
            .retry
            .run(|| async {
                let start = std::time::Instant::now();
                let attempt = tokio::time::timeout(self.call_timeout, self.store.try_consume_bands(specs, permits)).await;
                metrics::histogram!("fluxgate_store_call_duration_seconds").record(start.elapsed().as_secs_f64());
                match attempt {
                    Ok(inner) => inner,
                    Err(_) => Err(FluxgateError::Timeout),
                }
            })
            .await;

        if self.breaker_enabled {
            match &result {
                Ok(_) => self.breaker.record_success(),
                Err(_) => self.breaker.record_failure(),
            }
        }

        result
    }
}

/// Synthetic all-allowed result for `FAIL_OPEN` (spec.md §4.8): a deliberate
/// degraded-availability choice — the store is not consulted, so the
/// remaining-token figures are reported as unlimited rather than guessed.
fn allow_all(specs: &[BandSpec<'_>], permits: u64) -> Vec<BucketState> {
    specs
        .iter()
        .map(|spec| BucketState {
            consumed: true,
            remaining_tokens: spec.band.capacity().saturating_sub(permits),
            nanos_to_wait_for_refill: 0,
            reset_time_nanos: 0,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Band;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct FailingStore {
        calls: AtomicU32,
    }

    #[async_trait]
    impl TokenBucketStore for FailingStore {
        async fn try_consume_bands(
            &self,
            _specs: &[BandSpec<'_>],
            _permits: u64,
        ) -> Result<Vec<BucketState>, FluxgateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(FluxgateError::Connection("down".to_string()))
        }
    }

    fn band() -> Band {
        Band::new(Duration::from_secs(1), 10, None).unwrap()
    }

    #[tokio::test]
    async fn breaker_opens_after_threshold_and_fails_open() {
        let store = Arc::new(FailingStore { calls: AtomicU32::new(0) });
        let retry_cfg = RetryConfig {
            enabled: true,
            max_attempts: 1,
            initial_backoff_ms: 1,
            multiplier: 1.0,
            max_backoff_ms: 1,
        };
        let breaker_cfg = CircuitBreakerConfig {
            enabled: true,
            failure_threshold: 2,
            wait_duration_in_open_state_ms: 60_000,
            permitted_calls_in_half_open_state: 1,
            fallback_strategy: FallbackStrategy::FailOpen,
        };
        let envelope = ResilienceEnvelope::new(store.clone(), &retry_cfg, &breaker_cfg, 5_000);
        let b = band();
        let specs = vec![BandSpec { bucket_key: "k".to_string(), band: &b }];

        assert!(envelope.try_consume_bands(&specs, 1).await.is_err());
        assert!(envelope.try_consume_bands(&specs, 1).await.is_err());

        // Breaker now open — FAIL_OPEN means success without touching the store.
        let before = store.calls.load(Ordering::SeqCst);
        let result = envelope.try_consume_bands(&specs, 1).await.unwrap();
        assert!(result[0].consumed);
        assert_eq!(store.calls.load(Ordering::SeqCst), before);
    }

    #[tokio::test]
    async fn fail_closed_rejects_with_circuit_open() {
        let store = Arc::new(FailingStore { calls: AtomicU32::new(0) });
        let retry_cfg = RetryConfig {
            enabled: true,
            max_attempts: 1,
            initial_backoff_ms: 1,
            multiplier: 1.0,
            max_backoff_ms: 1,
        };
        let breaker_cfg = CircuitBreakerConfig {
            enabled: true,
            failure_threshold: 1,
            wait_duration_in_open_state_ms: 60_000,
            permitted_calls_in_half_open_state: 1,
            fallback_strategy: FallbackStrategy::FailClosed,
        };
        let envelope = ResilienceEnvelope::new(store, &retry_cfg, &breaker_cfg, 5_000);
        let b = band();
        let specs = vec![BandSpec { bucket_key: "k".to_string(), band: &b }];

        assert!(envelope.try_consume_bands(&specs, 1).await.is_err());
        let err = envelope.try_consume_bands(&specs, 1).await.unwrap_err();
        assert!(matches!(err, FluxgateError::CircuitOpen));
    }
}

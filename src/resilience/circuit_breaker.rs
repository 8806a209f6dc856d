use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::CircuitBreakerConfig;

const STATE_CLOSED: u8 = 0;
const STATE_OPEN: u8 = 1;
const STATE_HALF_OPEN: u8 = 2;

/// Result of checking the breaker before a store call.
pub enum BreakerCheck {
    Allowed,
    Probe,
    Rejected,
}

/// Three-state breaker guarding the single backing store (spec.md §4.8).
/// Adapted directly from the teacher's per-node `NodeBreaker` — here there is
/// exactly one protected target, so no registry keying is needed, but the
/// state machine (`AtomicU8` + CAS transitions) is unchanged.
pub struct CircuitBreaker {
    state: AtomicU8,
    consecutive_failures: AtomicU32,
    half_open_successes: AtomicU32,
    opened_at: Mutex<Option<Instant>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: AtomicU8::new(STATE_CLOSED),
            consecutive_failures: AtomicU32::new(0),
            half_open_successes: AtomicU32::new(0),
            opened_at: Mutex::new(None),
            config,
        }
    }

    pub fn check(&self) -> BreakerCheck {
        let state = self.state.load(Ordering::Acquire);
        match state {
            STATE_CLOSED => BreakerCheck::Allowed,
            STATE_OPEN => {
                let opened_at = *self.opened_at.lock().unwrap();
                if let Some(at) = opened_at {
                    if at.elapsed() >= Duration::from_millis(self.config.wait_duration_in_open_state_ms) {
                        if self
                            .state
                            .compare_exchange(STATE_OPEN, STATE_HALF_OPEN, Ordering::AcqRel, Ordering::Acquire)
                            .is_ok()
                        {
                            self.half_open_successes.store(0, Ordering::Relaxed);
                            metrics::gauge!("fluxgate_circuit_breaker_state").set(STATE_HALF_OPEN as f64);
                            return BreakerCheck::Probe;
                        }
                    }
                }
                BreakerCheck::Rejected
            }
            STATE_HALF_OPEN => BreakerCheck::Probe,
            _ => BreakerCheck::Allowed,
        }
    }

    pub fn record_success(&self) {
        match self.state.load(Ordering::Acquire) {
            STATE_CLOSED => {
                self.consecutive_failures.store(0, Ordering::Relaxed);
            }
            STATE_HALF_OPEN => {
                let count = self.half_open_successes.fetch_add(1, Ordering::Relaxed) + 1;
                if count >= self.config.permitted_calls_in_half_open_state {
                    self.state.store(STATE_CLOSED, Ordering::Release);
                    self.consecutive_failures.store(0, Ordering::Relaxed);
                    metrics::gauge!("fluxgate_circuit_breaker_state").set(STATE_CLOSED as f64);
                    tracing::info!("circuit_breaker: closed (recovered after {} successes)", count);
                }
            }
            _ => {}
        }
    }

    pub fn record_failure(&self) {
        match self.state.load(Ordering::Acquire) {
            STATE_CLOSED => {
                let count = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
                if count >= self.config.failure_threshold {
                    self.state.store(STATE_OPEN, Ordering::Release);
                    *self.opened_at.lock().unwrap() = Some(Instant::now());
                    metrics::gauge!("fluxgate_circuit_breaker_state").set(STATE_OPEN as f64);
                    tracing::warn!("circuit_breaker: opened (after {} consecutive failures)", count);
                }
            }
            STATE_HALF_OPEN => {
                self.state.store(STATE_OPEN, Ordering::Release);
                *self.opened_at.lock().unwrap() = Some(Instant::now());
                self.half_open_successes.store(0, Ordering::Relaxed);
                metrics::gauge!("fluxgate_circuit_breaker_state").set(STATE_OPEN as f64);
                tracing::warn!("circuit_breaker: re-opened (probe failed in half-open)");
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            enabled: true,
            failure_threshold: 3,
            permitted_calls_in_half_open_state: 2,
            wait_duration_in_open_state_ms: 1000,
            fallback_strategy: crate::config::FallbackStrategy::FailOpen,
        }
    }

    #[test]
    fn starts_closed() {
        let b = CircuitBreaker::new(cfg());
        assert!(matches!(b.check(), BreakerCheck::Allowed));
    }

    #[test]
    fn trips_after_threshold_failures() {
        let b = CircuitBreaker::new(cfg());
        for _ in 0..3 {
            b.record_failure();
        }
        assert!(matches!(b.check(), BreakerCheck::Rejected));
    }

    #[test]
    fn success_resets_failure_count() {
        let b = CircuitBreaker::new(cfg());
        b.record_failure();
        b.record_failure();
        b.record_success();
        b.record_failure();
        b.record_failure();
        assert!(matches!(b.check(), BreakerCheck::Allowed));
    }

    #[test]
    fn half_open_after_wait_duration_elapses() {
        let mut config = cfg();
        config.wait_duration_in_open_state_ms = 0;
        let b = CircuitBreaker::new(config);
        b.record_failure();
        b.record_failure();
        b.record_failure();
        std::thread::sleep(Duration::from_millis(5));
        assert!(matches!(b.check(), BreakerCheck::Probe));
    }

    #[test]
    fn half_open_failure_reopens() {
        let mut config = cfg();
        config.wait_duration_in_open_state_ms = 0;
        let b = CircuitBreaker::new(config);
        b.record_failure();
        b.record_failure();
        b.record_failure();
        std::thread::sleep(Duration::from_millis(5));
        let _ = b.check(); // transitions to half-open
        b.record_failure();
        std::thread::sleep(Duration::from_millis(5));
        assert!(matches!(b.check(), BreakerCheck::Probe)); // reopened, then elapsed again
    }
}

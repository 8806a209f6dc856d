use std::fmt;

/// Error kinds, not error types — see spec.md §7. `ScriptNotLoaded` is recovered
/// internally by the store and should never reach a caller; it exists so the
/// store's match arms stay exhaustive.
#[derive(Debug)]
#[allow(dead_code)]
pub enum FluxgateError {
    Config(String),
    Connection(String),
    Timeout,
    ScriptNotLoaded,
    CircuitOpen,
    MissingRuleSet(String),
    Cancelled,
    Internal(String),
}

impl fmt::Display for FluxgateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FluxgateError::Config(msg) => write!(f, "config error: {}", msg),
            FluxgateError::Connection(msg) => write!(f, "store connection error: {}", msg),
            FluxgateError::Timeout => write!(f, "store call timed out"),
            FluxgateError::ScriptNotLoaded => write!(f, "store script not loaded"),
            FluxgateError::CircuitOpen => write!(f, "circuit breaker open"),
            FluxgateError::MissingRuleSet(id) => write!(f, "rule-set not found: {}", id),
            FluxgateError::Cancelled => write!(f, "cancelled"),
            FluxgateError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for FluxgateError {}

impl FluxgateError {
    /// Whether the resilience envelope (spec.md §4.8) should retry a call that
    /// failed with this error. Connection/timeout errors are retryable; every
    /// other kind propagates immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FluxgateError::Connection(_) | FluxgateError::Timeout)
    }
}

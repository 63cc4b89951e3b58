//! Error types for circuit breaker operations

use crate::cancel::Cancellation;
use std::error::Error;
use std::time::Duration;

/// Errors that can occur during circuit breaker operations
#[derive(Debug, thiserror::Error)]
pub enum CircuitError<E = Box<dyn Error + Send + Sync>> {
    /// Circuit is open, calls are being rejected
    #[error("Circuit '{circuit}' is open (next probe in {retry_after:?})")]
    Open {
        circuit: String,
        retry_after: Duration,
    },
    /// Half-open probe limit has been reached
    #[error("Circuit '{circuit}' half-open request limit reached (limit: {limit})")]
    HalfOpenLimitReached { circuit: String, limit: u32 },
    /// The caller's cancellation signal fired before or during the call
    #[error("Circuit call cancelled: {0}")]
    Cancelled(Cancellation),
    /// The wrapped operation failed
    #[error("Circuit execution failed: {0}")]
    Execution(#[source] E),
}

impl<E> CircuitError<E> {
    /// Whether the breaker itself rejected the call without running it
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            CircuitError::Open { .. } | CircuitError::HalfOpenLimitReached { .. }
        )
    }

    /// Unwrap the wrapped operation's own error, if that is what this is
    pub fn into_execution(self) -> Option<E> {
        match self {
            CircuitError::Execution(e) => Some(e),
            _ => None,
        }
    }
}

/// Rejected configuration values
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("max_requests must be greater than 0")]
    MaxRequests,
    #[error("timeout must be greater than 0")]
    Timeout,
    #[error("failure_rate_threshold must be between 0 and 1 exclusive, got {0}")]
    FailureRateThreshold(f64),
    #[error("minimum_observations must be greater than 0")]
    MinimumObservations,
    #[error("failure_threshold must be greater than 0")]
    FailureThreshold,
    #[error("jitter_factor must be between 0 and 1 inclusive, got {0}")]
    JitterFactor(f64),
}

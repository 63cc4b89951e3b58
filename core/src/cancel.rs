//! Caller-supplied cancellation signals
//!
//! The breaker never times out a call on its own. A caller that wants a
//! deadline or a shutdown signal passes a [`CancelSignal`] to
//! `call_with_cancel`, which checks it before admitting the call and again
//! after the operation returns.

use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a cancellation signal fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Cancellation {
    #[error("operation canceled")]
    Canceled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Source of cancellation for a single call
pub trait CancelSignal {
    /// `Some` once the signal has fired, `None` while the call may proceed
    fn cancellation(&self) -> Option<Cancellation>;
}

impl CancelSignal for CancellationToken {
    fn cancellation(&self) -> Option<Cancellation> {
        self.is_cancelled().then_some(Cancellation::Canceled)
    }
}

/// Fires once the wrapped instant has passed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(pub Instant);

impl Deadline {
    pub fn after(timeout: std::time::Duration) -> Self {
        Self(Instant::now() + timeout)
    }
}

impl CancelSignal for Deadline {
    fn cancellation(&self) -> Option<Cancellation> {
        (Instant::now() >= self.0).then_some(Cancellation::DeadlineExceeded)
    }
}

impl<A: CancelSignal, B: CancelSignal> CancelSignal for (A, B) {
    fn cancellation(&self) -> Option<Cancellation> {
        self.0.cancellation().or_else(|| self.1.cancellation())
    }
}

impl<T: CancelSignal + ?Sized> CancelSignal for &T {
    fn cancellation(&self) -> Option<Cancellation> {
        (**self).cancellation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_token_signal() {
        let token = CancellationToken::new();
        assert_eq!(token.cancellation(), None);

        token.cancel();
        assert_eq!(token.cancellation(), Some(Cancellation::Canceled));
    }

    #[test]
    fn test_deadline_signal() {
        let future = Deadline::after(Duration::from_secs(60));
        assert_eq!(future.cancellation(), None);

        let past = Deadline(Instant::now());
        assert_eq!(past.cancellation(), Some(Cancellation::DeadlineExceeded));
    }

    #[test]
    fn test_combined_signal_reports_first() {
        let token = CancellationToken::new();
        let combined = (token.clone(), Deadline(Instant::now()));
        assert_eq!(
            combined.cancellation(),
            Some(Cancellation::DeadlineExceeded)
        );

        token.cancel();
        assert_eq!(combined.cancellation(), Some(Cancellation::Canceled));
    }
}

//! Explicitly invoked consistency checks
//!
//! Nothing in the call path runs these. They read the same independent atomics
//! as the metrics view, so they only give a reliable answer on a quiescent
//! circuit, typically at the end of a test.

use super::CircuitBreaker;
use crate::State;
use crate::clock::NEVER;
use std::sync::atomic::Ordering;

/// A broken internal invariant found by [`CircuitBreaker::verify_invariants`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("recorded outcomes ({outcomes}) exceed recorded requests ({requests})")]
    OutcomesExceedRequests { requests: u32, outcomes: u64 },
    #[error("success streak ({successes}) and failure streak ({failures}) are both non-zero")]
    OverlappingStreaks { successes: u32, failures: u32 },
    #[error("timestamp `{field}` lies in the future")]
    TimestampInFuture { field: &'static str },
    #[error("open timestamp recorded={recorded} while circuit is {state}")]
    OpenTimestampMismatch { state: State, recorded: bool },
    #[error("{in_flight} half-open probes in flight exceeds limit of {limit}")]
    ProbeLimitExceeded { in_flight: u32, limit: u32 },
}

impl CircuitBreaker {
    /// Check state, timestamp and counter invariants
    ///
    /// Intended for tests and debugging sessions; never called by the breaker.
    pub fn verify_invariants(&self) -> Result<(), InvariantViolation> {
        let counts = self.counters.snapshot();
        let state = self.state.load();
        let now = self.clock.now();

        let outcomes = u64::from(counts.total_successes) + u64::from(counts.total_failures);
        if outcomes > u64::from(counts.requests) {
            return Err(InvariantViolation::OutcomesExceedRequests {
                requests: counts.requests,
                outcomes,
            });
        }

        if counts.consecutive_successes > 0 && counts.consecutive_failures > 0 {
            return Err(InvariantViolation::OverlappingStreaks {
                successes: counts.consecutive_successes,
                failures: counts.consecutive_failures,
            });
        }

        for (field, cell) in [
            ("state_changed_at", &self.state_changed_at),
            ("counts_cleared_at", &self.counts_cleared_at),
        ] {
            if cell.load(Ordering::Acquire) > now {
                return Err(InvariantViolation::TimestampInFuture { field });
            }
        }

        let opened_at = self.opened_at.load(Ordering::Acquire);
        let recorded = opened_at != NEVER;
        if recorded != (state == State::Open) {
            return Err(InvariantViolation::OpenTimestampMismatch { state, recorded });
        }
        if recorded && opened_at > now {
            return Err(InvariantViolation::TimestampInFuture { field: "opened_at" });
        }

        let limit = self.settings.load().max_requests;
        let in_flight = self.gate.in_flight();
        if in_flight > limit {
            return Err(InvariantViolation::ProbeLimitExceeded { in_flight, limit });
        }

        Ok(())
    }
}

//! Lock-free outcome counters with overflow saturation
//!
//! Total counters stop at `u32::MAX` instead of wrapping, and report the first
//! saturation after each clear so the breaker can warn exactly once. Streak
//! counters use plain wrapping increments; every outcome of the opposite kind
//! resets them, so they never approach the limit under realistic traffic.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Point-in-time copy of a breaker's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub requests: u32,
    pub total_successes: u32,
    pub total_failures: u32,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
}

impl Counts {
    /// Counts as they would look after one more failed request
    pub fn with_one_more_failure(&self) -> Counts {
        Counts {
            requests: self.requests.saturating_add(1),
            total_successes: self.total_successes,
            total_failures: self.total_failures.saturating_add(1),
            consecutive_successes: 0,
            consecutive_failures: self.consecutive_failures.saturating_add(1),
        }
    }
}

/// Counter that can hit its saturation limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterKind {
    Requests,
    TotalSuccesses,
    TotalFailures,
}

impl fmt::Display for CounterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CounterKind::Requests => "requests",
            CounterKind::TotalSuccesses => "total_successes",
            CounterKind::TotalFailures => "total_failures",
        })
    }
}

/// Increment `cell` unless it already holds `u32::MAX`
///
/// Returns `false` when the counter is saturated and was left unchanged.
pub fn saturating_increment(cell: &AtomicU32) -> bool {
    let mut current = cell.load(Ordering::Relaxed);

    loop {
        if current == u32::MAX {
            return false;
        }

        let next = current + 1;
        match cell.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return true,
            Err(actual) => current = actual,
        }
    }
}

#[derive(Debug, Default)]
struct SaturatingCounter {
    value: AtomicU32,
    saturated: AtomicBool,
}

impl SaturatingCounter {
    /// Returns `true` only for the first failed increment since the last clear
    fn increment(&self) -> bool {
        if saturating_increment(&self.value) {
            return false;
        }
        !self.saturated.swap(true, Ordering::AcqRel)
    }

    fn load(&self) -> u32 {
        self.value.load(Ordering::Acquire)
    }

    fn is_saturated(&self) -> bool {
        self.saturated.load(Ordering::Acquire)
    }

    fn clear(&self) {
        self.value.store(0, Ordering::Release);
        self.saturated.store(false, Ordering::Release);
    }
}

/// Atomic counter set shared by every caller of a breaker
///
/// Each cell is updated independently. A snapshot taken while another thread
/// records or clears may be off by a single increment.
#[derive(Debug, Default)]
pub struct Counters {
    requests: SaturatingCounter,
    total_successes: SaturatingCounter,
    total_failures: SaturatingCounter,
    consecutive_successes: AtomicU32,
    consecutive_failures: AtomicU32,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count an admitted attempt
    pub fn record_request(&self) -> Option<CounterKind> {
        self.requests.increment().then_some(CounterKind::Requests)
    }

    /// Count a successful outcome and break any failure streak
    pub fn record_success(&self) -> Option<CounterKind> {
        let newly_saturated = self.total_successes.increment();
        self.consecutive_successes.fetch_add(1, Ordering::AcqRel);
        self.consecutive_failures.store(0, Ordering::Release);
        newly_saturated.then_some(CounterKind::TotalSuccesses)
    }

    /// Count a failed outcome and break any success streak
    pub fn record_failure(&self) -> Option<CounterKind> {
        let newly_saturated = self.total_failures.increment();
        self.consecutive_failures.fetch_add(1, Ordering::AcqRel);
        self.consecutive_successes.store(0, Ordering::Release);
        newly_saturated.then_some(CounterKind::TotalFailures)
    }

    /// Reset every counter and saturation flag to zero
    pub fn clear(&self) {
        self.requests.clear();
        self.total_successes.clear();
        self.total_failures.clear();
        self.consecutive_successes.store(0, Ordering::Release);
        self.consecutive_failures.store(0, Ordering::Release);
    }

    pub fn snapshot(&self) -> Counts {
        Counts {
            requests: self.requests.load(),
            total_successes: self.total_successes.load(),
            total_failures: self.total_failures.load(),
            consecutive_successes: self.consecutive_successes.load(Ordering::Acquire),
            consecutive_failures: self.consecutive_failures.load(Ordering::Acquire),
        }
    }

    /// Whether any total counter has hit its limit since the last clear
    pub fn is_saturated(&self) -> bool {
        self.requests.is_saturated()
            || self.total_successes.is_saturated()
            || self.total_failures.is_saturated()
    }

    #[cfg(test)]
    pub(crate) fn force(&self, kind: CounterKind, value: u32) {
        let cell = match kind {
            CounterKind::Requests => &self.requests.value,
            CounterKind::TotalSuccesses => &self.total_successes.value,
            CounterKind::TotalFailures => &self.total_failures.value,
        };
        cell.store(value, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_record_and_snapshot() {
        let counters = Counters::new();

        counters.record_request();
        counters.record_success();
        counters.record_request();
        counters.record_failure();
        counters.record_request();
        counters.record_failure();

        let counts = counters.snapshot();
        assert_eq!(counts.requests, 3);
        assert_eq!(counts.total_successes, 1);
        assert_eq!(counts.total_failures, 2);
        assert_eq!(counts.consecutive_successes, 0);
        assert_eq!(counts.consecutive_failures, 2);
    }

    #[test]
    fn test_streaks_are_mutually_exclusive() {
        let counters = Counters::new();

        counters.record_failure();
        counters.record_failure();
        counters.record_success();

        let counts = counters.snapshot();
        assert_eq!(counts.consecutive_successes, 1);
        assert_eq!(counts.consecutive_failures, 0);
    }

    #[test]
    fn test_clear_resets_everything() {
        let counters = Counters::new();
        counters.record_request();
        counters.record_success();
        counters.force(CounterKind::TotalFailures, u32::MAX);
        counters.record_failure();
        assert!(counters.is_saturated());

        counters.clear();

        assert_eq!(counters.snapshot(), Counts::default());
        assert!(!counters.is_saturated());
    }

    #[test]
    fn test_saturating_increment_stops_at_max() {
        let cell = AtomicU32::new(u32::MAX - 1);

        assert!(saturating_increment(&cell));
        assert_eq!(cell.load(Ordering::SeqCst), u32::MAX);

        assert!(!saturating_increment(&cell));
        assert_eq!(cell.load(Ordering::SeqCst), u32::MAX);
    }

    #[test]
    fn test_saturation_reported_once_until_clear() {
        let counters = Counters::new();
        counters.force(CounterKind::TotalSuccesses, u32::MAX);

        assert_eq!(counters.record_success(), Some(CounterKind::TotalSuccesses));
        assert_eq!(counters.record_success(), None);
        assert_eq!(counters.snapshot().total_successes, u32::MAX);

        counters.clear();
        counters.force(CounterKind::TotalSuccesses, u32::MAX);
        assert_eq!(counters.record_success(), Some(CounterKind::TotalSuccesses));
    }

    #[test]
    fn test_requests_saturate() {
        let counters = Counters::new();
        counters.force(CounterKind::Requests, u32::MAX);

        assert_eq!(counters.record_request(), Some(CounterKind::Requests));
        assert_eq!(counters.snapshot().requests, u32::MAX);
    }

    #[test]
    fn test_consecutive_counters_wrap() {
        let counters = Counters::new();
        let streak = &counters.consecutive_failures;
        streak.store(u32::MAX, Ordering::SeqCst);

        counters.record_failure();
        assert_eq!(counters.snapshot().consecutive_failures, 0);
    }

    #[test]
    fn test_one_more_failure_projection() {
        let counts = Counts {
            requests: 4,
            total_successes: 3,
            total_failures: 1,
            consecutive_successes: 2,
            consecutive_failures: 0,
        };

        let next = counts.with_one_more_failure();
        assert_eq!(next.requests, 5);
        assert_eq!(next.total_failures, 2);
        assert_eq!(next.consecutive_successes, 0);
        assert_eq!(next.consecutive_failures, 1);
    }

    #[test]
    fn test_concurrent_totals_match_requests() {
        let counters = Arc::new(Counters::new());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let counters = Arc::clone(&counters);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        counters.record_request();
                        if i % 2 == 0 {
                            counters.record_success();
                        } else {
                            counters.record_failure();
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let counts = counters.snapshot();
        assert_eq!(counts.requests, 8000);
        let outcomes = counts.total_successes + counts.total_failures;
        assert_eq!(outcomes, counts.requests);
    }
}

//! Monotonic time source for breaker timestamps
//!
//! Timestamps are kept as nanosecond offsets from a fixed anchor so they fit
//! in an `AtomicU64`. Using `Instant` keeps NTP adjustments out of timeout math.

use std::time::{Duration, Instant};

/// Sentinel offset meaning "no timestamp recorded"
pub(crate) const NEVER: u64 = u64::MAX;

#[derive(Debug, Clone, Copy)]
pub(crate) struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub(crate) fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Nanoseconds elapsed since the clock was created
    pub(crate) fn now(&self) -> u64 {
        duration_to_nanos(self.start.elapsed())
    }

    /// Convert an offset back into an `Instant`
    pub(crate) fn instant_at(&self, offset: u64) -> Instant {
        self.start + Duration::from_nanos(offset)
    }

    /// Time elapsed since `offset`; zero when `offset` is [`NEVER`] or in the future
    pub(crate) fn elapsed_since(&self, offset: u64) -> Duration {
        if offset == NEVER {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.now().saturating_sub(offset))
    }
}

pub(crate) fn duration_to_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(NEVER - 1)
}

//! Half-open probe admission
//!
//! While a circuit is HalfOpen only a bounded number of probe calls may run
//! at once. The gate packs a round number and an in-flight count into one
//! atomic word, so admission is an exact compare-and-swap against the cap.
//!
//! Each time the circuit opens, the gate starts a new round with a count of
//! zero. Guards from an earlier round may still be alive at that point; their
//! release is ignored so they can neither free a slot of the new round nor
//! drive the count below zero.

use std::sync::atomic::{AtomicU64, Ordering};

const COUNT_MASK: u64 = u32::MAX as u64;

fn round(word: u64) -> u32 {
    (word >> 32) as u32
}

fn count(word: u64) -> u32 {
    (word & COUNT_MASK) as u32
}

/// In-flight probe counter for the HalfOpen state
#[derive(Debug, Default)]
pub(crate) struct HalfOpenGate {
    word: AtomicU64,
}

impl HalfOpenGate {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Try to admit one probe without blocking
    ///
    /// Returns `None` if `limit` probes of the current round are in flight.
    pub(crate) fn try_admit(&self, limit: u32) -> Option<AdmissionGuard<'_>> {
        let mut current = self.word.load(Ordering::Acquire);

        loop {
            if count(current) >= limit {
                return None;
            }

            let next = current + 1;
            match self
                .word
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => {
                    return Some(AdmissionGuard {
                        gate: self,
                        round: round(current),
                    });
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Probes admitted in the current round and not yet released
    pub(crate) fn in_flight(&self) -> u32 {
        count(self.word.load(Ordering::Acquire))
    }

    /// Start a new round with no probes in flight
    pub(crate) fn reset(&self) {
        let _ = self
            .word
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |word| {
                Some(u64::from(round(word).wrapping_add(1)) << 32)
            });
    }

    fn release(&self, admitted_in: u32) {
        let _ = self
            .word
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |word| {
                (round(word) == admitted_in && count(word) > 0).then(|| word - 1)
            });
    }
}

/// Guard that releases a probe slot when dropped
///
/// Dropping happens on every exit path of a call, including unwinding out of
/// a panicking operation.
#[derive(Debug)]
pub(crate) struct AdmissionGuard<'a> {
    gate: &'a HalfOpenGate,
    round: u32,
}

impl Drop for AdmissionGuard<'_> {
    fn drop(&mut self) {
        self.gate.release(self.round);
    }
}

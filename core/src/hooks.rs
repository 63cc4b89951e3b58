//! Fault-safe invocation of user-supplied policy hooks
//!
//! Trip predicates, success classifiers and state observers are user code
//! running inside the breaker. A panic in any of them is caught here, reported
//! through the circuit's [`FaultLogger`], and replaced by a fixed default so
//! the breaker's own bookkeeping always completes.

use crate::counts::CounterKind;
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// Which policy hook faulted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    /// Fault defaults to "do not trip"
    TripPredicate,
    /// Fault is swallowed; the transition stays committed
    StateObserver,
    /// Fault defaults to "failure"
    SuccessClassifier,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HookKind::TripPredicate => "trip_predicate",
            HookKind::StateObserver => "state_observer",
            HookKind::SuccessClassifier => "success_classifier",
        })
    }
}

/// A panic trapped while running a policy hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookFault {
    pub circuit: String,
    pub hook: HookKind,
    pub message: String,
}

/// Sink for faults and saturation events raised inside a circuit
///
/// Implementations must be safe to call from many threads at once and should
/// not hold locks that the breaker's callers could also be waiting on.
pub trait FaultLogger: Send + Sync + fmt::Debug {
    /// A policy hook panicked and its default was substituted
    fn hook_fault(&self, fault: &HookFault);

    /// A total counter reached `u32::MAX` for the first time since its last clear
    fn counter_saturated(&self, circuit: &str, counter: CounterKind) {
        tracing::warn!(
            circuit = %circuit,
            counter = %counter,
            "circuit counter saturated; further increments are dropped until the next clear"
        );
    }
}

/// Default [`FaultLogger`] writing through `tracing`
///
/// Fault reports are serialized by a private lock so that multi-line panic
/// messages from concurrent callers do not interleave. The lock is held only
/// for the duration of the write.
#[derive(Debug, Default)]
pub struct TracingFaultLogger {
    write_lock: Mutex<()>,
}

impl TracingFaultLogger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FaultLogger for TracingFaultLogger {
    fn hook_fault(&self, fault: &HookFault) {
        let _guard = self.write_lock.lock();
        tracing::error!(
            circuit = %fault.circuit,
            hook = %fault.hook,
            "policy hook panicked: {}",
            fault.message
        );
    }
}

/// Run `f`, substituting `fallback` and logging if it panics
///
/// Panics raised by the logger itself are discarded.
pub(crate) fn guarded<R>(
    circuit: &str,
    hook: HookKind,
    logger: &dyn FaultLogger,
    fallback: R,
    f: impl FnOnce() -> R,
) -> R {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(payload) => {
            let fault = HookFault {
                circuit: circuit.to_string(),
                hook,
                message: panic_message(payload.as_ref()),
            };
            let _ = panic::catch_unwind(AssertUnwindSafe(|| logger.hook_fault(&fault)));
            fallback
        }
    }
}

/// Best-effort text of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

/// Logger that records faults in memory, for tests
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct CapturingLogger {
    pub(crate) faults: Mutex<Vec<HookFault>>,
    pub(crate) saturations: Mutex<Vec<CounterKind>>,
}

#[cfg(test)]
impl FaultLogger for CapturingLogger {
    fn hook_fault(&self, fault: &HookFault) {
        self.faults.lock().push(fault.clone());
    }

    fn counter_saturated(&self, _circuit: &str, counter: CounterKind) {
        self.saturations.lock().push(counter);
    }
}

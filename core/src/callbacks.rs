//! Callback system for circuit breaker state transitions

use crate::State;
use crate::hooks::{FaultLogger, HookKind, guarded};
use std::sync::Arc;

/// Observer receiving `(circuit, from, to)` for every committed transition
pub type StateChangeFn = Arc<dyn Fn(&str, State, State) + Send + Sync>;

/// Callback receiving the circuit name
pub type NamedFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Callbacks for circuit breaker events
#[derive(Clone, Default)]
pub struct Callbacks {
    pub on_state_change: Option<StateChangeFn>,
    pub on_open: Option<NamedFn>,
    pub on_close: Option<NamedFn>,
    pub on_half_open: Option<NamedFn>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notify observers of a transition that has already been committed
    ///
    /// Each callback is trapped on its own, so a panicking `on_state_change`
    /// does not prevent `on_open` from running.
    pub(crate) fn notify(&self, circuit: &str, from: State, to: State, logger: &dyn FaultLogger) {
        if let Some(ref callback) = self.on_state_change {
            guarded(circuit, HookKind::StateObserver, logger, (), || {
                callback(circuit, from, to)
            });
        }

        let targeted = match to {
            State::Open => &self.on_open,
            State::Closed => &self.on_close,
            State::HalfOpen => &self.on_half_open,
        };
        if let Some(callback) = targeted {
            guarded(circuit, HookKind::StateObserver, logger, (), || {
                callback(circuit)
            });
        }
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_state_change", &self.on_state_change.is_some())
            .field("on_open", &self.on_open.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_half_open", &self.on_half_open.is_some())
            .finish()
    }
}

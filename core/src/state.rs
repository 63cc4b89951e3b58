//! Circuit lifecycle states and their lock-free storage

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of a circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum State {
    /// Calls pass through and outcomes are counted
    Closed = 0,
    /// Calls are rejected until the open timeout elapses
    Open = 1,
    /// A limited number of probe calls test whether the dependency recovered
    HalfOpen = 2,
}

impl State {
    /// Name of the state as used in logs and diagnostics
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Closed => "Closed",
            State::Open => "Open",
            State::HalfOpen => "HalfOpen",
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => State::Open,
            2 => State::HalfOpen,
            _ => State::Closed,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomic cell holding a [`State`]
///
/// Every read observes exactly one of the three states. Transitions go
/// through [`AtomicState::compare_exchange`] so that, among concurrent
/// attempts from the same source state, only one caller wins.
#[derive(Debug)]
pub(crate) struct AtomicState {
    inner: AtomicU8,
}

impl AtomicState {
    pub(crate) fn new(state: State) -> Self {
        Self {
            inner: AtomicU8::new(state as u8),
        }
    }

    pub(crate) fn load(&self) -> State {
        State::from_u8(self.inner.load(Ordering::Acquire))
    }

    /// Move from `current` to `new`, returning the observed state on failure
    pub(crate) fn compare_exchange(&self, current: State, new: State) -> Result<State, State> {
        self.inner
            .compare_exchange(
                current as u8,
                new as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(State::from_u8)
            .map_err(State::from_u8)
    }
}

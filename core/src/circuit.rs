//! Circuit breaker implementation
//!
//! The breaker is shared by reference between any number of callers. Every
//! piece of state is an independent atomic cell; transitions between states
//! are made exclusive with compare-and-swap so that exactly one caller
//! performs each transition's side effects.

use crate::{
    Counts, State, adaptive,
    admission::{AdmissionGuard, HalfOpenGate},
    callbacks::Callbacks,
    cancel::{CancelSignal, Cancellation},
    classifier::{DefaultClassifier, OutcomeContext, SuccessClassifier},
    clock::{MonotonicClock, NEVER, duration_to_nanos},
    counts::{CounterKind, Counters},
    errors::{CircuitError, ConfigError},
    hooks::{FaultLogger, HookKind, TracingFaultLogger, guarded},
    metrics::{Diagnostics, Metrics},
    settings::{Config, Settings, SettingsStore, SettingsUpdate},
    state::AtomicState,
};
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

mod invariants;

pub use invariants::InvariantViolation;

/// User-supplied trip predicate
pub type TripFn = Arc<dyn Fn(&Counts) -> bool + Send + Sync>;

/// How a Closed circuit decides to trip, fixed at construction
#[derive(Clone)]
pub(crate) enum TripPolicy {
    /// Trip once this many failures happen in a row
    ConsecutiveFailures(u32),
    /// Trip when the failure rate exceeds the runtime threshold
    Adaptive,
    /// Caller-supplied predicate, run fault-trapped
    Custom(TripFn),
}

impl TripPolicy {
    fn resolve(config: &Config, custom: Option<TripFn>) -> Self {
        match custom {
            Some(predicate) => TripPolicy::Custom(predicate),
            None if config.adaptive => TripPolicy::Adaptive,
            None => TripPolicy::ConsecutiveFailures(config.failure_threshold),
        }
    }
}

impl std::fmt::Debug for TripPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TripPolicy::ConsecutiveFailures(n) => {
                f.debug_tuple("ConsecutiveFailures").field(n).finish()
            }
            TripPolicy::Adaptive => f.write_str("Adaptive"),
            TripPolicy::Custom(_) => f.write_str("Custom(<closure>)"),
        }
    }
}

/// Optional policy hooks handed over by the builder
#[derive(Default)]
pub(crate) struct Policies {
    pub(crate) ready_to_trip: Option<TripFn>,
    pub(crate) classifier: Option<Arc<dyn SuccessClassifier>>,
    pub(crate) callbacks: Callbacks,
    pub(crate) logger: Option<Arc<dyn FaultLogger>>,
}

/// Admission ticket for one call; releases its probe slot when dropped
struct Permit<'a> {
    _admission: Option<AdmissionGuard<'a>>,
}

/// Circuit breaker public API
pub struct CircuitBreaker {
    name: String,
    state: AtomicState,
    counters: Counters,
    settings: SettingsStore,
    clock: MonotonicClock,
    /// Offset at which the circuit last opened, [`NEVER`] unless Open
    opened_at: AtomicU64,
    /// Effective (possibly jittered) open timeout for the current opening
    open_timeout: AtomicU64,
    counts_cleared_at: AtomicU64,
    state_changed_at: AtomicU64,
    gate: HalfOpenGate,
    jitter_factor: f64,
    trip_policy: TripPolicy,
    classifier: Arc<dyn SuccessClassifier>,
    callbacks: Callbacks,
    logger: Arc<dyn FaultLogger>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker (use builder() for more options)
    ///
    /// # Panics
    ///
    /// Panics if `config` fails validation. Misconfiguration is a programming
    /// error and should surface at startup; use [`CircuitBreaker::try_new`]
    /// to handle it as a value instead.
    pub fn new(name: impl Into<String>, config: Config) -> Self {
        match Self::try_new(name, config) {
            Ok(circuit) => circuit,
            Err(e) => panic!("invalid circuit breaker configuration: {e}"),
        }
    }

    /// Create a new circuit breaker, returning an error for invalid configuration
    pub fn try_new(name: impl Into<String>, config: Config) -> Result<Self, ConfigError> {
        Self::with_policies(name.into(), config, Policies::default())
    }

    /// Create a new circuit breaker builder
    pub fn builder(name: impl Into<String>) -> crate::builder::CircuitBuilder {
        crate::builder::CircuitBuilder::new(name)
    }

    pub(crate) fn with_policies(
        name: String,
        config: Config,
        policies: Policies,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let clock = MonotonicClock::new();
        let now = clock.now();

        Ok(Self {
            trip_policy: TripPolicy::resolve(&config, policies.ready_to_trip),
            classifier: policies
                .classifier
                .unwrap_or_else(|| Arc::new(DefaultClassifier)),
            callbacks: policies.callbacks,
            logger: policies
                .logger
                .unwrap_or_else(|| Arc::new(TracingFaultLogger::new())),
            state: AtomicState::new(State::Closed),
            counters: Counters::new(),
            settings: SettingsStore::new(config.settings(), config.adaptive),
            opened_at: AtomicU64::new(NEVER),
            open_timeout: AtomicU64::new(duration_to_nanos(config.timeout)),
            counts_cleared_at: AtomicU64::new(now),
            state_changed_at: AtomicU64::new(now),
            gate: HalfOpenGate::new(),
            jitter_factor: config.jitter_factor,
            clock,
            name,
        })
    }

    /// Execute a fallible operation with circuit breaker protection
    ///
    /// Returns the operation's own result unchanged, or a rejection when the
    /// circuit is Open or the half-open probe limit is reached. A panic in the
    /// operation is recorded as a failure and then resumed.
    pub fn call<F, T, E>(&self, f: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Result<T, E>,
        E: 'static,
    {
        let permit = self.before_call::<E>()?;
        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(f));
        self.complete(permit, started, outcome)
    }

    /// Like [`call`](Self::call), honouring a cancellation signal
    ///
    /// If the signal has already fired, nothing is counted. If it fires while
    /// the operation runs, the attempt is counted as a request but its outcome
    /// is neither a success nor a failure and cannot trip the circuit.
    pub fn call_with_cancel<S, F, T, E>(&self, signal: &S, f: F) -> Result<T, CircuitError<E>>
    where
        S: CancelSignal + ?Sized,
        F: FnOnce() -> Result<T, E>,
        E: 'static,
    {
        if let Some(cancellation) = signal.cancellation() {
            return Err(CircuitError::Cancelled(cancellation));
        }

        let permit = self.before_call::<E>()?;
        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(f));

        if outcome.is_ok()
            && let Some(cancellation) = signal.cancellation()
        {
            return Err(self.abandon(permit, cancellation));
        }
        self.complete(permit, started, outcome)
    }

    /// Execute an asynchronous operation with circuit breaker protection
    pub async fn call_async<F, Fut, T, E>(&self, f: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: 'static,
    {
        let permit = self.before_call::<E>()?;
        let started = Instant::now();
        let outcome = run_async(f).await;
        self.complete(permit, started, outcome)
    }

    /// Asynchronous counterpart of [`call_with_cancel`](Self::call_with_cancel)
    pub async fn call_async_with_cancel<S, F, Fut, T, E>(
        &self,
        signal: &S,
        f: F,
    ) -> Result<T, CircuitError<E>>
    where
        S: CancelSignal + ?Sized,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: 'static,
    {
        if let Some(cancellation) = signal.cancellation() {
            return Err(CircuitError::Cancelled(cancellation));
        }

        let permit = self.before_call::<E>()?;
        let started = Instant::now();
        let outcome = run_async(f).await;

        if outcome.is_ok()
            && let Some(cancellation) = signal.cancellation()
        {
            return Err(self.abandon(permit, cancellation));
        }
        self.complete(permit, started, outcome)
    }

    /// Apply a sparse settings change
    ///
    /// Validation runs before anything is changed; an invalid field rejects the
    /// whole update. A changed interval clears counters if the circuit is
    /// Closed, and a changed timeout restarts the open timer if it is Open.
    pub fn update_settings(&self, update: SettingsUpdate) -> Result<Settings, ConfigError> {
        let state = self.state.load();
        let (previous, current) = self.settings.apply(&update)?;

        if current.interval != previous.interval && state == State::Closed {
            self.counters.clear();
            let now = self.clock.now();
            self.counts_cleared_at.store(now, Ordering::Release);
            tracing::debug!(
                circuit = %self.name,
                interval = ?current.interval,
                "interval changed; counters cleared"
            );
        }

        if current.timeout != previous.timeout && state == State::Open {
            let open_timeout = self.effective_open_timeout(current.timeout);
            self.open_timeout.store(open_timeout, Ordering::Release);
            let now = self.clock.now();
            let restarted = self
                .opened_at
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |opened| {
                    (opened != NEVER).then_some(now)
                })
                .is_ok();
            if restarted {
                tracing::debug!(
                    circuit = %self.name,
                    timeout = ?current.timeout,
                    "timeout changed; open timer restarted"
                );
            }
        }

        Ok(current)
    }

    /// Circuit name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state
    pub fn state(&self) -> State {
        self.state.load()
    }

    /// Get current state name
    pub fn state_name(&self) -> &'static str {
        self.state().as_str()
    }

    /// Check if circuit is open
    pub fn is_open(&self) -> bool {
        self.state() == State::Open
    }

    /// Check if circuit is closed
    pub fn is_closed(&self) -> bool {
        self.state() == State::Closed
    }

    /// Check if circuit is probing
    pub fn is_half_open(&self) -> bool {
        self.state() == State::HalfOpen
    }

    /// Current counters
    pub fn counts(&self) -> Counts {
        self.counters.snapshot()
    }

    /// Settings currently in effect
    pub fn settings(&self) -> Settings {
        self.settings.load()
    }

    /// Snapshot of state, counters and failure rates
    pub fn metrics(&self) -> Metrics {
        let counts = self.counters.snapshot();

        Metrics {
            name: self.name.clone(),
            state: self.state(),
            counts,
            failure_rate: adaptive::failure_rate(&counts),
            success_rate: adaptive::success_rate(&counts),
            saturated: self.counters.is_saturated(),
            state_changed_at: self
                .clock
                .instant_at(self.state_changed_at.load(Ordering::Acquire)),
            counts_cleared_at: self
                .clock
                .instant_at(self.counts_cleared_at.load(Ordering::Acquire)),
        }
    }

    /// Metrics plus active settings and what the next call would do
    pub fn diagnostics(&self) -> Diagnostics {
        let metrics = self.metrics();

        let will_trip_on_next_failure = metrics.state == State::Closed
            && self.ready_to_trip(&metrics.counts.with_one_more_failure());
        let time_until_probe = (metrics.state == State::Open).then(|| self.time_until_probe());

        Diagnostics {
            settings: self.settings.load(),
            adaptive: self.settings.is_adaptive(),
            jitter_factor: self.jitter_factor,
            half_open_in_flight: self.gate.in_flight(),
            will_trip_on_next_failure,
            time_until_probe,
            metrics,
        }
    }

    /// Admission checks run before the wrapped operation
    fn before_call<E>(&self) -> Result<Permit<'_>, CircuitError<E>> {
        let settings = self.settings.load();
        self.clear_expired_window(&settings);

        let state = match self.state.load() {
            State::Open => {
                if !self.probe_due() || !self.transition(State::Open, State::HalfOpen) {
                    tracing::debug!(circuit = %self.name, "call rejected: circuit open");
                    return Err(CircuitError::Open {
                        circuit: self.name.clone(),
                        retry_after: self.time_until_probe(),
                    });
                }
                State::HalfOpen
            }
            state => state,
        };

        self.note_saturation(self.counters.record_request());

        let admission = if state == State::HalfOpen {
            match self.gate.try_admit(settings.max_requests) {
                Some(guard) => Some(guard),
                None => {
                    tracing::debug!(
                        circuit = %self.name,
                        limit = settings.max_requests,
                        "call rejected: half-open probe limit reached"
                    );
                    return Err(CircuitError::HalfOpenLimitReached {
                        circuit: self.name.clone(),
                        limit: settings.max_requests,
                    });
                }
            }
        } else {
            None
        };

        Ok(Permit {
            _admission: admission,
        })
    }

    /// Record a finished attempt and hand its result back to the caller
    fn complete<T, E: 'static>(
        &self,
        permit: Permit<'_>,
        started: Instant,
        outcome: thread::Result<Result<T, E>>,
    ) -> Result<T, CircuitError<E>> {
        match outcome {
            Ok(result) => {
                let success = self.classify(&result, started.elapsed());
                self.after_call(permit, success);
                result.map_err(CircuitError::Execution)
            }
            Err(payload) => {
                tracing::debug!(
                    circuit = %self.name,
                    "wrapped operation panicked; recording failure"
                );
                self.after_call(permit, false);
                panic::resume_unwind(payload)
            }
        }
    }

    /// Drop an attempt whose caller cancelled it mid-flight
    fn abandon<E>(&self, permit: Permit<'_>, cancellation: Cancellation) -> CircuitError<E> {
        drop(permit);
        tracing::debug!(
            circuit = %self.name,
            reason = %cancellation,
            "call cancelled during execution; outcome not recorded"
        );
        CircuitError::Cancelled(cancellation)
    }

    fn classify<T, E: 'static>(&self, result: &Result<T, E>, duration: Duration) -> bool {
        let ctx = OutcomeContext {
            circuit_name: &self.name,
            error: result.as_ref().err().map(|e| e as &dyn Any),
            duration,
        };

        guarded(
            &self.name,
            HookKind::SuccessClassifier,
            &*self.logger,
            false,
            || self.classifier.is_successful(&ctx),
        )
    }

    /// Record the outcome and evaluate the transition it may cause
    ///
    /// The permit is released last, after any transition has committed.
    fn after_call(&self, permit: Permit<'_>, success: bool) {
        let saturated = if success {
            self.counters.record_success()
        } else {
            self.counters.record_failure()
        };
        self.note_saturation(saturated);

        match self.state.load() {
            State::Closed => {
                if self.ready_to_trip(&self.counters.snapshot()) {
                    self.transition(State::Closed, State::Open);
                }
            }
            State::HalfOpen if success => {
                self.transition(State::HalfOpen, State::Closed);
            }
            State::HalfOpen => {
                self.transition(State::HalfOpen, State::Open);
            }
            State::Open => {}
        }

        drop(permit);
    }

    fn ready_to_trip(&self, counts: &Counts) -> bool {
        match &self.trip_policy {
            TripPolicy::ConsecutiveFailures(threshold) => counts.consecutive_failures >= *threshold,
            TripPolicy::Adaptive => {
                let settings = self.settings.load();
                adaptive::should_trip(
                    counts,
                    settings.failure_rate_threshold,
                    settings.minimum_observations,
                )
            }
            TripPolicy::Custom(predicate) => guarded(
                &self.name,
                HookKind::TripPredicate,
                &*self.logger,
                false,
                || predicate(counts),
            ),
        }
    }

    /// Attempt `from -> to`; only the winning caller runs the side effects
    fn transition(&self, from: State, to: State) -> bool {
        if self.state.compare_exchange(from, to).is_err() {
            return false;
        }

        let now = self.clock.now();
        self.state_changed_at.store(now, Ordering::Release);

        match to {
            State::Open => {
                let open_timeout = self.effective_open_timeout(self.settings.load().timeout);
                self.open_timeout.store(open_timeout, Ordering::Release);
                self.opened_at.store(now, Ordering::Release);
                self.gate.reset();
            }
            State::HalfOpen => {
                self.opened_at.store(NEVER, Ordering::Release);
            }
            State::Closed => {}
        }
        self.counters.clear();
        self.counts_cleared_at.store(now, Ordering::Release);

        tracing::info!(
            circuit = %self.name,
            from = %from,
            to = %to,
            "circuit state changed"
        );
        self.callbacks.notify(&self.name, from, to, &*self.logger);
        true
    }

    /// Clear counters once the Closed-state interval has elapsed
    ///
    /// Concurrent callers race on the clear timestamp; only the winner clears.
    fn clear_expired_window(&self, settings: &Settings) {
        if settings.interval.is_zero() || self.state.load() != State::Closed {
            return;
        }

        let cleared_at = self.counts_cleared_at.load(Ordering::Acquire);
        if self.clock.elapsed_since(cleared_at) < settings.interval {
            return;
        }

        let now = self.clock.now();
        if self
            .counts_cleared_at
            .compare_exchange(cleared_at, now, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.counters.clear();
            tracing::debug!(circuit = %self.name, "interval elapsed; counters cleared");
        }
    }

    fn probe_due(&self) -> bool {
        let opened_at = self.opened_at.load(Ordering::Acquire);
        opened_at != NEVER
            && self.clock.elapsed_since(opened_at)
                >= Duration::from_nanos(self.open_timeout.load(Ordering::Acquire))
    }

    fn time_until_probe(&self) -> Duration {
        let timeout = Duration::from_nanos(self.open_timeout.load(Ordering::Acquire));
        let elapsed = self
            .clock
            .elapsed_since(self.opened_at.load(Ordering::Acquire));
        timeout.saturating_sub(elapsed)
    }

    /// Open timeout for a new opening, with jitter applied if configured
    fn effective_open_timeout(&self, timeout: Duration) -> u64 {
        if self.jitter_factor > 0.0 {
            let base_delay_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
            let policy = chrono_machines::Policy {
                max_attempts: 1,
                base_delay_ms,
                multiplier: 1.0,
                max_delay_ms: base_delay_ms,
            };
            let timeout_ms = policy.calculate_delay(1, self.jitter_factor);
            duration_to_nanos(Duration::from_millis(timeout_ms as u64))
        } else {
            duration_to_nanos(timeout)
        }
    }

    fn note_saturation(&self, saturated: Option<CounterKind>) {
        if let Some(counter) = saturated {
            let logger = &*self.logger;
            let _ = panic::catch_unwind(AssertUnwindSafe(|| {
                logger.counter_saturated(&self.name, counter)
            }));
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("counts", &self.counts())
            .field("settings", &self.settings())
            .field("trip_policy", &self.trip_policy)
            .field("callbacks", &self.callbacks)
            .finish()
    }
}

/// Build the operation's future and poll it, trapping panics from either step
async fn run_async<F, Fut, T, E>(f: F) -> thread::Result<Result<T, E>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(future) => AssertUnwindSafe(future).catch_unwind().await,
        Err(payload) => Err(payload),
    }
}

//! Builder API for ergonomic circuit breaker configuration

use crate::{
    Counts, State,
    circuit::{CircuitBreaker, Policies},
    classifier::SuccessClassifier,
    errors::ConfigError,
    hooks::FaultLogger,
    settings::Config,
};
use std::sync::Arc;
use std::time::Duration;

/// Builder for creating circuit breakers with fluent API
pub struct CircuitBuilder {
    name: String,
    config: Config,
    policies: Policies,
}

impl CircuitBuilder {
    /// Create a new builder for a circuit with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: Config::default(),
            policies: Policies::default(),
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Set how many probe calls may run concurrently while HalfOpen
    pub fn max_requests(mut self, max_requests: u32) -> Self {
        self.config.max_requests = max_requests;
        self
    }

    /// Set the period after which Closed-state counters are cleared
    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    /// Set how long the circuit stays Open before probing
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the number of consecutive failures that trips the circuit
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    /// Trip on failure rate instead of consecutive failures
    ///
    /// The circuit opens when `failures / requests` is strictly greater than
    /// `rate`, once at least `minimum_observations` requests were seen.
    pub fn failure_rate(mut self, rate: f64) -> Self {
        self.config.adaptive = true;
        self.config.failure_rate_threshold = rate;
        self
    }

    /// Set minimum number of requests before the failure rate is evaluated
    pub fn minimum_observations(mut self, observations: u32) -> Self {
        self.config.minimum_observations = observations;
        self
    }

    /// Set the jitter factor (0.0 = no jitter, 1.0 = full jitter)
    /// Uses chrono-machines formula: timeout * (1 - jitter + rand * jitter)
    pub fn jitter_factor(mut self, factor: f64) -> Self {
        self.config.jitter_factor = factor;
        self
    }

    /// Set a custom trip predicate, overriding both the consecutive-failure
    /// threshold and the failure rate
    ///
    /// A panic inside the predicate is logged and treated as "do not trip".
    pub fn ready_to_trip<F>(mut self, f: F) -> Self
    where
        F: Fn(&Counts) -> bool + Send + Sync + 'static,
    {
        self.policies.ready_to_trip = Some(Arc::new(f));
        self
    }

    /// Set a success classifier deciding which outcomes count as healthy
    ///
    /// A panic inside the classifier is logged and the outcome counts as a
    /// failure.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use adaptive_breaker::{CircuitBreaker, PredicateClassifier};
    /// use std::sync::Arc;
    /// use std::time::Duration;
    ///
    /// let circuit = CircuitBreaker::builder("api")
    ///     .success_classifier(Arc::new(PredicateClassifier::new(|ctx| {
    ///         // Slow answers are as bad as errors
    ///         ctx.error.is_none() && ctx.duration < Duration::from_secs(1)
    ///     })))
    ///     .build();
    /// # drop(circuit);
    /// ```
    pub fn success_classifier(mut self, classifier: Arc<dyn SuccessClassifier>) -> Self {
        self.policies.classifier = Some(classifier);
        self
    }

    /// Set the sink for trapped hook panics and counter saturation
    pub fn fault_logger(mut self, logger: Arc<dyn FaultLogger>) -> Self {
        self.policies.logger = Some(logger);
        self
    }

    /// Set callback for every state transition
    pub fn on_state_change<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, State, State) + Send + Sync + 'static,
    {
        self.policies.callbacks.on_state_change = Some(Arc::new(f));
        self
    }

    /// Set callback for when circuit opens
    pub fn on_open<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.policies.callbacks.on_open = Some(Arc::new(f));
        self
    }

    /// Set callback for when circuit closes
    pub fn on_close<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.policies.callbacks.on_close = Some(Arc::new(f));
        self
    }

    /// Set callback for when circuit enters half-open
    pub fn on_half_open<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.policies.callbacks.on_half_open = Some(Arc::new(f));
        self
    }

    /// Build the circuit breaker
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid, e.g. a failure rate outside
    /// `(0, 1)` or a zero timeout.
    pub fn build(self) -> CircuitBreaker {
        match self.try_build() {
            Ok(circuit) => circuit,
            Err(e) => panic!("invalid circuit breaker configuration: {e}"),
        }
    }

    /// Build the circuit breaker, returning an error for invalid configuration
    pub fn try_build(self) -> Result<CircuitBreaker, ConfigError> {
        CircuitBreaker::with_policies(self.name, self.config, self.policies)
    }
}

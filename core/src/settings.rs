//! Construction-time configuration and the runtime settings store
//!
//! [`Config`] is the value a circuit is built from. The five fields that can
//! change while traffic flows are copied into a [`SettingsStore`], which swaps
//! a whole immutable [`Settings`] record at once. Readers always see one
//! consistent record without taking a lock.

use crate::errors::ConfigError;
use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::Duration;

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of probe calls admitted concurrently while HalfOpen
    pub max_requests: u32,

    /// Period after which counters are cleared while Closed
    /// `Duration::ZERO` keeps counters until the next state change
    pub interval: Duration,

    /// Time spent Open before a probe is allowed
    pub timeout: Duration,

    /// Consecutive failures that trip the circuit when no adaptive or custom
    /// trip policy is configured
    pub failure_threshold: u32,

    /// Trip on failure rate instead of consecutive failures
    pub adaptive: bool,

    /// Failure rate (0.0-1.0, exclusive) above which an adaptive circuit trips
    pub failure_rate_threshold: f64,

    /// Requests required before the failure rate is evaluated
    pub minimum_observations: u32,

    /// Jitter factor for the open timeout (0.0 = no jitter, 1.0 = full jitter)
    /// Uses chrono-machines formula: timeout * (1 - jitter + rand * jitter)
    pub jitter_factor: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_requests: 1,
            interval: Duration::ZERO,
            timeout: Duration::from_secs(60),
            failure_threshold: 6,
            adaptive: false,
            failure_rate_threshold: 0.5,
            minimum_observations: 20,
            jitter_factor: 0.0,
        }
    }
}

impl Config {
    /// Check every field, returning the first invalid one
    pub fn validate(&self) -> Result<(), ConfigError> {
        SettingsUpdate::from(self).validate(self.adaptive)?;

        if self.failure_threshold == 0 {
            return Err(ConfigError::FailureThreshold);
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(ConfigError::JitterFactor(self.jitter_factor));
        }
        Ok(())
    }

    pub(crate) fn settings(&self) -> Settings {
        Settings {
            max_requests: self.max_requests,
            interval: self.interval,
            timeout: self.timeout,
            failure_rate_threshold: self.failure_rate_threshold,
            minimum_observations: self.minimum_observations,
        }
    }
}

/// Runtime-tunable settings in effect at one instant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    pub max_requests: u32,
    pub interval: Duration,
    pub timeout: Duration,
    pub failure_rate_threshold: f64,
    pub minimum_observations: u32,
}

/// Sparse settings change; absent fields keep their current value
///
/// ```rust
/// use adaptive_breaker::SettingsUpdate;
/// use std::time::Duration;
///
/// let update = SettingsUpdate::new()
///     .timeout(Duration::from_secs(5))
///     .max_requests(3);
/// assert!(update.interval.is_none());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SettingsUpdate {
    pub max_requests: Option<u32>,
    pub interval: Option<Duration>,
    pub timeout: Option<Duration>,
    pub failure_rate_threshold: Option<f64>,
    pub minimum_observations: Option<u32>,
}

impl SettingsUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_requests(mut self, max_requests: u32) -> Self {
        self.max_requests = Some(max_requests);
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn failure_rate_threshold(mut self, threshold: f64) -> Self {
        self.failure_rate_threshold = Some(threshold);
        self
    }

    pub fn minimum_observations(mut self, observations: u32) -> Self {
        self.minimum_observations = Some(observations);
        self
    }

    /// Validate every present field
    ///
    /// The failure rate threshold is only checked for adaptive circuits.
    /// `interval` needs no check: a `Duration` cannot be negative.
    pub fn validate(&self, adaptive: bool) -> Result<(), ConfigError> {
        if self.max_requests == Some(0) {
            return Err(ConfigError::MaxRequests);
        }
        if self.timeout == Some(Duration::ZERO) {
            return Err(ConfigError::Timeout);
        }
        if adaptive
            && let Some(threshold) = self.failure_rate_threshold
            && !(threshold > 0.0 && threshold < 1.0)
        {
            return Err(ConfigError::FailureRateThreshold(threshold));
        }
        if self.minimum_observations == Some(0) {
            return Err(ConfigError::MinimumObservations);
        }
        Ok(())
    }

    fn apply_to(&self, current: &Settings) -> Settings {
        Settings {
            max_requests: self.max_requests.unwrap_or(current.max_requests),
            interval: self.interval.unwrap_or(current.interval),
            timeout: self.timeout.unwrap_or(current.timeout),
            failure_rate_threshold: self
                .failure_rate_threshold
                .unwrap_or(current.failure_rate_threshold),
            minimum_observations: self
                .minimum_observations
                .unwrap_or(current.minimum_observations),
        }
    }
}

impl From<&Config> for SettingsUpdate {
    fn from(config: &Config) -> Self {
        Self {
            max_requests: Some(config.max_requests),
            interval: Some(config.interval),
            timeout: Some(config.timeout),
            failure_rate_threshold: Some(config.failure_rate_threshold),
            minimum_observations: Some(config.minimum_observations),
        }
    }
}

/// Lock-free holder of the current [`Settings`]
#[derive(Debug)]
pub(crate) struct SettingsStore {
    current: ArcSwap<Settings>,
    adaptive: bool,
}

impl SettingsStore {
    pub(crate) fn new(settings: Settings, adaptive: bool) -> Self {
        Self {
            current: ArcSwap::from_pointee(settings),
            adaptive,
        }
    }

    pub(crate) fn load(&self) -> Settings {
        **self.current.load()
    }

    pub(crate) fn is_adaptive(&self) -> bool {
        self.adaptive
    }

    /// Validate `update` and, only if every field passes, merge it in
    ///
    /// Returns the records before and after the swap.
    pub(crate) fn apply(
        &self,
        update: &SettingsUpdate,
    ) -> Result<(Settings, Settings), ConfigError> {
        update.validate(self.adaptive)?;

        let previous = self
            .current
            .rcu(|current| Arc::new(update.apply_to(current)));
        let previous = *previous;
        Ok((previous, update.apply_to(&previous)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn store(adaptive: bool) -> SettingsStore {
        SettingsStore::new(Config::default().settings(), adaptive)
    }

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(Config::default().validate(), Ok(()));
    }

    #[test]
    fn test_config_rejects_bad_fields() {
        let zero_requests = Config {
            max_requests: 0,
            ..Default::default()
        };
        assert_eq!(zero_requests.validate(), Err(ConfigError::MaxRequests));

        let bad_rate = Config {
            adaptive: true,
            failure_rate_threshold: 1.0,
            ..Default::default()
        };
        assert_eq!(
            bad_rate.validate(),
            Err(ConfigError::FailureRateThreshold(1.0))
        );

        let bad_jitter = Config {
            jitter_factor: 1.5,
            ..Default::default()
        };
        assert_eq!(bad_jitter.validate(), Err(ConfigError::JitterFactor(1.5)));

        let no_threshold = Config {
            failure_threshold: 0,
            ..Default::default()
        };
        assert_eq!(no_threshold.validate(), Err(ConfigError::FailureThreshold));
    }

    #[test]
    fn test_rate_threshold_ignored_when_not_adaptive() {
        let config = Config {
            failure_rate_threshold: 7.0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_nan_threshold_rejected() {
        let update = SettingsUpdate::new().failure_rate_threshold(f64::NAN);
        assert!(matches!(
            update.validate(true),
            Err(ConfigError::FailureRateThreshold(_))
        ));
    }

    #[test]
    fn test_sparse_update_keeps_absent_fields() {
        let store = store(false);
        let before = store.load();

        let (previous, updated) = store
            .apply(&SettingsUpdate::new().max_requests(4))
            .expect("valid update");

        assert_eq!(previous, before);
        assert_eq!(updated.max_requests, 4);
        assert_eq!(updated.timeout, before.timeout);
        assert_eq!(updated.interval, before.interval);
        assert_eq!(store.load(), updated);
    }

    #[test]
    fn test_invalid_update_changes_nothing() {
        let store = store(true);
        let before = store.load();

        let update = SettingsUpdate::new()
            .max_requests(10)
            .timeout(Duration::from_secs(1))
            .failure_rate_threshold(1.5);

        assert_eq!(
            store.apply(&update),
            Err(ConfigError::FailureRateThreshold(1.5))
        );
        assert_eq!(store.load(), before);
    }

    #[test]
    fn test_zero_values_rejected() {
        let store = store(false);

        assert_eq!(
            store.apply(&SettingsUpdate::new().timeout(Duration::ZERO)),
            Err(ConfigError::Timeout)
        );
        assert_eq!(
            store.apply(&SettingsUpdate::new().minimum_observations(0)),
            Err(ConfigError::MinimumObservations)
        );
    }

    #[test]
    fn test_concurrent_updates_do_not_lose_fields() {
        let store = Arc::new(store(false));

        let a = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..100 {
                    store
                        .apply(&SettingsUpdate::new().max_requests(7))
                        .unwrap();
                }
            })
        };
        let b = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..100 {
                    store
                        .apply(&SettingsUpdate::new().timeout(Duration::from_secs(9)))
                        .unwrap();
                }
            })
        };

        a.join().unwrap();
        b.join().unwrap();

        let settings = store.load();
        assert_eq!(settings.max_requests, 7);
        assert_eq!(settings.timeout, Duration::from_secs(9));
    }
}

//! Read-only snapshots of a circuit's health
//!
//! Snapshots are assembled from independent atomic reads and are therefore
//! approximate under concurrent traffic. They are meant for dashboards and
//! health endpoints, not for making decisions that need a consistent view.

use crate::{Counts, Settings, State};
use std::time::{Duration, Instant};

/// State and counters of a circuit at one moment
#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub name: String,
    pub state: State,
    pub counts: Counts,
    /// `total_failures / requests`, or 0.0 with no requests
    pub failure_rate: f64,
    /// `total_successes / requests`, or 0.0 with no requests
    pub success_rate: f64,
    /// A total counter hit its limit since the last clear
    pub saturated: bool,
    pub state_changed_at: Instant,
    pub counts_cleared_at: Instant,
}

/// [`Metrics`] plus active settings and short-term predictions
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostics {
    pub metrics: Metrics,
    pub settings: Settings,
    pub adaptive: bool,
    pub jitter_factor: f64,
    /// Probes currently admitted; only meaningful while HalfOpen
    pub half_open_in_flight: u32,
    /// Whether one more failure would trip the circuit; always `false`
    /// unless Closed
    pub will_trip_on_next_failure: bool,
    /// Wait before the next probe is admitted; `Some` only while Open
    pub time_until_probe: Option<Duration>,
}

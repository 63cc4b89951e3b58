//! Traffic-proportional trip decision
//!
//! A fixed consecutive-failure count trips too eagerly at low volume and too
//! late at high volume. Comparing the failure rate against a threshold, once
//! enough requests have been observed, behaves the same at any volume.

use crate::Counts;

/// Fraction of requests that failed, or 0.0 with no requests
pub fn failure_rate(counts: &Counts) -> f64 {
    ratio(counts.total_failures, counts.requests)
}

/// Fraction of requests that succeeded, or 0.0 with no requests
pub fn success_rate(counts: &Counts) -> f64 {
    ratio(counts.total_successes, counts.requests)
}

/// Whether the failure rate is strictly above `threshold`
///
/// Never trips below `minimum_observations` requests. A rate exactly equal
/// to the threshold does not trip.
pub fn should_trip(counts: &Counts, threshold: f64, minimum_observations: u32) -> bool {
    if counts.requests < minimum_observations || counts.requests == 0 {
        return false;
    }
    failure_rate(counts) > threshold
}

fn ratio(part: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        f64::from(part) / f64::from(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(requests: u32, failures: u32) -> Counts {
        Counts {
            requests,
            total_successes: requests - failures,
            total_failures: failures,
            ..Default::default()
        }
    }

    #[test]
    fn test_rates_with_no_requests() {
        let empty = Counts::default();
        assert_eq!(failure_rate(&empty), 0.0);
        assert_eq!(success_rate(&empty), 0.0);
    }

    #[test]
    fn test_rates() {
        let c = counts(20, 3);
        assert!((failure_rate(&c) - 0.15).abs() < f64::EPSILON);
        assert!((success_rate(&c) - 0.85).abs() < f64::EPSILON);
    }

    #[test]
    fn test_insufficient_observations_never_trip() {
        assert!(!should_trip(&counts(19, 19), 0.1, 20));
    }

    #[test]
    fn test_rate_equal_to_threshold_does_not_trip() {
        assert!(!should_trip(&counts(20, 2), 0.10, 20));
        assert!(!should_trip(&counts(100, 50), 0.5, 20));
    }

    #[test]
    fn test_rate_above_threshold_trips() {
        assert!(should_trip(&counts(20, 3), 0.10, 20));
        assert!(should_trip(&counts(21, 4), 0.10, 20));
    }

    #[test]
    fn test_same_threshold_at_any_volume() {
        assert!(should_trip(&counts(50, 6), 0.10, 20));
        assert!(should_trip(&counts(50_000, 6_000), 0.10, 20));
        assert!(!should_trip(&counts(50_000, 4_000), 0.10, 20));
    }
}

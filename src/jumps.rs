//! Detection of latency jumps in a latency-by-traversal-count series.
//!
//! A jump marks the traversal count at which the working set stopped fitting into a cache level.
//! The series is scanned from the longest traversal down, comparing each sample against the
//! running minimum of the longer traversals, so that noise below the boundary is not mistaken for a rise.

use std::{collections::BTreeMap, time::Duration};

/// Detected jumps, keyed by traversal count. Always contains traversal count 1 as a baseline.
pub type Jumps = BTreeMap<usize, Duration>;

/// Which sample's latency is reported for a jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JumpValue {
    /// The latency of the first traversal count past the rise.
    #[default]
    AfterRise,
    /// The latency of the last traversal count before the rise.
    BeforeRise,
}

/// Returns `true` if `b` lies within `a·(1 - margin)..=a·(1 + margin)`.
pub fn within_error_margin(a: Duration, b: Duration, margin: f64) -> bool {
    let a = a.as_nanos() as f64;
    let b = b.as_nanos() as f64;
    a * (1. - margin) <= b && b <= a * (1. + margin)
}

/// Finds latency jumps in `latencies`, where `latencies[i]` is the latency of traversal count `i + 1`.
pub fn spots_with_jumps(latencies: &[Duration], margin: f64, value: JumpValue) -> Jumps {
    let mut jumps = Jumps::new();
    let Some((&last, rest)) = latencies.split_last() else {
        return jumps;
    };
    let mut comparison_point = last;
    for (i, &latency) in rest.iter().enumerate().rev() {
        if !within_error_margin(comparison_point, latency, margin) && latency < comparison_point {
            let reported = match value {
                JumpValue::AfterRise => latencies[i + 1],
                JumpValue::BeforeRise => latency,
            };
            jumps.insert(i + 2, reported);
        }
        comparison_point = comparison_point.min(latency);
    }
    jumps.insert(1, latencies[0]);
    jumps
}

/// The smallest jump past the baseline, if any.
pub fn first_interesting_jump(jumps: &Jumps) -> Option<usize> {
    jumps.keys().nth(1).copied()
}

#[cfg(test)]
fn nanos(xs: &[u64]) -> Vec<Duration> {
    xs.iter().copied().map(Duration::from_nanos).collect()
}

#[test]
fn test_tolerance() {
    let a = Duration::from_nanos(100);
    for margin in [0.0, 0.1, 0.5, 2.0] {
        assert!(within_error_margin(a, a, margin));
    }
    assert!(!within_error_margin(a, Duration::from_nanos(101), 0.0));
    assert!(!within_error_margin(a, Duration::from_nanos(99), 0.0));
    assert!(within_error_margin(a, Duration::from_nanos(80), 0.2));
    assert!(within_error_margin(a, Duration::from_nanos(120), 0.2));
    assert!(!within_error_margin(a, Duration::from_nanos(79), 0.2));
    assert!(!within_error_margin(a, Duration::from_nanos(121), 0.2));
}

#[test]
fn test_tolerance_is_anchored_on_first_argument() {
    let a = Duration::from_nanos(100);
    let b = Duration::from_nanos(125);
    assert!(within_error_margin(b, a, 0.2));
    assert!(!within_error_margin(a, b, 0.2));
}

#[test]
fn test_single_rise() {
    let latencies = nanos(&[10, 10, 10, 50, 52, 55]);
    let jumps = spots_with_jumps(&latencies, 0.2, JumpValue::AfterRise);
    assert_eq!(
        jumps,
        Jumps::from([(1, Duration::from_nanos(10)), (4, Duration::from_nanos(50))])
    );
    assert_eq!(first_interesting_jump(&jumps), Some(4));
}

#[test]
fn test_before_rise_reports_lower_latency() {
    let latencies = nanos(&[10, 10, 10, 50, 52, 55]);
    let jumps = spots_with_jumps(&latencies, 0.2, JumpValue::BeforeRise);
    assert_eq!(
        jumps,
        Jumps::from([(1, Duration::from_nanos(10)), (4, Duration::from_nanos(10))])
    );
}

#[test]
fn test_two_levels() {
    let latencies = nanos(&[5, 5, 20, 21, 20, 100, 98, 105]);
    let jumps = spots_with_jumps(&latencies, 0.2, JumpValue::AfterRise);
    assert_eq!(jumps.keys().copied().collect::<Vec<_>>(), vec![1, 3, 6]);
    assert_eq!(first_interesting_jump(&jumps), Some(3));
}

#[test]
fn test_noise_below_boundary_is_ignored() {
    // 30 at count 2 is a spike, not a level: it is never below the running minimum
    let latencies = nanos(&[10, 30, 10, 11, 10]);
    let jumps = spots_with_jumps(&latencies, 0.2, JumpValue::AfterRise);
    assert_eq!(jumps.len(), 1);
    assert_eq!(first_interesting_jump(&jumps), None);
}

#[test]
fn test_flat_series_has_only_baseline() {
    let latencies = nanos(&[40; 12]);
    let jumps = spots_with_jumps(&latencies, 0.2, JumpValue::AfterRise);
    assert_eq!(jumps, Jumps::from([(1, Duration::from_nanos(40))]));
}

#[test]
fn test_degenerate_series() {
    assert!(spots_with_jumps(&[], 0.2, JumpValue::AfterRise).is_empty());
    let one = nanos(&[7]);
    assert_eq!(
        spots_with_jumps(&one, 0.2, JumpValue::AfterRise),
        Jumps::from([(1, Duration::from_nanos(7))])
    );
}

#[test]
fn test_baseline_always_present() {
    use rand::Rng;
    let mut rng = rand::rng();
    for _ in 0..200 {
        let len = rng.random_range(1..100);
        let latencies: Vec<Duration> = (0..len)
            .map(|_| Duration::from_nanos(rng.random_range(1..10_000)))
            .collect();
        let jumps = spots_with_jumps(&latencies, 0.2, JumpValue::AfterRise);
        assert_eq!(jumps.get(&1), Some(&latencies[0]));
        assert!(jumps.keys().all(|&k| (1..=len).contains(&k)));
    }
}

//! Angle helpers for carrier phase work.

use std::f64::consts::PI;

/// Smallest signed difference between `t` and a multiple of `2 * a`, in `[-a, a)`.
pub fn wrap(t: f64, a: f64) -> f64 {
    let period = 2.0 * a;
    // rem_euclid can round up to the period itself for tiny negative inputs.
    let folded = (t + a).rem_euclid(period);
    if folded < period {
        folded - a
    } else {
        -a
    }
}

/// Removes artificial ±2π jumps from a sequence of angles.
///
/// Each consecutive difference is folded into `[-π, π)` and the folded
/// differences are re-accumulated from the first angle, so a steady
/// per-sample increment survives crossing the ±π boundary.
pub fn unwrap_phase(phases: &[f64]) -> Vec<f64> {
    let Some(&first) = phases.first() else {
        return Vec::new();
    };
    std::iter::once(first)
        .chain(phases.windows(2).scan(first, |acc, pair| {
            *acc += wrap(pair[1] - pair[0], PI);
            Some(*acc)
        }))
        .collect()
}

//! Channel impairments applied before the receiver sees the samples.

use anyhow::{anyhow, Context};
use carriercore::processing::FractionalDelay;
use carriercore::{Sample, Signal};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::f64::consts::PI;

/// Noise spectral density N0 for an Eb/N0 in dB and energy per bit `eb`.
pub fn noise_variance(ebn0_db: f64, eb: f64) -> f64 {
    eb / 10f64.powf(ebn0_db / 10.0)
}

/// Adds complex white Gaussian noise with `n0 / 2` variance per component.
pub fn add_noise<R: Rng>(rng: &mut R, signal: &[Sample], n0: f64) -> anyhow::Result<Signal> {
    let normal = Normal::new(0.0, (n0 / 2.0).sqrt())
        .map_err(|err| anyhow!("noise variance {}: {}", n0, err))?;
    Ok(signal
        .iter()
        .map(|&s| s + Sample::new(normal.sample(rng), normal.sample(rng)))
        .collect())
}

/// Rotates sample `n` by `2π · cycles_per_sample · n`.
pub fn add_frequency_offset(signal: &[Sample], cycles_per_sample: f64) -> Signal {
    signal
        .iter()
        .enumerate()
        .map(|(n, &s)| s * Sample::from_polar(1.0, 2.0 * PI * cycles_per_sample * n as f64))
        .collect()
}

pub fn add_phase_offset(signal: &[Sample], radians: f64) -> Signal {
    let rotation = Sample::from_polar(1.0, radians);
    signal.iter().map(|&s| s * rotation).collect()
}

/// Delays the signal by `samples`, which may be fractional.
pub fn add_timing_offset(signal: &[Sample], samples: f64) -> anyhow::Result<Signal> {
    FractionalDelay::new(-samples)
        .and_then(|delay| delay.apply_signal(signal))
        .with_context(|| format!("delaying signal by {} samples", samples))
}

use crate::math::phase::unwrap_phase;
use crate::math::window::blackman;
use crate::prelude::{CarrierError, CarrierResult, Sample, Signal};
use serde::{Deserialize, Serialize};
use std::ops::{Mul, Sub};

/// Which derivative to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DerivativeOrder {
    First,
    Second,
}

impl TryFrom<u8> for DerivativeOrder {
    type Error = CarrierError;

    fn try_from(order: u8) -> CarrierResult<Self> {
        match order {
            1 => Ok(Self::First),
            2 => Ok(Self::Second),
            other => Err(CarrierError::InvalidParameter(format!(
                "derivative order {} not supported",
                other
            ))),
        }
    }
}

/// Discrete derivatives of sampled sequences.
///
/// Interior samples use the central difference `(x[n+1] - x[n-1]) / 2`;
/// the first sample uses a forward difference and the last a backward
/// difference, so the output always has the input's length.
pub struct DerivativeEstimator;

impl DerivativeEstimator {
    pub fn derivative(signal: &[Sample], order: DerivativeOrder) -> CarrierResult<Signal> {
        let first = difference(signal)?;
        match order {
            DerivativeOrder::First => Ok(first),
            DerivativeOrder::Second => difference(&first),
        }
    }

    /// Unwrapped instantaneous phase of each sample, in radians.
    pub fn unwrapped_phase(signal: &[Sample]) -> Vec<f64> {
        let phases: Vec<f64> = signal.iter().map(|s| s.arg()).collect();
        unwrap_phase(&phases)
    }

    /// Derivative of the unwrapped instantaneous phase, in radians/sample.
    pub fn phase_derivative(signal: &[Sample]) -> CarrierResult<Vec<f64>> {
        difference(&Self::unwrapped_phase(signal))
    }

    /// Derivative of the sample magnitudes.
    pub fn magnitude_derivative(signal: &[Sample]) -> CarrierResult<Vec<f64>> {
        let magnitudes: Vec<f64> = signal.iter().map(|s| s.norm()).collect();
        difference(&magnitudes)
    }
}

/// Same-length first difference with one-sided edges.
pub(crate) fn difference<T>(values: &[T]) -> CarrierResult<Vec<T>>
where
    T: Copy + Sub<Output = T> + Mul<f64, Output = T>,
{
    let n = values.len();
    if n < 2 {
        return Err(CarrierError::InsufficientData(format!(
            "derivative needs at least 2 samples, got {}",
            n
        )));
    }
    let interior = values.windows(3).map(|w| (w[2] - w[0]) * 0.5);
    Ok(std::iter::once(values[1] - values[0])
        .chain(interior)
        .chain(std::iter::once(values[n - 1] - values[n - 2]))
        .collect())
}

/// Blackman-windowed ideal differentiator, `h[n] = (-1)^n / n`.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivativeFilter {
    coefficients: Vec<f64>,
    sample_period: f64,
}

impl DerivativeFilter {
    /// `len` must be of the form `4k - 1`.
    pub fn new(len: usize) -> CarrierResult<Self> {
        Self::with_sample_period(len, 1.0)
    }

    pub fn with_sample_period(len: usize, sample_period: f64) -> CarrierResult<Self> {
        if len < 3 || (len + 1) % 4 != 0 {
            return Err(CarrierError::InvalidParameter(format!(
                "derivative filter length {} is not of the form 4k - 1",
                len
            )));
        }
        if !(sample_period.is_finite() && sample_period > 0.0) {
            return Err(CarrierError::InvalidParameter(format!(
                "sample period {} must be positive",
                sample_period
            )));
        }
        let half = (len as i64 - 1) / 2;
        let window = blackman(len);
        let coefficients = (-half..=half)
            .zip(window)
            .map(|(n, w)| {
                if n == 0 {
                    0.0
                } else {
                    let sign = if n % 2 == 0 { 1.0 } else { -1.0 };
                    sign / (n as f64 * sample_period) * w
                }
            })
            .collect();
        Ok(Self {
            coefficients,
            sample_period,
        })
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn sample_period(&self) -> f64 {
        self.sample_period
    }

    /// Same-length derivative of `x`, with linearly extrapolated edges.
    pub fn apply(&self, x: &[f64]) -> CarrierResult<Vec<f64>> {
        convolve_extrapolated(&self.coefficients, x)
    }
}

/// Same-length convolution of `x` with an odd-length, centered kernel.
///
/// Both ends are extended by linear extrapolation over half the kernel
/// before convolving, and only the fully overlapped outputs are kept.
pub(crate) fn convolve_extrapolated(coefficients: &[f64], x: &[f64]) -> CarrierResult<Vec<f64>> {
    let n = x.len();
    if n < 2 {
        return Err(CarrierError::InsufficientData(format!(
            "edge extrapolation needs at least 2 samples, got {}",
            n
        )));
    }
    let pad = coefficients.len().saturating_sub(1) / 2;
    let head_slope = x[1] - x[0];
    let tail_slope = x[n - 1] - x[n - 2];

    let extended: Vec<f64> = (1..=pad)
        .rev()
        .map(|k| x[0] - k as f64 * head_slope)
        .chain(x.iter().copied())
        .chain((1..=pad).map(|k| x[n - 1] + k as f64 * tail_slope))
        .collect();

    // h[m] sits at coefficients[m + pad]; y[i] = sum_m h[m] * x[i - m].
    Ok((0..n)
        .map(|i| {
            coefficients
                .iter()
                .enumerate()
                .map(|(j, &h)| h * extended[i + 2 * pad - j])
                .sum()
        })
        .collect())
}

use crate::math::fft::FftHelper;
use crate::math::phase::wrap;
use crate::math::stats::StatsHelper;
use crate::prelude::{CarrierError, CarrierResult, Sample, Signal};
use crate::processing::derivative::{difference, DerivativeEstimator};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Derivative variance (rad²/sample²) above which an estimate is flagged.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.1;

/// How far an estimate can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    #[default]
    Nominal,
    /// The phase derivative varied more than the configured threshold.
    WideVariance,
}

/// Carrier offset over one estimation window.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OffsetEstimate {
    /// Radians per sample.
    pub frequency_offset: f64,
    /// Radians.
    pub phase_offset: f64,
    /// Window variance of the phase derivative.
    pub variance: f64,
    pub confidence: Confidence,
}

impl OffsetEstimate {
    pub fn new(frequency_offset: f64, phase_offset: f64) -> Self {
        Self {
            frequency_offset,
            phase_offset,
            ..Default::default()
        }
    }

    /// The estimate that undoes this one.
    pub fn inverse(&self) -> Self {
        Self {
            frequency_offset: -self.frequency_offset,
            phase_offset: -self.phase_offset,
            ..*self
        }
    }

    /// Scales an estimate taken on an `m`-th power signal back to the original.
    ///
    /// The returned phase is ambiguous by multiples of `2π / m`.
    pub fn divided_by(&self, m: u32) -> CarrierResult<Self> {
        if m == 0 {
            return Err(CarrierError::InvalidParameter(
                "cannot divide an estimate by zero".into(),
            ));
        }
        let m = m as f64;
        Ok(Self {
            frequency_offset: self.frequency_offset / m,
            phase_offset: self.phase_offset / m,
            variance: self.variance / (m * m),
            confidence: self.confidence,
        })
    }
}

/// Derivative-based frequency and phase offset estimator.
///
/// The estimator does not strip modulation. Callers working with M-ary
/// PSK raise the window to the M-th power first ([`strip_modulation`])
/// and scale the result back with [`OffsetEstimate::divided_by`];
/// otherwise symbol phase jumps coarsen the estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffsetEstimator {
    confidence_threshold: f64,
}

impl Default for OffsetEstimator {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

impl OffsetEstimator {
    pub fn new(confidence_threshold: f64) -> CarrierResult<Self> {
        if !(confidence_threshold.is_finite() && confidence_threshold > 0.0) {
            return Err(CarrierError::InvalidParameter(format!(
                "confidence threshold {} must be positive",
                confidence_threshold
            )));
        }
        Ok(Self {
            confidence_threshold,
        })
    }

    pub fn confidence_threshold(&self) -> f64 {
        self.confidence_threshold
    }

    /// Estimates the offset over `signal`.
    ///
    /// Frequency is the mean of the unwrapped phase derivative. Phase is
    /// the mean of the unwrapped phase after removing the `frequency * n`
    /// trend, wrapped into `[-π, π)`. A noisy window is never an error; it
    /// comes back marked [`Confidence::WideVariance`].
    pub fn estimate(&self, signal: &[Sample]) -> CarrierResult<OffsetEstimate> {
        if signal.len() < 2 {
            return Err(CarrierError::InsufficientData(format!(
                "offset estimation needs at least 2 samples, got {}",
                signal.len()
            )));
        }

        let phases = DerivativeEstimator::unwrapped_phase(signal);
        let derivative = difference(&phases)?;
        let frequency_offset = StatsHelper::mean(&derivative);
        let variance = StatsHelper::variance(&derivative);

        let detrended: Vec<f64> = phases
            .iter()
            .enumerate()
            .map(|(n, &phase)| phase - frequency_offset * n as f64)
            .collect();
        let phase_offset = wrap(StatsHelper::mean(&detrended), PI);

        let confidence = if variance > self.confidence_threshold {
            warn!(
                "offset estimate variance {:.4} exceeds threshold {:.4}",
                variance, self.confidence_threshold
            );
            Confidence::WideVariance
        } else {
            Confidence::Nominal
        };

        debug!(
            "estimated offset over {} samples: {:.6} rad/sample, {:.4} rad",
            signal.len(),
            frequency_offset,
            phase_offset
        );

        Ok(OffsetEstimate {
            frequency_offset,
            phase_offset,
            variance,
            confidence,
        })
    }
}

/// Removes M-ary PSK modulation: `|z|² · exp(j·m·arg z)`.
pub fn strip_modulation(signal: &[Sample], m: u32) -> CarrierResult<Signal> {
    if m == 0 {
        return Err(CarrierError::InvalidParameter(
            "modulation power must be positive".into(),
        ));
    }
    let m = m as f64;
    Ok(signal
        .iter()
        .map(|z| Sample::from_polar(z.norm_sqr(), m * z.arg()))
        .collect())
}

/// Sub-bin refinement of the spectral peak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    /// Peak bin only.
    Coarse,
    /// Parabola through the peak and its neighbors.
    Parabolic,
    /// Parabola through the log-power of the peak and its neighbors.
    #[default]
    Gaussian,
}

/// Spectral frequency estimator for M-ary PSK windows.
///
/// Strips the modulation by `power`, takes a zero-padded FFT of twice
/// the window length, and locates the strongest line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerLawEstimator {
    power: u32,
    interpolation: Interpolation,
}

impl PowerLawEstimator {
    pub fn new(power: u32, interpolation: Interpolation) -> CarrierResult<Self> {
        if power == 0 {
            return Err(CarrierError::InvalidParameter(
                "modulation power must be positive".into(),
            ));
        }
        Ok(Self {
            power,
            interpolation,
        })
    }

    pub fn power(&self) -> u32 {
        self.power
    }

    /// Frequency offset of the original (unstripped) signal in radians/sample.
    pub fn estimate(&self, signal: &[Sample]) -> CarrierResult<f64> {
        if signal.len() < 2 {
            return Err(CarrierError::InsufficientData(format!(
                "spectral estimation needs at least 2 samples, got {}",
                signal.len()
            )));
        }

        let stripped = strip_modulation(signal, self.power)?;
        let fft_len = 2 * stripped.len();
        let spectrum: Vec<f64> = FftHelper::new(fft_len)
            .forward(&stripped)
            .iter()
            .map(|bin| bin.norm_sqr())
            .collect();

        let peak = spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(idx, _)| idx)
            .unwrap_or(0);
        let below = spectrum[(peak + fft_len - 1) % fft_len];
        let at = spectrum[peak];
        let above = spectrum[(peak + 1) % fft_len];

        let offset = match self.interpolation {
            Interpolation::Coarse => 0.0,
            Interpolation::Parabolic => vertex_offset(below, at, above),
            Interpolation::Gaussian if below > 0.0 && at > 0.0 && above > 0.0 => {
                vertex_offset(below.ln(), at.ln(), above.ln())
            }
            Interpolation::Gaussian => 0.0,
        };

        let bin = if peak >= fft_len / 2 {
            peak as f64 - fft_len as f64
        } else {
            peak as f64
        };
        let cycles = (bin + offset) / fft_len as f64 / self.power as f64;
        debug!(
            "power-law peak at bin {} (+{:.3}), {:.6} rad/sample",
            bin,
            offset,
            2.0 * PI * cycles
        );
        Ok(2.0 * PI * cycles)
    }
}

/// Offset of a parabola's vertex from the middle of three equally spaced points.
fn vertex_offset(below: f64, at: f64, above: f64) -> f64 {
    let curvature = below - 2.0 * at + above;
    if curvature == 0.0 {
        0.0
    } else {
        0.5 * (below - above) / curvature
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(len: usize, frequency: f64, phase: f64) -> Signal {
        (0..len)
            .map(|n| Sample::from_polar(1.0, frequency * n as f64 + phase))
            .collect()
    }

    fn psk_with_offset(len: usize, frequency: f64) -> Signal {
        (0..len)
            .map(|n| {
                let label = (n * 7 + n * n * 3) % 4;
                Sample::from_polar(1.0, PI / 2.0 * label as f64 + frequency * n as f64)
            })
            .collect()
    }

    #[test]
    fn noiseless_offset_is_recovered() {
        let estimate = OffsetEstimator::default()
            .estimate(&tone(1000, 0.01, 0.0))
            .unwrap();
        assert!((0.0095..=0.0105).contains(&estimate.frequency_offset));
        assert!(estimate.phase_offset.abs() < 1e-9);
        assert_eq!(estimate.confidence, Confidence::Nominal);
    }

    #[test]
    fn zero_offset_estimates_zero() {
        let estimate = OffsetEstimator::default()
            .estimate(&vec![Sample::new(0.7, 0.0); 64])
            .unwrap();
        assert!(estimate.frequency_offset.abs() < 1e-12);
        assert!(estimate.phase_offset.abs() < 1e-12);
        assert_eq!(estimate.variance, 0.0);
    }

    #[test]
    fn phase_offset_survives_wraparound() {
        let estimate = OffsetEstimator::default()
            .estimate(&tone(500, -0.2, 1.1))
            .unwrap();
        assert!((estimate.frequency_offset + 0.2).abs() < 1e-9);
        assert!((estimate.phase_offset - 1.1).abs() < 1e-9);
    }

    #[test]
    fn short_window_is_insufficient() {
        let estimator = OffsetEstimator::default();
        assert!(matches!(
            estimator.estimate(&[Sample::new(1.0, 0.0)]),
            Err(CarrierError::InsufficientData(_))
        ));
        assert!(matches!(
            estimator.estimate(&[]),
            Err(CarrierError::InsufficientData(_))
        ));
        assert!(estimator.estimate(&tone(2, 0.1, 0.0)).is_ok());
    }

    #[test]
    fn noisy_window_is_flagged_not_rejected() {
        let estimator = OffsetEstimator::new(0.01).unwrap();
        let estimate = estimator.estimate(&psk_with_offset(256, 0.01)).unwrap();
        assert_eq!(estimate.confidence, Confidence::WideVariance);
        assert!(estimate.variance > 0.01);
    }

    #[test]
    fn invalid_threshold_is_rejected() {
        for threshold in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                OffsetEstimator::new(threshold),
                Err(CarrierError::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn stripping_then_dividing_recovers_psk_offset() {
        let rx = psk_with_offset(400, 0.02);
        let stripped = strip_modulation(&rx, 4).unwrap();
        let estimate = OffsetEstimator::default()
            .estimate(&stripped)
            .unwrap()
            .divided_by(4)
            .unwrap();
        assert!((estimate.frequency_offset - 0.02).abs() < 1e-9);
        assert!(strip_modulation(&rx, 0).is_err());
    }

    #[test]
    fn inverse_and_division() {
        let estimate = OffsetEstimate::new(0.4, -0.8);
        let inverse = estimate.inverse();
        assert_eq!(inverse.frequency_offset, -0.4);
        assert_eq!(inverse.phase_offset, 0.8);
        let quarter = estimate.divided_by(4).unwrap();
        assert!((quarter.frequency_offset - 0.1).abs() < 1e-12);
        assert!((quarter.phase_offset + 0.2).abs() < 1e-12);
        assert!(estimate.divided_by(0).is_err());
    }

    #[test]
    fn power_law_estimator_refines_peak() {
        let rx = psk_with_offset(1000, 0.01);
        let coarse = PowerLawEstimator::new(4, Interpolation::Coarse)
            .unwrap()
            .estimate(&rx)
            .unwrap();
        let parabolic = PowerLawEstimator::new(4, Interpolation::Parabolic)
            .unwrap()
            .estimate(&rx)
            .unwrap();
        let gaussian = PowerLawEstimator::new(4, Interpolation::Gaussian)
            .unwrap()
            .estimate(&rx)
            .unwrap();
        assert!((coarse - 0.01).abs() < 4e-4, "coarse {}", coarse);
        assert!((parabolic - 0.01).abs() < 1e-4, "parabolic {}", parabolic);
        assert!((gaussian - 0.01).abs() < 5e-5, "gaussian {}", gaussian);
    }

    #[test]
    fn power_law_estimator_handles_negative_offsets() {
        let rx = psk_with_offset(512, -0.03);
        let estimate = PowerLawEstimator::new(4, Interpolation::default())
            .unwrap()
            .estimate(&rx)
            .unwrap();
        assert!((estimate + 0.03).abs() < 3e-4, "estimate {}", estimate);
        assert!(PowerLawEstimator::new(0, Interpolation::Coarse).is_err());
        assert!(PowerLawEstimator::new(4, Interpolation::Coarse)
            .unwrap()
            .estimate(&rx[..1])
            .is_err());
    }
}

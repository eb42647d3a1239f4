use crate::prelude::{CarrierError, CarrierResult, Sample, Signal};
use crate::processing::derivative::convolve_extrapolated;
use log::trace;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Default kernel length, in taps.
pub const DEFAULT_DELAY_TAPS: usize = 51;

/// Truncated-sinc interpolator that resamples a sequence at a fractional
/// sample offset.
///
/// Output `i` approximates the band-limited input at time `i + shift`, so a
/// positive shift advances the sequence and a negative one delays it.
/// Integer shifts reduce to exact sample moves away from the edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FractionalDelay {
    coefficients: Vec<f64>,
    shift: f64,
}

impl FractionalDelay {
    pub fn new(shift: f64) -> CarrierResult<Self> {
        Self::with_len(shift, DEFAULT_DELAY_TAPS)
    }

    /// `len` must be odd and at least 3.
    pub fn with_len(shift: f64, len: usize) -> CarrierResult<Self> {
        if len < 3 || len % 2 == 0 {
            return Err(CarrierError::InvalidParameter(format!(
                "fractional delay length {} must be odd and at least 3",
                len
            )));
        }
        if !shift.is_finite() {
            return Err(CarrierError::InvalidParameter(format!(
                "fractional shift {} is not finite",
                shift
            )));
        }
        let half = (len as i64 - 1) / 2;
        let coefficients = (-half..=half)
            .map(|n| {
                let x = (n as f64 + shift) * PI;
                if x == 0.0 {
                    1.0
                } else {
                    x.sin() / x
                }
            })
            .collect();
        trace!("fractional delay: {} taps, shift {}", len, shift);
        Ok(Self {
            coefficients,
            shift,
        })
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn shift(&self) -> f64 {
        self.shift
    }

    /// Same-length resampled copy of `x`, with linearly extrapolated edges.
    pub fn apply(&self, x: &[f64]) -> CarrierResult<Vec<f64>> {
        convolve_extrapolated(&self.coefficients, x)
    }

    /// Resamples the in-phase and quadrature rails independently.
    pub fn apply_signal(&self, signal: &[Sample]) -> CarrierResult<Signal> {
        let re: Vec<f64> = signal.iter().map(|s| s.re).collect();
        let im: Vec<f64> = signal.iter().map(|s| s.im).collect();
        let re = self.apply(&re)?;
        let im = self.apply(&im)?;
        Ok(re
            .into_iter()
            .zip(im)
            .map(|(re, im)| Sample::new(re, im))
            .collect())
    }
}

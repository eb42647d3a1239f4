use crate::prelude::{CarrierError, CarrierResult, Sample, Signal};
use log::debug;
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_1_SQRT_2, FRAC_PI_4, PI};

/// Distance in symbol periods below which a tap time counts as a singular point.
const SINGULARITY_TOLERANCE: f64 = 1e-9;

/// Pulse-shaping filter parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub rolloff: f64,
    /// Filter span in symbols.
    pub span: usize,
    pub samples_per_symbol: usize,
}

impl FilterSpec {
    pub fn new(rolloff: f64, span: usize, samples_per_symbol: usize) -> CarrierResult<Self> {
        let spec = Self {
            rolloff,
            span,
            samples_per_symbol,
        };
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> CarrierResult<()> {
        if !(0.0..=1.0).contains(&self.rolloff) {
            return Err(CarrierError::InvalidParameter(format!(
                "rolloff {} outside [0, 1]",
                self.rolloff
            )));
        }
        if self.span == 0 || self.samples_per_symbol == 0 {
            return Err(CarrierError::InvalidParameter(format!(
                "span ({}) and samples per symbol ({}) must be positive",
                self.span, self.samples_per_symbol
            )));
        }
        let product = self.span * self.samples_per_symbol;
        if product < 2 {
            return Err(CarrierError::InvalidParameter(
                "span * samples_per_symbol must exceed 1".into(),
            ));
        }
        // An odd product gives an even tap count with no middle tap.
        if product % 2 != 0 {
            return Err(CarrierError::InvalidParameter(format!(
                "span * samples_per_symbol ({}) must be even",
                product
            )));
        }
        Ok(())
    }

    /// Number of taps produced for this spec.
    pub fn tap_count(&self) -> usize {
        self.span * self.samples_per_symbol + 1
    }
}

/// Impulse-response family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PulseShape {
    #[default]
    RootRaisedCosine,
    RaisedCosine,
}

/// Unit-energy FIR coefficients, centered on the middle tap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterTaps {
    coefficients: Vec<f64>,
    spec: FilterSpec,
    shape: PulseShape,
}

impl FilterTaps {
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn len(&self) -> usize {
        self.coefficients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }

    pub fn spec(&self) -> &FilterSpec {
        &self.spec
    }

    pub fn shape(&self) -> PulseShape {
        self.shape
    }

    /// Index of the center tap.
    pub fn center(&self) -> usize {
        self.coefficients.len() / 2
    }

    /// Delay in samples introduced by one pass through the filter.
    pub fn group_delay(&self) -> usize {
        self.coefficients.len().saturating_sub(1) / 2
    }

    /// Tap times in symbol periods, zero at the center tap.
    pub fn time_index(&self) -> Vec<f64> {
        let n = self.spec.span * self.spec.samples_per_symbol;
        (0..=n)
            .map(|k| tap_time(k, n, self.spec.samples_per_symbol))
            .collect()
    }

    pub fn energy(&self) -> f64 {
        self.coefficients.iter().map(|c| c * c).sum()
    }
}

/// Builds pulse-shaping filters sampled from the continuous-time response.
///
/// Taps are spaced `1 / samples_per_symbol` symbol periods apart, the
/// total length is `span * samples_per_symbol + 1`, and the result is
/// scaled to unit energy (sum of squares equal to one). Callers that
/// need unit peak gain must rescale themselves.
pub struct FilterDesigner;

impl FilterDesigner {
    /// Root-raised-cosine design.
    pub fn design(spec: &FilterSpec) -> CarrierResult<FilterTaps> {
        Self::design_shape(spec, PulseShape::RootRaisedCosine)
    }

    pub fn design_shape(spec: &FilterSpec, shape: PulseShape) -> CarrierResult<FilterTaps> {
        spec.validate()?;

        let n = spec.span * spec.samples_per_symbol;
        let alpha = spec.rolloff;
        let raw: Vec<f64> = (0..=n)
            .map(|k| {
                let t = tap_time(k, n, spec.samples_per_symbol);
                match shape {
                    PulseShape::RootRaisedCosine => root_raised_cosine(t, alpha),
                    PulseShape::RaisedCosine => raised_cosine(t, alpha),
                }
            })
            .collect();

        let energy: f64 = raw.iter().map(|c| c * c).sum();
        if !energy.is_finite() || energy <= 0.0 {
            return Err(CarrierError::InvalidParameter(format!(
                "filter energy {} cannot be normalized",
                energy
            )));
        }
        let norm = energy.sqrt();
        let coefficients = raw.into_iter().map(|c| c / norm).collect::<Vec<_>>();

        debug!(
            "designed {:?} filter: {} taps, rolloff {}, sps {}",
            shape,
            coefficients.len(),
            alpha,
            spec.samples_per_symbol
        );

        Ok(FilterTaps {
            coefficients,
            spec: *spec,
            shape,
        })
    }
}

fn tap_time(k: usize, n: usize, samples_per_symbol: usize) -> f64 {
    (k as f64 - n as f64 / 2.0) / samples_per_symbol as f64
}

fn sinc(t: f64) -> f64 {
    if t == 0.0 {
        1.0
    } else {
        (PI * t).sin() / (PI * t)
    }
}

/// RRC impulse response at `t` symbol periods.
fn root_raised_cosine(t: f64, alpha: f64) -> f64 {
    if t == 0.0 {
        return 1.0 - alpha + 4.0 * alpha / PI;
    }
    if alpha == 0.0 {
        return sinc(t);
    }
    let edge = 1.0 / (4.0 * alpha);
    if (t.abs() - edge).abs() < SINGULARITY_TOLERANCE {
        let arg = PI / (4.0 * alpha);
        return alpha
            * FRAC_1_SQRT_2
            * ((1.0 + 2.0 / PI) * arg.sin() + (1.0 - 2.0 / PI) * arg.cos());
    }
    let numerator =
        (PI * t * (1.0 - alpha)).sin() + 4.0 * alpha * t * (PI * t * (1.0 + alpha)).cos();
    let denominator = PI * t * (1.0 - (4.0 * alpha * t).powi(2));
    numerator / denominator
}

/// Raised-cosine impulse response at `t` symbol periods.
fn raised_cosine(t: f64, alpha: f64) -> f64 {
    if t == 0.0 {
        return 1.0;
    }
    if alpha == 0.0 {
        return sinc(t);
    }
    let edge = 1.0 / (2.0 * alpha);
    if (t.abs() - edge).abs() < SINGULARITY_TOLERANCE {
        return FRAC_PI_4 * sinc(edge);
    }
    sinc(t) * (PI * alpha * t).cos() / (1.0 - (2.0 * alpha * t).powi(2))
}

/// Full convolution of complex samples with real taps (`n + taps - 1` outputs).
pub(crate) fn convolve(signal: &[Sample], taps: &[f64]) -> Signal {
    if signal.is_empty() || taps.is_empty() {
        return Vec::new();
    }
    let mut output = vec![Sample::new(0.0, 0.0); signal.len() + taps.len() - 1];
    for (i, &x) in signal.iter().enumerate() {
        for (j, &h) in taps.iter().enumerate() {
            output[i + j] += x * h;
        }
    }
    output
}

/// Matched filtering: convolution with the time-reversed conjugate taps.
///
/// Real taps make the conjugate a no-op, so only the reversal applies.
pub fn matched_filter(signal: &[Sample], taps: &FilterTaps) -> Signal {
    let reversed: Vec<f64> = taps.coefficients().iter().rev().copied().collect();
    convolve(signal, &reversed)
}

/// Inserts `samples_per_symbol - 1` zeros between symbols (none trailing)
/// and shapes the train with `taps`.
pub fn upsample(
    symbols: &[Sample],
    taps: &FilterTaps,
    samples_per_symbol: usize,
) -> CarrierResult<Signal> {
    if samples_per_symbol == 0 {
        return Err(CarrierError::InvalidParameter(
            "samples per symbol must be positive".into(),
        ));
    }
    if symbols.is_empty() {
        return Ok(Vec::new());
    }
    let mut train = vec![Sample::new(0.0, 0.0); (symbols.len() - 1) * samples_per_symbol + 1];
    for (slot, &symbol) in train.iter_mut().step_by(samples_per_symbol).zip(symbols) {
        *slot = symbol;
    }
    Ok(convolve(&train, taps.coefficients()))
}

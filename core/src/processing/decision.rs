use crate::math::stats::StatsHelper;
use crate::prelude::{CarrierError, CarrierResult, Sample, Signal};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::f64::consts::PI;

/// Relative gap between squared distances still treated as a tie.
const TIE_TOLERANCE: f64 = 1e-12;

/// Labeled set of ideal constellation points.
///
/// Every modulation uses this one type; the builders only differ in the
/// points they lay out. Points and labels are unique and non-empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Constellation {
    points: Vec<Sample>,
    labels: Vec<u32>,
}

impl Constellation {
    /// Points labeled by their index.
    pub fn new(points: Vec<Sample>) -> CarrierResult<Self> {
        let labels = (0..points.len() as u32).collect();
        Self::with_labels(points, labels)
    }

    pub fn with_labels(points: Vec<Sample>, labels: Vec<u32>) -> CarrierResult<Self> {
        if points.is_empty() {
            return Err(CarrierError::DegenerateConstellation(
                "constellation has no points".into(),
            ));
        }
        if points.len() != labels.len() {
            return Err(CarrierError::DegenerateConstellation(format!(
                "{} points but {} labels",
                points.len(),
                labels.len()
            )));
        }
        if points.iter().any(|p| !p.re.is_finite() || !p.im.is_finite()) {
            return Err(CarrierError::DegenerateConstellation(
                "constellation point is not finite".into(),
            ));
        }

        let mut seen_points = HashSet::with_capacity(points.len());
        for p in &points {
            // -0.0 and 0.0 are the same point.
            let key = ((p.re + 0.0).to_bits(), (p.im + 0.0).to_bits());
            if !seen_points.insert(key) {
                return Err(CarrierError::DegenerateConstellation(format!(
                    "duplicate point {}",
                    p
                )));
            }
        }
        let mut seen_labels = HashSet::with_capacity(labels.len());
        for label in &labels {
            if !seen_labels.insert(*label) {
                return Err(CarrierError::DegenerateConstellation(format!(
                    "duplicate label {}",
                    label
                )));
            }
        }

        Ok(Self { points, labels })
    }

    /// `order` points on the unit circle, the first at `rotation` radians.
    pub fn psk(order: usize, rotation: f64) -> CarrierResult<Self> {
        if order < 2 || !order.is_power_of_two() {
            return Err(CarrierError::InvalidParameter(format!(
                "PSK order {} is not a power of two >= 2",
                order
            )));
        }
        let points = (0..order)
            .map(|k| Sample::from_polar(1.0, 2.0 * PI * k as f64 / order as f64 + rotation))
            .collect();
        Self::new(points)
    }

    /// Square QAM with unit average energy; labels run row by row from the
    /// most negative in-phase and quadrature corner.
    pub fn qam(order: usize) -> CarrierResult<Self> {
        let side = (order as f64).sqrt().round() as usize;
        if order < 4 || side * side != order || !side.is_power_of_two() {
            return Err(CarrierError::InvalidParameter(format!(
                "QAM order {} is not an even power of two",
                order
            )));
        }
        let scale = (2.0 * (order as f64 - 1.0) / 3.0).sqrt();
        let level = |i: usize| (2.0 * i as f64 - (side as f64 - 1.0)) / scale;
        let points = (0..side)
            .flat_map(|q| (0..side).map(move |i| (i, q)))
            .map(|(i, q)| Sample::new(level(i), level(q)))
            .collect();
        Self::new(points)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Sample] {
        &self.points
    }

    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    /// Ideal point carrying `label`.
    pub fn point(&self, label: u32) -> Option<Sample> {
        self.labels
            .iter()
            .position(|&l| l == label)
            .map(|idx| self.points[idx])
    }

    /// Bits needed to carry one label of this constellation.
    pub fn bits_per_symbol(&self) -> u32 {
        (self.points.len() as u32).next_power_of_two().trailing_zeros()
    }

    /// Average energy of the points.
    pub fn mean_energy(&self) -> f64 {
        StatsHelper::mean_power(&self.points)
    }
}

/// Outcome of one hard decision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionResult {
    pub label: u32,
    pub point: Sample,
    /// `received - point`.
    pub error_vector: Sample,
}

/// Nearest-point quantizer.
pub struct SymbolDecision;

impl SymbolDecision {
    /// Picks the point closest to `sample` in Euclidean distance.
    ///
    /// Equidistant points resolve to the lowest label. Distances that differ
    /// only by rounding in the point coordinates count as equal.
    pub fn decide(sample: Sample, constellation: &Constellation) -> DecisionResult {
        let mut candidates = constellation
            .points
            .iter()
            .zip(&constellation.labels)
            .map(|(&point, &label)| ((sample - point).norm_sqr(), label, point));

        // Constellations are never empty.
        let first = candidates
            .next()
            .unwrap_or((f64::INFINITY, 0, Sample::new(0.0, 0.0)));
        let (_, label, point) = candidates.fold(first, |best, candidate| {
            let tolerance = TIE_TOLERANCE * best.0.max(1.0);
            let gap = candidate.0 - best.0;
            if gap < -tolerance || (gap.abs() <= tolerance && candidate.1 < best.1) {
                candidate
            } else {
                best
            }
        });

        DecisionResult {
            label,
            point,
            error_vector: sample - point,
        }
    }

    pub fn decide_all(signal: &[Sample], constellation: &Constellation) -> Vec<DecisionResult> {
        signal
            .iter()
            .map(|&sample| Self::decide(sample, constellation))
            .collect()
    }
}

/// Angle between received unique-word symbols and the known unique word.
pub fn phase_ambiguity(rx_uw: &[Sample], uw: &[Sample]) -> CarrierResult<f64> {
    if uw.is_empty() || rx_uw.len() != uw.len() {
        return Err(CarrierError::InsufficientData(format!(
            "unique word needs matching non-empty slices, got {} and {}",
            rx_uw.len(),
            uw.len()
        )));
    }
    let correlation: Sample = rx_uw.iter().zip(uw).map(|(r, u)| r * u.conj()).sum();
    Ok(correlation.arg())
}

/// Rotates `rx` so its unique word lines up with the known one.
pub fn resolve_phase_ambiguity(
    rx: &[Sample],
    rx_uw: &[Sample],
    uw: &[Sample],
) -> CarrierResult<Signal> {
    let rotation = Sample::from_polar(1.0, -phase_ambiguity(rx_uw, uw)?);
    Ok(rx.iter().map(|&s| s * rotation).collect())
}

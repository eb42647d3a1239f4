use crate::math::phase::wrap;
use crate::prelude::{CarrierError, CarrierResult, Sample, Signal};
use crate::processing::estimator::{OffsetEstimate, OffsetEstimator};
use log::debug;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// State of one streaming correction loop.
///
/// Owned by the caller and threaded through [`OffsetCorrector::step`];
/// discarding history means building a new value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LoopState {
    /// Phase applied to the next sample, kept in `[-π, π)`.
    pub accumulated_phase: f64,
    /// Radians per sample.
    pub current_frequency_estimate: f64,
    /// Fresh estimates blended so far.
    pub updates: u64,
}

impl LoopState {
    pub fn new(initial_phase: f64, initial_frequency: f64) -> Self {
        Self {
            accumulated_phase: wrap(initial_phase, PI),
            current_frequency_estimate: initial_frequency,
            updates: 0,
        }
    }

    /// State that starts where a block estimate would.
    pub fn from_estimate(estimate: &OffsetEstimate) -> Self {
        Self::new(estimate.phase_offset, estimate.frequency_offset)
    }
}

/// Removes estimated carrier offsets from sample streams.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffsetCorrector {
    alpha: f64,
}

impl OffsetCorrector {
    /// `alpha` is the weight of a fresh frequency estimate, in `(0, 1]`.
    pub fn new(alpha: f64) -> CarrierResult<Self> {
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(CarrierError::InvalidParameter(format!(
                "loop damping factor {} outside (0, 1]",
                alpha
            )));
        }
        Ok(Self { alpha })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Rotates sample `n` by `-(frequency * n + phase)`.
    pub fn correct_block(signal: &[Sample], estimate: &OffsetEstimate) -> Signal {
        signal
            .iter()
            .enumerate()
            .map(|(n, &sample)| {
                let phase = estimate.frequency_offset * n as f64 + estimate.phase_offset;
                sample * Sample::from_polar(1.0, -phase)
            })
            .collect()
    }

    /// Corrects one sample and returns the advanced state.
    ///
    /// The sample is rotated by the accumulated phase. A fresh estimate,
    /// if supplied, is then blended into the frequency as
    /// `(1 - α) * current + α * fresh`, and the phase advances by the
    /// resulting frequency.
    pub fn step(
        &self,
        state: LoopState,
        sample: Sample,
        fresh: Option<&OffsetEstimate>,
    ) -> (Sample, LoopState) {
        let corrected = sample * Sample::from_polar(1.0, -state.accumulated_phase);

        let (frequency, updates) = match fresh {
            Some(estimate) => (
                (1.0 - self.alpha) * state.current_frequency_estimate
                    + self.alpha * estimate.frequency_offset,
                state.updates + 1,
            ),
            None => (state.current_frequency_estimate, state.updates),
        };

        let next = LoopState {
            accumulated_phase: wrap(state.accumulated_phase + frequency, PI),
            current_frequency_estimate: frequency,
            updates,
        };
        (corrected, next)
    }

    /// Closed-loop correction of a whole signal.
    ///
    /// After every `window` corrected samples the residual offset of that
    /// window is estimated, and `current + residual` is fed back as the
    /// fresh estimate on the next step.
    pub fn track(
        &self,
        estimator: &OffsetEstimator,
        signal: &[Sample],
        window: usize,
        initial: LoopState,
    ) -> CarrierResult<(Signal, LoopState)> {
        if window < 2 {
            return Err(CarrierError::InvalidParameter(format!(
                "tracking window {} must be at least 2",
                window
            )));
        }

        let mut corrected = Vec::with_capacity(signal.len());
        let mut state = initial;
        let mut pending: Option<OffsetEstimate> = None;

        for &sample in signal {
            let (out, next) = self.step(state, sample, pending.take().as_ref());
            corrected.push(out);
            state = next;

            if corrected.len() % window == 0 {
                let residual = estimator.estimate(&corrected[corrected.len() - window..])?;
                pending = Some(OffsetEstimate {
                    frequency_offset: state.current_frequency_estimate + residual.frequency_offset,
                    ..residual
                });
            }
        }

        debug!(
            "tracked {} samples, {} loop updates, frequency {:.6} rad/sample",
            corrected.len(),
            state.updates,
            state.current_frequency_estimate
        );
        Ok((corrected, state))
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

    #[test]
    fn block_correction_removes_known_offset() {
        let rx = tone(300, 0.03, 0.4);
        let corrected = OffsetCorrector::correct_block(&rx, &OffsetEstimate::new(0.03, 0.4));
        for s in corrected {
            assert!((s - Sample::new(1.0, 0.0)).norm() < 1e-9);
        }
    }

    #[test]
    fn block_correction_inverse_round_trips() {
        let signal: Signal = (0..128)
            .map(|n| Sample::new((n as f64 * 0.37).sin(), (n as f64 * 0.11).cos()))
            .collect();
        let estimate = OffsetEstimate::new(-0.021, 2.5);
        let there = OffsetCorrector::correct_block(&signal, &estimate);
        let back = OffsetCorrector::correct_block(&there, &estimate.inverse());
        for (a, b) in back.iter().zip(&signal) {
            assert!((a - b).norm() < 1e-12);
        }
    }

    #[test]
    fn invalid_damping_is_rejected() {
        for alpha in [0.0, -0.5, 1.5, f64::NAN] {
            assert!(matches!(
                OffsetCorrector::new(alpha),
                Err(CarrierError::InvalidParameter(_))
            ));
        }
        assert!(OffsetCorrector::new(1.0).is_ok());
    }

    #[test]
    fn streaming_without_updates_matches_block() {
        let rx = tone(200, 0.07, -1.2);
        let estimate = OffsetEstimate::new(0.07, -1.2);
        let corrector = OffsetCorrector::new(0.5).unwrap();

        let mut state = LoopState::from_estimate(&estimate);
        let streamed: Signal = rx
            .iter()
            .map(|&s| {
                let (out, next) = corrector.step(state, s, None);
                state = next;
                out
            })
            .collect();

        let block = OffsetCorrector::correct_block(&rx, &estimate);
        for (a, b) in streamed.iter().zip(&block) {
            assert!((a - b).norm() < 1e-9);
        }
        assert_eq!(state.updates, 0);
    }

    #[test]
    fn loop_converges_to_repeated_estimate() {
        let f0 = 0.013;
        let corrector = OffsetCorrector::new(0.01).unwrap();
        let fresh = OffsetEstimate::new(f0, 0.0);
        let rx = tone(2000, f0, 0.0);

        let state = rx.iter().fold(LoopState::default(), |state, &s| {
            corrector.step(state, s, Some(&fresh)).1
        });
        assert!((state.current_frequency_estimate - f0).abs() < 1e-6);
        assert_eq!(state.updates, 2000);
    }

    #[test]
    fn state_is_a_value() {
        let corrector = OffsetCorrector::new(0.3).unwrap();
        let start = LoopState::new(0.0, 0.1);
        let (_, first) = corrector.step(start, Sample::new(1.0, 0.0), None);
        let (_, again) = corrector.step(start, Sample::new(1.0, 0.0), None);
        assert_eq!(first, again);
        assert_eq!(start, LoopState::new(0.0, 0.1));
        assert!((first.accumulated_phase - 0.1).abs() < 1e-12);
    }

    #[test]
    fn accumulated_phase_stays_bounded() {
        let corrector = OffsetCorrector::new(1.0).unwrap();
        let mut state = LoopState::new(0.0, 3.0);
        for _ in 0..1000 {
            state = corrector.step(state, Sample::new(1.0, 0.0), None).1;
            assert!(state.accumulated_phase >= -PI && state.accumulated_phase < PI);
        }
    }

    #[test]
    fn tracking_loop_locks_onto_tone() {
        let f0 = 0.05;
        let rx = tone(4096, f0, 0.3);
        let corrector = OffsetCorrector::new(0.2).unwrap();
        let (corrected, state) = corrector
            .track(&OffsetEstimator::default(), &rx, 32, LoopState::default())
            .unwrap();

        assert_eq!(corrected.len(), rx.len());
        assert!((state.current_frequency_estimate - f0).abs() < 1e-9);
        assert_eq!(state.updates, 4096 / 32 - 1);

        // Once locked only a constant phase remains.
        let tail = &corrected[3500..];
        let reference = tail[0];
        for s in tail {
            assert!((s - reference).norm() < 1e-6);
        }
    }

    #[test]
    fn tracking_rejects_tiny_window() {
        let corrector = OffsetCorrector::new(0.2).unwrap();
        let rx = tone(16, 0.01, 0.0);
        assert!(matches!(
            corrector.track(&OffsetEstimator::default(), &rx, 1, LoopState::default()),
            Err(CarrierError::InvalidParameter(_))
        ));
    }
}

use crate::generator::channel::{
    add_frequency_offset, add_noise, add_phase_offset, add_timing_offset, noise_variance,
};
use crate::generator::profile::{labels_to_symbols, random_labels};
use crate::workflow::config::{CorrectionMode, EstimatorKind, WorkflowConfig};
use crate::workflow::theory::reference_symbol_error_rate;
use anyhow::{ensure, Context};
use carriercore::processing::{
    matched_filter, resolve_phase_ambiguity, strip_modulation, upsample, Confidence,
    Constellation, FilterDesigner, FilterTaps, Interpolation, LoopState, OffsetCorrector,
    OffsetEstimate, OffsetEstimator, PowerLawEstimator, SymbolDecision,
};
use carriercore::telemetry::ErrorTally;
use carriercore::{Sample, Signal};
use log::{debug, info};
use rand::{rngs::StdRng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Outcome of one simulated burst.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialOutcome {
    pub tally: ErrorTally,
    /// Last frequency estimate used for correction, radians/symbol.
    pub frequency_estimate: f64,
    pub wide_variance: bool,
}

/// Aggregated results at one Eb/N0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepPoint {
    pub ebn0_db: f64,
    pub tally: ErrorTally,
    pub symbol_error_rate: f64,
    pub bit_error_rate: f64,
    /// Ideal coherent symbol error rate at this Eb/N0.
    pub reference_symbol_error_rate: f64,
    /// Mean over trials, radians/symbol.
    pub mean_frequency_estimate: f64,
    pub wide_variance_trials: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    pub config: WorkflowConfig,
    /// True offset at the symbol rate, radians/symbol.
    pub true_frequency_offset: f64,
    pub points: Vec<SweepPoint>,
}

/// Runs the transmit, channel and receive chain for the configured workflow.
pub struct Runner {
    config: WorkflowConfig,
    constellation: Constellation,
    taps: FilterTaps,
    estimator: OffsetEstimator,
    power_law: PowerLawEstimator,
    corrector: OffsetCorrector,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let constellation = config.constellation()?;
        let taps = FilterDesigner::design(&config.to_filter_spec()?)
            .context("designing pulse-shaping filter")?;
        let estimator = OffsetEstimator::new(config.confidence_threshold)
            .context("configuring offset estimator")?;
        let power_law = PowerLawEstimator::new(config.strip_power(), Interpolation::Gaussian)
            .context("configuring power-law estimator")?;
        let corrector = OffsetCorrector::new(config.alpha).context("configuring offset corrector")?;

        Ok(Self {
            config,
            constellation,
            taps,
            estimator,
            power_law,
            corrector,
        })
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Energy per bit of the transmitted symbols.
    fn energy_per_bit(&self) -> f64 {
        self.constellation.mean_energy() / self.constellation.bits_per_symbol().max(1) as f64
    }

    /// Simulates one burst with its own RNG seeded from `seed`.
    pub fn run_trial(&self, ebn0_db: f64, seed: u64) -> anyhow::Result<TrialOutcome> {
        let cfg = &self.config;
        let sps = cfg.samples_per_symbol;
        let mut rng = StdRng::seed_from_u64(seed);

        let labels = random_labels(&mut rng, cfg.symbols, self.constellation.len());
        let symbols = labels_to_symbols(&labels, &self.constellation)?;
        let shaped = upsample(&symbols, &self.taps, sps).context("shaping symbols")?;

        let shaped = if cfg.timing_offset != 0.0 {
            add_timing_offset(&shaped, cfg.timing_offset)?
        } else {
            shaped
        };
        let impaired = add_phase_offset(
            &add_frequency_offset(&shaped, cfg.frequency_offset),
            cfg.phase_offset,
        );
        let n0 = noise_variance(ebn0_db, self.energy_per_bit());
        let received = add_noise(&mut rng, &impaired, n0)?;

        let filtered = matched_filter(&received, &self.taps);
        let delay = 2 * self.taps.group_delay();
        let sampled: Signal = (0..cfg.symbols).map(|k| filtered[delay + k * sps]).collect();

        let (corrected, estimate) = self.correct(&sampled)?;

        let unique_word = &symbols[..cfg.unique_word];
        let resolved =
            resolve_phase_ambiguity(&corrected, &corrected[..cfg.unique_word], unique_word)
                .context("resolving phase ambiguity")?;

        let bits_per_symbol = self.constellation.bits_per_symbol();
        let mut tally = ErrorTally::new();
        for (&sample, &label) in resolved.iter().zip(&labels).skip(cfg.unique_word) {
            let decision = SymbolDecision::decide(sample, &self.constellation);
            tally.record(label, decision.label, bits_per_symbol);
        }

        debug!(
            "trial seed {} at {:.1} dB: {} symbol errors, estimate {:.6} rad/symbol",
            seed, ebn0_db, tally.symbol_errors, estimate.frequency_offset
        );

        Ok(TrialOutcome {
            tally,
            frequency_estimate: estimate.frequency_offset,
            wide_variance: estimate.confidence == Confidence::WideVariance,
        })
    }

    fn estimate_window(&self, window: &[Sample]) -> anyhow::Result<OffsetEstimate> {
        let power = self.config.strip_power();
        let estimate = match self.config.estimator {
            EstimatorKind::Derivative => {
                let stripped = strip_modulation(window, power)?;
                self.estimator.estimate(&stripped)?.divided_by(power)?
            }
            EstimatorKind::PowerLaw => OffsetEstimate::new(self.power_law.estimate(window)?, 0.0),
        };
        Ok(estimate)
    }

    /// Removes the estimated offset; the remaining constant phase is left
    /// for unique-word resolution.
    fn correct(&self, sampled: &[Sample]) -> anyhow::Result<(Signal, OffsetEstimate)> {
        match self.config.correction {
            CorrectionMode::Block => {
                let estimate = self.estimate_window(sampled).context("estimating burst offset")?;
                Ok((OffsetCorrector::correct_block(sampled, &estimate), estimate))
            }
            CorrectionMode::Tracking => {
                let window = self.config.tracking_window.min(sampled.len());
                let first = self
                    .estimate_window(&sampled[..window])
                    .context("estimating initial loop offset")?;
                let mut state = LoopState::from_estimate(&first);
                let mut corrected = Signal::with_capacity(sampled.len());
                let mut latest = first;

                for chunk in sampled.chunks(window) {
                    let fresh = if chunk.len() >= 2 {
                        Some(self.estimate_window(chunk).context("refreshing loop estimate")?)
                    } else {
                        None
                    };
                    for (i, &sample) in chunk.iter().enumerate() {
                        let supplied = if i == 0 { fresh.as_ref() } else { None };
                        let (out, next) = self.corrector.step(state, sample, supplied);
                        corrected.push(out);
                        state = next;
                    }
                    if let Some(fresh) = fresh {
                        latest = fresh;
                    }
                }

                Ok((
                    corrected,
                    OffsetEstimate {
                        frequency_offset: state.current_frequency_estimate,
                        ..latest
                    },
                ))
            }
        }
    }

    /// Runs every configured trial at every Eb/N0 point.
    ///
    /// Trials run in parallel, each with its own RNG and buffers; their
    /// tallies are merged once all trials at a point have finished.
    pub fn sweep(&self) -> anyhow::Result<SweepReport> {
        let points = self.config.ebn0_points()?;
        let mut results = Vec::with_capacity(points.len());

        for (point_index, &ebn0_db) in points.iter().enumerate() {
            let outcomes = (0..self.config.trials)
                .into_par_iter()
                .map(|trial| {
                    let seed = trial_seed(self.config.seed, point_index, trial);
                    self.run_trial(ebn0_db, seed)
                        .with_context(|| format!("trial {} at {:.1} dB", trial, ebn0_db))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            ensure!(!outcomes.is_empty(), "no trials ran at {:.1} dB", ebn0_db);

            let mut tally = ErrorTally::new();
            for outcome in &outcomes {
                tally.merge(&outcome.tally);
            }
            let mean_frequency_estimate = outcomes
                .iter()
                .map(|o| o.frequency_estimate)
                .sum::<f64>()
                / outcomes.len() as f64;
            let wide_variance_trials = outcomes.iter().filter(|o| o.wide_variance).count();

            info!(
                "Eb/N0 {:.1} dB: SER {:.3e}, BER {:.3e} over {} symbols",
                ebn0_db,
                tally.symbol_error_rate(),
                tally.bit_error_rate(),
                tally.symbols
            );

            results.push(SweepPoint {
                ebn0_db,
                tally,
                symbol_error_rate: tally.symbol_error_rate(),
                bit_error_rate: tally.bit_error_rate(),
                reference_symbol_error_rate: reference_symbol_error_rate(
                    self.config.modulation,
                    self.config.order,
                    ebn0_db,
                ),
                mean_frequency_estimate,
                wide_variance_trials,
            });
        }

        Ok(SweepReport {
            true_frequency_offset: 2.0
                * std::f64::consts::PI
                * self.config.frequency_offset
                * self.config.samples_per_symbol as f64,
            config: self.config.clone(),
            points: results,
        })
    }
}

/// Independent seed per (point, trial) so trials never share a stream.
fn trial_seed(base: u64, point_index: usize, trial: usize) -> u64 {
    base.wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .wrapping_add((point_index as u64) << 32)
        .wrapping_add(trial as u64)
}

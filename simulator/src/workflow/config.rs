use anyhow::{bail, Context};
use carriercore::processing::{Constellation, FilterSpec, DEFAULT_CONFIDENCE_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Modulation {
    Psk,
    Qam,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorKind {
    /// Phase-derivative estimator on the modulation-stripped window.
    Derivative,
    /// Zero-padded FFT peak of the modulation-stripped window.
    PowerLaw,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionMode {
    /// One estimate over the whole burst.
    Block,
    /// Streaming loop refreshed once per tracking window.
    Tracking,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub modulation: Modulation,
    pub order: usize,
    /// PSK rotation of the first point, radians.
    pub rotation: f64,
    pub ebn0_start: f64,
    pub ebn0_stop: f64,
    pub ebn0_step: f64,
    pub symbols: usize,
    pub trials: usize,
    pub rolloff: f64,
    pub span: usize,
    pub samples_per_symbol: usize,
    /// True carrier frequency offset, cycles per sample.
    pub frequency_offset: f64,
    /// True carrier phase offset, radians.
    pub phase_offset: f64,
    /// Channel delay in fractions of a sample.
    pub timing_offset: f64,
    /// Known leading symbols used to resolve phase ambiguity.
    pub unique_word: usize,
    pub estimator: EstimatorKind,
    pub correction: CorrectionMode,
    pub tracking_window: usize,
    pub alpha: f64,
    pub confidence_threshold: f64,
    /// Power used to strip modulation; defaults to the order for PSK and 4 for QAM.
    pub strip_power: Option<u32>,
    pub seed: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            modulation: Modulation::Psk,
            order: 4,
            rotation: 0.0,
            ebn0_start: 0.0,
            ebn0_stop: 10.0,
            ebn0_step: 2.0,
            symbols: 1000,
            trials: 20,
            rolloff: 0.35,
            span: 8,
            samples_per_symbol: 4,
            frequency_offset: 1e-4,
            phase_offset: 0.5,
            timing_offset: 0.0,
            unique_word: 32,
            estimator: EstimatorKind::Derivative,
            correction: CorrectionMode::Block,
            tracking_window: 200,
            alpha: 0.25,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            strip_power: None,
            seed: 0,
        }
    }
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn to_filter_spec(&self) -> anyhow::Result<FilterSpec> {
        FilterSpec::new(self.rolloff, self.span, self.samples_per_symbol)
            .context("building pulse-shaping filter spec")
    }

    pub fn constellation(&self) -> anyhow::Result<Constellation> {
        let constellation = match self.modulation {
            Modulation::Psk => Constellation::psk(self.order, self.rotation),
            Modulation::Qam => Constellation::qam(self.order),
        };
        constellation.with_context(|| {
            format!(
                "building {:?} constellation of order {}",
                self.modulation, self.order
            )
        })
    }

    pub fn strip_power(&self) -> u32 {
        self.strip_power.unwrap_or(match self.modulation {
            Modulation::Psk => self.order as u32,
            Modulation::Qam => 4,
        })
    }

    /// Eb/N0 points from start to stop inclusive.
    pub fn ebn0_points(&self) -> anyhow::Result<Vec<f64>> {
        if !(self.ebn0_step > 0.0) {
            bail!("Eb/N0 step {} must be positive", self.ebn0_step);
        }
        if self.ebn0_stop < self.ebn0_start {
            bail!(
                "Eb/N0 stop {} is below start {}",
                self.ebn0_stop,
                self.ebn0_start
            );
        }
        let count =
            ((self.ebn0_stop - self.ebn0_start) / self.ebn0_step + 1e-9).floor() as usize + 1;
        Ok((0..count)
            .map(|i| self.ebn0_start + i as f64 * self.ebn0_step)
            .collect())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.unique_word == 0 {
            bail!("unique word must hold at least one symbol");
        }
        if self.symbols <= self.unique_word {
            bail!(
                "{} symbols leave no payload after a {}-symbol unique word",
                self.symbols,
                self.unique_word
            );
        }
        if !self.timing_offset.is_finite() {
            bail!("timing offset {} is not finite", self.timing_offset);
        }
        if self.trials == 0 {
            bail!("at least one trial per point is required");
        }
        if self.correction == CorrectionMode::Tracking && self.tracking_window < 2 {
            bail!("tracking window {} must be at least 2", self.tracking_window);
        }
        self.ebn0_points()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn default_config_is_valid() {
        let cfg = WorkflowConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.to_filter_spec().unwrap().tap_count(), 33);
        assert_eq!(cfg.constellation().unwrap().len(), 4);
        assert_eq!(cfg.strip_power(), 4);
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"modulation: qam\norder: 16\nestimator: power_law\ntrials: 3\n")
            .unwrap();
        let path = temp.into_temp_path();
        let cfg = WorkflowConfig::load(&path).unwrap();
        assert_eq!(cfg.modulation, Modulation::Qam);
        assert_eq!(cfg.order, 16);
        assert_eq!(cfg.estimator, EstimatorKind::PowerLaw);
        assert_eq!(cfg.trials, 3);
        assert_eq!(cfg.symbols, 1000);
        assert_eq!(cfg.strip_power(), 4);
    }

    #[test]
    fn ebn0_points_are_inclusive() {
        let cfg = WorkflowConfig {
            ebn0_start: 2.0,
            ebn0_stop: 8.0,
            ebn0_step: 3.0,
            ..Default::default()
        };
        assert_eq!(cfg.ebn0_points().unwrap(), vec![2.0, 5.0, 8.0]);

        let bad = WorkflowConfig {
            ebn0_step: 0.0,
            ..Default::default()
        };
        assert!(bad.ebn0_points().is_err());
    }

    #[test]
    fn invalid_layouts_are_rejected() {
        let short = WorkflowConfig {
            symbols: 10,
            unique_word: 10,
            ..Default::default()
        };
        assert!(short.validate().is_err());

        let bad_filter = WorkflowConfig {
            rolloff: 1.5,
            ..Default::default()
        };
        assert!(bad_filter.to_filter_spec().is_err());

        let odd_filter = WorkflowConfig {
            span: 3,
            samples_per_symbol: 5,
            ..Default::default()
        };
        assert!(odd_filter.to_filter_spec().is_err());

        let bad_timing = WorkflowConfig {
            timing_offset: f64::INFINITY,
            ..Default::default()
        };
        assert!(bad_timing.validate().is_err());
    }
}

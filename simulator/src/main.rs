use anyhow::Context;
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use workflow::config::{CorrectionMode, EstimatorKind, Modulation, WorkflowConfig};
use workflow::runner::Runner;

mod generator;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Carrier-recovery error-rate sweep driver")]
struct Args {
    /// Load a workflow config from YAML (other flags are ignored)
    #[arg(long)]
    workflow: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = Modulation::Psk)]
    modulation: Modulation,
    #[arg(long, default_value_t = 4)]
    order: usize,
    #[arg(long, default_value_t = 0.0)]
    ebn0_start: f64,
    #[arg(long, default_value_t = 10.0)]
    ebn0_stop: f64,
    #[arg(long, default_value_t = 2.0)]
    ebn0_step: f64,
    #[arg(long, default_value_t = 1000)]
    symbols: usize,
    #[arg(long, default_value_t = 20)]
    trials: usize,
    /// True carrier frequency offset in cycles per sample
    #[arg(long, default_value_t = 1e-4)]
    frequency_offset: f64,
    /// True carrier phase offset in radians
    #[arg(long, default_value_t = 0.5)]
    phase_offset: f64,
    /// Channel delay in fractions of a sample
    #[arg(long, default_value_t = 0.0)]
    timing_offset: f64,
    #[arg(long, value_enum, default_value_t = EstimatorKind::Derivative)]
    estimator: EstimatorKind,
    #[arg(long, value_enum, default_value_t = CorrectionMode::Block)]
    correction: CorrectionMode,
    /// Loop damping factor for tracking mode
    #[arg(long, default_value_t = 0.25)]
    alpha: f64,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Write the sweep report as JSON
    #[arg(long)]
    report: Option<PathBuf>,
}

impl Args {
    fn to_workflow_config(&self) -> WorkflowConfig {
        WorkflowConfig {
            modulation: self.modulation,
            order: self.order,
            ebn0_start: self.ebn0_start,
            ebn0_stop: self.ebn0_stop,
            ebn0_step: self.ebn0_step,
            symbols: self.symbols,
            trials: self.trials,
            frequency_offset: self.frequency_offset,
            phase_offset: self.phase_offset,
            timing_offset: self.timing_offset,
            estimator: self.estimator,
            correction: self.correction,
            alpha: self.alpha,
            seed: self.seed,
            ..Default::default()
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let workflow_config = if let Some(path) = &args.workflow {
        WorkflowConfig::load(path)?
    } else {
        args.to_workflow_config()
    };

    let runner = Runner::new(workflow_config).context("preparing workflow")?;
    let report = runner.sweep().context("running error-rate sweep")?;

    println!(
        "{:?} {}-ary, {:?} estimator, {:?} correction, true offset {:.5} rad/symbol",
        runner.config().modulation,
        runner.config().order,
        runner.config().estimator,
        runner.config().correction,
        report.true_frequency_offset
    );
    for point in &report.points {
        println!(
            "Eb/N0 {:>5.1} dB -> SER {:.3e} (ideal {:.3e}), BER {:.3e}, est {:.5} rad/symbol, \
             wide-variance trials {}",
            point.ebn0_db,
            point.symbol_error_rate,
            point.reference_symbol_error_rate,
            point.bit_error_rate,
            point.mean_frequency_estimate,
            point.wide_variance_trials
        );
    }

    if let Some(report_path) = &args.report {
        if let Some(parent) = report_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&report).context("serializing sweep report")?;
        fs::write(report_path, json)
            .with_context(|| format!("writing sweep report {}", report_path.display()))?;
    }

    Ok(())
}

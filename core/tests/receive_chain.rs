use carriercore::processing::{
    matched_filter, resolve_phase_ambiguity, strip_modulation, upsample, Constellation,
    FilterDesigner, FilterSpec, LoopState, OffsetCorrector, OffsetEstimator, SymbolDecision,
};
use carriercore::telemetry::ErrorTally;
use carriercore::{Sample, Signal};
use std::f64::consts::PI;

const SPS: usize = 4;
const UNIQUE_WORD: usize = 16;

fn labels(count: usize) -> Vec<u32> {
    // Deterministic pseudo-random QPSK labels.
    let mut state = 0x2545_f491_u32;
    (0..count)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state % 4
        })
        .collect()
}

fn impaired_symbols(
    constellation: &Constellation,
    sent: &[u32],
    radians_per_sample: f64,
    phase: f64,
) -> Signal {
    let spec = FilterSpec::new(0.35, 8, SPS).unwrap();
    let taps = FilterDesigner::design(&spec).unwrap();
    let symbols: Signal = sent
        .iter()
        .map(|&label| constellation.point(label).unwrap())
        .collect();

    let tx = upsample(&symbols, &taps, SPS).unwrap();
    let rx: Signal = tx
        .iter()
        .enumerate()
        .map(|(n, &s)| s * Sample::from_polar(1.0, radians_per_sample * n as f64 + phase))
        .collect();
    let filtered = matched_filter(&rx, &taps);

    let delay = 2 * taps.group_delay();
    (0..sent.len()).map(|k| filtered[delay + k * SPS]).collect()
}

fn tally(constellation: &Constellation, sent: &[u32], corrected: &[Sample]) -> ErrorTally {
    let unique_word: Signal = sent[..UNIQUE_WORD]
        .iter()
        .map(|&label| constellation.point(label).unwrap())
        .collect();
    let resolved =
        resolve_phase_ambiguity(corrected, &corrected[..UNIQUE_WORD], &unique_word).unwrap();

    let mut tally = ErrorTally::new();
    for (decision, &label) in SymbolDecision::decide_all(&resolved, constellation)
        .iter()
        .zip(sent)
    {
        tally.record(label, decision.label, constellation.bits_per_symbol());
    }
    tally
}

#[test]
fn block_chain_recovers_qpsk_under_carrier_offset() {
    let qpsk = Constellation::psk(4, PI / 4.0).unwrap();
    let sent = labels(600);
    let rx = impaired_symbols(&qpsk, &sent, 0.002, 1.0);

    let estimate = OffsetEstimator::default()
        .estimate(&strip_modulation(&rx, 4).unwrap())
        .unwrap()
        .divided_by(4)
        .unwrap();
    assert!((estimate.frequency_offset - 0.002 * SPS as f64).abs() < 1e-4);

    let corrected = OffsetCorrector::correct_block(&rx, &estimate);
    let tally = tally(&qpsk, &sent, &corrected);
    assert_eq!(tally.symbols, 600);
    assert_eq!(tally.symbol_errors, 0);
}

#[test]
fn streaming_chain_recovers_qpsk_under_carrier_offset() {
    let qpsk = Constellation::psk(4, PI / 4.0).unwrap();
    let sent = labels(800);
    let rx = impaired_symbols(&qpsk, &sent, -0.003, -0.4);

    let estimator = OffsetEstimator::default();
    let corrector = OffsetCorrector::new(0.25).unwrap();
    let window = 100;

    let first = estimator
        .estimate(&strip_modulation(&rx[..window], 4).unwrap())
        .unwrap()
        .divided_by(4)
        .unwrap();
    let mut state = LoopState::from_estimate(&first);
    let mut corrected = Signal::with_capacity(rx.len());

    for chunk in rx.chunks(window) {
        let fresh = estimator
            .estimate(&strip_modulation(chunk, 4).unwrap())
            .unwrap()
            .divided_by(4)
            .unwrap();
        for (i, &sample) in chunk.iter().enumerate() {
            let supplied = if i == 0 { Some(&fresh) } else { None };
            let (out, next) = corrector.step(state, sample, supplied);
            corrected.push(out);
            state = next;
        }
    }

    assert_eq!(state.updates, 8);
    assert!((state.current_frequency_estimate + 0.003 * SPS as f64).abs() < 1e-3);
    let tally = tally(&qpsk, &sent, &corrected);
    assert_eq!(tally.symbol_errors, 0);
}

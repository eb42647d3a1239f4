use serde::{Deserialize, Serialize};

/// Symbol and bit error counts for one or more trials.
///
/// Each trial keeps its own tally; tallies are combined with [`merge`]
/// once the trials finish.
///
/// [`merge`]: ErrorTally::merge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ErrorTally {
    pub symbols: u64,
    pub symbol_errors: u64,
    pub bits: u64,
    pub bit_errors: u64,
}

impl ErrorTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one decision. Bit errors are the differing bits of the two
    /// labels in natural binary.
    pub fn record(&mut self, sent: u32, decided: u32, bits_per_symbol: u32) {
        let mask = if bits_per_symbol >= 32 {
            u32::MAX
        } else {
            (1u32 << bits_per_symbol) - 1
        };
        self.symbols += 1;
        self.bits += bits_per_symbol as u64;
        if sent != decided {
            self.symbol_errors += 1;
            self.bit_errors += ((sent ^ decided) & mask).count_ones() as u64;
        }
    }

    pub fn merge(&mut self, other: &ErrorTally) {
        self.symbols += other.symbols;
        self.symbol_errors += other.symbol_errors;
        self.bits += other.bits;
        self.bit_errors += other.bit_errors;
    }

    pub fn symbol_error_rate(&self) -> f64 {
        if self.symbols == 0 {
            return 0.0;
        }
        self.symbol_errors as f64 / self.symbols as f64
    }

    pub fn bit_error_rate(&self) -> f64 {
        if self.bits == 0 {
            return 0.0;
        }
        self.bit_errors as f64 / self.bits as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tally_reports_zero_rates() {
        let tally = ErrorTally::new();
        assert_eq!(tally.symbol_error_rate(), 0.0);
        assert_eq!(tally.bit_error_rate(), 0.0);
    }

    #[test]
    fn record_counts_differing_bits() {
        let mut tally = ErrorTally::new();
        tally.record(0b00, 0b00, 2);
        tally.record(0b01, 0b10, 2);
        tally.record(0b11, 0b10, 2);
        assert_eq!(tally.symbols, 3);
        assert_eq!(tally.symbol_errors, 2);
        assert_eq!(tally.bits, 6);
        assert_eq!(tally.bit_errors, 3);
        assert!((tally.bit_error_rate() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn merge_adds_counts() {
        let mut a = ErrorTally::new();
        a.record(1, 1, 1);
        let mut b = ErrorTally::new();
        b.record(0, 1, 1);
        a.merge(&b);
        assert_eq!(a.symbols, 2);
        assert_eq!(a.symbol_errors, 1);
        assert!((a.symbol_error_rate() - 0.5).abs() < 1e-12);
    }
}

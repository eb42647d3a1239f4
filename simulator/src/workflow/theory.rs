//! Closed-form AWGN error rates the Monte-Carlo sweep is compared against.

use crate::workflow::config::Modulation;
use statrs::function::erf::erfc;
use std::f64::consts::{PI, SQRT_2};

/// Area under the standard normal density to the right of `x`.
pub fn qfunc(x: f64) -> f64 {
    0.5 * erfc(x / SQRT_2)
}

/// Ideal coherent symbol error rate on an AWGN channel.
///
/// Exact for BPSK, QPSK and square QAM; nearest-neighbour approximation
/// for PSK of order 8 and above.
pub fn reference_symbol_error_rate(modulation: Modulation, order: usize, ebn0_db: f64) -> f64 {
    let bits = (order.max(2) as f64).log2();
    let ebn0 = 10f64.powf(ebn0_db / 10.0);
    let esn0 = bits * ebn0;
    match modulation {
        Modulation::Psk if order <= 2 => qfunc((2.0 * ebn0).sqrt()),
        Modulation::Psk if order == 4 => {
            let p = qfunc((2.0 * ebn0).sqrt());
            1.0 - (1.0 - p) * (1.0 - p)
        }
        Modulation::Psk => {
            let distance = (2.0 * esn0).sqrt() * (PI / order as f64).sin();
            (2.0 * qfunc(distance)).min(1.0)
        }
        Modulation::Qam => {
            let m = order as f64;
            let p = 2.0 * (1.0 - 1.0 / m.sqrt()) * qfunc((3.0 * esn0 / (m - 1.0)).sqrt());
            1.0 - (1.0 - p) * (1.0 - p)
        }
    }
}

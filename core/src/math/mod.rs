pub mod fft;
pub mod phase;
pub mod stats;
pub mod window;

pub use fft::FftHelper;
pub use phase::{unwrap_phase, wrap};
pub use stats::StatsHelper;
pub use window::blackman;

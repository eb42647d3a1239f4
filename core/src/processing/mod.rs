pub mod corrector;
pub mod decision;
pub mod delay;
pub mod derivative;
pub mod estimator;
pub mod filter;

pub use corrector::{LoopState, OffsetCorrector};
pub use decision::{
    phase_ambiguity, resolve_phase_ambiguity, Constellation, DecisionResult, SymbolDecision,
};
pub use delay::{FractionalDelay, DEFAULT_DELAY_TAPS};
pub use derivative::{DerivativeEstimator, DerivativeFilter, DerivativeOrder};
pub use estimator::{
    strip_modulation, Confidence, Interpolation, OffsetEstimate, OffsetEstimator,
    PowerLawEstimator, DEFAULT_CONFIDENCE_THRESHOLD,
};
pub use filter::{matched_filter, upsample, FilterDesigner, FilterSpec, FilterTaps, PulseShape};

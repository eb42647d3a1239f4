//! Carrier-recovery core for a simulated digital receiver.
//!
//! Pulse-shaping filter design, derivative-based carrier offset
//! estimation, block and streaming offset correction, and nearest-point
//! symbol decision. Every stage is a pure function over in-memory
//! sample sequences; the only mutable state, [`processing::LoopState`],
//! is a value threaded through the streaming corrector by its owner.

pub mod math;
pub mod prelude;
pub mod processing;
pub mod telemetry;

pub use prelude::{CarrierError, CarrierResult, Sample, Signal};
pub use processing::{
    Confidence, Constellation, DecisionResult, DerivativeOrder, FilterSpec, FilterTaps,
    LoopState, OffsetCorrector, OffsetEstimate, OffsetEstimator,
};

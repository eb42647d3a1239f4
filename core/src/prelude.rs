use num_complex::Complex64;

/// One complex baseband value (in-phase, quadrature).
pub type Sample = Complex64;

/// Ordered samples at a fixed rate; the time index is the position.
pub type Signal = Vec<Sample>;

/// Common error type for every core operation.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CarrierError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("insufficient data: {0}")]
    InsufficientData(String),
    #[error("degenerate constellation: {0}")]
    DegenerateConstellation(String),
}

pub type CarrierResult<T> = Result<T, CarrierError>;

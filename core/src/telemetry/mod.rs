pub mod metrics;

pub use metrics::ErrorTally;

use crate::prelude::Sample;

pub struct StatsHelper;

impl StatsHelper {
    pub fn mean(values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        values.iter().sum::<f64>() / values.len() as f64
    }

    /// Population variance about the mean.
    pub fn variance(values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        let mean = Self::mean(values);
        values.iter().map(|&v| (v - mean) * (v - mean)).sum::<f64>() / values.len() as f64
    }

    /// Sum of squared magnitudes.
    pub fn energy(samples: &[Sample]) -> f64 {
        samples.iter().map(|s| s.norm_sqr()).sum()
    }

    /// Mean squared magnitude; zero for an empty sequence.
    pub fn mean_power(samples: &[Sample]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        Self::energy(samples) / samples.len() as f64
    }
}

use crate::prelude::Sample;
use rustfft::{num_traits::Zero, Fft, FftPlanner};
use std::sync::Arc;

/// Helper that wraps the `rustfft` planner for reuse.
pub struct FftHelper {
    fft: Arc<dyn Fft<f64>>,
    size: usize,
}

impl FftHelper {
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        Self { fft, size }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Forward transform; the input is zero-padded or truncated to the planned size.
    pub fn forward(&self, input: &[Sample]) -> Vec<Sample> {
        let mut buffer: Vec<Sample> = input.iter().take(self.size).copied().collect();
        buffer.resize(self.size, Sample::zero());
        self.fft.process(&mut buffer);
        buffer
    }
}

use anyhow::Context;
use carriercore::processing::Constellation;
use carriercore::Signal;
use rand::Rng;

/// Uniformly random labels in `0..order`.
pub fn random_labels<R: Rng>(rng: &mut R, count: usize, order: usize) -> Vec<u32> {
    (0..count).map(|_| rng.gen_range(0..order as u32)).collect()
}

/// Maps labels to their ideal constellation points.
pub fn labels_to_symbols(labels: &[u32], constellation: &Constellation) -> anyhow::Result<Signal> {
    labels
        .iter()
        .map(|&label| {
            constellation
                .point(label)
                .with_context(|| format!("label {} not in constellation", label))
        })
        .collect()
}

use std::f64::consts::PI;

/// Symmetric Blackman window of `len` points.
pub fn blackman(len: usize) -> Vec<f64> {
    if len == 1 {
        return vec![1.0];
    }
    let denom = (len - 1) as f64;
    (0..len)
        .map(|n| {
            let x = n as f64 / denom;
            0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
        })
        .collect()
}

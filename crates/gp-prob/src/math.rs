//! Small numerically-stable math utilities used across probability code.

/// Natural log of `2π`.
pub const LN_2PI: f64 = 1.837_877_066_409_345_5;

/// Stable `log(sum(exp(x)))`.
///
/// Returns `-inf` for empty input or when every term is `-inf`.
pub fn log_sum_exp(xs: &[f64]) -> f64 {
    let max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    let s: f64 = xs.iter().map(|&x| (x - max).exp()).sum();
    max + s.ln()
}

/// Softmax of `logits` (max-shifted).
pub fn softmax(logits: &[f64]) -> Vec<f64> {
    let lse = log_sum_exp(logits);
    logits.iter().map(|&l| (l - lse).exp()).collect()
}

//! Log-space arithmetic.
//!
//! Forward/backward recursions multiply many small probabilities; doing that in
//! probability space underflows on sequences of a few hundred frames.

/// Numerically stable `ln(Σ exp(x_i))`.
///
/// Returns `-inf` for an empty slice or when every term is `-inf`.
pub fn log_sum_exp(xs: &[f64]) -> f64 {
    let max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    if max == f64::INFINITY {
        return f64::INFINITY;
    }
    let sum: f64 = xs.iter().map(|&x| (x - max).exp()).sum();
    max + sum.ln()
}

/// `ln(p)` with `ln(0) = -inf` and no NaN for tiny negatives from rounding.
pub fn safe_ln(p: f64) -> f64 {
    if p > 0.0 { p.ln() } else { f64::NEG_INFINITY }
}

//! Diagonal-covariance Gaussian densities.
//!
//! With a diagonal covariance the log-density factorizes per feature:
//!
//! ```text
//! ln N(x | μ, diag(σ²)) = -½ Σ_k [ ln(2π σ_k²) + (x_k - μ_k)² / σ_k² ]
//! ```

use std::f64::consts::PI;

use nalgebra::DMatrix;

/// Log-density of row `row` of `x` under a diagonal Gaussian.
///
/// `means` and `vars` are one row of the state parameter matrices.
pub fn diag_log_pdf(x: &DMatrix<f64>, row: usize, means: &[f64], vars: &[f64]) -> f64 {
    let mut acc = 0.0;
    for k in 0..means.len() {
        let var = vars[k];
        let diff = x[(row, k)] - means[k];
        acc += (2.0 * PI * var).ln() + diff * diff / var;
    }
    -0.5 * acc
}

/// Per-column population variance of a matrix.
pub fn column_variances(x: &DMatrix<f64>) -> Vec<f64> {
    let n = x.nrows() as f64;
    (0..x.ncols())
        .map(|k| {
            let col = x.column(k);
            let mean = col.sum() / n;
            col.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n
        })
        .collect()
}

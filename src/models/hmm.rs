//! Gaussian hidden Markov model with diagonal covariance.
//!
//! Parameters are stored in probability space; every recursion runs in log
//! space. Training is Baum-Welch (EM) over a set of independent sequences that
//! are stacked row-wise in one matrix and delimited by a length vector.

use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;
use tracing::debug;

use crate::error::{ScoringError, TrainingError};
use crate::math::{column_variances, diag_log_pdf, log_sum_exp, safe_ln};

/// Lloyd iterations used to seed the emission means.
const KMEANS_ROUNDS: usize = 10;

/// Posterior mass below which a state's emission parameters are left untouched.
const MIN_POSTERIOR: f64 = 1e-10;

/// Options for a single Baum-Welch run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    /// Hard cap on EM iterations.
    pub n_iter: usize,
    /// Stop once the log-likelihood gain of an iteration drops below this.
    pub tol: f64,
    /// Floor added to every variance.
    pub min_covar: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            n_iter: 1000,
            tol: 1e-2,
            min_covar: 1e-3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GaussianHmm {
    n_states: usize,
    n_features: usize,
    start: Vec<f64>,
    trans: DMatrix<f64>,
    means: Vec<Vec<f64>>,
    vars: Vec<Vec<f64>>,
    n_iter_run: usize,
    converged: bool,
}

/// Expected sufficient statistics from one E-step.
struct Stats {
    log_likelihood: f64,
    start: Vec<f64>,
    trans: DMatrix<f64>,
    post: Vec<f64>,
    obs: Vec<Vec<f64>>,
    obs_sq: Vec<Vec<f64>>,
}

impl Stats {
    fn zeros(n: usize, d: usize) -> Self {
        Self {
            log_likelihood: 0.0,
            start: vec![0.0; n],
            trans: DMatrix::zeros(n, n),
            post: vec![0.0; n],
            obs: vec![vec![0.0; d]; n],
            obs_sq: vec![vec![0.0; d]; n],
        }
    }
}

impl GaussianHmm {
    /// Build a model from explicit parameters.
    ///
    /// Rows of `trans`, `start`, `means` and `vars` are indexed by state.
    /// Returns `None` if the shapes disagree or a variance is not positive.
    pub fn from_parts(
        start: Vec<f64>,
        trans: DMatrix<f64>,
        means: Vec<Vec<f64>>,
        vars: Vec<Vec<f64>>,
    ) -> Option<Self> {
        let n = start.len();
        if n == 0 || trans.nrows() != n || trans.ncols() != n || means.len() != n || vars.len() != n {
            return None;
        }
        let d = means[0].len();
        if means.iter().any(|m| m.len() != d) || vars.iter().any(|v| v.len() != d) {
            return None;
        }
        if vars.iter().flatten().any(|v| !(v.is_finite() && *v > 0.0)) {
            return None;
        }
        Some(Self {
            n_states: n,
            n_features: d,
            start,
            trans,
            means,
            vars,
            n_iter_run: 0,
            converged: true,
        })
    }

    /// Fit a model with `n_states` states by Baum-Welch.
    pub fn fit(
        n_states: usize,
        x: &DMatrix<f64>,
        lengths: &[usize],
        opts: &FitOptions,
        seed: u64,
    ) -> Result<Self, TrainingError> {
        validate_training_input(n_states, x, lengths)?;

        let mut model = Self::initialize(n_states, x, opts.min_covar, seed);
        let mut prev_ll = f64::NEG_INFINITY;

        for iter in 0..opts.n_iter {
            let stats = model.accumulate(x, lengths);
            if !stats.log_likelihood.is_finite() {
                return Err(TrainingError::Diverged { iteration: iter });
            }
            model.maximize(&stats, opts.min_covar);
            model.n_iter_run = iter + 1;

            if stats.log_likelihood - prev_ll < opts.tol {
                model.converged = true;
                break;
            }
            prev_ll = stats.log_likelihood;
        }

        if !model.converged {
            debug!(
                n_states,
                n_iter = opts.n_iter,
                "Baum-Welch stopped at the iteration cap before converging"
            );
        }
        if !model.is_finite() {
            return Err(TrainingError::Diverged {
                iteration: model.n_iter_run,
            });
        }
        Ok(model)
    }

    pub fn n_states(&self) -> usize {
        self.n_states
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn start_probs(&self) -> &[f64] {
        &self.start
    }

    pub fn transition_matrix(&self) -> &DMatrix<f64> {
        &self.trans
    }

    pub fn means(&self) -> &[Vec<f64>] {
        &self.means
    }

    pub fn variances(&self) -> &[Vec<f64>] {
        &self.vars
    }

    /// EM iterations performed by the last `fit`.
    pub fn iterations(&self) -> usize {
        self.n_iter_run
    }

    /// Whether the last `fit` stopped on the tolerance rather than the cap.
    pub fn converged(&self) -> bool {
        self.converged
    }

    /// Total log-likelihood of all sequences (sum over sequences).
    pub fn score(&self, x: &DMatrix<f64>, lengths: &[usize]) -> Result<f64, ScoringError> {
        self.validate_scoring_input(x, lengths)?;

        let log_start: Vec<f64> = self.start.iter().map(|&p| safe_ln(p)).collect();
        let log_trans = self.trans.map(safe_ln);

        let mut total = 0.0;
        let mut offset = 0;
        for &len in lengths {
            let log_b = self.emission_log_probs(x, offset, len);
            let (_, ll) = forward(&log_start, &log_trans, &log_b);
            total += ll;
            offset += len;
        }

        if total.is_finite() {
            Ok(total)
        } else {
            Err(ScoringError::NonFinite)
        }
    }

    /// Most likely state path for every row (Viterbi), concatenated across sequences.
    pub fn decode(&self, x: &DMatrix<f64>, lengths: &[usize]) -> Result<Vec<usize>, ScoringError> {
        self.validate_scoring_input(x, lengths)?;

        let log_start: Vec<f64> = self.start.iter().map(|&p| safe_ln(p)).collect();
        let log_trans = self.trans.map(safe_ln);

        let mut path = Vec::with_capacity(x.nrows());
        let mut offset = 0;
        for &len in lengths {
            let log_b = self.emission_log_probs(x, offset, len);
            path.extend(viterbi(&log_start, &log_trans, &log_b));
            offset += len;
        }
        Ok(path)
    }

    fn validate_scoring_input(&self, x: &DMatrix<f64>, lengths: &[usize]) -> Result<(), ScoringError> {
        if x.nrows() == 0 || lengths.is_empty() {
            return Err(ScoringError::EmptyInput);
        }
        if x.ncols() != self.n_features {
            return Err(ScoringError::FeatureMismatch {
                expected: self.n_features,
                actual: x.ncols(),
            });
        }
        let lengths_sum: usize = lengths.iter().sum();
        if lengths_sum != x.nrows() || lengths.contains(&0) {
            return Err(ScoringError::LengthMismatch {
                rows: x.nrows(),
                lengths_sum,
            });
        }
        Ok(())
    }

    /// Uniform start/transition probabilities, k-means means, pooled variances.
    fn initialize(n_states: usize, x: &DMatrix<f64>, min_covar: f64, seed: u64) -> Self {
        let d = x.ncols();
        let mut rng = StdRng::seed_from_u64(seed);

        let mut means: Vec<Vec<f64>> = sample(&mut rng, x.nrows(), n_states)
            .into_iter()
            .map(|row| x.row(row).iter().copied().collect())
            .collect();
        kmeans_refine(x, &mut means, KMEANS_ROUNDS);

        let pooled: Vec<f64> = column_variances(x).into_iter().map(|v| v + min_covar).collect();
        let uniform = 1.0 / n_states as f64;

        Self {
            n_states,
            n_features: d,
            start: vec![uniform; n_states],
            trans: DMatrix::from_element(n_states, n_states, uniform),
            means,
            vars: vec![pooled; n_states],
            n_iter_run: 0,
            converged: false,
        }
    }

    fn emission_log_probs(&self, x: &DMatrix<f64>, offset: usize, len: usize) -> DMatrix<f64> {
        DMatrix::from_fn(len, self.n_states, |t, j| {
            diag_log_pdf(x, offset + t, &self.means[j], &self.vars[j])
        })
    }

    /// E-step: forward-backward on every sequence, accumulating posteriors.
    fn accumulate(&self, x: &DMatrix<f64>, lengths: &[usize]) -> Stats {
        let n = self.n_states;
        let d = self.n_features;
        let mut stats = Stats::zeros(n, d);

        let log_start: Vec<f64> = self.start.iter().map(|&p| safe_ln(p)).collect();
        let log_trans = self.trans.map(safe_ln);

        let mut offset = 0;
        for &len in lengths {
            let log_b = self.emission_log_probs(x, offset, len);
            let (log_alpha, ll) = forward(&log_start, &log_trans, &log_b);
            if !ll.is_finite() {
                stats.log_likelihood = f64::NEG_INFINITY;
                return stats;
            }
            let log_beta = backward(&log_trans, &log_b);
            stats.log_likelihood += ll;

            for t in 0..len {
                let row = offset + t;
                for j in 0..n {
                    let gamma = (log_alpha[(t, j)] + log_beta[(t, j)] - ll).exp();
                    if t == 0 {
                        stats.start[j] += gamma;
                    }
                    stats.post[j] += gamma;
                    for k in 0..d {
                        let v = x[(row, k)];
                        stats.obs[j][k] += gamma * v;
                        stats.obs_sq[j][k] += gamma * v * v;
                    }
                }
            }

            for t in 0..len.saturating_sub(1) {
                for i in 0..n {
                    for j in 0..n {
                        let log_xi = log_alpha[(t, i)] + log_trans[(i, j)] + log_b[(t + 1, j)]
                            + log_beta[(t + 1, j)]
                            - ll;
                        stats.trans[(i, j)] += log_xi.exp();
                    }
                }
            }

            offset += len;
        }

        stats
    }

    /// M-step: re-estimate parameters from accumulated statistics.
    fn maximize(&mut self, stats: &Stats, min_covar: f64) {
        let n = self.n_states;

        let start_sum: f64 = stats.start.iter().sum();
        if start_sum > 0.0 {
            for j in 0..n {
                self.start[j] = stats.start[j] / start_sum;
            }
        }

        for i in 0..n {
            let row_sum: f64 = stats.trans.row(i).sum();
            if row_sum > 0.0 {
                for j in 0..n {
                    self.trans[(i, j)] = stats.trans[(i, j)] / row_sum;
                }
            }
        }

        for j in 0..n {
            let post = stats.post[j];
            if post < MIN_POSTERIOR {
                continue;
            }
            for k in 0..self.n_features {
                let mean = stats.obs[j][k] / post;
                let var = (stats.obs_sq[j][k] / post - mean * mean).max(0.0);
                self.means[j][k] = mean;
                self.vars[j][k] = var + min_covar;
            }
        }
    }

    fn is_finite(&self) -> bool {
        self.start.iter().all(|v| v.is_finite())
            && self.trans.iter().all(|v| v.is_finite())
            && self.means.iter().flatten().all(|v| v.is_finite())
            && self.vars.iter().flatten().all(|v| v.is_finite() && *v > 0.0)
    }
}

fn validate_training_input(n_states: usize, x: &DMatrix<f64>, lengths: &[usize]) -> Result<(), TrainingError> {
    if n_states == 0 {
        return Err(TrainingError::ZeroStates);
    }
    if x.nrows() == 0 || x.ncols() == 0 || lengths.is_empty() {
        return Err(TrainingError::EmptyInput);
    }
    let lengths_sum: usize = lengths.iter().sum();
    if lengths_sum != x.nrows() {
        return Err(TrainingError::LengthMismatch {
            rows: x.nrows(),
            lengths_sum,
        });
    }
    if let Some(index) = lengths.iter().position(|&len| len == 0) {
        return Err(TrainingError::EmptySequence { index });
    }
    if x.nrows() < n_states {
        return Err(TrainingError::InsufficientRows {
            rows: x.nrows(),
            n_states,
        });
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(TrainingError::NonFiniteInput);
    }
    Ok(())
}

/// Lloyd's algorithm starting from the given centers. Empty clusters keep their center.
fn kmeans_refine(x: &DMatrix<f64>, centers: &mut [Vec<f64>], rounds: usize) {
    let k = centers.len();
    let d = x.ncols();
    let mut assignment = vec![0usize; x.nrows()];

    for _ in 0..rounds {
        for (row, slot) in assignment.iter_mut().enumerate() {
            let mut best = f64::INFINITY;
            for (j, center) in centers.iter().enumerate() {
                let dist: f64 = (0..d).map(|c| (x[(row, c)] - center[c]).powi(2)).sum();
                if dist < best {
                    best = dist;
                    *slot = j;
                }
            }
        }

        let mut sums = vec![vec![0.0; d]; k];
        let mut counts = vec![0usize; k];
        for (row, &j) in assignment.iter().enumerate() {
            counts[j] += 1;
            for c in 0..d {
                sums[j][c] += x[(row, c)];
            }
        }
        for j in 0..k {
            if counts[j] > 0 {
                for c in 0..d {
                    centers[j][c] = sums[j][c] / counts[j] as f64;
                }
            }
        }
    }
}

/// Forward pass. Returns `(log_alpha, log_likelihood)`.
fn forward(log_start: &[f64], log_trans: &DMatrix<f64>, log_b: &DMatrix<f64>) -> (DMatrix<f64>, f64) {
    let len = log_b.nrows();
    let n = log_start.len();
    let mut log_alpha = DMatrix::from_element(len, n, f64::NEG_INFINITY);
    let mut buf = vec![0.0; n];

    for j in 0..n {
        log_alpha[(0, j)] = log_start[j] + log_b[(0, j)];
    }
    for t in 1..len {
        for j in 0..n {
            for i in 0..n {
                buf[i] = log_alpha[(t - 1, i)] + log_trans[(i, j)];
            }
            log_alpha[(t, j)] = log_sum_exp(&buf) + log_b[(t, j)];
        }
    }

    let last: Vec<f64> = log_alpha.row(len - 1).iter().copied().collect();
    (log_alpha, log_sum_exp(&last))
}

fn backward(log_trans: &DMatrix<f64>, log_b: &DMatrix<f64>) -> DMatrix<f64> {
    let len = log_b.nrows();
    let n = log_b.ncols();
    let mut log_beta = DMatrix::zeros(len, n);
    let mut buf = vec![0.0; n];

    for t in (0..len.saturating_sub(1)).rev() {
        for i in 0..n {
            for j in 0..n {
                buf[j] = log_trans[(i, j)] + log_b[(t + 1, j)] + log_beta[(t + 1, j)];
            }
            log_beta[(t, i)] = log_sum_exp(&buf);
        }
    }
    log_beta
}

fn viterbi(log_start: &[f64], log_trans: &DMatrix<f64>, log_b: &DMatrix<f64>) -> Vec<usize> {
    let len = log_b.nrows();
    let n = log_start.len();
    let mut delta = DMatrix::from_element(len, n, f64::NEG_INFINITY);
    let mut psi = vec![vec![0usize; n]; len];

    for j in 0..n {
        delta[(0, j)] = log_start[j] + log_b[(0, j)];
    }
    for t in 1..len {
        for j in 0..n {
            let mut best = f64::NEG_INFINITY;
            let mut arg = 0;
            for i in 0..n {
                let v = delta[(t - 1, i)] + log_trans[(i, j)];
                if v > best {
                    best = v;
                    arg = i;
                }
            }
            delta[(t, j)] = best + log_b[(t, j)];
            psi[t][j] = arg;
        }
    }

    let mut state = 0;
    let mut best = f64::NEG_INFINITY;
    for j in 0..n {
        if delta[(len - 1, j)] > best {
            best = delta[(len - 1, j)];
            state = j;
        }
    }

    let mut path = vec![0; len];
    path[len - 1] = state;
    for t in (1..len).rev() {
        path[t - 1] = psi[t][path[t]];
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn two_state_model() -> GaussianHmm {
        GaussianHmm::from_parts(
            vec![0.6, 0.4],
            DMatrix::from_row_slice(2, 2, &[0.7, 0.3, 0.4, 0.6]),
            vec![vec![0.0], vec![3.0]],
            vec![vec![1.0], vec![1.0]],
        )
        .unwrap()
    }

    /// Two well separated regimes repeated over several sequences.
    fn regime_data() -> (DMatrix<f64>, Vec<usize>) {
        let mut rows = Vec::new();
        let mut lengths = Vec::new();
        for s in 0..4 {
            let mut len = 0;
            for t in 0..10 {
                let jitter = ((s * 10 + t) % 5) as f64 * 0.05;
                rows.push(jitter);
                rows.push(1.0 - jitter);
                len += 1;
            }
            for t in 0..10 {
                let jitter = ((s * 7 + t) % 5) as f64 * 0.05;
                rows.push(8.0 + jitter);
                rows.push(-6.0 - jitter);
                len += 1;
            }
            lengths.push(len);
        }
        let n_rows = rows.len() / 2;
        (DMatrix::from_row_slice(n_rows, 2, &rows), lengths)
    }

    #[test]
    fn single_state_score_is_sum_of_gaussian_log_densities() {
        let model = GaussianHmm::from_parts(
            vec![1.0],
            DMatrix::from_element(1, 1, 1.0),
            vec![vec![0.0]],
            vec![vec![1.0]],
        )
        .unwrap();
        let x = DMatrix::from_row_slice(3, 1, &[0.0, 1.0, -1.0]);
        let expected: f64 = (0..3).map(|r| diag_log_pdf(&x, r, &[0.0], &[1.0])).sum();
        assert_relative_eq!(model.score(&x, &[3]).unwrap(), expected, epsilon = 1e-10);
        // Splitting into independent sequences changes nothing for a 1-state model.
        assert_relative_eq!(model.score(&x, &[1, 2]).unwrap(), expected, epsilon = 1e-10);
    }

    #[test]
    fn score_rejects_mismatched_inputs() {
        let model = two_state_model();
        let x = DMatrix::from_row_slice(3, 1, &[0.1, 0.2, 2.9]);
        assert_eq!(
            model.score(&x, &[2]),
            Err(ScoringError::LengthMismatch { rows: 3, lengths_sum: 2 })
        );
        let wide = DMatrix::from_row_slice(1, 2, &[0.0, 0.0]);
        assert_eq!(
            model.score(&wide, &[1]),
            Err(ScoringError::FeatureMismatch { expected: 1, actual: 2 })
        );
        let empty = DMatrix::<f64>::zeros(0, 1);
        assert_eq!(model.score(&empty, &[]), Err(ScoringError::EmptyInput));
    }

    #[test]
    fn viterbi_tracks_regime_switch() {
        let model = two_state_model();
        let x = DMatrix::from_row_slice(4, 1, &[0.1, 0.2, 2.8, 3.1]);
        let path = model.decode(&x, &[4]).unwrap();
        assert_eq!(path, vec![0, 0, 1, 1]);
    }

    #[test]
    fn fit_rejects_bad_inputs() {
        let x = DMatrix::from_row_slice(3, 1, &[0.0, 1.0, 2.0]);
        let opts = FitOptions::default();
        assert_eq!(GaussianHmm::fit(0, &x, &[3], &opts, 1), Err(TrainingError::ZeroStates));
        assert_eq!(
            GaussianHmm::fit(4, &x, &[3], &opts, 1),
            Err(TrainingError::InsufficientRows { rows: 3, n_states: 4 })
        );
        assert_eq!(
            GaussianHmm::fit(2, &x, &[2], &opts, 1),
            Err(TrainingError::LengthMismatch { rows: 3, lengths_sum: 2 })
        );
        assert_eq!(
            GaussianHmm::fit(2, &x, &[3, 0], &opts, 1),
            Err(TrainingError::EmptySequence { index: 1 })
        );
        let bad = DMatrix::from_row_slice(2, 1, &[0.0, f64::NAN]);
        assert_eq!(GaussianHmm::fit(1, &bad, &[2], &opts, 1), Err(TrainingError::NonFiniteInput));
    }

    #[test]
    fn fit_produces_valid_stochastic_parameters() {
        let (x, lengths) = regime_data();
        let model = GaussianHmm::fit(2, &x, &lengths, &FitOptions::default(), 14).unwrap();

        assert_relative_eq!(model.start_probs().iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        for i in 0..2 {
            assert_relative_eq!(model.transition_matrix().row(i).sum(), 1.0, epsilon = 1e-9);
        }
        assert!(model.variances().iter().flatten().all(|&v| v >= 1e-3));
        assert!(model.iterations() >= 1);
    }

    #[test]
    fn fit_separates_regimes_and_improves_on_one_state() {
        let (x, lengths) = regime_data();
        let opts = FitOptions::default();
        let one = GaussianHmm::fit(1, &x, &lengths, &opts, 14).unwrap();
        let two = GaussianHmm::fit(2, &x, &lengths, &opts, 14).unwrap();

        let mut first: Vec<f64> = two.means().iter().map(|m| m[0]).collect();
        first.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert!(first[0] < 1.0 && first[1] > 7.0, "means: {first:?}");

        let ll_one = one.score(&x, &lengths).unwrap();
        let ll_two = two.score(&x, &lengths).unwrap();
        assert!(ll_two > ll_one, "2 states ({ll_two}) should beat 1 state ({ll_one})");
    }

    #[test]
    fn fit_is_deterministic_for_a_fixed_seed() {
        let (x, lengths) = regime_data();
        let opts = FitOptions::default();
        let a = GaussianHmm::fit(3, &x, &lengths, &opts, 7).unwrap();
        let b = GaussianHmm::fit(3, &x, &lengths, &opts, 7).unwrap();
        assert_eq!(a, b);
    }
}

//! Trainer/scorer seams used by the selectors.
//!
//! Selectors never name a concrete model type: they train through
//! `HmmTrainer` and evaluate through `SequenceModel`. `GaussianHmmTrainer`
//! is the production implementation; tests plug in scripted trainers.

use nalgebra::DMatrix;

use crate::domain::CandidateModel;
use crate::error::{ScoringError, TrainingError};
use crate::models::hmm::{FitOptions, GaussianHmm};

/// A fitted sequence model that can score observations.
pub trait SequenceModel {
    fn n_states(&self) -> usize;

    fn n_features(&self) -> usize;

    /// Log-likelihood of the stacked sequences in `x` delimited by `lengths`.
    fn score(&self, x: &DMatrix<f64>, lengths: &[usize]) -> Result<f64, ScoringError>;

    /// Most likely state of every row of `x`.
    fn decode(&self, x: &DMatrix<f64>, lengths: &[usize]) -> Result<Vec<usize>, ScoringError>;
}

/// Fits a fixed-topology model with a given number of hidden states.
pub trait HmmTrainer {
    type Model: SequenceModel;

    /// Fit `n_states` states to `x`/`lengths`.
    ///
    /// Implementations must be deterministic for a given `seed`.
    fn fit(
        &self,
        n_states: usize,
        x: &DMatrix<f64>,
        lengths: &[usize],
        seed: u64,
    ) -> Result<Self::Model, TrainingError>;
}

/// Diagonal-covariance Gaussian HMM trainer with a bounded EM budget.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GaussianHmmTrainer {
    pub options: FitOptions,
}

impl HmmTrainer for GaussianHmmTrainer {
    type Model = GaussianHmm;

    fn fit(
        &self,
        n_states: usize,
        x: &DMatrix<f64>,
        lengths: &[usize],
        seed: u64,
    ) -> Result<GaussianHmm, TrainingError> {
        GaussianHmm::fit(n_states, x, lengths, &self.options, seed)
    }
}

impl SequenceModel for GaussianHmm {
    fn n_states(&self) -> usize {
        GaussianHmm::n_states(self)
    }

    fn n_features(&self) -> usize {
        GaussianHmm::n_features(self)
    }

    fn score(&self, x: &DMatrix<f64>, lengths: &[usize]) -> Result<f64, ScoringError> {
        GaussianHmm::score(self, x, lengths)
    }

    fn decode(&self, x: &DMatrix<f64>, lengths: &[usize]) -> Result<Vec<usize>, ScoringError> {
        GaussianHmm::decode(self, x, lengths)
    }
}

impl<M: SequenceModel> CandidateModel<M> {
    pub fn new(n_states: usize, model: M) -> Self {
        Self { n_states, model }
    }

    pub fn score(&self, x: &DMatrix<f64>, lengths: &[usize]) -> Result<f64, ScoringError> {
        self.model.score(x, lengths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trainer_tags_state_count() {
        let x = DMatrix::from_row_slice(6, 1, &[0.0, 0.1, 0.2, 5.0, 5.1, 5.2]);
        let trainer = GaussianHmmTrainer::default();
        let model = trainer.fit(2, &x, &[3, 3], 14).unwrap();
        let candidate = CandidateModel::new(2, model);

        assert_eq!(candidate.model.n_states(), 2);
        assert_eq!(SequenceModel::n_features(&candidate.model), 1);
        assert!(candidate.score(&x, &[3, 3]).unwrap().is_finite());
        let path = SequenceModel::decode(&candidate.model, &x, &[3, 3]).unwrap();
        assert_eq!(path.len(), 6);
        assert!(path.iter().all(|&s| s < 2));
    }

    #[test]
    fn default_trainer_uses_bounded_budget() {
        let trainer = GaussianHmmTrainer::default();
        assert_eq!(trainer.options.n_iter, 1000);
        assert!(trainer.options.min_covar > 0.0);
    }
}

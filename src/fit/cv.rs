//! Cross-validated log-likelihood strategy.
//!
//! Instances are split into `k = min(3, instances)` unshuffled folds. Each
//! candidate is trained on every training split and scored on the held-out
//! split; the candidate's score is the mean over the folds that succeeded.
//! Higher is better.

use crate::data::combine_sequences;
use crate::domain::{CandidateModel, ScoreRecord, Selection, SelectorKind, SkippedCandidate};
use crate::error::SelectError;
use crate::fit::kfold::{kfold_split, Fold};
use crate::fit::selector::{checked_score, ModelSelector, SelectModel};
use crate::models::HmmTrainer;

pub const MAX_FOLDS: usize = 3;

/// Mean of `values`, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Picks the candidate with the highest mean held-out log-likelihood.
///
/// The returned model is the fold model with the best held-out score for
/// the winning state count; it is not retrained on the full data.
pub struct SelectorCv<'a, T: HmmTrainer> {
    base: ModelSelector<'a, T>,
}

impl<'a, T: HmmTrainer> SelectorCv<'a, T> {
    pub fn new(base: ModelSelector<'a, T>) -> Self {
        Self { base }
    }

    /// Run every fold for `n_states`.
    ///
    /// Returns the held-out scores of the folds that succeeded and the model
    /// behind the highest of them.
    fn run_folds(&self, n_states: usize, folds: &[Fold]) -> (Vec<f64>, Option<T::Model>) {
        let sequences = self.base.sequences();
        let mut fold_scores = Vec::with_capacity(folds.len());
        let mut best: Option<(T::Model, f64)> = None;

        for (i, fold) in folds.iter().enumerate() {
            let (x_train, len_train) = combine_sequences(&fold.train, sequences);
            let (x_test, len_test) = combine_sequences(&fold.test, sequences);

            let model = match self.base.fit(n_states, &x_train, &len_train) {
                Ok(m) => m,
                Err(e) => {
                    self.base
                        .notice(format_args!("fold {i} training failed with {n_states} states: {e}"));
                    continue;
                }
            };
            let score = match checked_score(&model, &x_test, &len_test) {
                Ok(s) => s,
                Err(e) => {
                    self.base
                        .notice(format_args!("fold {i} scoring failed with {n_states} states: {e}"));
                    continue;
                }
            };

            fold_scores.push(score);
            if best.as_ref().is_none_or(|(_, b)| score > *b) {
                best = Some((model, score));
            }
        }

        (fold_scores, best.map(|(m, _)| m))
    }
}

impl<T: HmmTrainer> SelectModel for SelectorCv<'_, T> {
    type Model = T::Model;

    fn select(&self) -> Result<Selection<T::Model>, SelectError> {
        let n_instances = self.base.sequences().len();
        let mut scores = Vec::new();
        let mut skipped = Vec::new();

        if n_instances < 2 {
            for n in self.base.config().candidates() {
                skipped.push(SkippedCandidate::other(
                    n,
                    format!("insufficient data: {n_instances} instance(s), need at least 2"),
                ));
            }
            return self.base.finish(SelectorKind::Cv, None, scores, skipped);
        }

        let folds = kfold_split(n_instances, MAX_FOLDS.min(n_instances))?;
        let mut best: Option<(CandidateModel<T::Model>, f64)> = None;

        for n in self.base.config().candidates() {
            let (fold_scores, fold_model) = self.run_folds(n, &folds);

            let (avg, model) = match (mean(&fold_scores), fold_model) {
                (Some(avg), Some(model)) => (avg, model),
                _ => {
                    skipped.push(SkippedCandidate::other(n, "no fold produced a score"));
                    continue;
                }
            };

            self.base.notice(format_args!(
                "n={n} CV={avg:.3} over {}/{} folds",
                fold_scores.len(),
                folds.len()
            ));
            scores.push(ScoreRecord { n_states: n, score: avg });

            if best.as_ref().is_none_or(|(_, b)| avg > *b) {
                best = Some((CandidateModel::new(n, model), avg));
            }
        }

        self.base
            .finish(SelectorKind::Cv, best.map(|(c, _)| c), scores, skipped)
    }
}

//! Discriminative Information Criterion strategy.
//!
//! ```text
//! DIC(n) = ln P(X_word | θ_n) - mean_{w ≠ word} ln P(X_w | θ_n)
//! ```
//!
//! Rewards models that explain their own word much better than every other
//! word in the vocabulary. Higher is better.

use crate::domain::{CandidateModel, ScoreRecord, Selection, SelectorKind, SkippedCandidate};
use crate::error::{ScoringError, SelectError};
use crate::fit::selector::{checked_score, ModelSelector, SelectModel};
use crate::models::HmmTrainer;

/// Picks the candidate with the highest DIC.
pub struct SelectorDic<'a, T: HmmTrainer> {
    base: ModelSelector<'a, T>,
}

impl<'a, T: HmmTrainer> SelectorDic<'a, T> {
    pub fn new(base: ModelSelector<'a, T>) -> Self {
        Self { base }
    }

    /// Mean log-likelihood of every other word under `candidate`.
    ///
    /// Any single scoring failure fails the whole mean.
    fn anti_likelihood(&self, candidate: &CandidateModel<T::Model>) -> Result<f64, ScoringError> {
        let mut total = 0.0;
        let mut count = 0usize;
        for (_, other) in self.base.other_words() {
            total += checked_score(&candidate.model, &other.x, &other.lengths)?;
            count += 1;
        }
        Ok(total / count as f64)
    }
}

impl<T: HmmTrainer> SelectModel for SelectorDic<'_, T> {
    type Model = T::Model;

    fn select(&self) -> Result<Selection<T::Model>, SelectError> {
        let data = self.base.data();
        let mut scores = Vec::new();
        let mut skipped = Vec::new();

        if self.base.other_words().next().is_none() {
            // Nothing to discriminate against.
            for n in self.base.config().candidates() {
                skipped.push(SkippedCandidate::other(n, "no competing words to score against"));
            }
            return self.base.finish(SelectorKind::Dic, None, scores, skipped);
        }

        let mut best: Option<(CandidateModel<T::Model>, f64)> = None;

        for n in self.base.config().candidates() {
            let candidate = match self.base.try_base_model(n) {
                Ok(c) => c,
                Err(e) => {
                    skipped.push(SkippedCandidate::training(n, &e));
                    continue;
                }
            };

            let margin = checked_score(&candidate.model, &data.x, &data.lengths)
                .and_then(|l_self| Ok(l_self - self.anti_likelihood(&candidate)?));
            let dic = match margin {
                Ok(v) => v,
                Err(e) => {
                    self.base.notice(format_args!("scoring failed with {n} states: {e}"));
                    skipped.push(SkippedCandidate::scoring(n, &e));
                    continue;
                }
            };

            self.base.notice(format_args!("n={n} DIC={dic:.3}"));
            scores.push(ScoreRecord { n_states: n, score: dic });

            if best.as_ref().is_none_or(|(_, b)| dic > *b) {
                best = Some((candidate, dic));
            }
        }

        self.base
            .finish(SelectorKind::Dic, best.map(|(c, _)| c), scores, skipped)
    }
}

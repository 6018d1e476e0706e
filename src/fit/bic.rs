//! Bayesian Information Criterion strategy.
//!
//! ```text
//! BIC(n) = -2 ln L + p ln N
//! p      = n² + 2·n·d - 1
//! ```
//!
//! `N` is the number of rows (time steps) across all instances, `d` the
//! feature dimensionality. `p` counts transition, mean and diagonal-variance
//! parameters of a Gaussian-emission HMM. Lower is better.

use crate::domain::{CandidateModel, ScoreRecord, Selection, SelectorKind, SkippedCandidate};
use crate::error::SelectError;
use crate::fit::selector::{checked_score, ModelSelector, SelectModel};
use crate::models::HmmTrainer;

/// Free parameter count of an `n`-state HMM over `d` features.
pub fn parameter_count(n_states: usize, n_features: usize) -> usize {
    n_states * n_states + 2 * n_states * n_features - 1
}

pub fn bic_score(log_likelihood: f64, n_params: usize, n_rows: usize) -> f64 {
    -2.0 * log_likelihood + n_params as f64 * (n_rows as f64).ln()
}

/// Picks the candidate with the lowest BIC.
pub struct SelectorBic<'a, T: HmmTrainer> {
    base: ModelSelector<'a, T>,
}

impl<'a, T: HmmTrainer> SelectorBic<'a, T> {
    pub fn new(base: ModelSelector<'a, T>) -> Self {
        Self { base }
    }
}

impl<T: HmmTrainer> SelectModel for SelectorBic<'_, T> {
    type Model = T::Model;

    fn select(&self) -> Result<Selection<T::Model>, SelectError> {
        let data = self.base.data();
        let n_features = data.n_features();
        let n_rows = data.n_rows();

        let mut scores = Vec::new();
        let mut skipped = Vec::new();
        let mut best: Option<(CandidateModel<T::Model>, f64)> = None;

        for n in self.base.config().candidates() {
            let candidate = match self.base.try_base_model(n) {
                Ok(c) => c,
                Err(e) => {
                    skipped.push(SkippedCandidate::training(n, &e));
                    continue;
                }
            };
            let log_l = match checked_score(&candidate.model, &data.x, &data.lengths) {
                Ok(v) => v,
                Err(e) => {
                    self.base.notice(format_args!("scoring failed with {n} states: {e}"));
                    skipped.push(SkippedCandidate::scoring(n, &e));
                    continue;
                }
            };

            let bic = bic_score(log_l, parameter_count(n, n_features), n_rows);
            self.base
                .notice(format_args!("n={n} logL={log_l:.3} BIC={bic:.3}"));
            scores.push(ScoreRecord { n_states: n, score: bic });

            // Strict comparison keeps the smallest n on ties.
            if best.as_ref().is_none_or(|(_, b)| bic < *b) {
                best = Some((candidate, bic));
            }
        }

        self.base
            .finish(SelectorKind::Bic, best.map(|(c, _)| c), scores, skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SelectorConfig;
    use crate::fit::testing::{catalogs, Plan, ScriptedTrainer};
    use approx::assert_relative_eq;

    const JOHN: &[usize] = &[10, 10, 10, 10, 10];

    fn config(min_n: usize, max_n: usize) -> SelectorConfig {
        SelectorConfig {
            min_n,
            max_n,
            ..SelectorConfig::default()
        }
    }

    #[test]
    fn parameter_count_matches_formula() {
        assert_eq!(parameter_count(2, 2), 11);
        assert_eq!(parameter_count(3, 2), 20);
        assert_eq!(parameter_count(1, 1), 2);
    }

    #[test]
    fn equal_bic_keeps_the_smallest_state_count() {
        // One frame: ln N = 0, so both candidates score exactly -2 * logL.
        let (words, hwords) = catalogs(&[("JOHN", &[1])]);
        let trainer = ScriptedTrainer::new([(2, Plan::scores(-5.0)), (3, Plan::scores(-5.0))]);

        let base = ModelSelector::new(&words, &hwords, "JOHN", config(2, 3), &trainer).unwrap();
        let selection = SelectorBic::new(base).select().unwrap();

        assert_eq!(selection.scores[0].score, 10.0);
        assert_eq!(selection.scores[1].score, 10.0);
        assert_eq!(selection.best.n_states, 2);
        assert!(!selection.fallback);
    }

    #[test]
    fn john_scenario_picks_three_states() {
        let (words, hwords) = catalogs(&[("JOHN", JOHN)]);
        let trainer = ScriptedTrainer::new([
            (2, Plan::scores(-120.0)),
            (3, Plan::scores(-100.0)),
            (4, Plan::fails()),
        ]);

        let base = ModelSelector::new(&words, &hwords, "JOHN", config(2, 4), &trainer).unwrap();
        let selection = SelectorBic::new(base).select().unwrap();

        assert_eq!(selection.best.n_states, 3);
        assert!(!selection.fallback);
        assert_eq!(selection.scores.len(), 2);
        assert_relative_eq!(selection.scores[0].score, 240.0 + 11.0 * 50f64.ln(), epsilon = 1e-9);
        assert_relative_eq!(selection.scores[1].score, 200.0 + 20.0 * 50f64.ln(), epsilon = 1e-9);
        assert_eq!(selection.skipped.len(), 1);
        assert_eq!(selection.skipped[0].n_states, 4);
    }

    #[test]
    fn chosen_state_count_follows_the_record_not_the_index() {
        // min_n is not 2 and a failure sits between the survivors: the minimum
        // lives at list index 1 but belongs to n = 7.
        let (words, hwords) = catalogs(&[("JOHN", JOHN)]);
        let trainer = ScriptedTrainer::new([
            (5, Plan::scores(-200.0)),
            (6, Plan::fails()),
            (7, Plan::scores(-50.0)),
        ]);

        let base = ModelSelector::new(&words, &hwords, "JOHN", config(5, 7), &trainer).unwrap();
        let selection = SelectorBic::new(base).select().unwrap();

        assert_eq!(selection.best.n_states, 7);
        assert_eq!(selection.best.model.n_states, 7);
        assert_eq!(selection.scores[1].n_states, 7);
    }

    #[test]
    fn scoring_failure_drops_only_that_candidate() {
        let (words, hwords) = catalogs(&[("JOHN", JOHN)]);
        let trainer = ScriptedTrainer::new([(2, Plan::default()), (3, Plan::scores(-500.0))]);

        let base = ModelSelector::new(&words, &hwords, "JOHN", config(2, 3), &trainer).unwrap();
        let selection = SelectorBic::new(base).select().unwrap();

        assert_eq!(selection.best.n_states, 3);
        assert!(selection.skipped[0].reason.starts_with("scoring failed"));
    }

    #[test]
    fn all_failures_fall_back_to_constant_model() {
        let (words, hwords) = catalogs(&[("JOHN", JOHN)]);
        let trainer = ScriptedTrainer::new([(3, Plan::fails()), (8, Plan::scores(-1.0))]);
        let config = SelectorConfig {
            n_constant: 8,
            min_n: 2,
            max_n: 4,
            ..SelectorConfig::default()
        };

        let base = ModelSelector::new(&words, &hwords, "JOHN", config, &trainer).unwrap();
        let selection = SelectorBic::new(base).select().unwrap();

        assert!(selection.fallback);
        assert_eq!(selection.best.n_states, 8);
        assert!(selection.scores.is_empty());
        assert_eq!(trainer.calls().last(), Some(&(8, 50)));
    }

    #[test]
    fn fallback_failure_is_surfaced() {
        let (words, hwords) = catalogs(&[("JOHN", JOHN)]);
        let trainer = ScriptedTrainer::default();

        let base = ModelSelector::new(&words, &hwords, "JOHN", config(2, 4), &trainer).unwrap();
        let err = SelectorBic::new(base).select().unwrap_err();
        assert!(matches!(err, SelectError::NoCandidateSucceeded { .. }));
    }
}

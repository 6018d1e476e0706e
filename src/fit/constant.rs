//! Constant strategy: always `n_constant` states.

use crate::domain::{Selection, SelectorKind};
use crate::error::SelectError;
use crate::fit::selector::{ModelSelector, SelectModel};
use crate::models::HmmTrainer;

/// Ignores the candidate range and trains `n_constant` states.
///
/// This is also the fallback every other strategy uses when nothing else
/// can be trained.
pub struct SelectorConstant<'a, T: HmmTrainer> {
    base: ModelSelector<'a, T>,
}

impl<'a, T: HmmTrainer> SelectorConstant<'a, T> {
    pub fn new(base: ModelSelector<'a, T>) -> Self {
        Self { base }
    }
}

impl<T: HmmTrainer> SelectModel for SelectorConstant<'_, T> {
    type Model = T::Model;

    fn select(&self) -> Result<Selection<T::Model>, SelectError> {
        let best = self.base.constant_model()?;
        Ok(Selection {
            kind: SelectorKind::Constant,
            best,
            scores: Vec::new(),
            skipped: Vec::new(),
            fallback: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SelectorConfig;
    use crate::fit::testing::{catalogs, Plan, ScriptedTrainer};

    #[test]
    fn trains_exactly_once_with_constant_state_count() {
        let (words, hwords) = catalogs(&[("JOHN", &[10, 10, 10])]);
        let trainer = ScriptedTrainer::new((1..=10).map(|n| (n, Plan::scores(-1.0))));
        let config = SelectorConfig {
            n_constant: 7,
            min_n: 2,
            max_n: 4,
            ..SelectorConfig::default()
        };

        let base = ModelSelector::new(&words, &hwords, "JOHN", config, &trainer).unwrap();
        let selection = SelectorConstant::new(base).select().unwrap();

        assert_eq!(selection.best.n_states, 7);
        assert_eq!(selection.kind, SelectorKind::Constant);
        assert!(!selection.fallback);
        assert_eq!(trainer.calls(), vec![(7, 30)]);
    }

    #[test]
    fn trainer_failure_surfaces_as_selection_error() {
        let (words, hwords) = catalogs(&[("JOHN", &[10, 10])]);
        let trainer = ScriptedTrainer::new([(3, Plan::fails())]);

        let base = ModelSelector::new(&words, &hwords, "JOHN", SelectorConfig::default(), &trainer).unwrap();
        let err = SelectorConstant::new(base).select().unwrap_err();

        assert!(matches!(
            err,
            SelectError::NoCandidateSucceeded { n_constant: 3, .. }
        ));
    }

    #[test]
    fn unknown_word_is_a_construction_error() {
        let (words, hwords) = catalogs(&[("JOHN", &[10])]);
        let trainer = ScriptedTrainer::default();
        let err = ModelSelector::new(&words, &hwords, "MARY", SelectorConfig::default(), &trainer)
            .err()
            .unwrap();
        assert_eq!(err, SelectError::UnknownWord("MARY".to_string()));
        assert!(trainer.calls().is_empty());
    }
}

//! Shared selector plumbing.
//!
//! `ModelSelector` owns one word's view of the catalogs plus the trainer and
//! exposes `base_model(n)`. Each strategy wraps a `ModelSelector` and
//! implements `SelectModel`.

use std::fmt;

use nalgebra::DMatrix;
use tracing::{debug, info, warn};

use crate::data::catalog::validate_word_entry;
use crate::domain::{
    CandidateModel, FeatureSequence, ScoreRecord, Selection, SelectorConfig, SelectorKind,
    SkippedCandidate, WordMatrix, WordMatrixCatalog, WordSequenceCatalog,
};
use crate::error::{ScoringError, SelectError, TrainingError};
use crate::models::{HmmTrainer, SequenceModel};

/// The single contract every strategy implements.
pub trait SelectModel {
    type Model;

    /// Pick one model for the bound word.
    ///
    /// Per-candidate training/scoring failures are absorbed. The only error
    /// is `SelectError::NoCandidateSucceeded`, raised when even the constant
    /// fallback cannot be trained.
    fn select(&self) -> Result<Selection<Self::Model>, SelectError>;
}

/// One word's data, the candidate range and the trainer.
pub struct ModelSelector<'a, T: HmmTrainer> {
    hwords: &'a WordMatrixCatalog,
    this_word: String,
    sequences: &'a [FeatureSequence],
    data: &'a WordMatrix,
    config: SelectorConfig,
    trainer: &'a T,
}

impl<'a, T: HmmTrainer> ModelSelector<'a, T> {
    /// Bind a selector to `this_word`.
    ///
    /// Fails if the configuration is invalid, the word is missing from either
    /// catalog, or the two catalog entries disagree.
    pub fn new(
        words: &'a WordSequenceCatalog,
        hwords: &'a WordMatrixCatalog,
        this_word: &str,
        config: SelectorConfig,
        trainer: &'a T,
    ) -> Result<Self, SelectError> {
        config.validate()?;

        let sequences = words
            .get(this_word)
            .ok_or_else(|| SelectError::UnknownWord(this_word.to_string()))?;
        let data = hwords
            .get(this_word)
            .ok_or_else(|| SelectError::UnknownWord(this_word.to_string()))?;
        validate_word_entry(this_word, sequences, data)?;

        Ok(Self {
            hwords,
            this_word: this_word.to_string(),
            sequences,
            data,
            config,
            trainer,
        })
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// Per-instance sequences of the bound word, in catalog order.
    pub fn sequences(&self) -> &'a [FeatureSequence] {
        self.sequences
    }

    /// The bound word's stacked matrix and lengths.
    pub fn data(&self) -> &'a WordMatrix {
        self.data
    }

    /// Matrix entries of every word except the bound one.
    pub fn other_words(&self) -> impl Iterator<Item = (&'a String, &'a WordMatrix)> + '_ {
        self.hwords
            .iter()
            .filter(move |(word, _)| word.as_str() != self.this_word)
    }

    /// Train `n_states` on the word's full data.
    pub fn try_base_model(&self, n_states: usize) -> Result<CandidateModel<T::Model>, TrainingError> {
        match self.fit(n_states, &self.data.x, &self.data.lengths) {
            Ok(model) => {
                self.notice(format_args!(
                    "model created for {} with {} states",
                    self.this_word, n_states
                ));
                Ok(CandidateModel::new(n_states, model))
            }
            Err(err) => {
                self.notice(format_args!(
                    "failure on {} with {} states: {err}",
                    self.this_word, n_states
                ));
                Err(err)
            }
        }
    }

    /// Train `n_states` on the word's full data, `None` if training fails.
    pub fn base_model(&self, n_states: usize) -> Option<CandidateModel<T::Model>> {
        self.try_base_model(n_states).ok()
    }

    /// Train on an arbitrary split of the word's data with the selector's seed.
    pub fn fit(&self, n_states: usize, x: &DMatrix<f64>, lengths: &[usize]) -> Result<T::Model, TrainingError> {
        self.trainer.fit(n_states, x, lengths, self.config.seed)
    }

    /// Progress notice: `info` when verbose, `debug` otherwise.
    pub fn notice(&self, args: fmt::Arguments<'_>) {
        if self.config.verbose {
            info!(word = %self.this_word, "{args}");
        } else {
            debug!(word = %self.this_word, "{args}");
        }
    }

    /// Turn a search result into a `Selection`, falling back to the constant
    /// model when no candidate survived.
    pub fn finish(
        &self,
        kind: SelectorKind,
        best: Option<CandidateModel<T::Model>>,
        scores: Vec<ScoreRecord>,
        skipped: Vec<SkippedCandidate>,
    ) -> Result<Selection<T::Model>, SelectError> {
        if let Some(best) = best {
            return Ok(Selection {
                kind,
                best,
                scores,
                skipped,
                fallback: false,
            });
        }

        warn!(
            word = %self.this_word,
            selector = kind.display_name(),
            n_constant = self.config.n_constant,
            "no candidate succeeded; falling back to the constant model"
        );
        let best = self.constant_model()?;
        Ok(Selection {
            kind,
            best,
            scores,
            skipped,
            fallback: true,
        })
    }

    /// `base_model(n_constant)`, with failure surfaced as the selection error.
    pub fn constant_model(&self) -> Result<CandidateModel<T::Model>, SelectError> {
        self.try_base_model(self.config.n_constant)
            .map_err(|source| SelectError::NoCandidateSucceeded {
                word: self.this_word.clone(),
                n_constant: self.config.n_constant,
                source,
            })
    }
}

/// Score and reject non-finite results as scoring failures.
pub fn checked_score<M: SequenceModel>(
    model: &M,
    x: &DMatrix<f64>,
    lengths: &[usize],
) -> Result<f64, ScoringError> {
    let score = model.score(x, lengths)?;
    if score.is_finite() {
        Ok(score)
    } else {
        Err(ScoringError::NonFinite)
    }
}

impl SkippedCandidate {
    pub fn training(n_states: usize, err: &TrainingError) -> Self {
        Self {
            n_states,
            reason: format!("training failed: {err}"),
        }
    }

    pub fn scoring(n_states: usize, err: &ScoringError) -> Self {
        Self {
            n_states,
            reason: format!("scoring failed: {err}"),
        }
    }

    pub fn other(n_states: usize, reason: impl Into<String>) -> Self {
        Self {
            n_states,
            reason: reason.into(),
        }
    }
}

//! Scripted trainer/scorer for selector tests.
//!
//! Each state count gets a `Plan` describing whether training fails and what
//! the resulting model scores. Models tell matrices apart by row count.

use std::collections::BTreeMap;
use std::sync::Mutex;

use nalgebra::DMatrix;

use crate::data::build_matrix_catalog;
use crate::domain::{FeatureSequence, WordMatrixCatalog, WordSequenceCatalog};
use crate::error::{ScoringError, TrainingError};
use crate::models::{HmmTrainer, SequenceModel};

#[derive(Debug, Clone, Default)]
pub struct Plan {
    /// Training always fails.
    pub fail: bool,
    /// Training fails when the training matrix has one of these row counts.
    pub fail_on_rows: Vec<usize>,
    /// Score for matrices not listed in `score_on_rows`; `None` = scoring error.
    pub score: Option<f64>,
    pub score_on_rows: Vec<(usize, f64)>,
}

impl Plan {
    pub fn scores(score: f64) -> Self {
        Self {
            score: Some(score),
            ..Self::default()
        }
    }

    pub fn fails() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScriptedModel {
    pub n_states: usize,
    pub n_features: usize,
    /// Row count of the matrix this model was trained on.
    pub trained_rows: usize,
    plan: Plan,
}

impl SequenceModel for ScriptedModel {
    fn n_states(&self) -> usize {
        self.n_states
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn score(&self, x: &DMatrix<f64>, _lengths: &[usize]) -> Result<f64, ScoringError> {
        if let Some((_, s)) = self.plan.score_on_rows.iter().find(|(rows, _)| *rows == x.nrows()) {
            return Ok(*s);
        }
        self.plan.score.ok_or(ScoringError::NonFinite)
    }

    /// Cycles through the states row by row.
    fn decode(&self, x: &DMatrix<f64>, _lengths: &[usize]) -> Result<Vec<usize>, ScoringError> {
        Ok((0..x.nrows()).map(|t| t % self.n_states).collect())
    }
}

/// Unplanned state counts fail to train.
#[derive(Debug, Default)]
pub struct ScriptedTrainer {
    plans: BTreeMap<usize, Plan>,
    /// `(n_states, training rows)` for every call, in order.
    pub calls: Mutex<Vec<(usize, usize)>>,
}

impl ScriptedTrainer {
    pub fn new(plans: impl IntoIterator<Item = (usize, Plan)>) -> Self {
        Self {
            plans: plans.into_iter().collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(usize, usize)> {
        self.calls.lock().unwrap().clone()
    }
}

impl HmmTrainer for ScriptedTrainer {
    type Model = ScriptedModel;

    fn fit(
        &self,
        n_states: usize,
        x: &DMatrix<f64>,
        _lengths: &[usize],
        _seed: u64,
    ) -> Result<ScriptedModel, TrainingError> {
        self.calls.lock().unwrap().push((n_states, x.nrows()));
        let failure = TrainingError::InsufficientRows {
            rows: x.nrows(),
            n_states,
        };
        let plan = self.plans.get(&n_states).ok_or(failure.clone())?;
        if plan.fail || plan.fail_on_rows.contains(&x.nrows()) {
            return Err(failure);
        }
        Ok(ScriptedModel {
            n_states,
            n_features: x.ncols(),
            trained_rows: x.nrows(),
            plan: plan.clone(),
        })
    }
}

/// Build both catalogs from `(word, instance lengths)` pairs with 2 features.
pub fn catalogs(entries: &[(&str, &[usize])]) -> (WordSequenceCatalog, WordMatrixCatalog) {
    let mut words = WordSequenceCatalog::new();
    for (w, (word, lengths)) in entries.iter().enumerate() {
        let instances: Vec<FeatureSequence> = lengths
            .iter()
            .enumerate()
            .map(|(i, &len)| {
                (0..len)
                    .map(|t| vec![(w * 100 + i * 10 + t) as f64, (t % 3) as f64])
                    .collect()
            })
            .collect();
        words.insert((*word).to_string(), instances);
    }
    let hwords = build_matrix_catalog(&words).unwrap();
    (words, hwords)
}

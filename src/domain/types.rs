//! Shared domain types.
//!
//! Catalog types are plain ordered maps so that iteration order (and therefore
//! floating-point accumulation order in DIC) is deterministic.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::ValueEnum;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::SelectError;

/// One recorded instance of a word: an ordered list of feature vectors.
pub type FeatureSequence = Vec<Vec<f64>>;

/// Word -> ordered list of instances.
///
/// Instance order matters: fold splitting indexes into it.
pub type WordSequenceCatalog = BTreeMap<String, Vec<FeatureSequence>>;

/// Word -> concatenated feature matrix plus per-instance row counts.
pub type WordMatrixCatalog = BTreeMap<String, WordMatrix>;

/// All instances of one word stacked into a single matrix.
///
/// Rows are time steps, columns are features. `lengths[i]` is the number of
/// rows contributed by instance `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct WordMatrix {
    pub x: DMatrix<f64>,
    pub lengths: Vec<usize>,
}

impl WordMatrix {
    /// Total number of rows (time steps) across instances.
    pub fn n_rows(&self) -> usize {
        self.x.nrows()
    }

    /// Feature dimensionality.
    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }
}

/// Which selection strategy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SelectorKind {
    Constant,
    Bic,
    Dic,
    Cv,
}

impl SelectorKind {
    pub const ALL: [SelectorKind; 4] = [
        SelectorKind::Constant,
        SelectorKind::Bic,
        SelectorKind::Dic,
        SelectorKind::Cv,
    ];

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            SelectorKind::Constant => "constant",
            SelectorKind::Bic => "BIC",
            SelectorKind::Dic => "DIC",
            SelectorKind::Cv => "CV",
        }
    }
}

/// Per-selector configuration. Immutable once a selector is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// State count used by the constant strategy and as the universal fallback.
    pub n_constant: usize,
    /// Smallest candidate state count (inclusive).
    pub min_n: usize,
    /// Largest candidate state count (inclusive).
    pub max_n: usize,
    /// Seed handed to every training call.
    pub seed: u64,
    /// Emit per-candidate progress notices at `info` level.
    pub verbose: bool,
}

pub const DEFAULT_N_CONSTANT: usize = 3;
pub const DEFAULT_MIN_N: usize = 2;
pub const DEFAULT_MAX_N: usize = 10;
pub const DEFAULT_SEED: u64 = 14;

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            n_constant: DEFAULT_N_CONSTANT,
            min_n: DEFAULT_MIN_N,
            max_n: DEFAULT_MAX_N,
            seed: DEFAULT_SEED,
            verbose: false,
        }
    }
}

impl SelectorConfig {
    pub fn validate(&self) -> Result<(), SelectError> {
        if self.n_constant == 0 {
            return Err(SelectError::InvalidConfig("n_constant must be >= 1".to_string()));
        }
        if self.min_n == 0 {
            return Err(SelectError::InvalidConfig("min_n must be >= 1".to_string()));
        }
        if self.min_n > self.max_n {
            return Err(SelectError::InvalidConfig(format!(
                "min_n ({}) must be <= max_n ({})",
                self.min_n, self.max_n
            )));
        }
        Ok(())
    }

    /// Candidate state counts in ascending order.
    pub fn candidates(&self) -> std::ops::RangeInclusive<usize> {
        self.min_n..=self.max_n
    }
}

/// A fitted model tagged with the state count used to create it.
#[derive(Debug, Clone)]
pub struct CandidateModel<M> {
    pub n_states: usize,
    pub model: M,
}

/// `(state_count, score)` pair recorded for each successfully scored candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub n_states: usize,
    pub score: f64,
}

/// A candidate that was dropped and why (for diagnostics).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedCandidate {
    pub n_states: usize,
    pub reason: String,
}

/// Outcome of a single `select()` call.
#[derive(Debug, Clone)]
pub struct Selection<M> {
    pub kind: SelectorKind,
    pub best: CandidateModel<M>,
    /// Scores for every candidate that was trained and scored.
    pub scores: Vec<ScoreRecord>,
    /// Candidates that were dropped.
    pub skipped: Vec<SkippedCandidate>,
    /// True when no candidate succeeded and the constant model was returned.
    pub fallback: bool,
}

/// Serializable per-word summary of a selection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordSelection {
    pub word: String,
    pub selector: SelectorKind,
    pub n_instances: usize,
    pub n_rows: usize,
    /// Chosen state count, or `None` if selection failed outright.
    pub n_states: Option<usize>,
    pub fallback: bool,
    pub scores: Vec<ScoreRecord>,
    pub skipped: Vec<SkippedCandidate>,
    /// Log-likelihood of the word's own data under the chosen model.
    pub log_likelihood: Option<f64>,
    /// Frames per state on the word's own Viterbi path; empty if not decoded.
    #[serde(default)]
    pub occupancy: Vec<usize>,
    pub error: Option<String>,
}

/// Where the word data comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    /// Long-format feature CSV.
    Csv {
        path: PathBuf,
        /// Explicit feature columns; `None` means every non-key column.
        features: Option<Vec<String>>,
    },
    /// Deterministic synthetic vocabulary.
    Synthetic(SyntheticConfig),
}

/// Parameters of the synthetic vocabulary generator.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticConfig {
    pub n_words: usize,
    pub instances_per_word: usize,
    pub n_features: usize,
    pub min_len: usize,
    pub max_len: usize,
    /// True state counts are drawn from this inclusive range.
    pub min_states: usize,
    pub max_states: usize,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            n_words: 6,
            instances_per_word: 6,
            n_features: 2,
            min_len: 12,
            max_len: 24,
            min_states: 2,
            max_states: 5,
            seed: 42,
        }
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus environment and defaults).
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub source: DataSource,
    pub selector: SelectorKind,
    pub selector_config: SelectorConfig,
    /// Restrict the run to these words (empty = all words).
    pub only_words: Vec<String>,
    pub export_json: Option<PathBuf>,
    pub export_csv: Option<PathBuf>,
}

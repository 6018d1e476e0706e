//! Error types.
//!
//! Two layers:
//!
//! - library errors (`TrainingError`, `ScoringError`, `SelectError`) that the
//!   selection core inspects and, where allowed, absorbs per candidate
//! - `AppError`, the process-level error carrying an exit code

use thiserror::Error;

/// The trainer could not fit a model for a given state count.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrainingError {
    #[error("state count must be >= 1")]
    ZeroStates,

    #[error("no observations to train on")]
    EmptyInput,

    #[error("sequence lengths sum to {lengths_sum} but the matrix has {rows} rows")]
    LengthMismatch { rows: usize, lengths_sum: usize },

    #[error("sequence {index} has zero length")]
    EmptySequence { index: usize },

    #[error("{rows} rows is not enough to fit {n_states} states")]
    InsufficientRows { rows: usize, n_states: usize },

    #[error("non-finite value in the input matrix")]
    NonFiniteInput,

    #[error("log-likelihood became non-finite at iteration {iteration}")]
    Diverged { iteration: usize },
}

/// The scorer could not evaluate a fitted model on a given matrix/length pair.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    #[error("model expects {expected} features but the matrix has {actual} columns")]
    FeatureMismatch { expected: usize, actual: usize },

    #[error("sequence lengths sum to {lengths_sum} but the matrix has {rows} rows")]
    LengthMismatch { rows: usize, lengths_sum: usize },

    #[error("no observations to score")]
    EmptyInput,

    #[error("log-likelihood is not finite")]
    NonFinite,
}

/// Errors that cross the `select()` boundary.
///
/// Only `NoCandidateSucceeded` is a selection outcome; the other variants are
/// usage faults raised while constructing a selector.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SelectError {
    #[error("invalid selector configuration: {0}")]
    InvalidConfig(String),

    #[error("word '{0}' is missing from the catalogs")]
    UnknownWord(String),

    #[error("catalog entries for '{word}' disagree: {reason}")]
    CatalogMismatch { word: String, reason: String },

    #[error("no model could be trained for '{word}' (fallback with {n_constant} states failed: {source})")]
    NoCandidateSucceeded {
        word: String,
        n_constant: usize,
        #[source]
        source: TrainingError,
    },
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<SelectError> for AppError {
    fn from(err: SelectError) -> Self {
        let code = match err {
            SelectError::InvalidConfig(_) | SelectError::UnknownWord(_) => 2,
            SelectError::CatalogMismatch { .. } | SelectError::NoCandidateSucceeded { .. } => 4,
        };
        AppError::new(code, err.to_string())
    }
}

//! Sequence models.
//!
//! - `hmm`: diagonal-covariance Gaussian HMM (Baum-Welch, forward scoring, Viterbi)
//! - `trainer`: the `HmmTrainer` / `SequenceModel` seams the selectors work against

pub mod hmm;
pub mod trainer;

pub use hmm::*;
pub use trainer::*;

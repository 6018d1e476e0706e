//! `hmm-select` library crate.
//!
//! Picks the number of hidden states for per-word Gaussian HMMs using one of
//! four strategies (constant, BIC, DIC, cross-validation). The binary
//! (`hmmsel`) is a thin wrapper around this library so that core logic is
//! testable without spawning processes.

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;

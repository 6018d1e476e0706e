//! Command-line parsing for the HMM state-count selector.
//!
//! Argument parsing and command dispatch stay separate from the selection
//! code. Every tuning flag can also be set through an `HMMSEL_*` environment
//! variable (or a `.env` file).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::{
    SelectorKind, DEFAULT_MAX_N, DEFAULT_MIN_N, DEFAULT_N_CONSTANT, DEFAULT_SEED,
};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "hmmsel", version, about = "Pick the number of hidden states for per-word HMMs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one selection strategy over every word and print the chosen state counts.
    Select(SelectArgs),
    /// Run all four strategies side by side.
    Compare(SelectArgs),
}

/// Options shared by `select` and `compare`.
#[derive(Debug, Parser, Clone)]
pub struct SelectArgs {
    /// Long-format feature CSV (`word`, `instance`, feature columns).
    /// Without it a synthetic vocabulary is generated.
    #[arg(long, value_name = "CSV", env = "HMMSEL_DATA")]
    pub data: Option<PathBuf>,

    /// Feature columns to use (comma-separated). Defaults to every non-key column.
    #[arg(long, value_delimiter = ',', env = "HMMSEL_FEATURES")]
    pub features: Vec<String>,

    /// Number of synthetic words.
    #[arg(long, default_value_t = 6)]
    pub words: usize,

    /// Instances per synthetic word.
    #[arg(long, default_value_t = 6)]
    pub instances: usize,

    /// Feature dimensionality of the synthetic vocabulary.
    #[arg(long, default_value_t = 2)]
    pub dims: usize,

    /// Seed for synthetic data generation.
    #[arg(long, default_value_t = 42, env = "HMMSEL_DATA_SEED")]
    pub data_seed: u64,

    /// Selection strategy (ignored by `compare`).
    #[arg(short = 's', long, value_enum, default_value_t = SelectorKind::Bic, env = "HMMSEL_SELECTOR")]
    pub selector: SelectorKind,

    /// Smallest candidate state count.
    #[arg(long, default_value_t = DEFAULT_MIN_N, env = "HMMSEL_MIN_N")]
    pub min_n: usize,

    /// Largest candidate state count.
    #[arg(long, default_value_t = DEFAULT_MAX_N, env = "HMMSEL_MAX_N")]
    pub max_n: usize,

    /// State count of the constant strategy and of every fallback.
    #[arg(long, default_value_t = DEFAULT_N_CONSTANT, env = "HMMSEL_N_CONSTANT")]
    pub n_constant: usize,

    /// Seed handed to every training call.
    #[arg(long, default_value_t = DEFAULT_SEED, env = "HMMSEL_SEED")]
    pub seed: u64,

    /// Log per-candidate progress.
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Only select for these words (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<String>,

    /// Export selection summaries to JSON.
    #[arg(long = "export-json", value_name = "JSON")]
    pub export_json: Option<PathBuf>,

    /// Export one row per word to CSV.
    #[arg(long = "export-csv", value_name = "CSV")]
    pub export_csv: Option<PathBuf>,
}

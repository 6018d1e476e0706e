//! Shared selection pipeline used by `select` and `compare`.
//!
//! load or generate words -> matrix catalog -> target words -> per-word
//! selection (parallel) -> `WordSelection` summaries
//!
//! `--only` narrows the target words, never the catalogs: DIC still scores
//! every target against the whole vocabulary.
//!
//! The CLI layer only handles presentation and exports.

use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::{info, warn};

use crate::data::{build_matrix_catalog, generate_sample};
use crate::domain::{
    DataSource, RunConfig, Selection, SelectorConfig, SelectorKind, WordMatrix, WordMatrixCatalog,
    WordSelection, WordSequenceCatalog,
};
use crate::error::{AppError, SelectError};
use crate::fit::select_for_word;
use crate::io::ingest::{load_word_sequences, RowError};
use crate::models::{GaussianHmmTrainer, HmmTrainer, SequenceModel};

/// Both catalogs plus where they came from.
#[derive(Debug, Clone)]
pub struct LoadedWords {
    pub words: WordSequenceCatalog,
    pub hwords: WordMatrixCatalog,
    /// Short description of the source for the report header.
    pub source_label: String,
    pub row_errors: Vec<RowError>,
    /// Generating state counts, known only for synthetic data.
    pub true_states: Option<BTreeMap<String, usize>>,
}

/// All computed outputs of a single run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub data: LoadedWords,
    /// Words a selection ran for, in catalog order.
    pub targets: Vec<String>,
    pub selectors: Vec<SelectorKind>,
    /// Sorted by word, then by strategy.
    pub results: Vec<WordSelection>,
}

impl RunOutput {
    pub fn failures(&self) -> usize {
        self.results.iter().filter(|r| r.error.is_some()).count()
    }
}

/// Run the configured strategy (or all of them for `compare`) with the
/// Gaussian HMM trainer.
pub fn run_selection(config: &RunConfig, selectors: &[SelectorKind]) -> Result<RunOutput, AppError> {
    let data = load_words(&config.source)?;
    let targets = resolve_targets(&data.words, &config.only_words)?;
    let trainer = GaussianHmmTrainer::default();

    info!(
        words = targets.len(),
        vocabulary = data.words.len(),
        selectors = selectors.len(),
        "starting selection"
    );
    let results = select_all(
        selectors,
        &targets,
        &data.words,
        &data.hwords,
        config.selector_config,
        &trainer,
    );

    Ok(RunOutput {
        data,
        targets,
        selectors: selectors.to_vec(),
        results,
    })
}

/// Read the CSV or generate the synthetic vocabulary, then stack it.
pub fn load_words(source: &DataSource) -> Result<LoadedWords, AppError> {
    let (words, source_label, row_errors, true_states) = match source {
        DataSource::Csv { path, features } => {
            let ingested = load_word_sequences(path, features.as_deref())?;
            for e in &ingested.row_errors {
                warn!(line = e.line, word = ?e.word, "skipped CSV row: {}", e.message);
            }
            let label = format!(
                "{} ({} rows, features: {})",
                path.display(),
                ingested.rows_used,
                ingested.feature_names.join(",")
            );
            (ingested.words, label, ingested.row_errors, None)
        }
        DataSource::Synthetic(synthetic) => {
            let sample = generate_sample(synthetic)?;
            let label = format!(
                "synthetic (seed={}, {} instances/word, {} features)",
                synthetic.seed, synthetic.instances_per_word, synthetic.n_features
            );
            (sample.words, label, Vec::new(), Some(sample.true_states))
        }
    };

    let hwords = build_matrix_catalog(&words)?;
    Ok(LoadedWords {
        words,
        hwords,
        source_label,
        row_errors,
        true_states,
    })
}

/// Catalog names matching `only` (case-insensitive), in catalog order.
///
/// An empty list targets every word. Unknown names are usage errors.
pub fn resolve_targets(words: &WordSequenceCatalog, only: &[String]) -> Result<Vec<String>, AppError> {
    if only.is_empty() {
        return Ok(words.keys().cloned().collect());
    }

    let mut keep = Vec::with_capacity(only.len());
    for wanted in only {
        let found = words
            .keys()
            .find(|w| w.eq_ignore_ascii_case(wanted.trim()))
            .ok_or_else(|| AppError::new(2, format!("Unknown word in --only: `{wanted}`")))?;
        keep.push(found);
    }

    Ok(words
        .keys()
        .filter(|w| keep.contains(w))
        .cloned()
        .collect())
}

/// Run every `(word, strategy)` pair in parallel.
///
/// Only `targets` get a job; the catalogs stay whole so every strategy
/// sees the full vocabulary. Catalogs are shared read-only; each task owns
/// the models it trains.
pub fn select_all<T>(
    selectors: &[SelectorKind],
    targets: &[String],
    words: &WordSequenceCatalog,
    hwords: &WordMatrixCatalog,
    config: SelectorConfig,
    trainer: &T,
) -> Vec<WordSelection>
where
    T: HmmTrainer + Sync,
{
    let jobs: Vec<(&String, SelectorKind)> = words
        .keys()
        .filter(|w| targets.contains(w))
        .flat_map(|w| selectors.iter().map(move |&k| (w, k)))
        .collect();

    jobs.par_iter()
        .map(|&(word, kind)| {
            let outcome = select_for_word(kind, words, hwords, word, config, trainer);
            summarize(word, kind, words, hwords, outcome)
        })
        .collect()
}

/// Flatten one selection outcome into its serializable summary.
pub fn summarize<M: SequenceModel>(
    word: &str,
    kind: SelectorKind,
    words: &WordSequenceCatalog,
    hwords: &WordMatrixCatalog,
    outcome: Result<Selection<M>, SelectError>,
) -> WordSelection {
    let n_instances = words.get(word).map_or(0, Vec::len);
    let n_rows = hwords.get(word).map_or(0, WordMatrix::n_rows);

    match outcome {
        Ok(selection) => {
            let own = hwords.get(word);
            let log_likelihood = own
                .and_then(|m| selection.best.score(&m.x, &m.lengths).ok())
                .filter(|v| v.is_finite());
            let occupancy = own
                .and_then(|m| selection.best.model.decode(&m.x, &m.lengths).ok())
                .map(|path| state_occupancy(&path, selection.best.n_states))
                .unwrap_or_default();
            WordSelection {
                word: word.to_string(),
                selector: kind,
                n_instances,
                n_rows,
                n_states: Some(selection.best.n_states),
                fallback: selection.fallback,
                scores: selection.scores,
                skipped: selection.skipped,
                log_likelihood,
                occupancy,
                error: None,
            }
        }
        Err(err) => {
            warn!(word, selector = kind.display_name(), "selection failed: {err}");
            WordSelection {
                word: word.to_string(),
                selector: kind,
                n_instances,
                n_rows,
                n_states: None,
                // A failed constant fit has no fallback to fall back from.
                fallback: matches!(err, SelectError::NoCandidateSucceeded { .. })
                    && kind != SelectorKind::Constant,
                scores: Vec::new(),
                skipped: Vec::new(),
                log_likelihood: None,
                occupancy: Vec::new(),
                error: Some(err.to_string()),
            }
        }
    }
}

/// Count how many frames of `path` sit in each of `n_states` states.
pub fn state_occupancy(path: &[usize], n_states: usize) -> Vec<usize> {
    let mut counts = vec![0; n_states];
    for &state in path {
        if let Some(c) = counts.get_mut(state) {
            *c += 1;
        }
    }
    counts
}

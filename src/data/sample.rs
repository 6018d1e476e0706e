//! Synthetic word vocabulary generated from ground-truth left-to-right HMMs.
//!
//! Each word gets its own state count and per-state emission means. An
//! instance walks the states in order, spending a roughly equal share of its
//! frames in each, and emits Gaussian noise around the current state's mean.
//! The output is fully determined by `SyntheticConfig::seed`.

use std::collections::BTreeMap;

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{FeatureSequence, SyntheticConfig, WordSequenceCatalog};
use crate::error::AppError;

/// Names handed out before falling back to `W<index>`.
const VOCABULARY: [&str; 12] = [
    "JOHN", "MARY", "CHOCOLATE", "BOOK", "FISH", "VEGETABLE", "FUTURE", "WRITE", "LOVE", "GO",
    "HOMEWORK", "BUY",
];

/// Spread of per-state means around zero.
const MEAN_SCALE: f64 = 4.0;

/// Emission noise standard deviation.
const EMISSION_SD: f64 = 0.4;

#[derive(Debug, Clone)]
pub struct SampleData {
    pub words: WordSequenceCatalog,
    /// State count used to generate each word.
    pub true_states: BTreeMap<String, usize>,
}

pub fn generate_sample(config: &SyntheticConfig) -> Result<SampleData, AppError> {
    if config.n_words == 0 || config.instances_per_word == 0 {
        return Err(AppError::new(2, "Synthetic vocabulary needs at least one word and one instance."));
    }
    if config.n_features == 0 {
        return Err(AppError::new(2, "Synthetic features must have dimensionality >= 1."));
    }
    if config.min_states == 0 || config.min_states > config.max_states {
        return Err(AppError::new(2, "Invalid synthetic state range."));
    }
    if config.min_len < config.max_states || config.min_len > config.max_len {
        return Err(AppError::new(
            2,
            "Synthetic sequence lengths must be ordered and cover every state at least once.",
        ));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mean_dist = Normal::new(0.0, MEAN_SCALE)
        .map_err(|e| AppError::new(4, format!("Mean distribution error: {e}")))?;
    let noise = Normal::new(0.0, EMISSION_SD)
        .map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;

    let mut words = WordSequenceCatalog::new();
    let mut true_states = BTreeMap::new();

    for w in 0..config.n_words {
        let name = word_name(w);
        let n_states = rng.gen_range(config.min_states..=config.max_states);
        let means: Vec<Vec<f64>> = (0..n_states)
            .map(|_| (0..config.n_features).map(|_| mean_dist.sample(&mut rng)).collect())
            .collect();

        let instances: Vec<FeatureSequence> = (0..config.instances_per_word)
            .map(|_| {
                let len = rng.gen_range(config.min_len..=config.max_len);
                (0..len)
                    .map(|t| {
                        let state = t * n_states / len;
                        means[state]
                            .iter()
                            .map(|&mu| mu + noise.sample(&mut rng))
                            .collect()
                    })
                    .collect()
            })
            .collect();

        true_states.insert(name.clone(), n_states);
        words.insert(name, instances);
    }

    Ok(SampleData { words, true_states })
}

fn word_name(index: usize) -> String {
    match VOCABULARY.get(index) {
        Some(name) => (*name).to_string(),
        None => format!("W{:02}", index + 1),
    }
}

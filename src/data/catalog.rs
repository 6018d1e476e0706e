//! Word catalogs: from per-instance sequences to stacked matrices.

use crate::data::combine::combine_sequences;
use crate::domain::{FeatureSequence, WordMatrix, WordMatrixCatalog, WordSequenceCatalog};
use crate::error::{AppError, SelectError};

impl WordMatrix {
    /// Stack every instance of a word, preserving instance order.
    pub fn from_sequences(sequences: &[FeatureSequence]) -> Self {
        let indices: Vec<usize> = (0..sequences.len()).collect();
        let (x, lengths) = combine_sequences(&indices, sequences);
        Self { x, lengths }
    }
}

/// Build the matrix catalog for every word.
///
/// Fails if a word has no instances, an instance has no frames, or feature
/// widths disagree anywhere in the catalog (DIC scores every word under every
/// other word's models, so one width must hold globally).
pub fn build_matrix_catalog(words: &WordSequenceCatalog) -> Result<WordMatrixCatalog, AppError> {
    let mut width: Option<usize> = None;

    for (word, sequences) in words {
        if sequences.is_empty() {
            return Err(AppError::new(3, format!("Word '{word}' has no instances.")));
        }
        for (i, seq) in sequences.iter().enumerate() {
            if seq.is_empty() {
                return Err(AppError::new(3, format!("Instance {i} of '{word}' has no frames.")));
            }
            for frame in seq {
                match width {
                    None => width = Some(frame.len()),
                    Some(w) if w != frame.len() => {
                        return Err(AppError::new(
                            2,
                            format!(
                                "Instance {i} of '{word}' has {} features, expected {w}.",
                                frame.len()
                            ),
                        ));
                    }
                    Some(_) => {}
                }
            }
        }
    }

    if width == Some(0) {
        return Err(AppError::new(2, "Feature vectors are empty."));
    }

    Ok(words
        .iter()
        .map(|(word, sequences)| (word.clone(), WordMatrix::from_sequences(sequences)))
        .collect())
}

/// Check that both catalog entries for `word` describe the same instances.
pub fn validate_word_entry(
    word: &str,
    sequences: &[FeatureSequence],
    matrix: &WordMatrix,
) -> Result<(), SelectError> {
    let mismatch = |reason: String| SelectError::CatalogMismatch {
        word: word.to_string(),
        reason,
    };

    if matrix.lengths.len() != sequences.len() {
        return Err(mismatch(format!(
            "{} row counts for {} instances",
            matrix.lengths.len(),
            sequences.len()
        )));
    }
    let total: usize = matrix.lengths.iter().sum();
    if total != matrix.n_rows() {
        return Err(mismatch(format!(
            "row counts sum to {total} but the matrix has {} rows",
            matrix.n_rows()
        )));
    }
    if let Some(i) = matrix
        .lengths
        .iter()
        .zip(sequences)
        .position(|(&len, seq)| len != seq.len())
    {
        return Err(mismatch(format!("instance {i} length disagrees between catalogs")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> WordSequenceCatalog {
        let mut words = WordSequenceCatalog::new();
        words.insert(
            "JOHN".to_string(),
            vec![vec![vec![1.0, 2.0], vec![3.0, 4.0]], vec![vec![5.0, 6.0]]],
        );
        words.insert("MARY".to_string(), vec![vec![vec![0.0, 0.0]; 4]]);
        words
    }

    #[test]
    fn matrix_catalog_preserves_invariants() {
        let words = catalog();
        let matrices = build_matrix_catalog(&words).unwrap();

        let john = &matrices["JOHN"];
        assert_eq!(john.lengths, vec![2, 1]);
        assert_eq!(john.n_rows(), 3);
        assert_eq!(john.n_features(), 2);
        assert_eq!(john.x[(2, 1)], 6.0);
        assert!(validate_word_entry("JOHN", &words["JOHN"], john).is_ok());
        assert_eq!(matrices["MARY"].lengths, vec![4]);
    }

    #[test]
    fn ragged_features_are_rejected() {
        let mut words = catalog();
        words.insert("BAD".to_string(), vec![vec![vec![1.0]]]);
        let err = build_matrix_catalog(&words).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn empty_instances_are_rejected() {
        let mut words = catalog();
        words.insert("EMPTY".to_string(), vec![vec![]]);
        assert_eq!(build_matrix_catalog(&words).unwrap_err().exit_code(), 3);
    }

    #[test]
    fn mismatched_entries_are_reported() {
        let words = catalog();
        let other = WordMatrix::from_sequences(&words["MARY"]);
        let err = validate_word_entry("JOHN", &words["JOHN"], &other).unwrap_err();
        assert!(matches!(err, SelectError::CatalogMismatch { .. }));
    }
}

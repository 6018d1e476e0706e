//! Stack selected instances of a word into one matrix.

use nalgebra::DMatrix;

use crate::domain::FeatureSequence;

/// Concatenate the instances at `indices` (in the given order) row-wise.
///
/// Returns the stacked matrix and the per-instance row counts. The feature
/// dimensionality is taken from the first frame of the first instance in
/// `sequences`, so an empty selection still yields a correctly shaped
/// `0 x d` matrix.
///
/// # Panics
/// Panics if an index is out of range. Callers pass fold indices produced from
/// `sequences.len()`.
pub fn combine_sequences(indices: &[usize], sequences: &[FeatureSequence]) -> (DMatrix<f64>, Vec<usize>) {
    let d = sequences
        .iter()
        .find_map(|seq| seq.first().map(|frame| frame.len()))
        .unwrap_or(0);

    let mut values = Vec::new();
    let mut lengths = Vec::with_capacity(indices.len());
    for &i in indices {
        let seq = &sequences[i];
        lengths.push(seq.len());
        for frame in seq {
            values.extend_from_slice(frame);
        }
    }

    let rows: usize = lengths.iter().sum();
    (DMatrix::from_row_slice(rows, d, &values), lengths)
}

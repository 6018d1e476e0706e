//! Unshuffled k-fold partitioning of instance indices.

use crate::error::SelectError;

/// One train/test partition of `0..n_samples`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Split `0..n_samples` into `n_splits` contiguous test blocks.
///
/// The first `n_samples % n_splits` folds get one extra index. Train indices
/// are the complement of each test block, in ascending order.
pub fn kfold_split(n_samples: usize, n_splits: usize) -> Result<Vec<Fold>, SelectError> {
    if n_splits < 2 {
        return Err(SelectError::InvalidConfig(format!(
            "k-fold needs at least 2 splits, got {n_splits}"
        )));
    }
    if n_splits > n_samples {
        return Err(SelectError::InvalidConfig(format!(
            "cannot split {n_samples} samples into {n_splits} folds"
        )));
    }

    let base = n_samples / n_splits;
    let extra = n_samples % n_splits;

    let mut folds = Vec::with_capacity(n_splits);
    let mut start = 0;
    for i in 0..n_splits {
        let size = base + usize::from(i < extra);
        let stop = start + size;
        folds.push(Fold {
            train: (0..start).chain(stop..n_samples).collect(),
            test: (start..stop).collect(),
        });
        start = stop;
    }
    Ok(folds)
}

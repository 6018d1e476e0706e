//! State-count selection.
//!
//! Responsibilities:
//!
//! - bind one word's data to a trainer (`ModelSelector`)
//! - run the chosen criterion over `[min_n, max_n]` (constant / BIC / DIC / CV)
//! - fall back to the constant model when every candidate fails

pub mod bic;
pub mod constant;
pub mod cv;
pub mod dic;
pub mod kfold;
pub mod selector;

#[cfg(test)]
pub(crate) mod testing;

pub use bic::*;
pub use constant::*;
pub use cv::*;
pub use dic::*;
pub use kfold::*;
pub use selector::*;

use crate::domain::{Selection, SelectorConfig, SelectorKind, WordMatrixCatalog, WordSequenceCatalog};
use crate::error::SelectError;
use crate::models::HmmTrainer;

/// Build the selector for `kind` around `word` and run it.
pub fn select_for_word<T: HmmTrainer>(
    kind: SelectorKind,
    words: &WordSequenceCatalog,
    hwords: &WordMatrixCatalog,
    word: &str,
    config: SelectorConfig,
    trainer: &T,
) -> Result<Selection<T::Model>, SelectError> {
    let base = ModelSelector::new(words, hwords, word, config, trainer)?;
    match kind {
        SelectorKind::Constant => SelectorConstant::new(base).select(),
        SelectorKind::Bic => SelectorBic::new(base).select(),
        SelectorKind::Dic => SelectorDic::new(base).select(),
        SelectorKind::Cv => SelectorCv::new(base).select(),
    }
}

//! Word data: catalogs, the sequence combiner and the synthetic vocabulary.

pub mod catalog;
pub mod combine;
pub mod sample;

pub use catalog::*;
pub use combine::*;
pub use sample::*;

//! Mathematical utilities: log-space arithmetic and diagonal Gaussian densities.

pub mod gaussian;
pub mod logspace;

pub use gaussian::*;
pub use logspace::*;

//! Terminal reporting for selection runs.

pub mod format;

pub use format::*;

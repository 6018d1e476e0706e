//! Input/output helpers.
//!
//! - feature CSV ingest + validation (`ingest`)
//! - selection exports (CSV/JSON) (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;

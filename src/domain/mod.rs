//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - word catalogs (`WordSequenceCatalog`, `WordMatrixCatalog`, `WordMatrix`)
//! - selector configuration (`SelectorConfig`, `SelectorKind`)
//! - selection outputs (`CandidateModel`, `ScoreRecord`, `Selection`, `WordSelection`)
//! - run configuration (`RunConfig`, `DataSource`)

pub mod types;

pub use types::*;

//! Gridcalc formula engine.
//!
//! Parsing, evaluation, dependency ordering and sparse storage for a
//! spreadsheet calculation core. The document model built on top of it
//! lives in `gridcalc-core`.

pub mod builtins;
pub mod engine;
pub mod store;

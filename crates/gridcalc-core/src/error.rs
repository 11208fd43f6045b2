//! Error types for gridcalc core.

use gridcalc_engine::engine::{CellRef, RegistryError};
use thiserror::Error;

/// Errors returned by sheet and workbook operations.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid formula in {cell} at position {position}: {message}")]
    InvalidFormula {
        cell: CellRef,
        position: usize,
        message: String,
    },

    #[error("Circular reference: {path}")]
    CircularReference { path: String },

    #[error("No sheet named '{0}'")]
    UnknownSheet(String),

    #[error("Sheet '{0}' already exists")]
    DuplicateSheet(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

pub type Result<T> = std::result::Result<T, CoreError>;

//! Error types for the gridcalc command-line driver

use gridcalc_core::CoreError;
use thiserror::Error;

/// Errors raised while reading or applying a script
#[derive(Error, Debug)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Error at line {line}: {source}")]
    Apply {
        line: usize,
        #[source]
        source: CoreError,
    },
}

pub type Result<T> = std::result::Result<T, CliError>;

//! gridcalc-core - UI-agnostic document model.

pub mod config;
pub mod document;
pub mod error;

pub use config::{Config, load_config};
pub use document::{Cell, CellContents, CellFormat, Sheet, Vertex, Workbook, format_value};
pub use error::{CoreError, Result};

pub use gridcalc_engine::engine::{CellRef, CellValue, Region};

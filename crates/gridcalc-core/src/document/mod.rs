//! Sheet and workbook state and logic (UI-agnostic).

mod cell;
mod eval;
mod format;
mod ops;
mod state;
mod workbook;

pub use cell::{Cell, CellContents};
pub use eval::format_value;
pub use format::CellFormat;
pub use state::{Sheet, Vertex};
pub use workbook::Workbook;

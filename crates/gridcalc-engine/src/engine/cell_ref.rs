//! Cell coordinate parsing and formatting.
//!
//! Provides bidirectional conversion between spreadsheet-style cell references
//! (e.g., "A1", "B2", "AA100") and zero-indexed row/column coordinates.
//!
//! # Examples
//!
//! ```
//! use gridcalc_engine::engine::CellRef;
//!
//! let cell = CellRef::from_a1("B3").unwrap();
//! assert_eq!(cell.col, 1); // 0-indexed
//! assert_eq!(cell.row, 2);
//! assert_eq!(cell.to_string(), "B3");
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

/// Largest column index addressable with three letters (`XFD`).
pub const MAX_COL: u32 = 16_383;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CellRefError {
    #[error("invalid cell reference: {0}")]
    Invalid(String),
    #[error("column out of range: {0}")]
    ColumnOutOfRange(String),
    #[error("row out of range: {0}")]
    RowOutOfRange(String),
}

/// A cell position by row and column indices (0-indexed).
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    pub fn new(row: u32, col: u32) -> CellRef {
        CellRef { row, col }
    }

    /// Parse a cell reference from A1 notation (e.g., "A1", "b2", "AA10").
    /// `$` markers are not accepted here; see [`crate::engine::CellReference`].
    pub fn from_a1(name: &str) -> Option<CellRef> {
        let caps = a1_re().captures(name)?;
        let col = letters_to_col(&caps["letters"])?;
        let row = parse_row_number(&caps["numbers"])?;
        Some(CellRef::new(row, col))
    }

    /// Convert column index to spreadsheet-style letters (0 -> A, 25 -> Z, 26 -> AA).
    pub fn col_to_letters(col: u32) -> String {
        let mut result = String::new();
        let mut n = col as u64 + 1;
        while n > 0 {
            n -= 1;
            result.insert(0, (b'A' + (n % 26) as u8) as char);
            n /= 26;
        }
        result
    }
}

/// Convert a letter run (case-insensitive) to a 0-indexed column.
pub fn letters_to_col(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    let mut acc = 0u32;
    for c in letters.bytes() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = (c.to_ascii_uppercase() - b'A') as u32 + 1;
        acc = acc.checked_mul(26)?.checked_add(digit)?;
    }
    let col = acc.checked_sub(1)?;
    (col <= MAX_COL).then_some(col)
}

/// Convert a 1-based row number to a 0-indexed row.
pub fn parse_row_number(digits: &str) -> Option<u32> {
    digits.parse::<u32>().ok()?.checked_sub(1)
}

fn a1_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?<letters>[A-Za-z]{1,3})(?<numbers>[0-9]+)$")
            .expect("A1 reference regex must compile")
    })
}

impl std::str::FromStr for CellRef {
    type Err = CellRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(caps) = a1_re().captures(s) else {
            return Err(CellRefError::Invalid(s.to_string()));
        };
        let col = letters_to_col(&caps["letters"])
            .ok_or_else(|| CellRefError::ColumnOutOfRange(s.to_string()))?;
        let row = parse_row_number(&caps["numbers"])
            .ok_or_else(|| CellRefError::RowOutOfRange(s.to_string()))?;
        Ok(CellRef::new(row, col))
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", CellRef::col_to_letters(self.col), self.row as u64 + 1)
    }
}

//! Number formats attached to regions of a sheet.

use super::{Sheet, format_value};
use gridcalc_engine::engine::{CellRef, CellValue, Region, format_fixed, format_money};

/// How a cell's number is displayed. Only numbers are affected; other
/// values print as usual.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CellFormat {
    #[default]
    General,
    Fixed {
        decimals: usize,
    },
    Money {
        symbol: String,
        decimals: usize,
    },
}

impl CellFormat {
    pub fn apply(&self, value: &CellValue) -> String {
        match (self, value) {
            (CellFormat::Fixed { decimals }, CellValue::Number(n)) => format_fixed(*n, *decimals),
            (CellFormat::Money { symbol, decimals }, CellValue::Number(n)) => {
                format_money(*n, symbol, *decimals)
            }
            _ => format_value(value),
        }
    }
}

impl Sheet {
    /// Format every cell of `region`, occupied or not. `General` clears it.
    pub fn set_format(&mut self, region: &Region, format: CellFormat) {
        if format == CellFormat::General {
            self.formats.clear(region);
        } else {
            self.formats.add(*region, format);
        }
    }

    pub fn format_at(&self, row: u32, col: u32) -> CellFormat {
        self.formats.get(row, col).cloned().unwrap_or_default()
    }

    /// Formatted regions, clipped to `region`.
    pub fn formats_in(&self, region: &Region) -> Vec<(Region, &CellFormat)> {
        self.formats.get_overlapping(region)
    }

    /// A cell's value as text, with its number format applied.
    pub fn display_value(&self, row: u32, col: u32) -> String {
        let value = self.value(row, col);
        match self.formats.get(row, col) {
            Some(format) => format.apply(&value),
            None => format_value(&value),
        }
    }

    /// Next occupied cell right of `at` in the same row.
    pub fn next_occupied_in_row(&self, at: CellRef) -> Option<CellRef> {
        let from = at.col.checked_add(1)?;
        let (col, _) = self.cells.next_non_empty_in_row(at.row, from)?;
        Some(CellRef::new(at.row, col))
    }

    /// Next occupied cell below `at` in the same column.
    pub fn next_occupied_in_column(&self, at: CellRef) -> Option<CellRef> {
        let from = at.row.checked_add(1)?;
        let (row, _) = self.cells.next_non_empty_in_column(at.col, from)?;
        Some(CellRef::new(row, at.col))
    }

    /// Nearest occupied cell left of `at` in the same row.
    pub fn prev_occupied_in_row(&self, at: CellRef) -> Option<CellRef> {
        let from = at.col.checked_sub(1)?;
        let (col, _) = self.cells.prev_non_empty_in_row(at.row, from)?;
        Some(CellRef::new(at.row, col))
    }

    /// Nearest occupied cell above `at` in the same column.
    pub fn prev_occupied_in_column(&self, at: CellRef) -> Option<CellRef> {
        let from = at.row.checked_sub(1)?;
        let (row, _) = self.cells.prev_non_empty_in_column(at.col, from)?;
        Some(CellRef::new(row, at.col))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn money() -> CellFormat {
        CellFormat::Money {
            symbol: "$".to_string(),
            decimals: 2,
        }
    }

    #[test]
    fn test_apply_only_touches_numbers() {
        let fixed = CellFormat::Fixed { decimals: 3 };
        assert_eq!(fixed.apply(&CellValue::Number(1.5)), "1.500");
        assert_eq!(money().apply(&CellValue::Number(-2.5)), "-$2.50");
        assert_eq!(fixed.apply(&CellValue::Text("1.5".into())), "1.5");
        assert_eq!(fixed.apply(&CellValue::Logical(true)), "TRUE");
        assert_eq!(CellFormat::General.apply(&CellValue::Number(0.25)), "0.25");
    }

    #[test]
    fn test_display_value_uses_region_format() {
        let mut sheet = Sheet::new("test");
        sheet.set_value(0, 0, 3.0).unwrap();
        sheet.set_formula(1, 0, "=A1/4").unwrap();
        sheet.set_format(&Region::columns(0, 0), money());
        assert_eq!(sheet.display_value(0, 0), "$3.00");
        assert_eq!(sheet.display_value(1, 0), "$0.75");
        assert_eq!(sheet.display_value(0, 1), "");

        sheet.set_format(&Region::cell(1, 0), CellFormat::General);
        assert_eq!(sheet.display_value(1, 0), "0.75");
        assert_eq!(sheet.format_at(0, 0), money());
        assert_eq!(sheet.format_at(1, 0), CellFormat::General);
    }

    #[test]
    fn test_formats_follow_structural_edits() {
        let mut sheet = Sheet::new("test");
        sheet.set_format(&Region::new(1, 0, 2, 0), CellFormat::Fixed { decimals: 1 });
        sheet.insert_rows(0, 3).unwrap();
        assert_eq!(sheet.format_at(1, 0), CellFormat::General);
        assert_eq!(sheet.format_at(4, 0), CellFormat::Fixed { decimals: 1 });
        assert_eq!(sheet.format_at(5, 0), CellFormat::Fixed { decimals: 1 });

        sheet.remove_rows(4, 1).unwrap();
        assert_eq!(
            sheet.formats_in(&Region::columns(0, 0)),
            vec![(Region::cell(4, 0), &CellFormat::Fixed { decimals: 1 })]
        );

        sheet.remove_columns(0, 1).unwrap();
        assert!(sheet.formats_in(&Region::new(0, 0, 10, 10)).is_empty());
    }

    #[test]
    fn test_occupied_navigation() {
        let mut sheet = Sheet::new("test");
        sheet.set_value(0, 0, 1.0).unwrap();
        sheet.set_value(0, 5, 2.0).unwrap();
        sheet.set_value(9, 0, 3.0).unwrap();
        let a1 = CellRef::new(0, 0);

        assert_eq!(sheet.next_occupied_in_row(a1), Some(CellRef::new(0, 5)));
        assert_eq!(sheet.next_occupied_in_row(CellRef::new(0, 5)), None);
        assert_eq!(sheet.next_occupied_in_column(a1), Some(CellRef::new(9, 0)));
        assert_eq!(sheet.prev_occupied_in_row(CellRef::new(0, 4)), Some(a1));
        assert_eq!(sheet.prev_occupied_in_row(a1), None);
        assert_eq!(sheet.prev_occupied_in_column(CellRef::new(20, 0)), Some(CellRef::new(9, 0)));
        assert_eq!(sheet.prev_occupied_in_column(CellRef::new(9, 0)), Some(a1));
    }
}

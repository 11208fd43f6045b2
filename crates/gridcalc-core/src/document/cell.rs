//! Cell contents as stored in a sheet.

use gridcalc_engine::engine::{CellValue, Formula};

/// What the user put in a cell.
#[derive(Clone, Debug, PartialEq)]
pub enum CellContents {
    Value(CellValue),
    Formula(Formula),
}

/// A stored cell: its contents plus the last computed value.
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    pub contents: CellContents,
    /// Equal to the contents for value cells; the last result for formulas.
    pub value: CellValue,
}

impl Cell {
    pub fn new_value(value: CellValue) -> Cell {
        Cell {
            value: value.clone(),
            contents: CellContents::Value(value),
        }
    }

    /// A formula cell that has not been calculated yet.
    pub fn new_formula(formula: Formula) -> Cell {
        Cell {
            contents: CellContents::Formula(formula),
            value: CellValue::Empty,
        }
    }

    /// Parse user input into cell contents.
    /// - Empty string or whitespace -> `None`
    /// - Starts with '=' -> formula
    /// - Quoted string -> text (without quotes)
    /// - Otherwise -> value inferred with `date_formats`
    pub fn from_input<S: AsRef<str>>(input: &str, date_formats: &[S]) -> Option<CellContents> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.starts_with('=') {
            return Some(CellContents::Formula(Formula::parse(trimmed)));
        }
        if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
            let text = &trimmed[1..trimmed.len() - 1];
            return Some(CellContents::Value(CellValue::Text(text.to_string())));
        }
        Some(CellContents::Value(CellValue::infer_with_formats(
            trimmed,
            date_formats,
        )))
    }

    pub fn formula(&self) -> Option<&Formula> {
        match &self.contents {
            CellContents::Formula(f) => Some(f),
            CellContents::Value(_) => None,
        }
    }

    pub fn is_formula(&self) -> bool {
        self.formula().is_some()
    }

    /// Text that recreates the cell through [`Cell::from_input`].
    pub fn to_input_string(&self) -> String {
        match &self.contents {
            CellContents::Formula(f) => f.to_formula_text(),
            CellContents::Value(CellValue::Text(s)) => {
                let plain = matches!(CellValue::infer(s), CellValue::Text(_))
                    && s.trim() == s
                    && !s.is_empty()
                    && !s.starts_with(['=', '"']);
                if plain {
                    s.clone()
                } else {
                    format!("\"{}\"", s)
                }
            }
            CellContents::Value(v) => v.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridcalc_engine::engine::DEFAULT_DATE_FORMATS;
    use pretty_assertions::assert_eq;

    fn input(text: &str) -> Option<CellContents> {
        Cell::from_input(text, DEFAULT_DATE_FORMATS)
    }

    #[test]
    fn test_from_input_tags() {
        assert_eq!(input("   "), None);
        assert_eq!(input("42"), Some(CellContents::Value(CellValue::Number(42.0))));
        assert_eq!(input("TRUE"), Some(CellContents::Value(CellValue::Logical(true))));
        assert_eq!(
            input("\"42\""),
            Some(CellContents::Value(CellValue::Text("42".to_string())))
        );
        assert_eq!(
            input("hello"),
            Some(CellContents::Value(CellValue::Text("hello".to_string())))
        );
        assert!(matches!(input("2024-03-01"), Some(CellContents::Value(CellValue::Date(_)))));
        match input("=A1+1") {
            Some(CellContents::Formula(f)) => assert_eq!(f.to_formula_text(), "=A1+1"),
            other => panic!("expected formula, got {other:?}"),
        }
    }

    #[test]
    fn test_formula_like_text_stays_text() {
        let cell = Cell::new_value(CellValue::Text("=abc".to_string()));
        assert_eq!(cell.to_input_string(), "\"=abc\"");
        assert_eq!(
            input(&cell.to_input_string()),
            Some(CellContents::Value(CellValue::Text("=abc".to_string())))
        );
    }

    #[test]
    fn test_input_string_round_trips() {
        for text in ["=SUM(A1:A3)", "42", "hello", "\"42\"", "TRUE", "\"=abc\"", "\"\"\"x\"\""] {
            let contents = input(text).unwrap();
            let cell = match contents {
                CellContents::Formula(f) => Cell::new_formula(f),
                CellContents::Value(v) => Cell::new_value(v),
            };
            assert_eq!(cell.to_input_string(), text);
        }
    }
}

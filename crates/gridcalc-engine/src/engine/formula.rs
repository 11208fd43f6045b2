//! A parsed formula: one syntax tree plus its flat reference list.

use std::fmt;

use super::ast::Expr;
use super::eval::{DataProvider, Evaluator};
use super::lexer::Diagnostic;
use super::parser::parse;
use super::reference::Reference;
use super::region::Axis;
use super::value::{CellValue, ErrorKind};

#[derive(Clone, Debug, PartialEq)]
pub struct Formula {
    expr: Expr,
    references: Vec<Reference>,
    diagnostics: Vec<Diagnostic>,
}

impl Formula {
    /// Parse formula text; a leading `=` is optional. Positions in the
    /// diagnostics are byte offsets into `text` as given.
    pub fn parse(text: &str) -> Formula {
        let trimmed = text.trim_start();
        let (body, offset) = match trimmed.strip_prefix('=') {
            Some(rest) => (rest, text.len() - rest.len()),
            None => (trimmed, text.len() - trimmed.len()),
        };
        let parsed = parse(body);
        let diagnostics = parsed
            .diagnostics
            .into_iter()
            .map(|d| Diagnostic::new(d.position + offset, d.message))
            .collect();
        Formula {
            references: parsed.expr.collect_references(),
            expr: parsed.expr,
            diagnostics,
        }
    }

    pub fn from_expr(expr: Expr) -> Formula {
        Formula {
            references: expr.collect_references(),
            expr,
            diagnostics: Vec::new(),
        }
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// References in source order, including bare names as named references.
    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn is_valid(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Whether any reference was invalidated by a structural edit.
    pub fn has_invalid_references(&self) -> bool {
        self.references.iter().any(|r| !r.is_valid())
    }

    /// Formula text with the leading `=`.
    pub fn to_formula_text(&self) -> String {
        format!("={}", self.expr.to_expression_text())
    }

    pub fn evaluate<P: DataProvider + ?Sized>(&self, provider: &P) -> CellValue {
        if !self.is_valid() {
            return CellValue::Error(ErrorKind::Value);
        }
        Evaluator::new(provider).evaluate(&self.expr)
    }

    pub fn insert_rows(&mut self, at: u32, count: u32) {
        self.rewrite(|r| r.after_insert(Axis::Row, at, count));
    }

    pub fn insert_columns(&mut self, at: u32, count: u32) {
        self.rewrite(|r| r.after_insert(Axis::Column, at, count));
    }

    pub fn remove_rows(&mut self, at: u32, count: u32) {
        self.rewrite(|r| r.after_remove(Axis::Row, at, count));
    }

    pub fn remove_columns(&mut self, at: u32, count: u32) {
        self.rewrite(|r| r.after_remove(Axis::Column, at, count));
    }

    /// Copy of this formula with relative references moved by the given
    /// offsets, as when a formula is copied to another cell.
    pub fn offset(&self, row_offset: i64, col_offset: i64) -> Formula {
        let mut copy = self.clone();
        copy.rewrite(|r| r.shifted(row_offset, col_offset));
        copy
    }

    fn rewrite(&mut self, mut f: impl FnMut(&Reference) -> Reference) {
        self.expr = self.expr.map_references(&mut f);
        self.references = self.expr.collect_references();
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_formula_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn edited(text: &str, edit: impl FnOnce(&mut Formula)) -> String {
        let mut formula = Formula::parse(text);
        assert!(formula.is_valid(), "{:?}", formula.diagnostics());
        edit(&mut formula);
        formula.to_formula_text()
    }

    #[test]
    fn test_parse_strips_equals() {
        let formula = Formula::parse("=SUM(A1:B2, 3)");
        assert!(formula.is_valid());
        assert_eq!(formula.to_formula_text(), "=SUM(A1:B2,3)");
        assert_eq!(formula.references().len(), 1);
        assert_eq!(Formula::parse("1+1").to_formula_text(), "=1+1");
    }

    #[test]
    fn test_diagnostic_positions_include_prefix() {
        let formula = Formula::parse("=SUM(1");
        assert!(!formula.is_valid());
        assert_eq!(formula.diagnostics()[0].position, 6);
    }

    #[test]
    fn test_insert_row_shifts_and_grows() {
        assert_eq!(edited("=A5+A1+SUM(A1:A4)", |f| f.insert_rows(2, 1)), "=A6+A1+SUM(A1:A5)");
        assert_eq!(edited("=$A$5+A$5", |f| f.insert_rows(0, 3)), "=$A$5+A$5");
        assert_eq!(edited("=B1+C:C", |f| f.insert_columns(1, 2)), "=D1+E:E");
    }

    #[test]
    fn test_remove_row_inverts_insert() {
        let text = "=A5+A1+SUM(A1:A4)";
        let mut formula = Formula::parse(text);
        formula.insert_rows(2, 1);
        formula.remove_rows(2, 1);
        assert_eq!(formula.to_formula_text(), text);
    }

    #[test]
    fn test_remove_invalidates_and_contracts() {
        assert_eq!(edited("=A3+SUM(A1:A10)", |f| f.remove_rows(2, 1)), "=#REF!+SUM(A1:A9)");
        let mut formula = Formula::parse("=A3");
        formula.remove_rows(2, 1);
        assert!(formula.has_invalid_references());
        assert!(Formula::parse(&formula.to_formula_text()).is_valid());
    }

    #[test]
    fn test_offset_skips_fixed_axes() {
        let formula = Formula::parse("=A1+$B$2+C$3");
        assert_eq!(formula.offset(1, 1).to_formula_text(), "=B2+$B$2+D$3");
    }
}

//! Typed references found in formulas.
//!
//! A [`Reference`] is one of six kinds (cell, column, row, range, named,
//! multi). References are values: shifting or applying a structural edit
//! returns a new reference and never changes the kind.
//!
//! Structural edit rules (rows shown, columns are symmetric):
//!
//! - Insert N rows at R: coordinates `>= R` move down by N; a range that
//!   spans R grows by N instead.
//! - Remove N rows at R: coordinates past the removed span move up by N;
//!   a reference entirely inside the span becomes invalid (`#REF!`); a range
//!   straddling the span contracts.
//! - A `$`-fixed axis never moves.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use super::cell_ref::{CellRef, MAX_COL, letters_to_col, parse_row_number};
use super::region::{Axis, Region, SpanEdit, UNBOUNDED, span_after_insert, span_after_remove};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceKind {
    Cell,
    Column,
    Row,
    Range,
    Named,
    Multi,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellReference {
    pub row: u32,
    pub col: u32,
    pub row_fixed: bool,
    pub col_fixed: bool,
    pub valid: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnReference {
    pub col: u32,
    pub fixed: bool,
    pub valid: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowReference {
    pub row: u32,
    pub fixed: bool,
    pub valid: bool,
}

/// Two same-kind endpoints (cell, column or row), normalized so that
/// `start <= end` on both axes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RangeReference {
    start: Box<Reference>,
    end: Box<Reference>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reference {
    Cell(CellReference),
    Column(ColumnReference),
    Row(RowReference),
    Range(RangeReference),
    Named(String),
    Multi(Vec<Reference>),
}

fn cell_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?<cf>\$?)(?<letters>[A-Za-z]{1,3})(?<rf>\$?)(?<numbers>[0-9]+)$")
            .expect("cell reference regex must compile")
    })
}

fn column_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?<cf>\$?)(?<letters>[A-Za-z]{1,3})$")
            .expect("column reference regex must compile")
    })
}

fn row_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?<rf>\$?)(?<numbers>[0-9]+)$").expect("row reference regex must compile")
    })
}

fn fixed_marker(fixed: bool) -> &'static str {
    if fixed { "$" } else { "" }
}

impl CellReference {
    pub fn new(row: u32, col: u32) -> CellReference {
        CellReference {
            row,
            col,
            row_fixed: false,
            col_fixed: false,
            valid: true,
        }
    }

    pub fn fixed(row: u32, col: u32, row_fixed: bool, col_fixed: bool) -> CellReference {
        CellReference {
            row_fixed,
            col_fixed,
            ..CellReference::new(row, col)
        }
    }

    /// Parse `[$]LETTERS[$]DIGITS`.
    pub fn parse(text: &str) -> Option<CellReference> {
        let caps = cell_re().captures(text)?;
        Some(CellReference::fixed(
            parse_row_number(&caps["numbers"])?,
            letters_to_col(&caps["letters"])?,
            !caps["rf"].is_empty(),
            !caps["cf"].is_empty(),
        ))
    }

    pub fn cell_ref(&self) -> CellRef {
        CellRef::new(self.row, self.col)
    }
}

impl ColumnReference {
    pub fn new(col: u32, fixed: bool) -> ColumnReference {
        ColumnReference { col, fixed, valid: true }
    }

    /// Parse `[$]LETTERS`.
    pub fn parse(text: &str) -> Option<ColumnReference> {
        let caps = column_re().captures(text)?;
        Some(ColumnReference::new(
            letters_to_col(&caps["letters"])?,
            !caps["cf"].is_empty(),
        ))
    }
}

impl RowReference {
    pub fn new(row: u32, fixed: bool) -> RowReference {
        RowReference { row, fixed, valid: true }
    }

    /// Parse `[$]DIGITS` (1-based).
    pub fn parse(text: &str) -> Option<RowReference> {
        let caps = row_re().captures(text)?;
        Some(RowReference::new(
            parse_row_number(&caps["numbers"])?,
            !caps["rf"].is_empty(),
        ))
    }
}

impl RangeReference {
    /// Build a range from two endpoints of the same positional kind.
    pub fn new(start: Reference, end: Reference) -> Option<RangeReference> {
        let same_kind = matches!(
            (&start, &end),
            (Reference::Cell(_), Reference::Cell(_))
                | (Reference::Column(_), Reference::Column(_))
                | (Reference::Row(_), Reference::Row(_))
        );
        if !same_kind {
            return None;
        }
        Some(RangeReference::normalized(start, end))
    }

    fn normalized(mut start: Reference, mut end: Reference) -> RangeReference {
        for axis in [Axis::Row, Axis::Column] {
            if let (Some(s), Some(e)) = (start.coord(axis), end.coord(axis))
                && s > e
            {
                let (sf, ef) = (start.is_fixed(axis), end.is_fixed(axis));
                start = start.with_coord(axis, e, ef);
                end = end.with_coord(axis, s, sf);
            }
        }
        RangeReference {
            start: Box::new(start),
            end: Box::new(end),
        }
    }

    pub fn start(&self) -> &Reference {
        &self.start
    }

    pub fn end(&self) -> &Reference {
        &self.end
    }
}

impl Reference {
    pub fn cell(row: u32, col: u32) -> Reference {
        Reference::Cell(CellReference::new(row, col))
    }

    /// Range between two cells (either order).
    pub fn cell_range(top: u32, left: u32, bottom: u32, right: u32) -> Reference {
        Reference::Range(RangeReference::normalized(
            Reference::cell(top, left),
            Reference::cell(bottom, right),
        ))
    }

    pub fn named(name: impl Into<String>) -> Reference {
        Reference::Named(name.into())
    }

    /// Parse A1-style reference text: `A1`, `$A$1:B2`, `A:C`, `3:$4`.
    pub fn parse(text: &str) -> Option<Reference> {
        let text = text.trim();
        if let Some((left, right)) = text.split_once(':') {
            let (start, end) = if let (Some(s), Some(e)) =
                (CellReference::parse(left), CellReference::parse(right))
            {
                (Reference::Cell(s), Reference::Cell(e))
            } else if let (Some(s), Some(e)) =
                (ColumnReference::parse(left), ColumnReference::parse(right))
            {
                (Reference::Column(s), Reference::Column(e))
            } else if let (Some(s), Some(e)) =
                (RowReference::parse(left), RowReference::parse(right))
            {
                (Reference::Row(s), Reference::Row(e))
            } else {
                return None;
            };
            return RangeReference::new(start, end).map(Reference::Range);
        }
        CellReference::parse(text).map(Reference::Cell)
    }

    pub fn kind(&self) -> ReferenceKind {
        match self {
            Reference::Cell(_) => ReferenceKind::Cell,
            Reference::Column(_) => ReferenceKind::Column,
            Reference::Row(_) => ReferenceKind::Row,
            Reference::Range(_) => ReferenceKind::Range,
            Reference::Named(_) => ReferenceKind::Named,
            Reference::Multi(_) => ReferenceKind::Multi,
        }
    }

    pub fn is_valid(&self) -> bool {
        match self {
            Reference::Cell(c) => c.valid,
            Reference::Column(c) => c.valid,
            Reference::Row(r) => r.valid,
            Reference::Range(r) => r.start.is_valid() && r.end.is_valid(),
            Reference::Named(_) => true,
            Reference::Multi(parts) => parts.iter().all(Reference::is_valid),
        }
    }

    /// Structural equality.
    pub fn same_as(&self, other: &Reference) -> bool {
        self == other
    }

    /// The region this reference denotes; `None` for names and invalid references.
    pub fn to_region(&self) -> Option<Region> {
        if !self.is_valid() {
            return None;
        }
        match self {
            Reference::Cell(c) => Some(Region::cell(c.row, c.col)),
            Reference::Column(c) => Some(Region::columns(c.col, c.col)),
            Reference::Row(r) => Some(Region::rows(r.row, r.row)),
            Reference::Range(r) => {
                let start = r.start.to_region()?;
                let end = r.end.to_region()?;
                Some(start.bounding(&end))
            }
            Reference::Named(_) => None,
            Reference::Multi(parts) => {
                let mut regions = parts.iter().map(Reference::to_region);
                let first = regions.next()??;
                regions.try_fold(first, |acc, r| Some(acc.bounding(&r?)))
            }
        }
    }

    /// Every region this reference covers (one per part for multi references).
    pub fn regions(&self) -> Vec<Region> {
        match self {
            Reference::Multi(parts) => parts.iter().flat_map(Reference::regions).collect(),
            other => other.to_region().into_iter().collect(),
        }
    }

    pub fn to_text(&self) -> String {
        if !self.is_valid() {
            return "#REF!".to_string();
        }
        match self {
            Reference::Cell(c) => format!(
                "{}{}{}{}",
                fixed_marker(c.col_fixed),
                CellRef::col_to_letters(c.col),
                fixed_marker(c.row_fixed),
                c.row as u64 + 1
            ),
            Reference::Column(c) => {
                format!("{}{}", fixed_marker(c.fixed), CellRef::col_to_letters(c.col))
            }
            Reference::Row(r) => format!("{}{}", fixed_marker(r.fixed), r.row as u64 + 1),
            Reference::Range(r) => format!("{}:{}", r.start.to_text(), r.end.to_text()),
            Reference::Named(name) => name.clone(),
            Reference::Multi(parts) => format!(
                "({})",
                parts.iter().map(Reference::to_text).collect::<Vec<_>>().join(",")
            ),
        }
    }

    fn coord(&self, axis: Axis) -> Option<u32> {
        match (self, axis) {
            (Reference::Cell(c), Axis::Row) => Some(c.row),
            (Reference::Cell(c), Axis::Column) => Some(c.col),
            (Reference::Column(c), Axis::Column) => Some(c.col),
            (Reference::Row(r), Axis::Row) => Some(r.row),
            _ => None,
        }
    }

    fn is_fixed(&self, axis: Axis) -> bool {
        match (self, axis) {
            (Reference::Cell(c), Axis::Row) => c.row_fixed,
            (Reference::Cell(c), Axis::Column) => c.col_fixed,
            (Reference::Column(c), Axis::Column) => c.fixed,
            (Reference::Row(r), Axis::Row) => r.fixed,
            _ => false,
        }
    }

    fn with_coord(&self, axis: Axis, value: u32, fixed: bool) -> Reference {
        let mut out = self.clone();
        match (&mut out, axis) {
            (Reference::Cell(c), Axis::Row) => {
                c.row = value;
                c.row_fixed = fixed;
            }
            (Reference::Cell(c), Axis::Column) => {
                c.col = value;
                c.col_fixed = fixed;
            }
            (Reference::Column(c), Axis::Column) => {
                c.col = value;
                c.fixed = fixed;
            }
            (Reference::Row(r), Axis::Row) => {
                r.row = value;
                r.fixed = fixed;
            }
            _ => {}
        }
        out
    }

    fn invalidated(&self) -> Reference {
        let mut out = self.clone();
        match &mut out {
            Reference::Cell(c) => c.valid = false,
            Reference::Column(c) => c.valid = false,
            Reference::Row(r) => r.valid = false,
            Reference::Range(r) => {
                r.start = Box::new(r.start.invalidated());
                r.end = Box::new(r.end.invalidated());
            }
            Reference::Multi(parts) => {
                *parts = parts.iter().map(Reference::invalidated).collect();
            }
            Reference::Named(_) => {}
        }
        out
    }

    fn max_coord(axis: Axis) -> i64 {
        match axis {
            Axis::Row => UNBOUNDED as i64 - 1,
            Axis::Column => MAX_COL as i64,
        }
    }

    fn offset_axis(&self, axis: Axis, offset: i64) -> Reference {
        let Some(c) = self.coord(axis) else {
            return self.clone();
        };
        if offset == 0 || self.is_fixed(axis) {
            return self.clone();
        }
        let moved = c as i64 + offset;
        if moved < 0 || moved > Reference::max_coord(axis) {
            return self.invalidated();
        }
        self.with_coord(axis, moved as u32, false)
    }

    /// A copy moved by the given offsets. Fixed axes stay put; a coordinate
    /// pushed off the grid makes the reference invalid.
    pub fn shifted(&self, row_offset: i64, col_offset: i64) -> Reference {
        match self {
            Reference::Cell(_) | Reference::Column(_) | Reference::Row(_) => self
                .offset_axis(Axis::Row, row_offset)
                .offset_axis(Axis::Column, col_offset),
            Reference::Range(r) => Reference::Range(RangeReference::normalized(
                r.start.shifted(row_offset, col_offset),
                r.end.shifted(row_offset, col_offset),
            )),
            Reference::Named(_) => self.clone(),
            Reference::Multi(parts) => Reference::Multi(
                parts.iter().map(|p| p.shifted(row_offset, col_offset)).collect(),
            ),
        }
    }

    /// A copy adjusted for `count` rows/columns inserted at `at`.
    pub fn after_insert(&self, axis: Axis, at: u32, count: u32) -> Reference {
        if count == 0 || !self.is_valid() {
            return self.clone();
        }
        match self {
            Reference::Cell(_) | Reference::Column(_) | Reference::Row(_) => match self.coord(axis) {
                Some(c) if c >= at && !self.is_fixed(axis) => {
                    self.offset_axis(axis, count as i64)
                }
                _ => self.clone(),
            },
            Reference::Range(r) => {
                let (Some(s), Some(e)) = (r.start.coord(axis), r.end.coord(axis)) else {
                    return self.clone();
                };
                let Some((new_s, new_e)) = span_after_insert(s, e, at, count) else {
                    return self.clone();
                };
                self.with_range_span(r, axis, new_s, new_e)
            }
            Reference::Named(_) => self.clone(),
            Reference::Multi(parts) => Reference::Multi(
                parts.iter().map(|p| p.after_insert(axis, at, count)).collect(),
            ),
        }
    }

    /// A copy adjusted for `count` rows/columns removed starting at `at`.
    pub fn after_remove(&self, axis: Axis, at: u32, count: u32) -> Reference {
        if count == 0 || !self.is_valid() {
            return self.clone();
        }
        let last_removed = at.saturating_add(count - 1);
        match self {
            Reference::Cell(_) | Reference::Column(_) | Reference::Row(_) => match self.coord(axis) {
                Some(c) if c >= at && c <= last_removed => self.invalidated(),
                Some(c) if c > last_removed && !self.is_fixed(axis) => {
                    self.offset_axis(axis, -(count as i64))
                }
                _ => self.clone(),
            },
            Reference::Range(r) => {
                let (Some(s), Some(e)) = (r.start.coord(axis), r.end.coord(axis)) else {
                    return self.clone();
                };
                match span_after_remove(s, e, at, count) {
                    SpanEdit::Unchanged => self.clone(),
                    SpanEdit::Removed => self.invalidated(),
                    SpanEdit::Moved(new_s, new_e) => self.with_range_span(r, axis, new_s, new_e),
                }
            }
            Reference::Named(_) => self.clone(),
            Reference::Multi(parts) => Reference::Multi(
                parts.iter().map(|p| p.after_remove(axis, at, count)).collect(),
            ),
        }
    }

    fn with_range_span(&self, r: &RangeReference, axis: Axis, new_s: u32, new_e: u32) -> Reference {
        let start = if r.start.is_fixed(axis) {
            (*r.start).clone()
        } else {
            r.start.with_coord(axis, new_s, false)
        };
        let end = if r.end.is_fixed(axis) {
            (*r.end).clone()
        } else {
            r.end.with_coord(axis, new_e, false)
        };
        Reference::Range(RangeReference::normalized(start, end))
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn r(text: &str) -> Reference {
        Reference::parse(text).unwrap_or_else(|| panic!("bad reference {text}"))
    }

    #[test]
    fn test_parse_and_print() {
        for text in ["A1", "$A$1", "A$1", "$B2", "A1:C3", "A:B", "$3:4", "$A$1:$B$9"] {
            assert_eq!(r(text).to_text(), text);
        }
        assert_eq!(r("b2").to_text(), "B2");
        assert!(Reference::parse("A1:B").is_none());
        assert!(Reference::parse("Total").is_none());
    }

    #[test]
    fn test_range_normalizes_corners() {
        assert_eq!(r("C3:A1").to_text(), "A1:C3");
        assert_eq!(r("A3:C1").to_text(), "A1:C3");
        assert_eq!(r("$C3:A$1").to_text(), "A$1:$C3");
        assert_eq!(r("B:A").to_text(), "A:B");
    }

    #[test]
    fn test_kind_and_region() {
        assert_eq!(r("A1").kind(), ReferenceKind::Cell);
        assert_eq!(r("A1:B2").kind(), ReferenceKind::Range);
        assert_eq!(r("A1:B2").to_region(), Some(Region::new(0, 0, 1, 1)));
        assert_eq!(r("B:C").to_region(), Some(Region::columns(1, 2)));
        assert_eq!(r("2:2").to_region(), Some(Region::rows(1, 1)));
        assert_eq!(Reference::named("x").to_region(), None);
        let multi = Reference::Multi(vec![r("A1"), r("C3")]);
        assert_eq!(multi.to_region(), Some(Region::new(0, 0, 2, 2)));
        assert_eq!(multi.regions().len(), 2);
    }

    #[test]
    fn test_insert_row_shifts_and_grows() {
        // Rows are 0-indexed: index 2 is the third row.
        let below = Reference::cell(5, 0);
        assert_eq!(below.after_insert(Axis::Row, 2, 1), Reference::cell(6, 0));
        let above = Reference::cell(1, 0);
        assert_eq!(above.after_insert(Axis::Row, 2, 1), above);
        let range = r("A1:A4");
        assert_eq!(range.after_insert(Axis::Row, 2, 1).to_text(), "A1:A5");
    }

    #[test]
    fn test_remove_row_inverts_insert() {
        for reference in [Reference::cell(5, 0), Reference::cell(1, 0), r("A1:A4"), r("B3:C9")] {
            let inserted = reference.after_insert(Axis::Row, 2, 1);
            assert_eq!(inserted.after_remove(Axis::Row, 2, 1), reference);
        }
    }

    #[test]
    fn test_remove_invalidates_contained() {
        let gone = Reference::cell(3, 0).after_remove(Axis::Row, 2, 3);
        assert_eq!(gone.kind(), ReferenceKind::Cell);
        assert!(!gone.is_valid());
        assert_eq!(gone.to_text(), "#REF!");
        assert!(!r("A3:B4").after_remove(Axis::Row, 2, 2).is_valid());
    }

    #[test]
    fn test_remove_contracts_straddling_range() {
        assert_eq!(r("A1:A10").after_remove(Axis::Row, 2, 3).to_text(), "A1:A7");
        assert_eq!(r("A4:A10").after_remove(Axis::Row, 1, 4).to_text(), "A2:A6");
        assert_eq!(r("A1:A4").after_remove(Axis::Row, 2, 5).to_text(), "A1:A2");
    }

    #[test]
    fn test_fixed_axis_is_exempt() {
        assert_eq!(r("A$6").after_insert(Axis::Row, 2, 1).to_text(), "A$6");
        assert_eq!(r("$A6").after_insert(Axis::Row, 2, 1).to_text(), "$A7");
        assert_eq!(r("$A6").after_insert(Axis::Column, 0, 1).to_text(), "$A6");
        assert_eq!(r("A$1:A$4").after_insert(Axis::Row, 2, 1).to_text(), "A$1:A$4");
        assert_eq!(r("$C$3").shifted(4, 4).to_text(), "$C$3");
    }

    #[test]
    fn test_columns_follow_column_edits_only() {
        assert_eq!(r("B:C").after_insert(Axis::Row, 0, 5).to_text(), "B:C");
        assert_eq!(r("B:C").after_insert(Axis::Column, 0, 1).to_text(), "C:D");
        assert_eq!(r("B:D").after_insert(Axis::Column, 2, 2).to_text(), "B:F");
        assert!(!r("B:C").after_remove(Axis::Column, 1, 2).is_valid());
    }

    #[test]
    fn test_shifted_off_grid_is_invalid() {
        assert_eq!(r("B2").shifted(1, 2).to_text(), "D3");
        assert!(!r("A1").shifted(-1, 0).is_valid());
        assert_eq!(r("A1:B2").shifted(2, 0).to_text(), "A3:B4");
    }

    #[test]
    fn test_named_and_multi() {
        let name = Reference::named("Rate");
        assert_eq!(name.after_insert(Axis::Row, 0, 3), name);
        let multi = Reference::Multi(vec![r("A1"), r("B5:B6")]);
        assert_eq!(multi.to_text(), "(A1,B5:B6)");
        assert_eq!(multi.after_insert(Axis::Row, 2, 1).to_text(), "(A1,B6:B7)");
        assert!(multi.same_as(&Reference::Multi(vec![r("A1"), r("B5:B6")])));
    }
}

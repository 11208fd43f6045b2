//! Rectangular regions of the grid.
//!
//! A [`Region`] is an inclusive rectangle of rows and columns. Whole-row and
//! whole-column regions are expressed with [`UNBOUNDED`] as the far edge, so
//! `A:A` is `Region { top: 0, bottom: UNBOUNDED, left: 0, right: 0 }`.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::cell_ref::CellRef;

/// Far edge of a region that extends to the end of the grid.
pub const UNBOUNDED: u32 = u32::MAX;

/// Which coordinate a structural edit or a storage partition works on.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Row,
    #[default]
    Column,
}

impl Axis {
    pub fn other(self) -> Axis {
        match self {
            Axis::Row => Axis::Column,
            Axis::Column => Axis::Row,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Region {
    pub top: u32,
    pub left: u32,
    pub bottom: u32,
    pub right: u32,
}

impl Region {
    /// Build a region from two corners in any order.
    pub fn new(top: u32, left: u32, bottom: u32, right: u32) -> Region {
        Region {
            top: top.min(bottom),
            left: left.min(right),
            bottom: top.max(bottom),
            right: left.max(right),
        }
    }

    pub fn cell(row: u32, col: u32) -> Region {
        Region::new(row, col, row, col)
    }

    /// Whole rows `top..=bottom`.
    pub fn rows(top: u32, bottom: u32) -> Region {
        Region::new(top, 0, bottom, UNBOUNDED)
    }

    /// Whole columns `left..=right`.
    pub fn columns(left: u32, right: u32) -> Region {
        Region::new(0, left, UNBOUNDED, right)
    }

    pub fn all() -> Region {
        Region::new(0, 0, UNBOUNDED, UNBOUNDED)
    }

    pub fn start(&self, axis: Axis) -> u32 {
        match axis {
            Axis::Row => self.top,
            Axis::Column => self.left,
        }
    }

    pub fn end(&self, axis: Axis) -> u32 {
        match axis {
            Axis::Row => self.bottom,
            Axis::Column => self.right,
        }
    }

    fn with_span(&self, axis: Axis, start: u32, end: u32) -> Region {
        match axis {
            Axis::Row => Region::new(start, self.left, end, self.right),
            Axis::Column => Region::new(self.top, start, self.bottom, end),
        }
    }

    pub fn height(&self) -> u64 {
        self.bottom as u64 - self.top as u64 + 1
    }

    pub fn width(&self) -> u64 {
        self.right as u64 - self.left as u64 + 1
    }

    pub fn area(&self) -> u64 {
        self.height().saturating_mul(self.width())
    }

    pub fn is_bounded(&self) -> bool {
        self.bottom != UNBOUNDED && self.right != UNBOUNDED
    }

    pub fn is_single_cell(&self) -> bool {
        self.top == self.bottom && self.left == self.right
    }

    pub fn top_left(&self) -> CellRef {
        CellRef::new(self.top, self.left)
    }

    pub fn contains(&self, row: u32, col: u32) -> bool {
        row >= self.top && row <= self.bottom && col >= self.left && col <= self.right
    }

    pub fn contains_region(&self, other: &Region) -> bool {
        other.top >= self.top
            && other.bottom <= self.bottom
            && other.left >= self.left
            && other.right <= self.right
    }

    pub fn intersects(&self, other: &Region) -> bool {
        self.top <= other.bottom
            && other.top <= self.bottom
            && self.left <= other.right
            && other.left <= self.right
    }

    pub fn intersection(&self, other: &Region) -> Option<Region> {
        if !self.intersects(other) {
            return None;
        }
        Some(Region {
            top: self.top.max(other.top),
            left: self.left.max(other.left),
            bottom: self.bottom.min(other.bottom),
            right: self.right.min(other.right),
        })
    }

    /// Smallest region containing both.
    pub fn bounding(&self, other: &Region) -> Region {
        Region {
            top: self.top.min(other.top),
            left: self.left.min(other.left),
            bottom: self.bottom.max(other.bottom),
            right: self.right.max(other.right),
        }
    }

    /// The parts of `self` not covered by `other`, as at most four disjoint regions.
    pub fn subtract(&self, other: &Region) -> Vec<Region> {
        let Some(cut) = self.intersection(other) else {
            return vec![*self];
        };
        let mut pieces = Vec::with_capacity(4);
        if cut.top > self.top {
            pieces.push(Region::new(self.top, self.left, cut.top - 1, self.right));
        }
        if cut.bottom < self.bottom {
            pieces.push(Region::new(cut.bottom + 1, self.left, self.bottom, self.right));
        }
        if cut.left > self.left {
            pieces.push(Region::new(cut.top, self.left, cut.bottom, cut.left - 1));
        }
        if cut.right < self.right {
            pieces.push(Region::new(cut.top, cut.right + 1, cut.bottom, self.right));
        }
        pieces
    }

    /// Union of two regions when that union is itself a rectangle.
    pub fn merged(&self, other: &Region) -> Option<Region> {
        let touches = |a_start: u32, a_end: u32, b_start: u32, b_end: u32| {
            a_start as u64 <= b_end as u64 + 1 && b_start as u64 <= a_end as u64 + 1
        };
        if self.left == other.left
            && self.right == other.right
            && touches(self.top, self.bottom, other.top, other.bottom)
        {
            return Some(self.bounding(other));
        }
        if self.top == other.top
            && self.bottom == other.bottom
            && touches(self.left, self.right, other.left, other.right)
        {
            return Some(self.bounding(other));
        }
        None
    }

    /// Region after inserting `count` rows/columns at `at`.
    ///
    /// Regions at or past `at` move; a region spanning `at` grows.
    pub fn after_insert(&self, axis: Axis, at: u32, count: u32) -> Region {
        let (start, end) = (self.start(axis), self.end(axis));
        match span_after_insert(start, end, at, count) {
            Some((s, e)) => self.with_span(axis, s, e),
            None => *self,
        }
    }

    /// Region after removing `count` rows/columns starting at `at`.
    /// Returns `None` when the region lies entirely inside the removed span.
    pub fn after_remove(&self, axis: Axis, at: u32, count: u32) -> Option<Region> {
        let (start, end) = (self.start(axis), self.end(axis));
        match span_after_remove(start, end, at, count) {
            SpanEdit::Unchanged => Some(*self),
            SpanEdit::Moved(s, e) => Some(self.with_span(axis, s, e)),
            SpanEdit::Removed => None,
        }
    }
}

/// Outcome of removing a span from an inclusive `start..=end` interval.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum SpanEdit {
    Unchanged,
    Moved(u32, u32),
    Removed,
}

fn add_keep_unbounded(value: u32, count: u32) -> u32 {
    if value == UNBOUNDED {
        UNBOUNDED
    } else {
        value.saturating_add(count).min(UNBOUNDED - 1)
    }
}

fn sub_keep_unbounded(value: u32, count: u32) -> u32 {
    if value == UNBOUNDED {
        UNBOUNDED
    } else {
        value.saturating_sub(count)
    }
}

/// Interval after inserting `count` lines at `at`; `None` when unaffected.
pub(crate) fn span_after_insert(start: u32, end: u32, at: u32, count: u32) -> Option<(u32, u32)> {
    if count == 0 || end < at {
        return None;
    }
    if start >= at {
        Some((add_keep_unbounded(start, count), add_keep_unbounded(end, count)))
    } else {
        Some((start, add_keep_unbounded(end, count)))
    }
}

/// Interval after removing lines `at..at + count`.
pub(crate) fn span_after_remove(start: u32, end: u32, at: u32, count: u32) -> SpanEdit {
    if count == 0 || end < at {
        return SpanEdit::Unchanged;
    }
    let last_removed = at.saturating_add(count - 1);
    if start > last_removed {
        return SpanEdit::Moved(start - count, sub_keep_unbounded(end, count));
    }
    if start >= at && end <= last_removed {
        return SpanEdit::Removed;
    }
    let new_start = start.min(at);
    let new_end = if end > last_removed {
        sub_keep_unbounded(end, count)
    } else {
        at - 1
    };
    SpanEdit::Moved(new_start, new_end)
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows_unbounded = self.bottom == UNBOUNDED && self.top == 0;
        let cols_unbounded = self.right == UNBOUNDED && self.left == 0;
        if rows_unbounded && !cols_unbounded {
            return write!(
                f,
                "{}:{}",
                CellRef::col_to_letters(self.left),
                CellRef::col_to_letters(self.right)
            );
        }
        if cols_unbounded && !rows_unbounded {
            return write!(f, "{}:{}", self.top as u64 + 1, self.bottom as u64 + 1);
        }
        if self.is_single_cell() {
            return write!(f, "{}", self.top_left());
        }
        write!(
            f,
            "{}:{}",
            self.top_left(),
            CellRef::new(self.bottom, self.right)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalizes_corners() {
        let r = Region::new(5, 4, 1, 2);
        assert_eq!(r, Region { top: 1, left: 2, bottom: 5, right: 4 });
        assert_eq!(r.height(), 5);
        assert_eq!(r.width(), 3);
    }

    #[test]
    fn test_subtract_center_leaves_four_pieces() {
        let outer = Region::new(0, 0, 4, 4);
        let hole = Region::cell(2, 2);
        let pieces = outer.subtract(&hole);
        assert_eq!(pieces.len(), 4);
        let area: u64 = pieces.iter().map(|p| p.area()).sum();
        assert_eq!(area, 24);
        assert!(pieces.iter().all(|p| !p.contains(2, 2)));
    }

    #[test]
    fn test_subtract_unbounded() {
        let col = Region::columns(0, 0);
        let pieces = col.subtract(&Region::rows(0, 9));
        assert_eq!(pieces, vec![Region::new(10, 0, UNBOUNDED, 0)]);
    }

    #[test]
    fn test_merged_requires_rectangular_union() {
        let a = Region::new(0, 0, 1, 1);
        assert_eq!(a.merged(&Region::new(2, 0, 3, 1)), Some(Region::new(0, 0, 3, 1)));
        assert_eq!(a.merged(&Region::new(2, 0, 3, 2)), None);
        assert_eq!(a.merged(&Region::new(5, 0, 6, 1)), None);
    }

    #[test]
    fn test_insert_and_remove_rows() {
        let r = Region::new(0, 0, 3, 0);
        let grown = r.after_insert(Axis::Row, 2, 1);
        assert_eq!(grown, Region::new(0, 0, 4, 0));
        assert_eq!(grown.after_remove(Axis::Row, 2, 1), Some(r));

        let below = Region::new(5, 0, 6, 0);
        assert_eq!(below.after_insert(Axis::Row, 2, 3), Region::new(8, 0, 9, 0));
        assert_eq!(below.after_remove(Axis::Row, 5, 2), None);
        assert_eq!(below.after_insert(Axis::Column, 2, 3), below);
    }

    #[test]
    fn test_remove_straddling_start() {
        // rows 3..=8, remove 1..=4 -> rows 1..=4
        let r = Region::new(3, 0, 8, 0);
        assert_eq!(r.after_remove(Axis::Row, 1, 4), Some(Region::new(1, 0, 4, 0)));
    }

    #[test]
    fn test_display() {
        assert_eq!(Region::new(0, 0, 1, 1).to_string(), "A1:B2");
        assert_eq!(Region::columns(0, 1).to_string(), "A:B");
        assert_eq!(Region::rows(2, 3).to_string(), "3:4");
        assert_eq!(Region::cell(0, 2).to_string(), "C1");
    }
}

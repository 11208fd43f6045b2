//! Sparse 2-D store partitioned by a primary axis.
//!
//! With [`Axis::Column`] as primary axis the store keeps one [`SparseList`]
//! per occupied column, each indexed by row; with [`Axis::Row`] the roles
//! swap. Lookups along the primary axis ("next occupied row in column C")
//! never visit empty cells. Nothing is allocated for empty cells.

use crate::engine::{Axis, Region, UNBOUNDED};

use super::SparseList;

#[derive(Clone, Debug, PartialEq)]
pub struct MatrixStore<T> {
    axis: Axis,
    lines: SparseList<SparseList<T>>,
    len: usize,
}

impl<T> Default for MatrixStore<T> {
    fn default() -> Self {
        MatrixStore::new(Axis::default())
    }
}

impl<T> MatrixStore<T> {
    pub fn new(axis: Axis) -> Self {
        MatrixStore {
            axis,
            lines: SparseList::new(),
            len: 0,
        }
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// (line, index) for a cell under this store's partitioning.
    fn key(&self, row: u32, col: u32) -> (u32, u32) {
        match self.axis {
            Axis::Column => (col, row),
            Axis::Row => (row, col),
        }
    }

    fn cell(&self, line: u32, index: u32) -> (u32, u32) {
        match self.axis {
            Axis::Column => (index, line),
            Axis::Row => (line, index),
        }
    }

    /// Region bounds as (first line, last line, first index, last index).
    fn bounds(&self, region: &Region) -> (u32, u32, u32, u32) {
        let other = self.axis.other();
        (
            region.start(self.axis),
            region.end(self.axis),
            region.start(other),
            region.end(other),
        )
    }

    pub fn get(&self, row: u32, col: u32) -> Option<&T> {
        let (line, index) = self.key(row, col);
        self.lines.get(line)?.get(index)
    }

    pub fn get_mut(&mut self, row: u32, col: u32) -> Option<&mut T> {
        let (line, index) = self.key(row, col);
        self.lines.get_mut(line)?.get_mut(index)
    }

    /// Store `value`, returning what was there before.
    pub fn set(&mut self, row: u32, col: u32, value: T) -> Option<T> {
        let (line, index) = self.key(row, col);
        let previous = self
            .lines
            .get_or_insert_with(line, SparseList::new)
            .set(index, value);
        if previous.is_none() {
            self.len += 1;
        }
        previous
    }

    pub fn clear(&mut self, row: u32, col: u32) -> Option<T> {
        let (line, index) = self.key(row, col);
        let list = self.lines.get_mut(line)?;
        let removed = list.remove(index);
        if list.is_empty() {
            self.lines.remove(line);
        }
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    /// Every stored cell as (row, col, value), line by line.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32, &T)> {
        self.lines.iter().flat_map(move |(line, list)| {
            list.iter().map(move |(index, value)| {
                let (row, col) = self.cell(line, index);
                (row, col, value)
            })
        })
    }

    /// Occupied cells inside `region`, sorted by row then column.
    pub fn get_non_empty_data(&self, region: &Region) -> Vec<(u32, u32, &T)> {
        let (first_line, last_line, first_index, last_index) = self.bounds(region);
        let mut out: Vec<(u32, u32, &T)> = self
            .lines
            .iter_range(first_line, last_line)
            .flat_map(|(line, list)| {
                list.iter_range(first_index, last_index).map(move |(index, value)| {
                    let (row, col) = self.cell(line, index);
                    (row, col, value)
                })
            })
            .collect();
        if self.axis == Axis::Column {
            out.sort_by_key(|(row, col, _)| (*row, *col));
        }
        out
    }

    /// Dense rows covering `region`. Unbounded edges are clipped to the
    /// occupied extent; a region with nothing to clip to yields no rows.
    pub fn get_data(&self, region: &Region) -> Vec<Vec<Option<&T>>> {
        let Some(region) = self.clip_to_used(region) else {
            return Vec::new();
        };
        (region.top..=region.bottom)
            .map(|row| (region.left..=region.right).map(|col| self.get(row, col)).collect())
            .collect()
    }

    /// `region` with unbounded far edges pulled in to the last occupied
    /// row/column.
    pub fn clip_to_used(&self, region: &Region) -> Option<Region> {
        if region.is_bounded() {
            return Some(*region);
        }
        let used = self.used_region()?;
        if !region.intersects(&used) {
            return None;
        }
        let bottom = if region.bottom == UNBOUNDED { used.bottom } else { region.bottom };
        let right = if region.right == UNBOUNDED { used.right } else { region.right };
        if bottom < region.top || right < region.left {
            return None;
        }
        Some(Region {
            top: region.top,
            left: region.left,
            bottom,
            right,
        })
    }

    /// Next occupied cell in `row` at or after `from_col`.
    pub fn next_non_empty_in_row(&self, row: u32, from_col: u32) -> Option<(u32, &T)> {
        self.next_non_empty_along(Axis::Row, row, from_col)
    }

    /// Next occupied cell in `col` at or after `from_row`.
    pub fn next_non_empty_in_column(&self, col: u32, from_row: u32) -> Option<(u32, &T)> {
        self.next_non_empty_along(Axis::Column, col, from_row)
    }

    fn next_non_empty_along(&self, line_axis: Axis, line: u32, from: u32) -> Option<(u32, &T)> {
        if line_axis == self.axis {
            return self.lines.get(line)?.next_non_empty(from);
        }
        // Walking across lines: the first later line holding this index.
        let mut cursor = from;
        while let Some((candidate, list)) = self.lines.next_non_empty(cursor) {
            if let Some(value) = list.get(line) {
                return Some((candidate, value));
            }
            cursor = candidate.checked_add(1)?;
        }
        None
    }

    /// Last occupied cell in `row` at or before `from_col`.
    pub fn prev_non_empty_in_row(&self, row: u32, from_col: u32) -> Option<(u32, &T)> {
        self.prev_non_empty_along(Axis::Row, row, from_col)
    }

    /// Last occupied cell in `col` at or before `from_row`.
    pub fn prev_non_empty_in_column(&self, col: u32, from_row: u32) -> Option<(u32, &T)> {
        self.prev_non_empty_along(Axis::Column, col, from_row)
    }

    fn prev_non_empty_along(&self, line_axis: Axis, line: u32, from: u32) -> Option<(u32, &T)> {
        if line_axis == self.axis {
            return self.lines.get(line)?.prev_non_empty(from);
        }
        let mut cursor = from;
        while let Some((candidate, list)) = self.lines.prev_non_empty(cursor) {
            if let Some(value) = list.get(line) {
                return Some((candidate, value));
            }
            cursor = candidate.checked_sub(1)?;
        }
        None
    }

    /// Remove every cell inside `region`, returning them.
    pub fn clear_region(&mut self, region: &Region) -> Vec<(u32, u32, T)> {
        let (first_line, last_line, first_index, last_index) = self.bounds(region);
        let lines: Vec<u32> = self
            .lines
            .iter_range(first_line, last_line)
            .map(|(line, _)| line)
            .collect();
        let mut removed = Vec::new();
        for line in lines {
            let Some(list) = self.lines.get_mut(line) else {
                continue;
            };
            let indices: Vec<u32> = list
                .iter_range(first_index, last_index)
                .map(|(index, _)| index)
                .collect();
            for index in indices {
                if let Some(value) = list.remove(index) {
                    let (row, col) = match self.axis {
                        Axis::Column => (index, line),
                        Axis::Row => (line, index),
                    };
                    removed.push((row, col, value));
                }
            }
            if list.is_empty() {
                self.lines.remove(line);
            }
        }
        self.len -= removed.len();
        removed
    }

    pub fn insert_rows(&mut self, at: u32, count: u32) {
        self.insert_along(Axis::Row, at, count);
    }

    pub fn insert_columns(&mut self, at: u32, count: u32) {
        self.insert_along(Axis::Column, at, count);
    }

    pub fn remove_rows(&mut self, at: u32, count: u32) {
        self.remove_along(Axis::Row, at, count);
    }

    pub fn remove_columns(&mut self, at: u32, count: u32) {
        self.remove_along(Axis::Column, at, count);
    }

    fn insert_along(&mut self, axis: Axis, at: u32, count: u32) {
        if axis == self.axis {
            self.lines.insert_at(at, count);
        } else {
            for (_, list) in self.lines.iter_range_mut(0, u32::MAX) {
                list.insert_at(at, count);
            }
        }
        self.recount();
    }

    fn remove_along(&mut self, axis: Axis, at: u32, count: u32) {
        if axis == self.axis {
            self.lines.remove_at(at, count);
        } else {
            for (_, list) in self.lines.iter_range_mut(0, u32::MAX) {
                list.remove_at(at, count);
            }
            self.lines.retain(|_, list| !list.is_empty());
        }
        self.recount();
    }

    fn recount(&mut self) {
        self.len = self.lines.iter().map(|(_, list)| list.len()).sum();
    }

    /// Smallest region holding every stored cell.
    pub fn used_region(&self) -> Option<Region> {
        let (first_line, _) = self.lines.first()?;
        let (last_line, _) = self.lines.last()?;
        let first_index = self.lines.iter().filter_map(|(_, l)| l.first()).map(|(i, _)| i).min()?;
        let last_index = self.lines.iter().filter_map(|(_, l)| l.last()).map(|(i, _)| i).max()?;
        let (top, left) = self.cell(first_line, first_index);
        let (bottom, right) = self.cell(last_line, last_index);
        Some(Region::new(top, left, bottom, right))
    }
}

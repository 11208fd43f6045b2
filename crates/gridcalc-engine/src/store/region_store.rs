//! Payloads attached to rectangular regions rather than single cells.
//!
//! Stored regions never overlap: adding a region carves it out of whatever
//! it covers, then neighbours carrying equal payloads are merged back into
//! larger rectangles.

use crate::engine::{Axis, Region};

#[derive(Clone, Debug, PartialEq)]
pub struct RegionStore<T> {
    entries: Vec<(Region, T)>,
}

impl<T> Default for RegionStore<T> {
    fn default() -> Self {
        RegionStore {
            entries: Vec::new(),
        }
    }
}

impl<T: Clone + PartialEq> RegionStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Region, &T)> {
        self.entries.iter().map(|(r, p)| (r, p))
    }

    /// Tag `region` with `payload`, replacing whatever covered it before.
    pub fn add(&mut self, region: Region, payload: T) {
        self.carve(&region);
        self.entries.push((region, payload));
        self.consolidate();
    }

    pub fn get(&self, row: u32, col: u32) -> Option<&T> {
        self.entries
            .iter()
            .find(|(r, _)| r.contains(row, col))
            .map(|(_, p)| p)
    }

    /// Stored regions intersecting `region`, each clipped to it.
    pub fn get_overlapping(&self, region: &Region) -> Vec<(Region, &T)> {
        self.entries
            .iter()
            .filter_map(|(r, p)| r.intersection(region).map(|cut| (cut, p)))
            .collect()
    }

    /// Remove payloads from every coordinate in `region`.
    pub fn clear(&mut self, region: &Region) {
        self.carve(region);
        self.consolidate();
    }

    pub fn insert_rows(&mut self, at: u32, count: u32) {
        self.edit(|r| Some(r.after_insert(Axis::Row, at, count)));
    }

    pub fn insert_columns(&mut self, at: u32, count: u32) {
        self.edit(|r| Some(r.after_insert(Axis::Column, at, count)));
    }

    pub fn remove_rows(&mut self, at: u32, count: u32) {
        self.edit(|r| r.after_remove(Axis::Row, at, count));
    }

    pub fn remove_columns(&mut self, at: u32, count: u32) {
        self.edit(|r| r.after_remove(Axis::Column, at, count));
    }

    fn edit(&mut self, f: impl Fn(&Region) -> Option<Region>) {
        self.entries = std::mem::take(&mut self.entries)
            .into_iter()
            .filter_map(|(r, p)| f(&r).map(|moved| (moved, p)))
            .collect();
        self.consolidate();
    }

    /// Cut `region` out of every stored region.
    fn carve(&mut self, region: &Region) {
        let mut kept = Vec::with_capacity(self.entries.len());
        for (r, p) in std::mem::take(&mut self.entries) {
            if r.intersects(region) {
                kept.extend(r.subtract(region).into_iter().map(|piece| (piece, p.clone())));
            } else {
                kept.push((r, p));
            }
        }
        self.entries = kept;
    }

    /// Merge equal-payload pairs whose union is a rectangle until none remain.
    fn consolidate(&mut self) {
        loop {
            let mut merged = None;
            'search: for i in 0..self.entries.len() {
                for j in (i + 1)..self.entries.len() {
                    let (a, pa) = &self.entries[i];
                    let (b, pb) = &self.entries[j];
                    if pa == pb
                        && let Some(union) = a.merged(b)
                    {
                        merged = Some((i, j, union));
                        break 'search;
                    }
                }
            }
            let Some((i, j, union)) = merged else {
                break;
            };
            self.entries.swap_remove(j);
            self.entries[i].0 = union;
        }
    }
}

//! One row or column of the sparse grid.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Bound;

/// Ordered index → value map that only stores occupied slots, so nearest
/// occupied lookups cost O(log k) in the number of occupied slots.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SparseList<T> {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    items: BTreeMap<u32, T>,
}

impl<T> Default for SparseList<T> {
    fn default() -> Self {
        SparseList {
            items: BTreeMap::new(),
        }
    }
}

impl<T> SparseList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: u32) -> Option<&T> {
        self.items.get(&index)
    }

    pub fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        self.items.get_mut(&index)
    }

    /// Store `value` at `index`, returning the previous value.
    pub fn set(&mut self, index: u32, value: T) -> Option<T> {
        self.items.insert(index, value)
    }

    pub fn get_or_insert_with(&mut self, index: u32, f: impl FnOnce() -> T) -> &mut T {
        self.items.entry(index).or_insert_with(f)
    }

    pub fn remove(&mut self, index: u32) -> Option<T> {
        self.items.remove(&index)
    }

    /// First occupied slot at or after `from`.
    pub fn next_non_empty(&self, from: u32) -> Option<(u32, &T)> {
        self.items.range(from..).next().map(|(i, v)| (*i, v))
    }

    /// Last occupied slot at or before `from`.
    pub fn prev_non_empty(&self, from: u32) -> Option<(u32, &T)> {
        self.items.range(..=from).next_back().map(|(i, v)| (*i, v))
    }

    pub fn first(&self) -> Option<(u32, &T)> {
        self.items.first_key_value().map(|(i, v)| (*i, v))
    }

    pub fn last(&self) -> Option<(u32, &T)> {
        self.items.last_key_value().map(|(i, v)| (*i, v))
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (u32, &T)> {
        self.items.iter().map(|(i, v)| (*i, v))
    }

    /// Occupied slots in `from..=to` (nothing when `from > to`).
    pub fn iter_range(&self, from: u32, to: u32) -> impl DoubleEndedIterator<Item = (u32, &T)> {
        self.items
            .range(inclusive_bounds(from, to))
            .map(|(i, v)| (*i, v))
    }

    pub fn iter_range_mut(&mut self, from: u32, to: u32) -> impl Iterator<Item = (u32, &mut T)> {
        self.items
            .range_mut(inclusive_bounds(from, to))
            .map(|(i, v)| (*i, v))
    }

    /// Open `count` empty slots at `index`, moving later values up.
    /// Values pushed past the last addressable slot are dropped.
    pub fn insert_at(&mut self, index: u32, count: u32) {
        if count == 0 {
            return;
        }
        let tail = self.items.split_off(&index);
        for (i, value) in tail {
            if let Some(moved) = i.checked_add(count).filter(|m| *m < u32::MAX) {
                self.items.insert(moved, value);
            }
        }
    }

    /// Delete slots `index..index + count`, moving later values down.
    /// Returns the removed values.
    pub fn remove_at(&mut self, index: u32, count: u32) -> Vec<(u32, T)> {
        if count == 0 {
            return Vec::new();
        }
        let mut removed = self.items.split_off(&index);
        let tail = match index.checked_add(count) {
            Some(end) => removed.split_off(&end),
            None => BTreeMap::new(),
        };
        for (i, value) in tail {
            self.items.insert(i - count, value);
        }
        removed.into_iter().collect()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn retain(&mut self, mut f: impl FnMut(u32, &mut T) -> bool) {
        self.items.retain(|i, v| f(*i, v));
    }
}

fn inclusive_bounds(from: u32, to: u32) -> (Bound<u32>, Bound<u32>) {
    if from <= to {
        (Bound::Included(from), Bound::Included(to))
    } else {
        (Bound::Included(from), Bound::Excluded(from))
    }
}

impl<T> FromIterator<(u32, T)> for SparseList<T> {
    fn from_iter<I: IntoIterator<Item = (u32, T)>>(iter: I) -> Self {
        SparseList {
            items: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn list(items: &[(u32, &'static str)]) -> SparseList<&'static str> {
        items.iter().copied().collect()
    }

    fn indices<T>(l: &SparseList<T>) -> Vec<u32> {
        l.iter().map(|(i, _)| i).collect()
    }

    #[test]
    fn test_nearest_occupied() {
        let l = list(&[(3, "a"), (1_000_000, "b")]);
        assert_eq!(l.next_non_empty(0), Some((3, &"a")));
        assert_eq!(l.next_non_empty(3), Some((3, &"a")));
        assert_eq!(l.next_non_empty(4), Some((1_000_000, &"b")));
        assert_eq!(l.next_non_empty(1_000_001), None);
        assert_eq!(l.prev_non_empty(999_999), Some((3, &"a")));
        assert_eq!(l.prev_non_empty(2), None);
    }

    #[test]
    fn test_iter_range_inclusive() {
        let l = list(&[(1, "a"), (2, "b"), (5, "c"), (9, "d")]);
        let got: Vec<_> = l.iter_range(2, 5).map(|(i, _)| i).collect();
        assert_eq!(got, vec![2, 5]);
        assert_eq!(l.iter_range(6, 3).count(), 0);
        assert_eq!(l.iter_range(0, u32::MAX).count(), 4);
    }

    #[test]
    fn test_insert_and_remove_slots() {
        let mut l = list(&[(1, "a"), (2, "b"), (5, "c")]);
        l.insert_at(2, 3);
        assert_eq!(indices(&l), vec![1, 5, 8]);
        let removed = l.remove_at(4, 2);
        assert_eq!(removed, vec![(5, "b")]);
        assert_eq!(indices(&l), vec![1, 6]);
        assert_eq!(l.get(6), Some(&"c"));
    }

    #[test]
    fn test_insert_drops_overflow() {
        let mut l = list(&[(u32::MAX - 2, "x")]);
        l.insert_at(0, 5);
        assert!(l.is_empty());
    }
}

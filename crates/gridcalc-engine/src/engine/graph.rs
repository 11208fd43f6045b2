//! Dependency graph and recalculation order.
//!
//! Edges point from a precedent to a dependent: if `B1` reads `A1`, then
//! `A1 -> B1`. Sorting yields every vertex after all of its precedents.
//! Cycles are reported, never traversed forever.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

/// A cycle found while ordering; `path` starts and ends at the same vertex.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("circular dependency: {path:?}")]
pub struct CycleError<V: fmt::Debug> {
    pub path: Vec<V>,
}

#[derive(Clone, Debug)]
pub struct DependencyGraph<V: Ord + Clone> {
    precedents: BTreeMap<V, BTreeSet<V>>,
    dependents: BTreeMap<V, BTreeSet<V>>,
}

impl<V: Ord + Clone> Default for DependencyGraph<V> {
    fn default() -> Self {
        DependencyGraph {
            precedents: BTreeMap::new(),
            dependents: BTreeMap::new(),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

impl<V: Ord + Clone + fmt::Debug> DependencyGraph<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vertex(&mut self, v: V) {
        self.precedents.entry(v.clone()).or_default();
        self.dependents.entry(v).or_default();
    }

    pub fn add_edge(&mut self, precedent: V, dependent: V) {
        self.add_vertex(precedent.clone());
        self.add_vertex(dependent.clone());
        self.dependents
            .entry(precedent.clone())
            .or_default()
            .insert(dependent.clone());
        self.precedents.entry(dependent).or_default().insert(precedent);
    }

    /// Record that `dependent` reads every vertex in `precedents`.
    pub fn add_edges(&mut self, precedents: impl IntoIterator<Item = V>, dependent: V) {
        self.add_vertex(dependent.clone());
        for precedent in precedents {
            self.add_edge(precedent, dependent.clone());
        }
    }

    pub fn remove_edge(&mut self, precedent: &V, dependent: &V) {
        if let Some(set) = self.dependents.get_mut(precedent) {
            set.remove(dependent);
        }
        if let Some(set) = self.precedents.get_mut(dependent) {
            set.remove(precedent);
        }
    }

    /// Drop `dependent`'s incoming edges, keeping the vertex and its dependents.
    pub fn remove_precedents(&mut self, dependent: &V) {
        let Some(old) = self.precedents.get_mut(dependent).map(std::mem::take) else {
            return;
        };
        for precedent in old {
            if let Some(set) = self.dependents.get_mut(&precedent) {
                set.remove(dependent);
            }
        }
    }

    /// Remove a vertex and every edge touching it.
    pub fn remove_vertex(&mut self, v: &V) {
        self.remove_precedents(v);
        self.precedents.remove(v);
        if let Some(dependents) = self.dependents.remove(v) {
            for dependent in dependents {
                if let Some(set) = self.precedents.get_mut(&dependent) {
                    set.remove(v);
                }
            }
        }
    }

    pub fn contains(&self, v: &V) -> bool {
        self.precedents.contains_key(v)
    }

    pub fn len(&self) -> usize {
        self.precedents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.precedents.is_empty()
    }

    pub fn vertices(&self) -> impl Iterator<Item = &V> {
        self.precedents.keys()
    }

    pub fn precedents_of(&self, v: &V) -> impl Iterator<Item = &V> {
        self.precedents.get(v).into_iter().flatten()
    }

    pub fn dependents_of(&self, v: &V) -> impl Iterator<Item = &V> {
        self.dependents.get(v).into_iter().flatten()
    }

    /// `roots` plus everything that transitively depends on them.
    pub fn dependents_closure<'a>(&'a self, roots: impl IntoIterator<Item = &'a V>) -> BTreeSet<V> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<&V> = roots.into_iter().collect();
        while let Some(v) = stack.pop() {
            if seen.insert(v.clone()) {
                stack.extend(self.dependents_of(v));
            }
        }
        seen
    }

    /// A cycle through `start` following precedent edges, if one exists.
    pub fn find_cycle_from(&self, start: &V) -> Option<Vec<V>> {
        let mut path = vec![start.clone()];
        let mut visited = BTreeSet::new();
        if self.cycle_dfs(start, start, &mut visited, &mut path) {
            Some(path)
        } else {
            None
        }
    }

    fn cycle_dfs(&self, start: &V, current: &V, visited: &mut BTreeSet<V>, path: &mut Vec<V>) -> bool {
        for next in self.precedents_of(current) {
            if next == start {
                path.push(next.clone());
                return true;
            }
            if !visited.insert(next.clone()) {
                continue;
            }
            path.push(next.clone());
            if self.cycle_dfs(start, next, visited, path) {
                return true;
            }
            path.pop();
        }
        false
    }

    /// Every vertex, each after all of its precedents.
    pub fn topological_sort(&self) -> Result<Vec<V>, CycleError<V>> {
        self.sort_where(self.precedents.keys(), |_| true)
    }

    /// Order only `subset`. Callers pass a set closed under dependents (such
    /// as [`dependents_closure`](Self::dependents_closure)), so every path
    /// between two members stays inside it.
    pub fn topological_sort_of(&self, subset: &BTreeSet<V>) -> Result<Vec<V>, CycleError<V>> {
        self.sort_where(subset.iter(), |v| subset.contains(v))
    }

    fn sort_where<'a>(
        &'a self,
        roots: impl Iterator<Item = &'a V>,
        include: impl Fn(&V) -> bool,
    ) -> Result<Vec<V>, CycleError<V>> {
        let pending_of = |v: &V| -> Vec<V> {
            let mut list: Vec<V> = self.precedents_of(v).filter(|p| include(*p)).cloned().collect();
            list.reverse();
            list
        };

        let mut marks: BTreeMap<V, Mark> = BTreeMap::new();
        let mut order = Vec::new();
        for root in roots {
            if marks.contains_key(root) {
                continue;
            }
            marks.insert(root.clone(), Mark::Visiting);
            let mut stack: Vec<(V, Vec<V>)> = vec![(root.clone(), pending_of(root))];
            loop {
                let Some(frame) = stack.last_mut() else {
                    break;
                };
                match frame.1.pop() {
                    Some(next) => match marks.get(&next).copied() {
                        Some(Mark::Done) => {}
                        Some(Mark::Visiting) => {
                            let from = stack.iter().position(|(v, _)| *v == next).unwrap_or(0);
                            let mut path: Vec<V> = stack[from..].iter().map(|(v, _)| v.clone()).collect();
                            path.push(next);
                            return Err(CycleError { path });
                        }
                        None => {
                            marks.insert(next.clone(), Mark::Visiting);
                            let pending = pending_of(&next);
                            stack.push((next, pending));
                        }
                    },
                    None => {
                        if let Some((v, _)) = stack.pop() {
                            marks.insert(v.clone(), Mark::Done);
                            order.push(v);
                        }
                    }
                }
            }
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn position(order: &[u32], v: u32) -> usize {
        order.iter().position(|x| *x == v).expect("vertex in order")
    }

    #[test]
    fn test_precedents_come_first() {
        // 4 depends on 1, 1 depends on 3, 3 depends on 2.
        let mut graph = DependencyGraph::new();
        graph.add_edges([1], 4);
        graph.add_edges([3], 1);
        graph.add_edges([2], 3);
        let order = graph.topological_sort().unwrap();
        assert_eq!(order, vec![2, 3, 1, 4]);
        assert!(position(&order, 2) < position(&order, 3));
        assert!(position(&order, 3) < position(&order, 1));
        assert!(position(&order, 1) < position(&order, 4));
    }

    #[test]
    fn test_diamond() {
        let mut graph = DependencyGraph::new();
        graph.add_edges([1, 2], 3);
        graph.add_edges([1], 2);
        graph.add_edges([3], 4);
        let order = graph.topological_sort().unwrap();
        assert_eq!(order, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_remove_vertex_drops_edges() {
        let mut graph = DependencyGraph::new();
        graph.add_edges([1, 2], 3);
        graph.remove_vertex(&1);
        assert!(!graph.contains(&1));
        assert_eq!(graph.precedents_of(&3).copied().collect::<Vec<_>>(), vec![2]);
        graph.remove_edge(&2, &3);
        assert_eq!(graph.precedents_of(&3).count(), 0);
        graph.add_edges([2], 3);
        graph.remove_precedents(&3);
        assert!(graph.contains(&3));
        assert_eq!(graph.dependents_of(&2).count(), 0);
    }

    #[test]
    fn test_cycle_is_reported() {
        let mut graph = DependencyGraph::new();
        graph.add_edges([2], 1);
        graph.add_edges([3], 2);
        graph.add_edges([1], 3);
        let err = graph.topological_sort().unwrap_err();
        assert_eq!(err.path.first(), err.path.last());
        assert_eq!(err.path.len(), 4);
        let cycle = graph.find_cycle_from(&1).unwrap();
        assert_eq!(cycle, vec![1, 2, 3, 1]);
        graph.remove_precedents(&3);
        assert!(graph.find_cycle_from(&1).is_none());
        assert!(graph.topological_sort().is_ok());
    }

    #[test]
    fn test_self_reference_is_cycle() {
        let mut graph = DependencyGraph::new();
        graph.add_edges(["a"], "a");
        assert_eq!(graph.find_cycle_from(&"a"), Some(vec!["a", "a"]));
        let err: Box<dyn std::error::Error> = Box::new(graph.topological_sort().unwrap_err());
        assert_eq!(err.to_string(), r#"circular dependency: ["a", "a"]"#);
    }

    #[test]
    fn test_closure_and_subset_sort() {
        let mut graph = DependencyGraph::new();
        graph.add_edges([1], 2);
        graph.add_edges([2], 3);
        graph.add_edges([9], 3);
        graph.add_edges([9], 10);
        let dirty = graph.dependents_closure([&2]);
        assert_eq!(dirty, BTreeSet::from([2, 3]));
        assert_eq!(graph.topological_sort_of(&dirty).unwrap(), vec![2, 3]);
    }
}

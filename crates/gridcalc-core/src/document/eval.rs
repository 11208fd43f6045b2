//! Dependency bookkeeping and recalculation for [`Sheet`].
//!
//! Formula cells read precedents through three kinds of vertex: single
//! cells, ranges (expanded into cells up to `max_dependency_cells`, kept as
//! one [`Vertex::Region`] beyond that) and defined names. Formula cells
//! inside a region vertex get an edge into it, so ordering and cycle
//! detection see through large ranges too.

use super::{Cell, Sheet, Vertex};
use crate::error::{CoreError, Result};
use gridcalc_engine::engine::{
    CellRef, CellValue, CycleError, DataProvider, Function, Reference, Region, Variable,
};
use std::collections::BTreeSet;

impl Sheet {
    /// Vertices read by `references`.
    pub(crate) fn precedent_vertices(&self, references: &[Reference]) -> BTreeSet<Vertex> {
        let mut out = BTreeSet::new();
        for reference in references {
            if let Reference::Named(name) = reference {
                out.insert(Vertex::Name(name.to_ascii_uppercase()));
                continue;
            }
            for region in reference.regions() {
                if region.is_single_cell() {
                    out.insert(Vertex::Cell(region.top_left()));
                } else if region.is_bounded() && region.area() <= self.config.max_dependency_cells {
                    for row in region.top..=region.bottom {
                        for col in region.left..=region.right {
                            out.insert(Vertex::Cell(CellRef::new(row, col)));
                        }
                    }
                } else {
                    out.insert(Vertex::Region(region));
                }
            }
        }
        out
    }

    /// Region vertices covering `at`.
    pub(crate) fn containing_regions(&self, at: CellRef) -> Vec<Vertex> {
        self.graph
            .vertices()
            .filter(|v| matches!(v, Vertex::Region(r) if r.contains(at.row, at.col)))
            .cloned()
            .collect()
    }

    /// Replace the precedents of `vertex`.
    pub(crate) fn link(&mut self, vertex: Vertex, precedents: BTreeSet<Vertex>) {
        let old: Vec<Vertex> = self.graph.precedents_of(&vertex).cloned().collect();
        self.graph.remove_precedents(&vertex);
        for precedent in &precedents {
            if let Vertex::Region(region) = precedent
                && !self.graph.contains(precedent)
            {
                self.link_region_members(*region);
            }
        }
        self.graph.add_edges(precedents, vertex);
        self.prune(old);
    }

    /// Edge from every formula cell inside `region` into its vertex.
    fn link_region_members(&mut self, region: Region) {
        let members: Vec<CellRef> = self
            .cells
            .get_non_empty_data(&region)
            .into_iter()
            .filter(|(_, _, cell)| cell.is_formula())
            .map(|(row, col, _)| CellRef::new(row, col))
            .collect();
        for member in members {
            self.graph
                .add_edge(Vertex::Cell(member), Vertex::Region(region));
        }
    }

    pub(crate) fn link_formula(&mut self, at: CellRef, references: &[Reference]) {
        let vertex = Vertex::Cell(at);
        let precedents = self.precedent_vertices(references);
        self.link(vertex.clone(), precedents);
        for region in self.containing_regions(at) {
            self.graph.add_edge(vertex.clone(), region);
        }
    }

    pub(crate) fn link_name(&mut self, name: &str, definition: &Variable) {
        let precedents = match definition {
            Variable::Range(reference) => self.precedent_vertices(std::slice::from_ref(reference)),
            Variable::Value(_) => BTreeSet::new(),
        };
        self.link(Vertex::Name(name.to_string()), precedents);
    }

    /// Drop the edges a formula at `at` contributed.
    pub(crate) fn unlink_cell(&mut self, at: CellRef) {
        let vertex = Vertex::Cell(at);
        let old: Vec<Vertex> = self.graph.precedents_of(&vertex).cloned().collect();
        self.graph.remove_precedents(&vertex);
        let regions: Vec<Vertex> = self
            .graph
            .dependents_of(&vertex)
            .filter(|v| matches!(v, Vertex::Region(_)))
            .cloned()
            .collect();
        for region in &regions {
            self.graph.remove_edge(&vertex, region);
        }
        self.prune(old.into_iter().chain(regions).chain([vertex]));
    }

    /// Remove candidates nothing depends on and nothing keeps alive.
    pub(crate) fn prune(&mut self, candidates: impl IntoIterator<Item = Vertex>) {
        for vertex in candidates {
            if !self.graph.contains(&vertex) || self.graph.dependents_of(&vertex).next().is_some() {
                continue;
            }
            let keep = match &vertex {
                Vertex::Cell(c) => self.cells.get(c.row, c.col).is_some_and(Cell::is_formula),
                Vertex::Region(_) => false,
                Vertex::Name(n) => self.names.contains_key(n),
            };
            if !keep {
                self.graph.remove_vertex(&vertex);
            }
        }
    }

    /// Rebuild every edge from the stored formulas and names.
    pub(crate) fn rebuild_graph(&mut self) {
        self.graph = Default::default();
        let names: Vec<(String, Variable)> = self
            .names
            .iter()
            .map(|(n, v)| (n.clone(), v.clone()))
            .collect();
        for (name, definition) in names {
            self.link_name(&name, &definition);
        }
        let formulas: Vec<(CellRef, Vec<Reference>)> = self
            .cells
            .iter()
            .filter_map(|(row, col, cell)| {
                cell.formula()
                    .map(|f| (CellRef::new(row, col), f.references().to_vec()))
            })
            .collect();
        for (at, references) in formulas {
            self.link_formula(at, &references);
        }
    }

    pub(crate) fn cycle_error(path: &[Vertex]) -> CoreError {
        CoreError::CircularReference {
            path: path
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" -> "),
        }
    }

    /// Recalculate after an edit unless batching or manual mode holds it back.
    pub(crate) fn after_edit(&mut self) -> Result<()> {
        if self.config.auto_calculate && self.pause_depth == 0 {
            self.calculate()?;
        }
        Ok(())
    }

    /// Recalculate every formula that depends on an edit since the last
    /// calculation, in dependency order. Returns how many formulas ran.
    pub fn calculate(&mut self) -> Result<usize> {
        if self.dirty.is_empty() {
            return Ok(0);
        }
        let mut roots = BTreeSet::new();
        for vertex in &self.dirty {
            if let Vertex::Cell(at) = vertex {
                roots.extend(self.containing_regions(*at));
            }
            roots.insert(vertex.clone());
        }
        let affected = self.graph.dependents_closure(roots.iter());
        // Pending edits stay dirty if no order exists.
        let order = self
            .graph
            .topological_sort_of(&affected)
            .map_err(|CycleError { path }| Sheet::cycle_error(&path))?;
        self.dirty.clear();

        let mut evaluated = 0;
        for vertex in order {
            if let Vertex::Cell(at) = vertex
                && self.evaluate_cell(at)
            {
                evaluated += 1;
            }
        }
        log::debug!(
            "sheet '{}': recalculated {} formulas ({} vertices affected)",
            self.name,
            evaluated,
            affected.len()
        );
        Ok(evaluated)
    }

    /// Mark every formula dirty and recalculate.
    pub fn calculate_all(&mut self) -> Result<usize> {
        let formulas: Vec<Vertex> = self
            .cells
            .iter()
            .filter(|(_, _, cell)| cell.is_formula())
            .map(|(row, col, _)| Vertex::Cell(CellRef::new(row, col)))
            .collect();
        self.dirty.extend(formulas);
        self.calculate()
    }

    fn evaluate_cell(&mut self, at: CellRef) -> bool {
        let Some(formula) = self.cells.get(at.row, at.col).and_then(Cell::formula) else {
            return false;
        };
        let value = formula.evaluate(&*self);
        if let Some(cell) = self.cells.get_mut(at.row, at.col) {
            cell.value = value;
        }
        true
    }

    /// Start batching: edits only mark cells dirty until the matching
    /// [`resume_calculation`](Self::resume_calculation).
    pub fn pause_calculation(&mut self) {
        self.pause_depth += 1;
    }

    /// End one level of batching, recalculating once the outermost batch ends.
    pub fn resume_calculation(&mut self) -> Result<usize> {
        self.pause_depth = self.pause_depth.saturating_sub(1);
        if self.pause_depth == 0 && self.config.auto_calculate {
            self.calculate()
        } else {
            Ok(0)
        }
    }

    pub fn set_auto_calculate(&mut self, enabled: bool) {
        self.config.auto_calculate = enabled;
    }
}

impl DataProvider for Sheet {
    fn cell_value(&self, row: u32, col: u32) -> CellValue {
        self.value(row, col)
    }

    fn range_values(&self, region: &Region) -> Vec<CellValue> {
        self.cells
            .get_non_empty_data(region)
            .into_iter()
            .map(|(_, _, cell)| cell.value.clone())
            .filter(|value| !value.is_empty())
            .collect()
    }

    fn range_array(&self, region: &Region) -> Vec<Vec<CellValue>> {
        self.cells
            .get_data(region)
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| cell.map(|c| c.value.clone()).unwrap_or_default())
                    .collect()
            })
            .collect()
    }

    fn variable(&self, name: &str) -> Option<Variable> {
        self.names.get(&name.to_ascii_uppercase()).cloned()
    }

    fn function(&self, name: &str) -> Option<&dyn Function> {
        self.functions.get(name)
    }
}

/// Display text for a value. Arrays print one row per line with
/// tab-separated columns.
pub fn format_value(value: &CellValue) -> String {
    match value {
        CellValue::Array(rows) => rows
            .iter()
            .map(|row| row.iter().map(format_value).collect::<Vec<_>>().join("\t"))
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use gridcalc_engine::builtins::builtin_registry;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn sheet_with_limit(max_dependency_cells: u64) -> Sheet {
        let config = Config {
            max_dependency_cells,
            ..Config::default()
        };
        Sheet::with_config("test", &config, Arc::new(builtin_registry()))
    }

    #[test]
    fn test_small_ranges_expand_to_cells() {
        let sheet = sheet_with_limit(4);
        let refs = [Reference::parse("A1:B2").unwrap()];
        let vertices = sheet.precedent_vertices(&refs);
        assert_eq!(vertices.len(), 4);
        assert!(vertices.contains(&Vertex::Cell(CellRef::new(1, 1))));

        let refs = [Reference::parse("A1:C2").unwrap(), Reference::named("rate")];
        let vertices = sheet.precedent_vertices(&refs);
        assert_eq!(
            vertices,
            BTreeSet::from([
                Vertex::Region(Region::new(0, 0, 1, 2)),
                Vertex::Name("RATE".to_string()),
            ])
        );
    }

    #[test]
    fn test_large_range_orders_through_region_vertex() {
        let mut sheet = sheet_with_limit(2);
        sheet.set_formula(0, 0, "=B1*2").unwrap();
        sheet.set_formula(0, 2, "=SUM(A1:A10)").unwrap();
        sheet.set_value(0, 1, 5.0).unwrap();
        assert_eq!(sheet.value(0, 0), CellValue::Number(10.0));
        assert_eq!(sheet.value(0, 2), CellValue::Number(10.0));
        sheet.set_value(4, 0, 1.0).unwrap();
        assert_eq!(sheet.value(0, 2), CellValue::Number(11.0));
    }

    #[test]
    fn test_unused_region_vertices_are_pruned() {
        let mut sheet = sheet_with_limit(2);
        sheet.set_formula(0, 2, "=SUM(A:A)").unwrap();
        assert!(sheet.graph.contains(&Vertex::Region(Region::columns(0, 0))));
        sheet.set_value(0, 2, 1.0).unwrap();
        assert!(!sheet.graph.contains(&Vertex::Region(Region::columns(0, 0))));
        assert!(sheet.graph.is_empty());
    }

    #[test]
    fn test_large_range_stays_sparse_in_graph() {
        let mut sheet = Sheet::new("test");
        sheet.set_formula(0, 1, "=SUM(A1:A1000000)").unwrap();
        assert_eq!(sheet.graph.len(), 2);
        assert!(sheet.graph.contains(&Vertex::Region(Region::new(0, 0, 999_999, 0))));

        sheet.set_value(499_999, 0, 7.0).unwrap();
        assert_eq!(sheet.value(0, 1), CellValue::Number(7.0));
        assert_eq!(sheet.graph.len(), 2);
    }

    #[test]
    fn test_failed_ordering_keeps_edits_pending() {
        let mut sheet = Sheet::new("test");
        sheet.set_formula(0, 0, "=B1").unwrap();
        let (a1, b1) = (Vertex::Cell(CellRef::new(0, 0)), Vertex::Cell(CellRef::new(0, 1)));
        sheet.graph.add_edge(a1.clone(), b1.clone());

        sheet.set_auto_calculate(false);
        sheet.set_value(0, 1, 1.0).unwrap();
        assert!(matches!(
            sheet.calculate(),
            Err(CoreError::CircularReference { .. })
        ));
        assert!(sheet.needs_calculation());

        sheet.graph.remove_edge(&a1, &b1);
        assert_eq!(sheet.calculate().unwrap(), 1);
        assert_eq!(sheet.value(0, 0), CellValue::Number(1.0));
        assert!(!sheet.needs_calculation());
    }

    #[test]
    fn test_format_value_array() {
        let value = CellValue::Array(vec![
            vec![CellValue::Number(1.0), CellValue::Text("a".to_string())],
            vec![CellValue::Logical(true), CellValue::Empty],
        ]);
        assert_eq!(format_value(&value), "1\ta\nTRUE\t");
    }
}

use crate::config::Config;
use crate::error::Result;
use gridcalc_engine::builtins::builtin_registry;
use gridcalc_engine::engine::{
    CellRef, CellValue, DependencyGraph, FunctionRegistry, Region, Variable,
};
use gridcalc_engine::store::{MatrixStore, RegionStore};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use super::{Cell, CellFormat};

/// A node of the dependency graph.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Vertex {
    Cell(CellRef),
    /// A range too large to expand into per-cell edges.
    Region(Region),
    /// A defined name, stored uppercase.
    Name(String),
}

impl fmt::Display for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vertex::Cell(c) => write!(f, "{c}"),
            Vertex::Region(r) => write!(f, "{r}"),
            Vertex::Name(n) => f.write_str(n),
        }
    }
}

/// One grid of cells with its formulas, names and recalculation state.
pub struct Sheet {
    pub name: String,
    pub(crate) cells: MatrixStore<Cell>,
    pub(crate) formats: RegionStore<CellFormat>,
    pub(crate) graph: DependencyGraph<Vertex>,
    /// Defined names, keyed uppercase.
    pub(crate) names: BTreeMap<String, Variable>,
    pub(crate) functions: Arc<FunctionRegistry>,
    pub(crate) config: Config,
    /// Vertices edited since the last calculation.
    pub(crate) dirty: BTreeSet<Vertex>,
    pub(crate) pause_depth: u32,
}

impl Sheet {
    /// Create an empty sheet with the builtin functions and default config.
    pub fn new(name: impl Into<String>) -> Self {
        Sheet::with_config(name, &Config::default(), Arc::new(builtin_registry()))
    }

    pub fn with_config(
        name: impl Into<String>,
        config: &Config,
        functions: Arc<FunctionRegistry>,
    ) -> Self {
        Sheet {
            name: name.into(),
            cells: MatrixStore::new(config.storage_axis),
            formats: RegionStore::new(),
            graph: DependencyGraph::new(),
            names: BTreeMap::new(),
            functions,
            config: config.clone(),
            dirty: BTreeSet::new(),
            pause_depth: 0,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Swap in a new function registry and recalculate every formula.
    pub fn set_functions(&mut self, functions: Arc<FunctionRegistry>) -> Result<usize> {
        self.functions = functions;
        self.calculate_all()
    }

    pub fn cell(&self, row: u32, col: u32) -> Option<&Cell> {
        self.cells.get(row, col)
    }

    /// Current value of a cell; `Empty` for unset cells.
    pub fn value(&self, row: u32, col: u32) -> CellValue {
        self.cells
            .get(row, col)
            .map(|c| c.value.clone())
            .unwrap_or_default()
    }

    /// Formula text (with leading `=`) if the cell holds a formula.
    pub fn formula_text(&self, row: u32, col: u32) -> Option<String> {
        self.cells
            .get(row, col)
            .and_then(Cell::formula)
            .map(|f| f.to_formula_text())
    }

    /// Occupied cells inside `region`, sorted by row then column.
    pub fn non_empty_cells(&self, region: &Region) -> Vec<(CellRef, &Cell)> {
        self.cells
            .get_non_empty_data(region)
            .into_iter()
            .map(|(row, col, cell)| (CellRef::new(row, col), cell))
            .collect()
    }

    /// The smallest region holding every occupied cell.
    pub fn used_region(&self) -> Option<Region> {
        self.cells.used_region()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn name_definition(&self, name: &str) -> Option<&Variable> {
        self.names.get(&name.to_ascii_uppercase())
    }

    pub fn defined_names(&self) -> impl Iterator<Item = (&str, &Variable)> {
        self.names.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Whether edits are being batched by [`Sheet::pause_calculation`].
    pub fn is_paused(&self) -> bool {
        self.pause_depth > 0
    }

    /// Whether edits are waiting for [`Sheet::calculate`].
    pub fn needs_calculation(&self) -> bool {
        !self.dirty.is_empty()
    }
}

impl fmt::Debug for Sheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sheet")
            .field("name", &self.name)
            .field("cells", &self.cells.len())
            .field("formats", &self.formats.len())
            .field("vertices", &self.graph.len())
            .field("names", &self.names.len())
            .finish()
    }
}

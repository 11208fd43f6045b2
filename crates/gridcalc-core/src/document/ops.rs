use super::{Cell, CellContents, Sheet, Vertex};
use crate::error::{CoreError, Result};
use gridcalc_engine::engine::{Axis, CellRef, CellValue, Formula, Reference, Region, Variable};

/// Direction of a structural edit.
#[derive(Copy, Clone, Debug)]
enum Edit {
    Insert,
    Remove,
}

impl Edit {
    fn apply_formula(self, formula: &mut Formula, axis: Axis, at: u32, count: u32) {
        match (self, axis) {
            (Edit::Insert, Axis::Row) => formula.insert_rows(at, count),
            (Edit::Insert, Axis::Column) => formula.insert_columns(at, count),
            (Edit::Remove, Axis::Row) => formula.remove_rows(at, count),
            (Edit::Remove, Axis::Column) => formula.remove_columns(at, count),
        }
    }

    fn apply_reference(self, reference: &Reference, axis: Axis, at: u32, count: u32) -> Reference {
        match self {
            Edit::Insert => reference.after_insert(axis, at, count),
            Edit::Remove => reference.after_remove(axis, at, count),
        }
    }
}

impl Sheet {
    /// Store a constant. Setting `Empty` clears the cell.
    pub fn set_value(&mut self, row: u32, col: u32, value: impl Into<CellValue>) -> Result<()> {
        let value = value.into();
        if value.is_empty() {
            return self.clear_cell(row, col);
        }
        let at = CellRef::new(row, col);
        let previous = self.cells.set(row, col, Cell::new_value(value));
        if previous.is_some_and(|c| c.is_formula()) {
            self.unlink_cell(at);
        }
        self.dirty.insert(Vertex::Cell(at));
        self.after_edit()
    }

    /// Parse and store a formula (leading `=` optional).
    ///
    /// Formulas with diagnostics are rejected with
    /// [`CoreError::InvalidFormula`]; formulas that would read their own
    /// result are rejected with [`CoreError::CircularReference`]. Either way
    /// the cell keeps its previous contents.
    pub fn set_formula(&mut self, row: u32, col: u32, text: &str) -> Result<()> {
        self.install_formula(CellRef::new(row, col), Formula::parse(text))
    }

    /// Set a cell from user input: `=` starts a formula, quotes force text,
    /// empty input clears, anything else is inferred.
    pub fn set_input(&mut self, row: u32, col: u32, input: &str) -> Result<()> {
        match Cell::from_input(input, &self.config.date_formats) {
            None => self.clear_cell(row, col),
            Some(CellContents::Formula(formula)) => {
                self.install_formula(CellRef::new(row, col), formula)
            }
            Some(CellContents::Value(value)) => self.set_value(row, col, value),
        }
    }

    fn install_formula(&mut self, at: CellRef, formula: Formula) -> Result<()> {
        if let Some(diagnostic) = formula.diagnostics().first() {
            log::warn!("rejected formula in {}: {}", at, diagnostic);
            return Err(CoreError::InvalidFormula {
                cell: at,
                position: diagnostic.position,
                message: diagnostic.message.clone(),
            });
        }

        let references = formula.references().to_vec();
        let previous = self.cells.set(at.row, at.col, Cell::new_formula(formula));
        self.link_formula(at, &references);

        if let Some(path) = self.graph.find_cycle_from(&Vertex::Cell(at)) {
            let err = Sheet::cycle_error(&path);
            log::warn!("rejected formula in {}: {}", at, err);
            match previous {
                Some(old) => {
                    let old_references = old.formula().map(|f| f.references().to_vec());
                    self.cells.set(at.row, at.col, old);
                    match old_references {
                        Some(refs) => self.link_formula(at, &refs),
                        None => self.unlink_cell(at),
                    }
                }
                None => {
                    self.cells.clear(at.row, at.col);
                    self.unlink_cell(at);
                }
            }
            return Err(err);
        }

        self.dirty.insert(Vertex::Cell(at));
        self.after_edit()
    }

    pub fn clear_cell(&mut self, row: u32, col: u32) -> Result<()> {
        let at = CellRef::new(row, col);
        let Some(previous) = self.cells.clear(row, col) else {
            return Ok(());
        };
        if previous.is_formula() {
            self.unlink_cell(at);
        } else {
            self.prune([Vertex::Cell(at)]);
        }
        self.dirty.insert(Vertex::Cell(at));
        self.after_edit()
    }

    /// Clear every cell in `region`, returning how many were removed.
    pub fn clear_region(&mut self, region: &Region) -> Result<usize> {
        let removed = self.cells.clear_region(region);
        for (row, col, cell) in &removed {
            let at = CellRef::new(*row, *col);
            if cell.is_formula() {
                self.unlink_cell(at);
            } else {
                self.prune([Vertex::Cell(at)]);
            }
            self.dirty.insert(Vertex::Cell(at));
        }
        self.after_edit()?;
        Ok(removed.len())
    }

    /// Copy a cell's contents to `to`, shifting the relative references of
    /// a formula by the distance moved.
    pub fn copy_cell(&mut self, from: CellRef, to: CellRef) -> Result<()> {
        let Some(cell) = self.cells.get(from.row, from.col) else {
            return self.clear_cell(to.row, to.col);
        };
        match &cell.contents {
            CellContents::Formula(formula) => {
                let moved = formula.offset(
                    to.row as i64 - from.row as i64,
                    to.col as i64 - from.col as i64,
                );
                self.install_formula(to, moved)
            }
            CellContents::Value(value) => {
                let value = value.clone();
                self.set_value(to.row, to.col, value)
            }
        }
    }

    /// Define (or redefine) a name as a constant or a range.
    pub fn define_name(&mut self, name: &str, definition: Variable) -> Result<()> {
        if !is_valid_name(name) {
            return Err(CoreError::InvalidName(name.to_string()));
        }
        let key = name.to_ascii_uppercase();
        let vertex = Vertex::Name(key.clone());
        let previous = self.names.insert(key.clone(), definition.clone());
        self.link_name(&key, &definition);

        if let Some(path) = self.graph.find_cycle_from(&vertex) {
            let err = Sheet::cycle_error(&path);
            log::warn!("rejected definition of {}: {}", key, err);
            match previous {
                Some(old) => {
                    self.link_name(&key, &old);
                    self.names.insert(key, old);
                }
                None => {
                    self.names.remove(&key);
                    self.link(vertex.clone(), Default::default());
                    self.prune([vertex]);
                }
            }
            return Err(err);
        }

        self.dirty.insert(vertex);
        self.after_edit()
    }

    /// Remove a name; formulas using it evaluate to `#NAME?`.
    pub fn remove_name(&mut self, name: &str) -> Result<bool> {
        let key = name.to_ascii_uppercase();
        if self.names.remove(&key).is_none() {
            return Ok(false);
        }
        let vertex = Vertex::Name(key);
        self.link(vertex.clone(), Default::default());
        self.prune([vertex.clone()]);
        self.dirty.insert(vertex);
        self.after_edit()?;
        Ok(true)
    }

    /// Insert `count` empty rows before row `at`.
    pub fn insert_rows(&mut self, at: u32, count: u32) -> Result<()> {
        self.structural_edit(Edit::Insert, Axis::Row, at, count)
    }

    /// Insert `count` empty columns before column `at`.
    pub fn insert_columns(&mut self, at: u32, count: u32) -> Result<()> {
        self.structural_edit(Edit::Insert, Axis::Column, at, count)
    }

    /// Delete rows `at..at + count`. References into them become `#REF!`.
    pub fn remove_rows(&mut self, at: u32, count: u32) -> Result<()> {
        self.structural_edit(Edit::Remove, Axis::Row, at, count)
    }

    /// Delete columns `at..at + count`. References into them become `#REF!`.
    pub fn remove_columns(&mut self, at: u32, count: u32) -> Result<()> {
        self.structural_edit(Edit::Remove, Axis::Column, at, count)
    }

    fn structural_edit(&mut self, edit: Edit, axis: Axis, at: u32, count: u32) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        match (edit, axis) {
            (Edit::Insert, Axis::Row) => self.cells.insert_rows(at, count),
            (Edit::Insert, Axis::Column) => self.cells.insert_columns(at, count),
            (Edit::Remove, Axis::Row) => self.cells.remove_rows(at, count),
            (Edit::Remove, Axis::Column) => self.cells.remove_columns(at, count),
        }
        match (edit, axis) {
            (Edit::Insert, Axis::Row) => self.formats.insert_rows(at, count),
            (Edit::Insert, Axis::Column) => self.formats.insert_columns(at, count),
            (Edit::Remove, Axis::Row) => self.formats.remove_rows(at, count),
            (Edit::Remove, Axis::Column) => self.formats.remove_columns(at, count),
        }

        let formula_cells: Vec<(u32, u32)> = self
            .cells
            .iter()
            .filter(|(_, _, cell)| cell.is_formula())
            .map(|(row, col, _)| (row, col))
            .collect();
        for &(row, col) in &formula_cells {
            if let Some(Cell {
                contents: CellContents::Formula(formula),
                ..
            }) = self.cells.get_mut(row, col)
            {
                edit.apply_formula(formula, axis, at, count);
            }
        }
        for definition in self.names.values_mut() {
            if let Variable::Range(reference) = definition {
                *reference = edit.apply_reference(reference, axis, at, count);
            }
        }

        log::debug!(
            "sheet '{}': {:?} {} {:?}(s) at {}",
            self.name,
            edit,
            count,
            axis,
            at
        );
        self.rebuild_graph();
        self.dirty.extend(
            formula_cells
                .into_iter()
                .map(|(row, col)| Vertex::Cell(CellRef::new(row, col))),
        );
        self.after_edit()
    }
}

/// Names follow identifier rules and must not read as a cell reference or
/// a logical literal.
fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_well = chars.next().is_some_and(|c| c.is_alphabetic() || c == '_');
    starts_well
        && chars.all(|c| c.is_alphanumeric() || c == '_')
        && Reference::parse(name).is_none()
        && !name.eq_ignore_ascii_case("true")
        && !name.eq_ignore_ascii_case("false")
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridcalc_engine::engine::ErrorKind;
    use pretty_assertions::assert_eq;

    fn a1(name: &str) -> CellRef {
        CellRef::from_a1(name).unwrap()
    }

    fn set(sheet: &mut Sheet, name: &str, input: &str) {
        let at = a1(name);
        sheet.set_input(at.row, at.col, input).unwrap();
    }

    fn get(sheet: &Sheet, name: &str) -> CellValue {
        let at = a1(name);
        sheet.value(at.row, at.col)
    }

    fn formula(sheet: &Sheet, name: &str) -> Option<String> {
        let at = a1(name);
        sheet.formula_text(at.row, at.col)
    }

    #[test]
    fn test_edits_propagate_in_dependency_order() {
        let mut sheet = Sheet::new("s");
        set(&mut sheet, "A1", "2");
        set(&mut sheet, "B1", "=A1*10");
        set(&mut sheet, "C1", "=B1+A1");
        assert_eq!(get(&sheet, "C1"), CellValue::Number(22.0));
        set(&mut sheet, "A1", "3");
        assert_eq!(get(&sheet, "B1"), CellValue::Number(30.0));
        assert_eq!(get(&sheet, "C1"), CellValue::Number(33.0));
    }

    #[test]
    fn test_invalid_formula_is_rejected() {
        let mut sheet = Sheet::new("s");
        set(&mut sheet, "A1", "5");
        let err = sheet.set_formula(0, 0, "=SUM(1,").unwrap_err();
        assert!(matches!(err, CoreError::InvalidFormula { .. }));
        assert_eq!(get(&sheet, "A1"), CellValue::Number(5.0));
    }

    #[test]
    fn test_cycle_is_rejected_and_state_restored() {
        let mut sheet = Sheet::new("s");
        set(&mut sheet, "A1", "=B1+1");
        set(&mut sheet, "B1", "4");
        let err = sheet.set_formula(0, 1, "=A1*2").unwrap_err();
        match err {
            CoreError::CircularReference { path } => assert_eq!(path, "B1 -> A1 -> B1"),
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(get(&sheet, "B1"), CellValue::Number(4.0));
        assert_eq!(formula(&sheet, "B1"), None);
        set(&mut sheet, "B1", "6");
        assert_eq!(get(&sheet, "A1"), CellValue::Number(7.0));

        assert!(sheet.set_formula(2, 2, "=C3").is_err());
        assert!(sheet.cell(2, 2).is_none());
        assert!(sheet.set_formula(9, 0, "=SUM(A:A)").is_err());
    }

    #[test]
    fn test_paused_batch_matches_per_edit_results() {
        let inputs = [("A1", "1"), ("A2", "=A1+1"), ("A3", "=A2*A1"), ("A1", "5")];

        let mut per_edit = Sheet::new("a");
        for (name, input) in inputs {
            set(&mut per_edit, name, input);
        }

        let mut batched = Sheet::new("b");
        batched.pause_calculation();
        for (name, input) in inputs {
            set(&mut batched, name, input);
        }
        assert_eq!(get(&batched, "A3"), CellValue::Empty);
        assert!(batched.needs_calculation());
        batched.resume_calculation().unwrap();

        for name in ["A1", "A2", "A3"] {
            assert_eq!(get(&batched, name), get(&per_edit, name));
        }
        assert_eq!(get(&batched, "A3"), CellValue::Number(30.0));
    }

    #[test]
    fn test_manual_mode_waits_for_calculate() {
        let mut sheet = Sheet::new("s");
        sheet.set_auto_calculate(false);
        set(&mut sheet, "A1", "1");
        set(&mut sheet, "B1", "=A1+1");
        assert_eq!(get(&sheet, "B1"), CellValue::Empty);
        assert_eq!(sheet.calculate().unwrap(), 1);
        assert_eq!(get(&sheet, "B1"), CellValue::Number(2.0));
    }

    #[test]
    fn test_insert_rows_rewrites_formulas() {
        let mut sheet = Sheet::new("s");
        set(&mut sheet, "A1", "1");
        set(&mut sheet, "A2", "2");
        set(&mut sheet, "A3", "3");
        set(&mut sheet, "B1", "=SUM(A1:A3)");
        sheet.insert_rows(1, 1).unwrap();
        assert_eq!(formula(&sheet, "B1").as_deref(), Some("=SUM(A1:A4)"));
        assert_eq!(get(&sheet, "A4"), CellValue::Number(3.0));
        set(&mut sheet, "A2", "10");
        assert_eq!(get(&sheet, "B1"), CellValue::Number(16.0));
    }

    #[test]
    fn test_remove_rows_invalidates_references() {
        let mut sheet = Sheet::new("s");
        set(&mut sheet, "A1", "1");
        set(&mut sheet, "A2", "2");
        set(&mut sheet, "A3", "3");
        set(&mut sheet, "B4", "=A2+SUM(A1:A3)");
        sheet.remove_rows(1, 1).unwrap();
        assert_eq!(formula(&sheet, "B3").as_deref(), Some("=#REF!+SUM(A1:A2)"));
        assert_eq!(get(&sheet, "B3"), CellValue::Error(ErrorKind::Ref));
    }

    #[test]
    fn test_remove_columns_moves_cells() {
        let mut sheet = Sheet::new("s");
        set(&mut sheet, "C1", "7");
        set(&mut sheet, "D1", "=C1*2");
        sheet.remove_columns(0, 2).unwrap();
        assert_eq!(get(&sheet, "A1"), CellValue::Number(7.0));
        assert_eq!(formula(&sheet, "B1").as_deref(), Some("=A1*2"));
        assert_eq!(get(&sheet, "B1"), CellValue::Number(14.0));
    }

    #[test]
    fn test_names_resolve_and_recalculate() {
        let mut sheet = Sheet::new("s");
        set(&mut sheet, "A1", "1");
        set(&mut sheet, "A2", "2");
        set(&mut sheet, "B1", "=SUM(data)*rate");
        assert_eq!(get(&sheet, "B1"), CellValue::Error(ErrorKind::Name));

        sheet
            .define_name("data", Variable::Range(Reference::parse("A1:A2").unwrap()))
            .unwrap();
        sheet
            .define_name("Rate", Variable::Value(CellValue::Number(10.0)))
            .unwrap();
        assert_eq!(get(&sheet, "B1"), CellValue::Number(30.0));

        set(&mut sheet, "A2", "4");
        assert_eq!(get(&sheet, "B1"), CellValue::Number(50.0));

        assert!(sheet.remove_name("rate").unwrap());
        assert_eq!(get(&sheet, "B1"), CellValue::Error(ErrorKind::Name));
    }

    #[test]
    fn test_name_validation_and_cycles() {
        let mut sheet = Sheet::new("s");
        for bad in ["A1", "1x", "true", "has space", ""] {
            assert!(sheet.define_name(bad, Variable::Value(1.0.into())).is_err(), "{bad}");
        }
        set(&mut sheet, "A2", "=SUM(block)");
        let err = sheet
            .define_name("block", Variable::Range(Reference::parse("A1:A3").unwrap()))
            .unwrap_err();
        assert!(matches!(err, CoreError::CircularReference { .. }));
        assert!(sheet.name_definition("block").is_none());
    }

    #[test]
    fn test_copy_shifts_relative_references() {
        let mut sheet = Sheet::new("s");
        set(&mut sheet, "A1", "1");
        set(&mut sheet, "A2", "2");
        set(&mut sheet, "B1", "=A1*$A$1+10");
        sheet.copy_cell(a1("B1"), a1("B2")).unwrap();
        assert_eq!(formula(&sheet, "B2").as_deref(), Some("=A2*$A$1+10"));
        assert_eq!(get(&sheet, "B2"), CellValue::Number(12.0));
    }

    #[test]
    fn test_clear_region_dirties_dependents() {
        let mut sheet = Sheet::new("s");
        set(&mut sheet, "A1", "1");
        set(&mut sheet, "A2", "2");
        set(&mut sheet, "B1", "=SUM(A1:A2)");
        assert_eq!(sheet.clear_region(&Region::columns(0, 0)).unwrap(), 2);
        assert_eq!(get(&sheet, "B1"), CellValue::Number(0.0));
        assert_eq!(sheet.len(), 1);
    }
}

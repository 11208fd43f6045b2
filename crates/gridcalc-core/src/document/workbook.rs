use super::Sheet;
use crate::config::Config;
use crate::error::{CoreError, Result};
use gridcalc_engine::builtins::builtin_registry;
use gridcalc_engine::engine::{Function, FunctionRegistry};
use std::sync::Arc;

/// Named sheets sharing one configuration and function registry.
/// Structural edits and names stay scoped to their sheet.
#[derive(Debug)]
pub struct Workbook {
    sheets: Vec<Sheet>,
    functions: Arc<FunctionRegistry>,
    config: Config,
}

impl Workbook {
    pub fn new() -> Self {
        Workbook::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Workbook {
            sheets: Vec::new(),
            functions: Arc::new(builtin_registry()),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Add an empty sheet. Sheet names are unique ignoring case.
    pub fn add_sheet(&mut self, name: &str) -> Result<&mut Sheet> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::InvalidName(name.to_string()));
        }
        if self.position(name).is_some() {
            return Err(CoreError::DuplicateSheet(name.to_string()));
        }
        self.sheets
            .push(Sheet::with_config(name, &self.config, self.functions.clone()));
        let last = self.sheets.len() - 1;
        Ok(&mut self.sheets[last])
    }

    pub fn remove_sheet(&mut self, name: &str) -> Result<Sheet> {
        let index = self
            .position(name)
            .ok_or_else(|| CoreError::UnknownSheet(name.to_string()))?;
        Ok(self.sheets.remove(index))
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.position(name).map(|i| &self.sheets[i])
    }

    pub fn sheet_mut(&mut self, name: &str) -> Result<&mut Sheet> {
        let index = self
            .position(name)
            .ok_or_else(|| CoreError::UnknownSheet(name.to_string()))?;
        Ok(&mut self.sheets[index])
    }

    pub fn sheets(&self) -> impl Iterator<Item = &Sheet> {
        self.sheets.iter()
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.sheets
            .iter()
            .position(|s| s.name.eq_ignore_ascii_case(name))
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Register (or replace) a function in every sheet and recalculate.
    pub fn register_function(&mut self, name: &str, function: impl Function + 'static) -> Result<()> {
        Arc::make_mut(&mut self.functions).register(name, function)?;
        for sheet in &mut self.sheets {
            sheet.set_functions(self.functions.clone())?;
        }
        Ok(())
    }

    pub fn pause_calculation(&mut self) {
        for sheet in &mut self.sheets {
            sheet.pause_calculation();
        }
    }

    pub fn resume_calculation(&mut self) -> Result<usize> {
        let mut evaluated = 0;
        for sheet in &mut self.sheets {
            evaluated += sheet.resume_calculation()?;
        }
        Ok(evaluated)
    }

    pub fn calculate(&mut self) -> Result<usize> {
        let mut evaluated = 0;
        for sheet in &mut self.sheets {
            evaluated += sheet.calculate()?;
        }
        Ok(evaluated)
    }
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridcalc_engine::engine::{Args, CellValue, Parameter, ParameterKind};
    use pretty_assertions::assert_eq;

    struct Double;

    impl Function for Double {
        fn parameters(&self) -> &[Parameter] {
            const PARAMS: &[Parameter] = &[Parameter::required("value", ParameterKind::Number)];
            PARAMS
        }

        fn call(&self, args: &Args) -> CellValue {
            match args.number(0) {
                Ok(n) => CellValue::Number(n * 2.0),
                Err(e) => CellValue::Error(e),
            }
        }
    }

    #[test]
    fn test_sheet_names_are_unique() {
        let mut book = Workbook::new();
        book.add_sheet("Data").unwrap();
        book.add_sheet("Summary").unwrap();
        assert!(matches!(book.add_sheet("data"), Err(CoreError::DuplicateSheet(_))));
        assert!(matches!(book.add_sheet("  "), Err(CoreError::InvalidName(_))));
        assert_eq!(book.sheet_names(), vec!["Data", "Summary"]);
        book.remove_sheet("DATA").unwrap();
        assert_eq!(book.sheet_names(), vec!["Summary"]);
        assert!(matches!(book.sheet_mut("Data"), Err(CoreError::UnknownSheet(_))));
    }

    #[test]
    fn test_structural_edits_stay_on_one_sheet() {
        let mut book = Workbook::new();
        for name in ["a", "b"] {
            let sheet = book.add_sheet(name).unwrap();
            sheet.set_input(0, 0, "1").unwrap();
            sheet.set_input(1, 0, "=A1+1").unwrap();
        }
        book.sheet_mut("a").unwrap().insert_rows(0, 1).unwrap();
        let a = book.sheet("a").unwrap();
        let b = book.sheet("b").unwrap();
        assert_eq!(a.formula_text(2, 0).as_deref(), Some("=A2+1"));
        assert_eq!(b.formula_text(1, 0).as_deref(), Some("=A1+1"));
        assert_eq!(a.value(2, 0), CellValue::Number(2.0));
    }

    #[test]
    fn test_registered_function_reaches_every_sheet() {
        let mut book = Workbook::new();
        book.add_sheet("s").unwrap().set_input(0, 0, "=DOUBLE(21)").unwrap();
        assert_eq!(
            book.sheet("s").unwrap().value(0, 0),
            CellValue::Error(gridcalc_engine::engine::ErrorKind::Name)
        );
        book.register_function("double", Double).unwrap();
        assert_eq!(book.sheet("s").unwrap().value(0, 0), CellValue::Number(42.0));
        book.add_sheet("t").unwrap().set_input(0, 0, "=DOUBLE(2)").unwrap();
        assert_eq!(book.sheet("t").unwrap().value(0, 0), CellValue::Number(4.0));
    }
}

//! Function registry and argument conversion.
//!
//! A function declares typed [`Parameter`]s. Before its body runs, every raw
//! argument the evaluator produced (an [`Operand`]) is converted to the
//! declared kind through one coercion table. Conversion failures become
//! [`Arg::Error`] values; unless the function [accepts errors](Function::accepts_errors),
//! the first such error is the call's result and the body never runs.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use super::eval::DataProvider;
use super::reference::Reference;
use super::value::{CellValue, ErrorKind};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParameterKind {
    Number,
    Text,
    Logical,
    Any,
    /// Every number in the argument: scalars are coerced, ranges and arrays
    /// contribute their non-empty numeric items.
    NumberSequence,
    LogicalSequence,
    /// The argument must be a reference; it is passed unresolved.
    Reference,
    /// A 2-D block of values (ranges resolve to their full payload).
    Array,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Requirement {
    Required,
    Optional,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Parameter {
    pub name: &'static str,
    pub kind: ParameterKind,
    pub requirement: Requirement,
    pub repeating: bool,
}

impl Parameter {
    pub const fn required(name: &'static str, kind: ParameterKind) -> Parameter {
        Parameter {
            name,
            kind,
            requirement: Requirement::Required,
            repeating: false,
        }
    }

    pub const fn optional(name: &'static str, kind: ParameterKind) -> Parameter {
        Parameter {
            name,
            kind,
            requirement: Requirement::Optional,
            repeating: false,
        }
    }

    pub const fn repeating(self) -> Parameter {
        Parameter {
            repeating: true,
            ..self
        }
    }

    pub fn is_required(&self) -> bool {
        self.requirement == Requirement::Required
    }
}

/// A raw evaluated argument, before conversion.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Value(CellValue),
    /// A reference left unresolved so that the parameter kind decides how to read it.
    Reference(Reference),
    /// An omitted argument (`f(1,,3)`).
    Missing,
}

/// A converted argument as seen by a function body.
#[derive(Clone, Debug, PartialEq)]
pub enum Arg {
    Number(f64),
    Text(String),
    Logical(bool),
    Value(CellValue),
    Numbers(Vec<f64>),
    Logicals(Vec<bool>),
    Reference(Reference),
    Array(Vec<Vec<CellValue>>),
    /// An omitted optional argument.
    Missing,
    Error(ErrorKind),
}

impl Arg {
    pub fn error(&self) -> Option<ErrorKind> {
        match self {
            Arg::Error(e) => Some(*e),
            _ => None,
        }
    }
}

/// Converted arguments, one per supplied operand.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Args {
    items: Vec<Arg>,
}

impl Args {
    pub fn new(items: Vec<Arg>) -> Args {
        Args { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arg> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arg> {
        self.items.iter()
    }

    pub fn first_error(&self) -> Option<ErrorKind> {
        self.items.iter().find_map(Arg::error)
    }

    pub fn number(&self, index: usize) -> Result<f64, ErrorKind> {
        match self.get(index) {
            Some(Arg::Number(n)) => Ok(*n),
            Some(Arg::Error(e)) => Err(*e),
            _ => Err(ErrorKind::Value),
        }
    }

    /// The number at `index`, or `default` when it was omitted.
    pub fn number_or(&self, index: usize, default: f64) -> Result<f64, ErrorKind> {
        match self.get(index) {
            None | Some(Arg::Missing) => Ok(default),
            _ => self.number(index),
        }
    }

    pub fn text(&self, index: usize) -> Result<&str, ErrorKind> {
        match self.get(index) {
            Some(Arg::Text(s)) => Ok(s),
            Some(Arg::Error(e)) => Err(*e),
            _ => Err(ErrorKind::Value),
        }
    }

    pub fn text_or<'a>(&'a self, index: usize, default: &'a str) -> Result<&'a str, ErrorKind> {
        match self.get(index) {
            None | Some(Arg::Missing) => Ok(default),
            _ => self.text(index),
        }
    }

    pub fn logical(&self, index: usize) -> Result<bool, ErrorKind> {
        match self.get(index) {
            Some(Arg::Logical(b)) => Ok(*b),
            Some(Arg::Error(e)) => Err(*e),
            _ => Err(ErrorKind::Value),
        }
    }

    /// The value at `index`; errors are returned as error values, omitted
    /// arguments as empty.
    pub fn value(&self, index: usize) -> CellValue {
        match self.get(index) {
            Some(Arg::Value(v)) => v.clone(),
            Some(Arg::Number(n)) => CellValue::Number(*n),
            Some(Arg::Text(s)) => CellValue::Text(s.clone()),
            Some(Arg::Logical(b)) => CellValue::Logical(*b),
            Some(Arg::Array(rows)) => CellValue::Array(rows.clone()),
            Some(Arg::Error(e)) => CellValue::Error(*e),
            _ => CellValue::Empty,
        }
    }

    pub fn reference(&self, index: usize) -> Result<&Reference, ErrorKind> {
        match self.get(index) {
            Some(Arg::Reference(r)) => Ok(r),
            Some(Arg::Error(e)) => Err(*e),
            _ => Err(ErrorKind::Value),
        }
    }

    /// All numbers from `from` onwards (for a trailing repeating sequence).
    pub fn numbers_from(&self, from: usize) -> Result<Vec<f64>, ErrorKind> {
        let mut out = Vec::new();
        for arg in self.items.iter().skip(from) {
            match arg {
                Arg::Numbers(ns) => out.extend_from_slice(ns),
                Arg::Number(n) => out.push(*n),
                Arg::Missing => {}
                Arg::Error(e) => return Err(*e),
                _ => return Err(ErrorKind::Value),
            }
        }
        Ok(out)
    }

    pub fn logicals_from(&self, from: usize) -> Result<Vec<bool>, ErrorKind> {
        let mut out = Vec::new();
        for arg in self.items.iter().skip(from) {
            match arg {
                Arg::Logicals(bs) => out.extend_from_slice(bs),
                Arg::Logical(b) => out.push(*b),
                Arg::Missing => {}
                Arg::Error(e) => return Err(*e),
                _ => return Err(ErrorKind::Value),
            }
        }
        Ok(out)
    }
}

pub trait Function: Send + Sync {
    fn parameters(&self) -> &[Parameter];

    /// When false, the first error among the converted arguments is the result.
    fn accepts_errors(&self) -> bool {
        false
    }

    fn call(&self, args: &Args) -> CellValue;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("function {function}: only the last parameter may repeat ('{parameter}' does)")]
    RepeatingNotLast {
        function: String,
        parameter: &'static str,
    },
    #[error("function {function}: required parameter '{parameter}' follows an optional one")]
    RequiredAfterOptional {
        function: String,
        parameter: &'static str,
    },
    #[error("invalid function name '{0}'")]
    InvalidName(String),
    #[error("unknown function '{0}'")]
    Unknown(String),
}

/// Case-insensitive name → function table.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn Function>>,
}

impl FunctionRegistry {
    pub fn new() -> FunctionRegistry {
        FunctionRegistry::default()
    }

    pub fn register(
        &mut self,
        name: &str,
        function: impl Function + 'static,
    ) -> Result<(), RegistryError> {
        self.register_arc(name, Arc::new(function))
    }

    fn register_arc(&mut self, name: &str, function: Arc<dyn Function>) -> Result<(), RegistryError> {
        let valid_name = name
            .chars()
            .next()
            .is_some_and(|c| c.is_alphabetic() || c == '_')
            && name.chars().all(|c| c.is_alphanumeric() || c == '_');
        if !valid_name {
            return Err(RegistryError::InvalidName(name.to_string()));
        }
        validate_parameters(name, function.parameters())?;
        let key = name.to_uppercase();
        if self.functions.insert(key, function).is_some() {
            log::debug!("function {} replaced", name);
        }
        Ok(())
    }

    /// Make `alias` call the function already registered as `target`.
    pub fn alias(&mut self, alias: &str, target: &str) -> Result<(), RegistryError> {
        let function = self
            .functions
            .get(&target.to_uppercase())
            .cloned()
            .ok_or_else(|| RegistryError::Unknown(target.to_string()))?;
        self.register_arc(alias, function)
    }

    pub fn get(&self, name: &str) -> Option<&dyn Function> {
        self.functions.get(&name.to_uppercase()).map(|f| f.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(&name.to_uppercase())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}

fn validate_parameters(name: &str, parameters: &[Parameter]) -> Result<(), RegistryError> {
    let last = parameters.len().saturating_sub(1);
    let mut seen_optional = false;
    for (i, parameter) in parameters.iter().enumerate() {
        if parameter.repeating && i != last {
            return Err(RegistryError::RepeatingNotLast {
                function: name.to_string(),
                parameter: parameter.name,
            });
        }
        if parameter.is_required() && seen_optional {
            return Err(RegistryError::RequiredAfterOptional {
                function: name.to_string(),
                parameter: parameter.name,
            });
        }
        seen_optional |= !parameter.is_required();
    }
    Ok(())
}

/// Whether `count` supplied arguments fit the parameter list.
fn arity_matches(parameters: &[Parameter], count: usize) -> bool {
    let required = parameters.iter().filter(|p| p.is_required()).count();
    let repeating = parameters.last().is_some_and(|p| p.repeating);
    count >= required && (repeating || count <= parameters.len())
}

fn parameter_for(parameters: &[Parameter], index: usize) -> Option<&Parameter> {
    parameters.get(index).or_else(|| parameters.last().filter(|p| p.repeating))
}

/// Convert operands and invoke `function`.
pub fn call_function<P: DataProvider + ?Sized>(
    function: &dyn Function,
    operands: Vec<Operand>,
    provider: &P,
) -> CellValue {
    let parameters = function.parameters();
    if !arity_matches(parameters, operands.len()) {
        return CellValue::Error(ErrorKind::Value);
    }
    let mut items = Vec::with_capacity(operands.len());
    for (i, operand) in operands.into_iter().enumerate() {
        let Some(parameter) = parameter_for(parameters, i) else {
            return CellValue::Error(ErrorKind::Value);
        };
        items.push(convert_argument(operand, parameter, provider));
    }
    let args = Args::new(items);
    if !function.accepts_errors()
        && let Some(e) = args.first_error()
    {
        return CellValue::Error(e);
    }
    function.call(&args)
}

/// Convert one raw argument to `parameter`'s declared kind.
pub fn convert_argument<P: DataProvider + ?Sized>(
    operand: Operand,
    parameter: &Parameter,
    provider: &P,
) -> Arg {
    if let Operand::Reference(reference) = &operand
        && !reference.is_valid()
    {
        return Arg::Error(ErrorKind::Ref);
    }
    let operand = match operand {
        Operand::Missing if parameter.is_required() => Operand::Value(CellValue::Empty),
        Operand::Missing => return Arg::Missing,
        other => other,
    };
    match parameter.kind {
        ParameterKind::Reference => match operand {
            Operand::Reference(r) => Arg::Reference(r),
            Operand::Value(CellValue::Error(e)) => Arg::Error(e),
            _ => Arg::Error(ErrorKind::Value),
        },
        ParameterKind::Array => match resolve_block(&operand, provider) {
            Ok(rows) => Arg::Array(rows),
            Err(e) => Arg::Error(e),
        },
        ParameterKind::NumberSequence => match operand {
            Operand::Value(v @ CellValue::Array(_)) => collect_numbers(v.flatten()),
            Operand::Value(v) => number_arg(&v),
            Operand::Reference(r) => match resolve_sequence(&r, provider) {
                Ok(values) => collect_numbers(values.iter()),
                Err(e) => Arg::Error(e),
            },
            Operand::Missing => Arg::Missing,
        },
        ParameterKind::LogicalSequence => match operand {
            Operand::Value(v @ CellValue::Array(_)) => collect_logicals(v.flatten()),
            Operand::Value(v) => match v.to_logical() {
                Ok(b) => Arg::Logical(b),
                Err(e) => Arg::Error(e),
            },
            Operand::Reference(r) => match resolve_sequence(&r, provider) {
                Ok(values) => collect_logicals(values.iter()),
                Err(e) => Arg::Error(e),
            },
            Operand::Missing => Arg::Missing,
        },
        ParameterKind::Any => match resolve_any(&operand, provider) {
            CellValue::Error(e) => Arg::Error(e),
            v => Arg::Value(v),
        },
        ParameterKind::Number => match resolve_scalar(&operand, provider) {
            Ok(v) => number_arg(&v),
            Err(e) => Arg::Error(e),
        },
        ParameterKind::Text => match resolve_scalar(&operand, provider).and_then(|v| v.to_text()) {
            Ok(s) => Arg::Text(s),
            Err(e) => Arg::Error(e),
        },
        ParameterKind::Logical => {
            match resolve_scalar(&operand, provider).and_then(|v| v.to_logical()) {
                Ok(b) => Arg::Logical(b),
                Err(e) => Arg::Error(e),
            }
        }
    }
}

fn number_arg(value: &CellValue) -> Arg {
    match value.to_number() {
        Ok(n) if n.is_finite() => Arg::Number(n),
        Ok(_) => Arg::Error(ErrorKind::Num),
        Err(e) => Arg::Error(e),
    }
}

fn collect_numbers<'v>(values: impl IntoIterator<Item = &'v CellValue>) -> Arg {
    let mut out = Vec::new();
    for value in values {
        match value {
            CellValue::Number(n) if !n.is_finite() => return Arg::Error(ErrorKind::Num),
            CellValue::Number(n) => out.push(*n),
            CellValue::Date(d) => out.push(CellValue::date_to_serial(d)),
            CellValue::Error(e) => return Arg::Error(*e),
            _ => {}
        }
    }
    Arg::Numbers(out)
}

fn collect_logicals<'v>(values: impl IntoIterator<Item = &'v CellValue>) -> Arg {
    let mut out = Vec::new();
    for value in values {
        match value {
            CellValue::Logical(b) => out.push(*b),
            CellValue::Number(n) => out.push(*n != 0.0),
            CellValue::Error(e) => return Arg::Error(*e),
            _ => {}
        }
    }
    Arg::Logicals(out)
}

/// Resolve a reference operand to a single value (a one-cell range is fine).
fn resolve_scalar<P: DataProvider + ?Sized>(
    operand: &Operand,
    provider: &P,
) -> Result<CellValue, ErrorKind> {
    match operand {
        Operand::Value(v) => v.scalar(),
        Operand::Reference(r) => resolve_reference(r, provider).scalar(),
        Operand::Missing => Ok(CellValue::Empty),
    }
}

fn resolve_any<P: DataProvider + ?Sized>(operand: &Operand, provider: &P) -> CellValue {
    match operand {
        Operand::Value(v) => v.clone(),
        Operand::Reference(r) => resolve_reference(r, provider),
        Operand::Missing => CellValue::Empty,
    }
}

fn resolve_block<P: DataProvider + ?Sized>(
    operand: &Operand,
    provider: &P,
) -> Result<Vec<Vec<CellValue>>, ErrorKind> {
    match resolve_any(operand, provider) {
        CellValue::Array(rows) => Ok(rows),
        CellValue::Error(e) => Err(e),
        scalar => Ok(vec![vec![scalar]]),
    }
}

/// Non-empty values under a reference, region by region.
fn resolve_sequence<P: DataProvider + ?Sized>(
    reference: &Reference,
    provider: &P,
) -> Result<Vec<CellValue>, ErrorKind> {
    if let Reference::Named(name) = reference {
        return match provider.variable(name) {
            Some(super::eval::Variable::Range(inner)) if !matches!(inner, Reference::Named(_)) => {
                resolve_sequence(&inner, provider)
            }
            Some(super::eval::Variable::Value(v)) => {
                Ok(v.flatten().into_iter().filter(|v| !v.is_empty()).cloned().collect())
            }
            Some(super::eval::Variable::Range(_)) => Err(ErrorKind::Ref),
            None => Err(ErrorKind::Name),
        };
    }
    if !reference.is_valid() {
        return Err(ErrorKind::Ref);
    }
    Ok(reference
        .regions()
        .iter()
        .flat_map(|region| provider.range_values(region))
        .collect())
}

/// The value a reference denotes: a cell's value, or a range's 2-D block.
fn resolve_reference<P: DataProvider + ?Sized>(reference: &Reference, provider: &P) -> CellValue {
    super::eval::reference_value(reference, provider, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo(&'static [Parameter]);

    impl Function for Echo {
        fn parameters(&self) -> &[Parameter] {
            self.0
        }

        fn call(&self, args: &Args) -> CellValue {
            args.value(0)
        }
    }

    const ONE_NUMBER: &[Parameter] = &[Parameter::required("n", ParameterKind::Number)];
    const BAD_REPEAT: &[Parameter] = &[
        Parameter::required("a", ParameterKind::Number).repeating(),
        Parameter::required("b", ParameterKind::Number),
    ];

    #[test]
    fn test_register_is_case_insensitive() {
        let mut registry = FunctionRegistry::new();
        registry.register("Echo", Echo(ONE_NUMBER)).unwrap();
        assert!(registry.contains("ECHO"));
        assert!(registry.get("echo").is_some());
        registry.alias("E", "echo").unwrap();
        assert_eq!(registry.names(), vec!["E", "ECHO"]);
    }

    #[test]
    fn test_repeating_must_be_last() {
        let mut registry = FunctionRegistry::new();
        let err = registry.register("BAD", Echo(BAD_REPEAT)).unwrap_err();
        assert!(matches!(err, RegistryError::RepeatingNotLast { parameter: "a", .. }));
        assert!(!registry.contains("BAD"));
    }

    #[test]
    fn test_invalid_name_rejected() {
        let mut registry = FunctionRegistry::new();
        assert!(registry.register("1X", Echo(ONE_NUMBER)).is_err());
        assert!(registry.register("", Echo(ONE_NUMBER)).is_err());
        assert_eq!(
            registry.register("STATS.MEAN", Echo(ONE_NUMBER)),
            Err(RegistryError::InvalidName("STATS.MEAN".to_string()))
        );
        registry.register("STATS_MEAN", Echo(ONE_NUMBER)).unwrap();
        assert!(registry.alias("stats.avg", "STATS_MEAN").is_err());
        assert_eq!(
            registry.alias("X", "NOPE"),
            Err(RegistryError::Unknown("NOPE".to_string()))
        );
    }

    #[test]
    fn test_arity() {
        let params = &[
            Parameter::required("a", ParameterKind::Number),
            Parameter::optional("b", ParameterKind::Number),
        ];
        assert!(!arity_matches(params, 0));
        assert!(arity_matches(params, 1));
        assert!(arity_matches(params, 2));
        assert!(!arity_matches(params, 3));
        let repeating = &[Parameter::required("n", ParameterKind::NumberSequence).repeating()];
        assert!(arity_matches(repeating, 7));
        assert!(!arity_matches(repeating, 0));
    }

    #[test]
    fn test_numbers_from_collects_sequences() {
        let args = Args::new(vec![
            Arg::Numbers(vec![1.0, 2.0]),
            Arg::Number(3.0),
            Arg::Missing,
        ]);
        assert_eq!(args.numbers_from(0), Ok(vec![1.0, 2.0, 3.0]));
        let args = Args::new(vec![Arg::Number(1.0), Arg::Error(ErrorKind::Div0)]);
        assert_eq!(args.numbers_from(0), Err(ErrorKind::Div0));
        assert_eq!(args.first_error(), Some(ErrorKind::Div0));
    }
}

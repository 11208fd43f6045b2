//! Spreadsheet formula engine API.
//!
//! - [`lex`] / [`parse`] - formula text to tokens and syntax trees ([`Expr`])
//! - [`Reference`] - typed cell, column, row, range, named and union references
//! - [`CellValue`] - runtime values and the coercion table
//! - [`FunctionRegistry`] - typed function definitions and argument conversion
//! - [`Evaluator`] - evaluation against a [`DataProvider`]
//! - [`Formula`] - a parsed formula and its structural-edit operations
//! - [`DependencyGraph`] - recalculation order and cycle detection

mod ast;
mod cell_ref;
mod eval;
mod format;
mod formula;
mod functions;
mod graph;
mod lexer;
mod parser;
mod reference;
mod region;
mod value;

pub use ast::{BinaryOp, Expr, Literal, UnaryOp};
pub use cell_ref::{CellRef, CellRefError, MAX_COL};
pub use eval::{DataProvider, Evaluator, Variable, binary};
pub use format::{format_fixed, format_money, format_number};
pub use formula::Formula;
pub use functions::{
    Arg, Args, Function, FunctionRegistry, Operand, Parameter, ParameterKind, RegistryError,
    Requirement, call_function, convert_argument,
};
pub use graph::{CycleError, DependencyGraph};
pub use lexer::{Diagnostic, Lexed, Token, TokenKind, lex, quote, unquote};
pub use parser::{Parsed, parse};
pub use reference::{
    CellReference, ColumnReference, RangeReference, Reference, ReferenceKind, RowReference,
};
pub use region::{Axis, Region, UNBOUNDED};
pub use value::{CellValue, DEFAULT_DATE_FORMATS, ErrorKind, ValueKind, format_date};

//! Expression evaluation.
//!
//! The evaluator is read-only: it pulls cell values, variables and functions
//! from a [`DataProvider`] and returns a [`CellValue`]. Writing results back
//! is the caller's job.

use std::cmp::Ordering;

use super::ast::{BinaryOp, Expr, UnaryOp};
use super::functions::{Function, Operand, call_function};
use super::reference::Reference;
use super::region::Region;
use super::value::{CellValue, ErrorKind};

/// Named references may point at other names; give up past this depth.
const MAX_NAME_DEPTH: usize = 16;

/// What a name resolves to.
#[derive(Clone, Debug, PartialEq)]
pub enum Variable {
    Value(CellValue),
    Range(Reference),
}

/// Everything the evaluator reads from the outside world.
pub trait DataProvider {
    fn cell_value(&self, row: u32, col: u32) -> CellValue;

    /// Non-empty values inside `region`, row by row.
    fn range_values(&self, region: &Region) -> Vec<CellValue>;

    /// Dense block of values covering `region`, clipped to the occupied extent
    /// for unbounded regions.
    fn range_array(&self, region: &Region) -> Vec<Vec<CellValue>>;

    fn variable(&self, name: &str) -> Option<Variable>;

    fn variable_exists(&self, name: &str) -> bool {
        self.variable(name).is_some()
    }

    fn function(&self, name: &str) -> Option<&dyn Function>;

    fn function_exists(&self, name: &str) -> bool {
        self.function(name).is_some()
    }
}

pub struct Evaluator<'a, P: DataProvider + ?Sized> {
    provider: &'a P,
}

impl<'a, P: DataProvider + ?Sized> Evaluator<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        Evaluator { provider }
    }

    pub fn evaluate(&self, expr: &Expr) -> CellValue {
        match self.operand(expr) {
            Operand::Value(v) => v,
            Operand::Reference(r) => reference_value(&r, self.provider, 0),
            Operand::Missing => CellValue::Empty,
        }
    }

    /// Evaluate, keeping references unresolved for function arguments.
    fn operand(&self, expr: &Expr) -> Operand {
        match expr {
            Expr::Reference(r) => Operand::Reference(r.clone()),
            Expr::Name(name) => match self.provider.variable(name) {
                Some(Variable::Value(v)) => Operand::Value(v),
                Some(Variable::Range(r)) => Operand::Reference(r),
                None => Operand::Value(CellValue::Error(ErrorKind::Name)),
            },
            Expr::Paren(inner) => self.operand(inner),
            Expr::Missing => Operand::Missing,
            Expr::Literal(lit) => Operand::Value(lit.to_value()),
            Expr::Array(rows) => Operand::Value(CellValue::Array(
                rows.iter()
                    .map(|row| row.iter().map(|lit| lit.to_value()).collect())
                    .collect(),
            )),
            Expr::Unary { op, operand } => Operand::Value(self.unary(*op, operand)),
            Expr::Binary { op, left, right } => {
                let left = self.evaluate(left);
                let right = self.evaluate(right);
                Operand::Value(binary(*op, &left, &right))
            }
            Expr::Call { name, args } => Operand::Value(self.call(name, args)),
        }
    }

    fn unary(&self, op: UnaryOp, operand: &Expr) -> CellValue {
        let n = match self.evaluate(operand).to_number() {
            Ok(n) => n,
            Err(e) => return CellValue::Error(e),
        };
        match op {
            UnaryOp::Plus => CellValue::Number(n),
            UnaryOp::Minus => CellValue::Number(-n),
        }
    }

    fn call(&self, name: &str, args: &[Expr]) -> CellValue {
        let Some(function) = self.provider.function(name) else {
            log::debug!("unknown function {}", name);
            return CellValue::Error(ErrorKind::Name);
        };
        let operands = args.iter().map(|arg| self.operand(arg)).collect();
        call_function(function, operands, self.provider)
    }
}

/// The value under a reference: a cell's value or a range's block.
pub(crate) fn reference_value<P: DataProvider + ?Sized>(
    reference: &Reference,
    provider: &P,
    depth: usize,
) -> CellValue {
    if !reference.is_valid() {
        return CellValue::Error(ErrorKind::Ref);
    }
    match reference {
        Reference::Cell(c) => provider.cell_value(c.row, c.col),
        Reference::Named(name) => {
            if depth >= MAX_NAME_DEPTH {
                return CellValue::Error(ErrorKind::Ref);
            }
            match provider.variable(name) {
                Some(Variable::Value(v)) => v,
                Some(Variable::Range(r)) => reference_value(&r, provider, depth + 1),
                None => CellValue::Error(ErrorKind::Name),
            }
        }
        // A union has no single value outside a function argument.
        Reference::Multi(_) => CellValue::Error(ErrorKind::Value),
        Reference::Column(_) | Reference::Row(_) | Reference::Range(_) => {
            match reference.to_region() {
                Some(region) => CellValue::Array(provider.range_array(&region)),
                None => CellValue::Error(ErrorKind::Ref),
            }
        }
    }
}

/// Apply a binary operator to two evaluated operands.
pub fn binary(op: BinaryOp, left: &CellValue, right: &CellValue) -> CellValue {
    match op {
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Pow => {
            arithmetic(op, left, right)
        }
        BinaryOp::Concat => match (left.to_text(), right.to_text()) {
            (Ok(a), Ok(b)) => CellValue::Text(a + &b),
            (Err(e), _) | (_, Err(e)) => CellValue::Error(e),
        },
        _ => match left.compare(right) {
            Ok(ordering) => CellValue::Logical(match op {
                BinaryOp::Eq => ordering == Ordering::Equal,
                BinaryOp::Ne => ordering != Ordering::Equal,
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }),
            Err(e) => CellValue::Error(e),
        },
    }
}

fn arithmetic(op: BinaryOp, left: &CellValue, right: &CellValue) -> CellValue {
    let a = match left.to_number() {
        Ok(n) => n,
        Err(e) => return CellValue::Error(e),
    };
    let b = match right.to_number() {
        Ok(n) => n,
        Err(e) => return CellValue::Error(e),
    };
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div if b == 0.0 => return CellValue::Error(ErrorKind::Div0),
        BinaryOp::Div => a / b,
        _ => a.powf(b),
    };
    if result.is_finite() {
        CellValue::Number(result)
    } else {
        CellValue::Error(ErrorKind::Num)
    }
}

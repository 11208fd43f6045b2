//! Formula syntax tree.

use std::fmt;

use super::format::format_number;
use super::lexer::quote;
use super::reference::Reference;
use super::value::{CellValue, ErrorKind};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    pub fn from_symbol(symbol: &str) -> Option<BinaryOp> {
        Some(match symbol {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "^" => BinaryOp::Pow,
            "&" => BinaryOp::Concat,
            "=" => BinaryOp::Eq,
            "<>" => BinaryOp::Ne,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::Le,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::Ge,
            _ => return None,
        })
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "^",
            BinaryOp::Concat => "&",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }

    /// Binding strength; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 1,
            BinaryOp::Concat => 2,
            BinaryOp::Add | BinaryOp::Sub => 3,
            BinaryOp::Mul | BinaryOp::Div => 4,
            BinaryOp::Pow => 5,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Number(f64),
    Text(String),
    Logical(bool),
    Error(ErrorKind),
}

impl Literal {
    pub fn to_value(&self) -> CellValue {
        match self {
            Literal::Number(n) => CellValue::Number(*n),
            Literal::Text(s) => CellValue::Text(s.clone()),
            Literal::Logical(b) => CellValue::Logical(*b),
            Literal::Error(e) => CellValue::Error(*e),
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            Literal::Number(n) => format_number(*n),
            Literal::Text(s) => quote(s),
            Literal::Logical(true) => "TRUE".to_string(),
            Literal::Logical(false) => "FALSE".to_string(),
            Literal::Error(e) => e.as_code().to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Literal(Literal),
    /// Bare identifier, resolved through the provider's variables.
    Name(String),
    Reference(Reference),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Paren(Box<Expr>),
    Call {
        name: String,
        args: Vec<Expr>,
    },
    /// `{1,2;3,4}`: rows of literals.
    Array(Vec<Vec<Literal>>),
    /// An omitted argument, or the placeholder left by a parse error.
    Missing,
}

impl Expr {
    pub fn number(n: f64) -> Expr {
        Expr::Literal(Literal::Number(n))
    }

    pub fn text(s: impl Into<String>) -> Expr {
        Expr::Literal(Literal::Text(s.into()))
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Expr {
        Expr::Call {
            name: name.into(),
            args,
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Reprint the subtree as formula syntax (without a leading `=`).
    pub fn to_expression_text(&self) -> String {
        let mut out = String::new();
        self.write_text(&mut out);
        out
    }

    fn write_text(&self, out: &mut String) {
        match self {
            Expr::Literal(lit) => out.push_str(&lit.to_text()),
            Expr::Name(name) => out.push_str(name),
            Expr::Reference(reference) => out.push_str(&reference.to_text()),
            Expr::Unary { op, operand } => {
                out.push(match op {
                    UnaryOp::Plus => '+',
                    UnaryOp::Minus => '-',
                });
                operand.write_text(out);
            }
            Expr::Binary { op, left, right } => {
                left.write_text(out);
                out.push_str(op.symbol());
                right.write_text(out);
            }
            Expr::Paren(inner) => {
                out.push('(');
                inner.write_text(out);
                out.push(')');
            }
            Expr::Call { name, args } => {
                out.push_str(name);
                out.push('(');
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    arg.write_text(out);
                }
                out.push(')');
            }
            Expr::Array(rows) => {
                out.push('{');
                for (r, row) in rows.iter().enumerate() {
                    if r > 0 {
                        out.push(';');
                    }
                    for (c, item) in row.iter().enumerate() {
                        if c > 0 {
                            out.push(',');
                        }
                        out.push_str(&item.to_text());
                    }
                }
                out.push('}');
            }
            Expr::Missing => {}
        }
    }

    /// Rebuild the tree with every reference passed through `f`.
    pub fn map_references(&self, f: &mut impl FnMut(&Reference) -> Reference) -> Expr {
        match self {
            Expr::Reference(reference) => Expr::Reference(f(reference)),
            Expr::Unary { op, operand } => Expr::Unary {
                op: *op,
                operand: Box::new(operand.map_references(f)),
            },
            Expr::Binary { op, left, right } => Expr::Binary {
                op: *op,
                left: Box::new(left.map_references(f)),
                right: Box::new(right.map_references(f)),
            },
            Expr::Paren(inner) => Expr::Paren(Box::new(inner.map_references(f))),
            Expr::Call { name, args } => Expr::Call {
                name: name.clone(),
                args: args.iter().map(|a| a.map_references(f)).collect(),
            },
            other => other.clone(),
        }
    }

    /// References in source order; bare names are reported as named references.
    pub fn collect_references(&self) -> Vec<Reference> {
        let mut out = Vec::new();
        self.visit_references(&mut out);
        out
    }

    fn visit_references(&self, out: &mut Vec<Reference>) {
        match self {
            Expr::Reference(reference) => out.push(reference.clone()),
            Expr::Name(name) => out.push(Reference::named(name.clone())),
            Expr::Unary { operand, .. } => operand.visit_references(out),
            Expr::Binary { left, right, .. } => {
                left.visit_references(out);
                right.visit_references(out);
            }
            Expr::Paren(inner) => inner.visit_references(out),
            Expr::Call { args, .. } => args.iter().for_each(|a| a.visit_references(out)),
            Expr::Literal(_) | Expr::Array(_) | Expr::Missing => {}
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_expression_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_nested_tree() {
        let expr = Expr::binary(
            BinaryOp::Mul,
            Expr::Paren(Box::new(Expr::binary(
                BinaryOp::Add,
                Expr::number(1.0),
                Expr::Reference(Reference::cell(0, 0)),
            ))),
            Expr::call("SUM", vec![Expr::text("a\"b"), Expr::Missing, Expr::number(2.5)]),
        );
        assert_eq!(expr.to_expression_text(), "(1+A1)*SUM(\"a\"\"b\",,2.5)");
    }

    #[test]
    fn test_map_and_collect_references() {
        let expr = Expr::binary(
            BinaryOp::Add,
            Expr::Reference(Reference::cell(0, 0)),
            Expr::Name("rate".to_string()),
        );
        let moved = expr.map_references(&mut |r| r.shifted(1, 1));
        assert_eq!(moved.to_expression_text(), "B2+rate");
        assert_eq!(
            moved.collect_references(),
            vec![Reference::cell(1, 1), Reference::named("rate")]
        );
    }
}

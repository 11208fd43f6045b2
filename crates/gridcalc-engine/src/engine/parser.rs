//! Formula parser.
//!
//! Precedence climbing over the lexer's tokens, loosest to tightest:
//! comparison, `&`, additive, multiplicative, `^`, unary `+`/`-`, and
//! reference literals (`A1`, `A1:B2`, `A:C`, `3:4`, `(A1,B2)`).
//!
//! Parsing never fails outright: problems become [`Diagnostic`]s and the
//! parser returns a best-effort tree with [`Expr::Missing`] holes.

use super::ast::{BinaryOp, Expr, Literal, UnaryOp};
use super::lexer::{Diagnostic, Token, TokenKind, lex, unquote};
use super::reference::{CellReference, ColumnReference, RangeReference, Reference, RowReference};
use super::value::ErrorKind;

#[derive(Clone, Debug)]
pub struct Parsed {
    pub expr: Expr,
    pub diagnostics: Vec<Diagnostic>,
}

impl Parsed {
    pub fn is_valid(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Parse formula text (without the leading `=`).
pub fn parse(text: &str) -> Parsed {
    let lexed = lex(text);
    let mut parser = Parser {
        tokens: lexed.tokens,
        pos: 0,
        diagnostics: lexed.diagnostics,
    };
    let expr = if parser.peek().kind == TokenKind::Eof {
        parser.error_at(parser.peek(), "empty formula");
        Expr::Missing
    } else {
        parser.parse_expression()
    };
    let trailing = parser.peek();
    if trailing.kind != TokenKind::Eof {
        parser.error_at(trailing, format!("unexpected '{}'", trailing.text));
    }
    let mut diagnostics = parser.diagnostics;
    diagnostics.sort_by_key(|d| d.position);
    Parsed { expr, diagnostics }
}

struct Parser<'src> {
    tokens: Vec<Token<'src>>,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<'src> Parser<'src> {
    fn peek(&self) -> Token<'src> {
        // The token list always ends with Eof, and `advance` never moves past it.
        self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token<'src> {
        let tok = self.peek();
        if tok.kind != TokenKind::Eof {
            self.pos += 1;
        }
        tok
    }

    fn error_at(&mut self, tok: Token<'_>, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::new(tok.start, message));
    }

    /// Value of a number token; literals beyond `f64` range are diagnostics.
    fn number_value(&mut self, tok: Token<'_>) -> f64 {
        let n: f64 = tok.text.parse().unwrap_or_default();
        if !n.is_finite() {
            self.error_at(tok, format!("number '{}' is too large", tok.text));
        }
        n
    }

    fn expect_punct(&mut self, punct: &str, message: &str) -> bool {
        if self.peek().is_punct(punct) {
            self.advance();
            true
        } else {
            let tok = self.peek();
            self.error_at(tok, message);
            false
        }
    }

    fn parse_expression(&mut self) -> Expr {
        self.parse_binary(1)
    }

    fn parse_binary(&mut self, min_precedence: u8) -> Expr {
        let mut left = self.parse_unary();
        loop {
            let tok = self.peek();
            if tok.kind != TokenKind::Operator {
                break;
            }
            let Some(op) = BinaryOp::from_symbol(tok.text) else {
                break;
            };
            let precedence = op.precedence();
            if precedence < min_precedence {
                break;
            }
            self.advance();
            let right = self.parse_binary(precedence + 1);
            left = Expr::binary(op, left, right);
        }
        left
    }

    fn parse_unary(&mut self) -> Expr {
        let tok = self.peek();
        let op = if tok.is_op("-") {
            UnaryOp::Minus
        } else if tok.is_op("+") {
            UnaryOp::Plus
        } else {
            return self.parse_primary();
        };
        self.advance();
        Expr::Unary {
            op,
            operand: Box::new(self.parse_unary()),
        }
    }

    fn parse_primary(&mut self) -> Expr {
        let tok = self.peek();
        match tok.kind {
            TokenKind::Number => {
                self.advance();
                if self.peek().is_op(":")
                    && let Some(row) = RowReference::parse(tok.text)
                {
                    return self.parse_range_end(Reference::Row(row));
                }
                Expr::Literal(Literal::Number(self.number_value(tok)))
            }
            TokenKind::String => {
                self.advance();
                Expr::Literal(Literal::Text(unquote(tok.text)))
            }
            TokenKind::Error => {
                self.advance();
                let kind = ErrorKind::from_code(tok.text).unwrap_or(ErrorKind::Value);
                Expr::Literal(Literal::Error(kind))
            }
            TokenKind::Identifier => self.parse_identifier(),
            TokenKind::Punctuation if tok.text == "(" => self.parse_parenthesized(),
            TokenKind::Punctuation if tok.text == "{" => self.parse_array(),
            TokenKind::Eof => {
                self.error_at(tok, "unexpected end of formula");
                Expr::Missing
            }
            TokenKind::Bad => {
                // Already reported by the lexer.
                self.advance();
                Expr::Missing
            }
            TokenKind::Operator | TokenKind::Punctuation => {
                self.error_at(tok, format!("unexpected '{}'", tok.text));
                self.advance();
                Expr::Missing
            }
        }
    }

    fn parse_identifier(&mut self) -> Expr {
        let tok = self.advance();
        let text = tok.text;

        if self.peek().is_punct("(") {
            return self.parse_call(text);
        }
        if text.eq_ignore_ascii_case("true") {
            return Expr::Literal(Literal::Logical(true));
        }
        if text.eq_ignore_ascii_case("false") {
            return Expr::Literal(Literal::Logical(false));
        }

        let range_follows = self.peek().is_op(":");
        if let Some(cell) = CellReference::parse(text) {
            let start = Reference::Cell(cell);
            return if range_follows {
                self.parse_range_end(start)
            } else {
                Expr::Reference(start)
            };
        }
        if range_follows {
            if let Some(col) = ColumnReference::parse(text) {
                return self.parse_range_end(Reference::Column(col));
            }
            if let Some(row) = RowReference::parse(text) {
                return self.parse_range_end(Reference::Row(row));
            }
        }
        if text.contains('$') {
            self.error_at(tok, format!("invalid reference '{}'", text));
        }
        Expr::Name(text.to_string())
    }

    /// Having parsed the start of a range, consume `:` and the matching end.
    fn parse_range_end(&mut self, start: Reference) -> Expr {
        self.advance();
        let tok = self.peek();
        let end = match (&start, tok.kind) {
            (Reference::Cell(_), TokenKind::Identifier) => {
                CellReference::parse(tok.text).map(Reference::Cell)
            }
            (Reference::Column(_), TokenKind::Identifier) => {
                ColumnReference::parse(tok.text).map(Reference::Column)
            }
            (Reference::Row(_), TokenKind::Identifier | TokenKind::Number) => {
                RowReference::parse(tok.text).map(Reference::Row)
            }
            _ => None,
        };
        match end.and_then(|end| RangeReference::new(start.clone(), end)) {
            Some(range) => {
                self.advance();
                Expr::Reference(Reference::Range(range))
            }
            None => {
                self.error_at(tok, format!("expected a range end matching '{}'", start));
                Expr::Reference(start)
            }
        }
    }

    fn parse_call(&mut self, name: &str) -> Expr {
        self.advance();
        let mut args = Vec::new();
        if self.peek().is_punct(")") {
            self.advance();
            return Expr::call(name, args);
        }
        loop {
            let tok = self.peek();
            let arg = if tok.is_punct(",") || tok.is_punct(")") {
                Expr::Missing
            } else {
                self.parse_expression()
            };
            args.push(arg);
            let tok = self.peek();
            if tok.is_punct(",") {
                self.advance();
                continue;
            }
            if tok.is_punct(")") {
                self.advance();
                break;
            }
            self.error_at(tok, format!("missing ')' in call to {}", name));
            break;
        }
        Expr::call(name, args)
    }

    fn parse_parenthesized(&mut self) -> Expr {
        let open = self.advance();
        if self.peek().is_punct(")") {
            self.error_at(open, "empty parentheses");
            self.advance();
            return Expr::Missing;
        }
        let inner = self.parse_expression();
        if self.peek().is_punct(",")
            && let Expr::Reference(first) = &inner
        {
            let mut parts = vec![first.clone()];
            while self.peek().is_punct(",") {
                self.advance();
                let tok = self.peek();
                match self.parse_expression() {
                    Expr::Reference(part) => parts.push(part),
                    _ => self.error_at(tok, "only references can be combined in a union"),
                }
            }
            self.expect_punct(")", "missing ')'");
            return Expr::Reference(Reference::Multi(parts));
        }
        self.expect_punct(")", "missing ')'");
        Expr::Paren(Box::new(inner))
    }

    fn parse_array(&mut self) -> Expr {
        let open = self.advance();
        let mut rows: Vec<Vec<Literal>> = vec![Vec::new()];
        if self.peek().is_punct("}") {
            self.error_at(open, "empty array constant");
            self.advance();
            return Expr::Array(Vec::new());
        }
        loop {
            if let Some(item) = self.parse_array_item()
                && let Some(row) = rows.last_mut()
            {
                row.push(item);
            }
            let tok = self.peek();
            if tok.is_punct(",") {
                self.advance();
            } else if tok.is_punct(";") {
                self.advance();
                rows.push(Vec::new());
            } else if tok.is_punct("}") {
                self.advance();
                break;
            } else {
                self.error_at(tok, "missing '}'");
                break;
            }
        }
        let width = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|row| row.len() != width) {
            self.error_at(open, "array rows must have the same length");
        }
        Expr::Array(rows)
    }

    fn parse_array_item(&mut self) -> Option<Literal> {
        let tok = self.peek();
        let negate = tok.is_op("-");
        if negate || tok.is_op("+") {
            self.advance();
            let num = self.peek();
            if num.kind == TokenKind::Number {
                self.advance();
                let n = self.number_value(num);
                return Some(Literal::Number(if negate { -n } else { n }));
            }
            self.error_at(num, "expected a number in array constant");
            return None;
        }
        match tok.kind {
            TokenKind::Number => {
                self.advance();
                Some(Literal::Number(self.number_value(tok)))
            }
            TokenKind::String => {
                self.advance();
                Some(Literal::Text(unquote(tok.text)))
            }
            TokenKind::Error => {
                self.advance();
                ErrorKind::from_code(tok.text).map(Literal::Error)
            }
            TokenKind::Identifier if tok.text.eq_ignore_ascii_case("true") => {
                self.advance();
                Some(Literal::Logical(true))
            }
            TokenKind::Identifier if tok.text.eq_ignore_ascii_case("false") => {
                self.advance();
                Some(Literal::Logical(false))
            }
            TokenKind::Punctuation | TokenKind::Eof => {
                self.error_at(tok, "expected a literal in array constant");
                None
            }
            _ => {
                self.error_at(tok, "array constants may only contain literals");
                self.advance();
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ReferenceKind;
    use pretty_assertions::assert_eq;

    fn text_of(formula: &str) -> String {
        let parsed = parse(formula);
        assert!(parsed.is_valid(), "{formula}: {:?}", parsed.diagnostics);
        parsed.expr.to_expression_text()
    }

    #[test]
    fn test_precedence() {
        let parsed = parse("1+2*3");
        assert_eq!(
            parsed.expr,
            Expr::binary(
                BinaryOp::Add,
                Expr::number(1.0),
                Expr::binary(BinaryOp::Mul, Expr::number(2.0), Expr::number(3.0))
            )
        );
        let parsed = parse("1&2=3");
        assert!(matches!(parsed.expr, Expr::Binary { op: BinaryOp::Eq, .. }));
    }

    #[test]
    fn test_left_associative() {
        let parsed = parse("8-4-2");
        let Expr::Binary { op, left, right } = parsed.expr else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Sub);
        assert!(matches!(*left, Expr::Binary { op: BinaryOp::Sub, .. }));
        assert_eq!(*right, Expr::number(2.0));
    }

    #[test]
    fn test_unary_is_right_associative() {
        let parsed = parse("--1");
        let Expr::Unary { op: UnaryOp::Minus, operand } = parsed.expr else {
            panic!("expected unary");
        };
        assert!(matches!(*operand, Expr::Unary { op: UnaryOp::Minus, .. }));
    }

    #[test]
    fn test_references() {
        let refs = |f: &str| parse(f).expr.collect_references();
        assert_eq!(refs("A1")[0].kind(), ReferenceKind::Cell);
        assert_eq!(refs("$A$1:B2")[0].to_text(), "$A$1:B2");
        assert_eq!(refs("A:B")[0].kind(), ReferenceKind::Range);
        assert_eq!(refs("A:B")[0].to_text(), "A:B");
        assert_eq!(refs("3:4")[0].to_text(), "3:4");
        assert_eq!(refs("$3:4")[0].to_text(), "$3:4");
        assert_eq!(refs("SUM((A1,B2:B3))")[0].kind(), ReferenceKind::Multi);
        assert_eq!(refs("rate*2")[0], Reference::named("rate"));
    }

    #[test]
    fn test_round_trip_text() {
        for formula in [
            "7+9",
            "(1+2)*3",
            "sum(1,2,3,4)",
            "sum({1,2,3},4)",
            "if(TRUE,\"yes\",\"no\")",
            "-A1^2&\"x\"",
            "SUM($A$1:B10,C:C,2:$3)",
            "IF(A1>=10,A1<>B1,#N/A)",
            "{1,-2;\"a\",FALSE}",
            "f(,1,)",
            "SUM((A1,B2:C3))",
        ] {
            let printed = text_of(formula);
            assert_eq!(text_of(&printed), printed);
        }
        assert_eq!(text_of(" 1 + 2 "), "1+2");
        assert_eq!(text_of("true"), "TRUE");
    }

    #[test]
    fn test_missing_paren_is_diagnostic() {
        let parsed = parse("SUM(1,2");
        assert_eq!(parsed.diagnostics.len(), 1);
        assert_eq!(parsed.diagnostics[0].position, 7);
        assert_eq!(
            parsed.expr,
            Expr::call("SUM", vec![Expr::number(1.0), Expr::number(2.0)])
        );
        assert!(!parse("(1+2").is_valid());
    }

    #[test]
    fn test_bad_input_never_panics() {
        for formula in ["", "+", "1+", ")", "{1,2;3}", "SUM(", "A1:", "A1:B", "(,)", "{}", "1 2", "$3"] {
            let parsed = parse(formula);
            assert!(!parsed.is_valid(), "{formula} should be invalid");
        }
    }

    #[test]
    fn test_out_of_range_number_is_diagnostic() {
        let huge = "9".repeat(400);
        for formula in [huge.clone(), format!("1+{huge}"), format!("{{1,-{huge}}}")] {
            let parsed = parse(&formula);
            assert_eq!(parsed.diagnostics.len(), 1, "{formula}");
            assert!(parsed.diagnostics[0].message.contains("too large"));
        }
        let largest = format!("{}", f64::MAX);
        assert!(parse(&largest).is_valid());
        assert_eq!(parse(&largest).expr.to_expression_text(), largest);
    }

    #[test]
    fn test_array_constant() {
        let parsed = parse("{1,2;3,4}");
        assert_eq!(
            parsed.expr,
            Expr::Array(vec![
                vec![Literal::Number(1.0), Literal::Number(2.0)],
                vec![Literal::Number(3.0), Literal::Number(4.0)],
            ])
        );
    }
}

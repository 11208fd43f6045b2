//! Formula lexer.
//!
//! Turns formula text into a flat sequence of [`Token`]s that borrow from the
//! input. Lexing never fails: malformed input produces [`TokenKind::Bad`]
//! tokens and a [`Diagnostic`] for each problem, and the stream always ends
//! with a single [`TokenKind::Eof`].

use thiserror::Error;

use super::value::ErrorKind;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Number,
    String,
    Identifier,
    /// An error literal such as `#REF!`.
    Error,
    Operator,
    Punctuation,
    Eof,
    Bad,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Token<'src> {
    pub kind: TokenKind,
    /// Source text of the token (for strings, including the quotes).
    pub text: &'src str,
    /// Byte offset of the first character.
    pub start: usize,
}

impl<'src> Token<'src> {
    pub fn is_op(&self, op: &str) -> bool {
        self.kind == TokenKind::Operator && self.text == op
    }

    pub fn is_punct(&self, punct: &str) -> bool {
        self.kind == TokenKind::Punctuation && self.text == punct
    }
}

/// A non-fatal lexical or syntactic problem.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message} at position {position}")]
pub struct Diagnostic {
    pub position: usize,
    pub message: String,
}

impl Diagnostic {
    pub fn new(position: usize, message: impl Into<String>) -> Diagnostic {
        Diagnostic {
            position,
            message: message.into(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Lexed<'src> {
    pub tokens: Vec<Token<'src>>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Lex formula text (without the leading `=`).
pub fn lex(text: &str) -> Lexed<'_> {
    Lexer::new(text).run()
}

struct Lexer<'src> {
    input: &'src str,
    pos: usize,
    out: Lexed<'src>,
}

impl<'src> Lexer<'src> {
    fn new(input: &'src str) -> Self {
        Lexer {
            input,
            pos: 0,
            out: Lexed::default(),
        }
    }

    fn run(mut self) -> Lexed<'src> {
        loop {
            self.skip_whitespace();
            let Some(c) = self.peek() else {
                break;
            };
            let start = self.pos;
            match c {
                '0'..='9' | '.' => self.lex_number(),
                '"' => self.lex_string(),
                '#' => self.lex_error_literal(),
                c if c.is_alphabetic() || c == '_' || c == '$' => self.lex_identifier(),
                '<' => {
                    let len = match self.peek_at(1) {
                        Some('=') | Some('>') => 2,
                        _ => 1,
                    };
                    self.push(TokenKind::Operator, start, start + len);
                }
                '>' => {
                    let len = if self.peek_at(1) == Some('=') { 2 } else { 1 };
                    self.push(TokenKind::Operator, start, start + len);
                }
                '+' | '-' | '*' | '/' | '^' | '&' | '=' | ':' => {
                    self.push(TokenKind::Operator, start, start + 1)
                }
                '(' | ')' | ',' | ';' | '{' | '}' => {
                    self.push(TokenKind::Punctuation, start, start + 1)
                }
                other => {
                    let end = start + other.len_utf8();
                    self.out
                        .diagnostics
                        .push(Diagnostic::new(start, format!("unexpected character '{}'", other)));
                    self.push(TokenKind::Bad, start, end);
                }
            }
        }
        let end = self.input.len();
        self.out.tokens.push(Token {
            kind: TokenKind::Eof,
            text: &self.input[end..],
            start: end,
        });
        self.out
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(n)
    }

    fn skip_whitespace(&mut self) {
        let skipped: usize = self.input[self.pos..]
            .chars()
            .take_while(|c| c.is_whitespace())
            .map(char::len_utf8)
            .sum();
        self.pos += skipped;
    }

    fn push(&mut self, kind: TokenKind, start: usize, end: usize) {
        self.out.tokens.push(Token {
            kind,
            text: &self.input[start..end],
            start,
        });
        self.pos = end;
    }

    fn lex_number(&mut self) {
        let start = self.pos;
        let end = start
            + self.input[start..]
                .bytes()
                .take_while(|b| b.is_ascii_digit() || *b == b'.')
                .count();
        let text = &self.input[start..end];
        if text.parse::<f64>().is_ok() {
            self.push(TokenKind::Number, start, end);
        } else {
            self.out
                .diagnostics
                .push(Diagnostic::new(start, format!("malformed number '{}'", text)));
            self.push(TokenKind::Bad, start, end);
        }
    }

    fn lex_identifier(&mut self) {
        let start = self.pos;
        let len: usize = self.input[start..]
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '$')
            .map(char::len_utf8)
            .sum();
        self.push(TokenKind::Identifier, start, start + len);
    }

    fn lex_string(&mut self) {
        let start = self.pos;
        let bytes = self.input.as_bytes();
        let mut i = start + 1;
        while i < bytes.len() {
            if bytes[i] == b'"' {
                if bytes.get(i + 1) == Some(&b'"') {
                    i += 2;
                    continue;
                }
                self.push(TokenKind::String, start, i + 1);
                return;
            }
            i += 1;
        }
        self.out
            .diagnostics
            .push(Diagnostic::new(start, "unterminated string literal"));
        self.push(TokenKind::Bad, start, self.input.len());
    }

    fn lex_error_literal(&mut self) {
        let start = self.pos;
        let rest = &self.input[start..];
        for kind in ErrorKind::ALL {
            let code = kind.as_code();
            if rest.len() >= code.len()
                && rest.is_char_boundary(code.len())
                && rest[..code.len()].eq_ignore_ascii_case(code)
            {
                self.push(TokenKind::Error, start, start + code.len());
                return;
            }
        }
        self.out
            .diagnostics
            .push(Diagnostic::new(start, "unknown error literal"));
        self.push(TokenKind::Bad, start, start + 1);
    }
}

/// Unescape the contents of a string token (`"a""b"` -> `a"b`).
pub fn unquote(text: &str) -> String {
    let inner = text
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(text);
    inner.replace("\"\"", "\"")
}

/// Quote a string for formula text (`a"b` -> `"a""b"`).
pub fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(text: &str) -> Vec<(TokenKind, &str)> {
        lex(text).tokens.iter().map(|t| (t.kind, t.text)).collect()
    }

    #[test]
    fn test_lex_arithmetic() {
        assert_eq!(
            kinds("7 + 9.5*x"),
            vec![
                (TokenKind::Number, "7"),
                (TokenKind::Operator, "+"),
                (TokenKind::Number, "9.5"),
                (TokenKind::Operator, "*"),
                (TokenKind::Identifier, "x"),
                (TokenKind::Eof, ""),
            ]
        );
    }

    #[test]
    fn test_lex_two_char_operators() {
        let ops: Vec<_> = lex("1>=2<=3<>4<5>6")
            .tokens
            .into_iter()
            .filter(|t| t.kind == TokenKind::Operator)
            .map(|t| t.text)
            .collect();
        assert_eq!(ops, vec![">=", "<=", "<>", "<", ">"]);
    }

    #[test]
    fn test_lex_fixed_reference_is_one_token() {
        assert_eq!(
            kinds("$A$1:B$2"),
            vec![
                (TokenKind::Identifier, "$A$1"),
                (TokenKind::Operator, ":"),
                (TokenKind::Identifier, "B$2"),
                (TokenKind::Eof, ""),
            ]
        );
    }

    #[test]
    fn test_lex_string_with_escaped_quote() {
        let lexed = lex(r#""say ""hi""""#);
        assert!(lexed.diagnostics.is_empty());
        assert_eq!(lexed.tokens[0].kind, TokenKind::String);
        assert_eq!(unquote(lexed.tokens[0].text), r#"say "hi""#);
        assert_eq!(quote(r#"say "hi""#), lexed.tokens[0].text);
    }

    #[test]
    fn test_unterminated_string_is_bad_token() {
        let lexed = lex("1 & \"abc");
        assert_eq!(lexed.diagnostics.len(), 1);
        assert_eq!(lexed.diagnostics[0].position, 4);
        let last_two: Vec<_> = lexed.tokens.iter().rev().take(2).map(|t| t.kind).collect();
        assert_eq!(last_two, vec![TokenKind::Eof, TokenKind::Bad]);
    }

    #[test]
    fn test_malformed_number_is_recorded() {
        let lexed = lex("1.2.3+1");
        assert_eq!(lexed.tokens[0].kind, TokenKind::Bad);
        assert_eq!(lexed.tokens[1].kind, TokenKind::Operator);
        assert_eq!(lexed.diagnostics.len(), 1);
    }

    #[test]
    fn test_error_literals() {
        assert_eq!(
            kinds("#REF!+#div/0!"),
            vec![
                (TokenKind::Error, "#REF!"),
                (TokenKind::Operator, "+"),
                (TokenKind::Error, "#div/0!"),
                (TokenKind::Eof, ""),
            ]
        );
        assert_eq!(lex("#FOO").diagnostics.len(), 1);
    }

    #[test]
    fn test_exactly_one_eof() {
        for text in ["", "   ", "1+", "\"open", "@@"] {
            let lexed = lex(text);
            let eofs = lexed.tokens.iter().filter(|t| t.kind == TokenKind::Eof).count();
            assert_eq!(eofs, 1, "input {:?}", text);
            assert_eq!(lexed.tokens.last().map(|t| t.kind), Some(TokenKind::Eof));
        }
    }
}

//! Restricted arithmetic evaluator for raw flow fields.
//!
//! Investor-flow exports carry value/count cells as small arithmetic strings
//! (`"1250000000"`, `"1.2e9"`, `"(300+45)*1000"`). Only numeric literals,
//! unary `+`/`-`, binary `+ - * /` and parentheses are accepted. Anything else
//! is a `MalformedExpression`.

use thiserror::Error;

/// Deepest parenthesis/unary nesting accepted before giving up.
const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("malformed expression '{input}': {reason}")]
    MalformedExpression { input: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(f64),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

/// Evaluate an arithmetic expression to a finite `f64`.
pub fn evaluate(input: &str) -> Result<f64, ExprError> {
    let fail = |reason: String| ExprError::MalformedExpression {
        input: input.to_string(),
        reason,
    };

    let tokens = tokenize(input).map_err(fail)?;
    if tokens.is_empty() {
        return Err(fail("empty expression".into()));
    }

    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr().map_err(fail)?;
    if parser.pos != tokens.len() {
        return Err(fail(format!("unexpected token at position {}", parser.pos)));
    }
    if !value.is_finite() {
        return Err(fail("result is not finite".into()));
    }
    Ok(value)
}

/// Evaluate an optional raw cell. Blank and missing cells are `Ok(None)`.
pub fn evaluate_cell(cell: Option<&str>) -> Result<Option<f64>, ExprError> {
    match cell.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) if s.eq_ignore_ascii_case("nan") || s.eq_ignore_ascii_case("none") => Ok(None),
        Some(s) => evaluate(s).map(Some),
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b' ' | b'\t' | b'\n' | b'\r' => {
                i += 1;
            }
            b'+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            b'-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            b'*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            b'/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            b'(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            b')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            b'0'..=b'9' | b'.' => {
                let start = i;
                let mut literal = String::new();
                while i < bytes.len() {
                    match bytes[i] {
                        b'0'..=b'9' | b'.' => literal.push(bytes[i] as char),
                        b',' if is_digit_group(bytes, i) => {}
                        b'e' | b'E' => {
                            literal.push('e');
                            if matches!(bytes.get(i + 1), Some(b'+') | Some(b'-')) {
                                i += 1;
                                literal.push(bytes[i] as char);
                            }
                        }
                        _ => break,
                    }
                    i += 1;
                }
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| format!("bad number '{}'", &input[start..i]))?;
                tokens.push(Token::Num(value));
            }
            _ => {
                let ch = input[i..].chars().next().unwrap_or('?');
                return Err(format!("unexpected character '{ch}'"));
            }
        }
    }

    Ok(tokens)
}

/// A `,` counts as a thousands separator only between a digit and three digits.
fn is_digit_group(bytes: &[u8], i: usize) -> bool {
    i > 0
        && bytes[i - 1].is_ascii_digit()
        && bytes.len() >= i + 4
        && bytes[i + 1..i + 4].iter().all(u8::is_ascii_digit)
        && bytes.get(i + 4).map_or(true, |b| !b.is_ascii_digit())
}

/// Recursive-descent parser.
///
/// ```text
/// expr   := term (('+' | '-') term)*
/// term   := unary (('*' | '/') unary)*
/// unary  := ('+' | '-') unary | atom
/// atom   := NUM | '(' expr ')'
/// ```
struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.peek();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn enter(&mut self) -> Result<(), String> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err("expression nested too deeply".into());
        }
        Ok(())
    }

    fn expr(&mut self) -> Result<f64, String> {
        let mut acc = self.term()?;
        while let Some(op @ (Token::Plus | Token::Minus)) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            acc = if op == Token::Plus { acc + rhs } else { acc - rhs };
        }
        Ok(acc)
    }

    fn term(&mut self) -> Result<f64, String> {
        let mut acc = self.unary()?;
        while let Some(op @ (Token::Star | Token::Slash)) = self.peek() {
            self.pos += 1;
            let rhs = self.unary()?;
            if op == Token::Star {
                acc *= rhs;
            } else {
                if rhs == 0.0 {
                    return Err("division by zero".into());
                }
                acc /= rhs;
            }
        }
        Ok(acc)
    }

    fn unary(&mut self) -> Result<f64, String> {
        match self.peek() {
            Some(Token::Plus) => {
                self.pos += 1;
                self.enter()?;
                let v = self.unary();
                self.depth -= 1;
                v
            }
            Some(Token::Minus) => {
                self.pos += 1;
                self.enter()?;
                let v = self.unary().map(|v| -v);
                self.depth -= 1;
                v
            }
            _ => self.atom(),
        }
    }

    fn atom(&mut self) -> Result<f64, String> {
        match self.next() {
            Some(Token::Num(v)) => Ok(v),
            Some(Token::LParen) => {
                self.enter()?;
                let v = self.expr()?;
                self.depth -= 1;
                match self.next() {
                    Some(Token::RParen) => Ok(v),
                    _ => Err("missing ')'".into()),
                }
            }
            Some(t) => Err(format!("unexpected token {t:?}")),
            None => Err("unexpected end of expression".into()),
        }
    }
}

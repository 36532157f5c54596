//! Arithmetic expressions over doubles.
//!
//! ```text
//! Expr   := Term (('+'|'-') Term)*
//! Term   := Factor (('*'|'/') Factor)*
//! Factor := NUMBER | '(' Expr ')' | '-' Factor
//! ```
use logos::Logos;

use crate::error::ParseError;
use crate::parsers::MAX_DEPTH;

#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
enum Tok {
    #[regex(r"[0-9]+(\.[0-9]*)?([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Num(f64),
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
}

fn tokenize(src: &str) -> Result<Vec<(usize, Tok)>, ParseError> {
    Tok::lexer(src)
        .spanned()
        .map(|(tok, span)| match tok {
            Ok(tok) => Ok((span.start, tok)),
            Err(()) => Err(ParseError::syntax(span.start, format!("unexpected input {:?}", &src[span]))),
        })
        .collect()
}

struct Parser {
    toks: Vec<(usize, Tok)>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<Tok> { self.toks.get(self.pos).map(|(_, t)| *t) }

    fn offset(&self) -> usize { self.toks.get(self.pos).map(|(o, _)| *o).unwrap_or(self.end) }

    /// Run a nested production, bounded by [`MAX_DEPTH`].
    fn nested<T>(&mut self, at: usize, f: impl FnOnce(&mut Self) -> Result<T, ParseError>) -> Result<T, ParseError> {
        if self.depth >= MAX_DEPTH {
            return Err(ParseError::syntax(at, "expression nested too deeply"));
        }
        self.depth += 1;
        let out = f(self);
        self.depth -= 1;
        out
    }

    fn expr(&mut self) -> Result<f64, ParseError> {
        let mut acc = self.term()?;
        while let Some(op @ (Tok::Plus | Tok::Minus)) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            acc = if op == Tok::Plus { acc + rhs } else { acc - rhs };
        }
        Ok(acc)
    }

    fn term(&mut self) -> Result<f64, ParseError> {
        let mut acc = self.factor()?;
        while let Some(op @ (Tok::Star | Tok::Slash)) = self.peek() {
            self.pos += 1;
            let rhs = self.factor()?;
            acc = if op == Tok::Star {
                acc * rhs
            } else {
                if rhs == 0.0 { return Err(ParseError::DivisionByZero); }
                acc / rhs
            };
        }
        Ok(acc)
    }

    fn factor(&mut self) -> Result<f64, ParseError> {
        let at = self.offset();
        match self.peek() {
            Some(Tok::Num(n)) => { self.pos += 1; Ok(n) }
            Some(Tok::Minus) => { self.pos += 1; self.nested(at, |p| p.factor()).map(|v| -v) }
            Some(Tok::LParen) => {
                self.pos += 1;
                let v = self.nested(at, |p| p.expr())?;
                match self.peek() {
                    Some(Tok::RParen) => { self.pos += 1; Ok(v) }
                    _ => Err(ParseError::syntax(self.offset(), "unbalanced parentheses: expected ')'")),
                }
            }
            Some(_) => Err(ParseError::syntax(at, "expected a number, '(' or '-'")),
            None => Err(ParseError::syntax(at, "unexpected end of expression")),
        }
    }
}

/// Evaluate an expression at double precision.
pub fn evaluate(src: &str) -> Result<f64, ParseError> {
    let toks = tokenize(src)?;
    let mut p = Parser { toks, pos: 0, end: src.len(), depth: 0 };
    let v = p.expr()?;
    if p.pos != p.toks.len() {
        let message = match p.peek() {
            Some(Tok::RParen) => "unbalanced parentheses: unexpected ')'",
            _ => "unexpected trailing input",
        };
        return Err(ParseError::syntax(p.offset(), message));
    }
    Ok(v)
}

/// Evaluate and require an exactly integral result.
pub fn evaluate_integer(src: &str) -> Result<i64, ParseError> {
    let v = evaluate(src)?;
    if !v.is_finite() || v.fract() != 0.0 {
        return Err(ParseError::NonIntegral(v));
    }
    // i64::MAX as f64 rounds up to 2^63, which is already out of range
    if v < i64::MIN as f64 || v >= i64::MAX as f64 {
        return Err(ParseError::OutOfRange(v));
    }
    Ok(v as i64)
}

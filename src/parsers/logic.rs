//! Boolean logic: `true and (false or not false)`. Keywords are case-insensitive.
use logos::Logos;

use crate::error::ParseError;
use crate::parsers::MAX_DEPTH;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n]+")]
enum Tok {
    #[token("true", |_| true, ignore(ascii_case))]
    #[token("false", |_| false, ignore(ascii_case))]
    Lit(bool),
    #[token("and", ignore(ascii_case))]
    And,
    #[token("or", ignore(ascii_case))]
    Or,
    #[token("not", ignore(ascii_case))]
    Not,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    /// Any other identifier; always rejected, but lexed whole for the error message.
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Word,
}

fn tokenize(src: &str) -> Result<Vec<(usize, Tok)>, ParseError> {
    Tok::lexer(src)
        .spanned()
        .map(|(tok, span)| match tok {
            Ok(Tok::Word) => Err(ParseError::syntax(span.start, format!("unknown word {:?}", &src[span]))),
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

    fn nested<T>(&mut self, at: usize, f: impl FnOnce(&mut Self) -> Result<T, ParseError>) -> Result<T, ParseError> {
        if self.depth >= MAX_DEPTH {
            return Err(ParseError::syntax(at, "expression nested too deeply"));
        }
        self.depth += 1;
        let out = f(self);
        self.depth -= 1;
        out
    }

    fn expr(&mut self) -> Result<bool, ParseError> {
        let mut acc = self.term()?;
        while self.peek() == Some(Tok::Or) {
            self.pos += 1;
            let rhs = self.term()?;
            acc = acc || rhs;
        }
        Ok(acc)
    }

    fn term(&mut self) -> Result<bool, ParseError> {
        let mut acc = self.factor()?;
        while self.peek() == Some(Tok::And) {
            self.pos += 1;
            let rhs = self.factor()?;
            acc = acc && rhs;
        }
        Ok(acc)
    }

    fn factor(&mut self) -> Result<bool, ParseError> {
        let at = self.offset();
        match self.peek() {
            Some(Tok::Lit(b)) => { self.pos += 1; Ok(b) }
            Some(Tok::Not) => { self.pos += 1; self.nested(at, |p| p.factor()).map(|v| !v) }
            Some(Tok::LParen) => {
                self.pos += 1;
                let v = self.nested(at, |p| p.expr())?;
                match self.peek() {
                    Some(Tok::RParen) => { self.pos += 1; Ok(v) }
                    _ => Err(ParseError::syntax(self.offset(), "unbalanced parentheses: expected ')'")),
                }
            }
            Some(_) => Err(ParseError::syntax(at, "expected true, false, 'not' or '('")),
            None => Err(ParseError::syntax(at, "unexpected end of expression")),
        }
    }
}

pub fn evaluate(src: &str) -> Result<bool, ParseError> {
    let toks = tokenize(src)?;
    let mut p = Parser { toks, pos: 0, end: src.len(), depth: 0 };
    let v = p.expr()?;
    if p.pos != p.toks.len() {
        return Err(ParseError::syntax(p.offset(), "unexpected trailing input"));
    }
    Ok(v)
}

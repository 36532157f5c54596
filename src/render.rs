//! Template rendering: splicing referenced values into a leaf's raw text.
//!
//! The engine only needs a renderer that finds reference expressions and asks
//! a `lookup(name)` callback for their text. [`Interpolator`] is the default and
//! handles plain `${ dotted.name }` substitution; richer expression languages
//! plug in by implementing [`Renderer`].
use crate::error::Error;

/// Callback the engine hands to a renderer. Resolves a reference body to text.
pub type Lookup<'a> = dyn FnMut(&str) -> Result<String, Error> + 'a;

#[derive(Debug)]
pub enum RenderError {
    /// The lookup callback failed; the engine error is passed through untouched.
    Lookup(Box<Error>),
    /// The template itself is malformed.
    Syntax { position: usize, message: String },
}

impl From<Error> for RenderError {
    fn from(err: Error) -> Self { RenderError::Lookup(Box::new(err)) }
}

pub trait Renderer {
    fn render(&self, template: &str, lookup: &mut Lookup<'_>) -> Result<String, RenderError>;
}

/// Default renderer: `${name}` with optional inner whitespace, `$${` for a literal `${`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Interpolator;

impl Renderer for Interpolator {
    fn render(&self, template: &str, lookup: &mut Lookup<'_>) -> Result<String, RenderError> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        let mut offset = 0;
        while let Some(at) = rest.find('$') {
            out.push_str(&rest[..at]);
            let tail = &rest[at..];
            if tail.starts_with("$${") {
                out.push_str("${");
                rest = &tail[3..];
                offset += at + 3;
            } else if let Some(body_start) = tail.strip_prefix("${") {
                let Some(close) = body_start.find('}') else {
                    return Err(RenderError::Syntax {
                        position: offset + at,
                        message: "unterminated `${`".to_string(),
                    });
                };
                let name = body_start[..close].trim();
                if name.is_empty() {
                    return Err(RenderError::Syntax {
                        position: offset + at,
                        message: "empty reference `${}`".to_string(),
                    });
                }
                out.push_str(&lookup(name)?);
                let consumed = 2 + close + 1;
                rest = &tail[consumed..];
                offset += at + consumed;
            } else {
                out.push('$');
                rest = &tail[1..];
                offset += at + 1;
            }
        }
        out.push_str(rest);
        Ok(out)
    }
}

/// A template that is exactly one reference, e.g. `${ this.a.b }`.
pub fn sole_reference(template: &str) -> Option<String> {
    let body = template.trim().strip_prefix("${")?.strip_suffix('}')?;
    if body.contains('}') || body.contains("${") {
        return None;
    }
    let name = body.trim();
    (!name.is_empty()).then(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypath::Keypath;
    use pretty_assertions::assert_eq;

    fn render_with(template: &str, pairs: &[(&str, &str)]) -> Result<String, RenderError> {
        let mut lookup = |name: &str| -> Result<String, Error> {
            pairs.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
                .ok_or_else(|| Error::UnknownReference { keypath: Keypath::root(), name: name.to_string() })
        };
        Interpolator.render(template, &mut lookup)
    }

    #[test]
    fn substitutes_every_reference() {
        let out = render_with("2 * ${this.x} + ${ this.y }", &[("this.x", "10"), ("this.y", "3")]).unwrap();
        assert_eq!(out, "2 * 10 + 3");
    }

    #[test]
    fn plain_text_and_lone_dollars_pass_through() {
        assert_eq!(render_with("costs $5", &[]).unwrap(), "costs $5");
        assert_eq!(render_with("no refs", &[]).unwrap(), "no refs");
        assert_eq!(render_with("$${literal}", &[]).unwrap(), "${literal}");
    }

    #[test]
    fn lookup_errors_pass_through() {
        match render_with("${missing}", &[]) {
            Err(RenderError::Lookup(err)) => assert!(matches!(*err, Error::UnknownReference { .. })),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn malformed_templates() {
        assert!(matches!(render_with("a ${this.x", &[]), Err(RenderError::Syntax { position: 2, .. })));
        assert!(matches!(render_with("${ }", &[]), Err(RenderError::Syntax { position: 0, .. })));
    }

    #[test]
    fn sole_references() {
        assert_eq!(sole_reference(" ${ this.a.b } "), Some("this.a.b".to_string()));
        assert_eq!(sole_reference("${this.a} ${this.b}"), None);
        assert_eq!(sole_reference("x ${this.a}"), None);
    }
}

//! Keypaths: the address of a node inside a configuration tree.
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// Ordered sequence of mapping keys / list indices, root first.
///
/// Displays dotted (`release.date`, `authors.2`); the root displays as `<root>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Keypath(Vec<Segment>);

impl Keypath {
    pub fn root() -> Self { Self::default() }

    pub fn segments(&self) -> &[Segment] { &self.0 }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn key(&self, key: impl Into<String>) -> Self {
        let mut out = self.clone();
        out.0.push(Segment::Key(key.into()));
        out
    }

    pub fn index(&self, index: usize) -> Self {
        let mut out = self.clone();
        out.0.push(Segment::Index(index));
        out
    }

    pub fn push(&mut self, segment: Segment) { self.0.push(segment); }

    /// Split a dotted reference body (`a.b.2`) into raw string parts.
    ///
    /// Whether a part addresses a key or an index depends on the node it is
    /// applied to, so parts stay untyped here.
    pub fn dotted_parts(name: &str) -> Vec<&str> {
        name.split('.').map(str::trim).collect()
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(k) => f.write_str(k),
            Segment::Index(i) => write!(f, "{i}"),
        }
    }
}

impl fmt::Display for Keypath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<root>");
        }
        for (i, seg) in self.0.iter().enumerate() {
            if i > 0 { f.write_str(".")?; }
            write!(f, "{seg}")?;
        }
        Ok(())
    }
}

impl From<Vec<Segment>> for Keypath {
    fn from(segments: Vec<Segment>) -> Self { Self(segments) }
}

impl FromIterator<Segment> for Keypath {
    fn from_iter<I: IntoIterator<Item = Segment>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// `keypath!["authors", 2]` style construction, mostly for tests.
#[macro_export]
macro_rules! keypath {
    () => { $crate::keypath::Keypath::root() };
    ($($seg:expr),+ $(,)?) => {{
        let mut kp = $crate::keypath::Keypath::root();
        $( kp.push($crate::keypath::Segment::from($seg)); )+
        kp
    }};
}

impl From<&str> for Segment {
    fn from(key: &str) -> Self { Segment::Key(key.to_string()) }
}

impl From<String> for Segment {
    fn from(key: String) -> Self { Segment::Key(key) }
}

impl From<usize> for Segment {
    fn from(index: usize) -> Self { Segment::Index(index) }
}

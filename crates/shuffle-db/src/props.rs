//! Property sets — the per-file attributes the rule engine reads and writes.
//!
//! The seven known properties are stored as typed fields. Anything else a rule
//! assigns lands in [`PropertySet::extra`] so user rule files stay forward
//! compatible without loosening the types the record codec relies on.

use std::collections::BTreeMap;
use std::fmt;

/// A rule value: either an integer or a string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Value {
    Int(i64),
    Str(String),
}

impl Value {
    /// Parse a value literal from a rule file.
    ///
    /// `'quoted'` and `"quoted"` literals are strings; everything else is tried
    /// as an integer and kept verbatim as a string if that fails.
    #[must_use]
    pub fn parse(literal: &str) -> Self {
        let bytes = literal.as_bytes();
        if let (Some(&first), Some(&last)) = (bytes.first(), bytes.last()) {
            if bytes.len() >= 2 && first == last && (first == b'\'' || first == b'"') {
                // SAFETY: first and last bytes are ASCII quotes, so 1 and len-1
                // are char boundaries and 1 <= len-1 because len >= 2.
                #[allow(clippy::indexing_slicing)]
                let inner = &literal[1..literal.len().saturating_sub(1)];
                return Self::Str(inner.to_owned());
            }
        }
        literal
            .parse::<i64>()
            .map_or_else(|_| Self::Str(literal.to_owned()), Self::Int)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            Self::Int(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Str(s) => write!(f, "'{s}'"),
        }
    }
}

/// Names of the properties the record codec understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Known {
    Filename,
    Size,
    Ignore,
    Type,
    Shuffle,
    Reuse,
    Bookmark,
}

impl Known {
    pub const ALL: [Self; 7] = [
        Self::Filename,
        Self::Size,
        Self::Ignore,
        Self::Type,
        Self::Shuffle,
        Self::Reuse,
        Self::Bookmark,
    ];

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Filename => "filename",
            Self::Size => "size",
            Self::Ignore => "ignore",
            Self::Type => "type",
            Self::Shuffle => "shuffle",
            Self::Reuse => "reuse",
            Self::Bookmark => "bookmark",
        }
    }
}

/// A property name as written in a rule: known, or carried through as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropName {
    Known(Known),
    Other(String),
}

impl PropName {
    #[must_use]
    pub fn parse(name: &str) -> Self {
        Known::from_name(name).map_or_else(|| Self::Other(name.to_owned()), Self::Known)
    }

    #[must_use]
    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }
}

impl fmt::Display for PropName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(k) => f.write_str(k.name()),
            Self::Other(s) => f.write_str(s),
        }
    }
}

/// A single typed assignment produced by a rule action.
///
/// Built by [`Assignment::new`], which rejects values of the wrong variant
/// for known properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    Filename(String),
    Size(i64),
    Ignore(bool),
    Type(u8),
    Shuffle(u8),
    Reuse(bool),
    Bookmark(u8),
    Other(String, Value),
}

impl Assignment {
    /// Type-check `value` against the property `name`.
    ///
    /// Returns `None` when a known property receives a value it cannot hold
    /// (a string for an integer field, or an integer outside `0..=255` for a
    /// byte field).
    #[must_use]
    pub fn new(name: &PropName, value: Value) -> Option<Self> {
        let known = match name {
            PropName::Known(k) => *k,
            PropName::Other(other) => return Some(Self::Other(other.clone(), value)),
        };
        match (known, value) {
            (Known::Filename, Value::Str(s)) => Some(Self::Filename(s)),
            (Known::Size, Value::Int(i)) => Some(Self::Size(i)),
            (Known::Ignore, Value::Int(i)) => Some(Self::Ignore(i != 0)),
            (Known::Reuse, Value::Int(i)) => Some(Self::Reuse(i != 0)),
            (Known::Type, Value::Int(i)) => u8::try_from(i).ok().map(Self::Type),
            (Known::Shuffle, Value::Int(i)) => u8::try_from(i).ok().map(Self::Shuffle),
            (Known::Bookmark, Value::Int(i)) => u8::try_from(i).ok().map(Self::Bookmark),
            _ => None,
        }
    }
}

/// The resolved attributes of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySet {
    /// Volume-relative path with a leading `/`, as stored in the database.
    pub filename: String,
    /// File size in bytes; `None` when the file could not be stat'ed.
    pub size: Option<i64>,
    pub ignore: bool,
    /// Firmware file type (the `type` property): 1 MP3, 2 AAC, 4 WAV.
    pub kind: u8,
    pub shuffle: u8,
    pub reuse: bool,
    pub bookmark: u8,
    /// Properties assigned by user rules that the codec does not know about.
    pub extra: BTreeMap<String, Value>,
}

impl PropertySet {
    /// Built-in defaults for a file before any rule runs.
    #[must_use]
    pub fn defaults(filename: impl Into<String>, size: Option<u64>, reuse: bool) -> Self {
        Self {
            filename: filename.into(),
            size: size.and_then(|s| i64::try_from(s).ok()),
            ignore: false,
            kind: 1,
            shuffle: 1,
            reuse,
            bookmark: 0,
            extra: BTreeMap::new(),
        }
    }

    /// Look up a property for condition matching. Absent properties yield `None`.
    #[must_use]
    pub fn get(&self, name: &PropName) -> Option<Value> {
        let known = match name {
            PropName::Known(k) => *k,
            PropName::Other(other) => return self.extra.get(other).cloned(),
        };
        match known {
            Known::Filename => Some(Value::Str(self.filename.clone())),
            Known::Size => self.size.map(Value::Int),
            Known::Ignore => Some(Value::Int(i64::from(self.ignore))),
            Known::Type => Some(Value::Int(i64::from(self.kind))),
            Known::Shuffle => Some(Value::Int(i64::from(self.shuffle))),
            Known::Reuse => Some(Value::Int(i64::from(self.reuse))),
            Known::Bookmark => Some(Value::Int(i64::from(self.bookmark))),
        }
    }

    pub fn apply(&mut self, assignment: &Assignment) {
        match assignment {
            Assignment::Filename(s) => self.filename.clone_from(s),
            Assignment::Size(i) => self.size = Some(*i),
            Assignment::Ignore(b) => self.ignore = *b,
            Assignment::Type(t) => self.kind = *t,
            Assignment::Shuffle(s) => self.shuffle = *s,
            Assignment::Reuse(b) => self.reuse = *b,
            Assignment::Bookmark(b) => self.bookmark = *b,
            Assignment::Other(name, value) => {
                self.extra.insert(name.clone(), value.clone());
            }
        }
    }

    /// Whether the track joins the shuffle sequence.
    #[must_use]
    pub fn in_shuffle(&self) -> bool {
        self.shuffle != 0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn parse_quoted_strings() {
        assert_eq!(Value::parse("'abc'"), Value::Str("abc".into()));
        assert_eq!(Value::parse("\"a b\""), Value::Str("a b".into()));
        assert_eq!(Value::parse("''"), Value::Str(String::new()));
    }

    #[test]
    fn parse_integers_and_fallback() {
        assert_eq!(Value::parse("42"), Value::Int(42));
        assert_eq!(Value::parse("-3"), Value::Int(-3));
        assert_eq!(Value::parse("*.mp3"), Value::Str("*.mp3".into()));
        // mismatched quotes stay literal
        assert_eq!(Value::parse("'abc\""), Value::Str("'abc\"".into()));
        assert_eq!(Value::parse("'"), Value::Str("'".into()));
    }

    #[test]
    fn known_names_round_trip() {
        for k in Known::ALL {
            assert_eq!(Known::from_name(k.name()), Some(k));
        }
        assert_eq!(Known::from_name("volume"), None);
    }

    #[test]
    fn assignment_rejects_wrong_variant_for_known_property() {
        let ty = PropName::parse("type");
        assert_eq!(Assignment::new(&ty, Value::Int(2)), Some(Assignment::Type(2)));
        assert_eq!(Assignment::new(&ty, Value::Str("mp3".into())), None);
        assert_eq!(Assignment::new(&ty, Value::Int(256)), None);
        assert_eq!(Assignment::new(&ty, Value::Int(-1)), None);
    }

    #[test]
    fn assignment_keeps_unknown_properties() {
        let name = PropName::parse("rating");
        assert!(!name.is_known());
        let a = Assignment::new(&name, Value::Int(5)).unwrap();
        let mut props = PropertySet::defaults("/a.mp3", Some(10), true);
        props.apply(&a);
        assert_eq!(props.get(&name), Some(Value::Int(5)));
    }

    #[test]
    fn missing_size_is_absent() {
        let props = PropertySet::defaults("/a.mp3", None, true);
        assert_eq!(props.get(&PropName::Known(Known::Size)), None);
        let props = PropertySet::defaults("/a.mp3", Some(1234), true);
        assert_eq!(props.get(&PropName::Known(Known::Size)), Some(Value::Int(1234)));
    }

    #[test]
    fn defaults_match_device_expectations() {
        let props = PropertySet::defaults("/x.mp3", None, false);
        assert!(!props.ignore);
        assert_eq!(props.kind, 1);
        assert!(props.in_shuffle());
        assert!(!props.reuse);
        assert_eq!(props.bookmark, 0);
    }
}

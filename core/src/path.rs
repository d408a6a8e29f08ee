//! `ValuePath` and `lookup` - locating a value inside a nested event
//!
//! A path is a dotted list of identifier segments (`"a.b.c"`). Lookup walks
//! nested JSON objects one segment at a time and reports either the value it
//! reached or [`Lookup::Absent`].
//!
//! # INV: Absent is data, not an error
//!
//! A missing key or a non-object intermediate value yields `Absent`. Lookup
//! never fails, and `Absent` is distinct from a `null` present in the event.

use crate::Event;
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::LazyLock;

static SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+").expect("segment pattern is a valid regex"));

/// A parsed dotted path into an event.
///
/// Parsing is purely syntactic and never fails: every run of identifier
/// characters (`\w+`) is a segment, everything else is a separator. A path
/// with zero segments addresses the event root.
///
/// ```
/// use evroute::ValuePath;
///
/// let path = ValuePath::parse("detail.user.id");
/// assert_eq!(path.segments(), ["detail", "user", "id"]);
///
/// // Stray separators are dropped
/// assert_eq!(ValuePath::parse(".a..b.").segments(), ["a", "b"]);
///
/// assert!(ValuePath::parse("").is_root());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ValuePath {
    raw: String,
    segments: Vec<String>,
}

impl ValuePath {
    /// Parse a dotted path.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        let segments = SEGMENT
            .find_iter(path)
            .map(|m| m.as_str().to_owned())
            .collect();
        Self {
            raw: path.to_owned(),
            segments,
        }
    }

    /// The path addressing the event root.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// The segments in walk order.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The string this path was parsed from.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns `true` if this path has no segments.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for ValuePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for ValuePath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

impl From<String> for ValuePath {
    fn from(path: String) -> Self {
        Self::parse(&path)
    }
}

impl From<&String> for ValuePath {
    fn from(path: &String) -> Self {
        Self::parse(path)
    }
}

/// Result of walking a [`ValuePath`] through an event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup<'a> {
    /// The path resolved to this value (which may itself be `null`).
    Found(&'a Value),
    /// Some segment was missing, or an intermediate value was not an object.
    Absent,
}

impl<'a> Lookup<'a> {
    /// Returns `true` if the path did not resolve.
    #[inline]
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Returns the found value, if any.
    #[inline]
    #[must_use]
    pub fn value(self) -> Option<&'a Value> {
        match self {
            Self::Found(v) => Some(v),
            Self::Absent => None,
        }
    }
}

/// Walk `path` through `event`.
///
/// ```
/// use evroute::{lookup, Lookup, ValuePath};
/// use serde_json::json;
///
/// let event = json!({"a": {"b": "c"}});
/// assert_eq!(lookup(&event, &ValuePath::parse("a.b")), Lookup::Found(&json!("c")));
/// assert_eq!(lookup(&event, &ValuePath::parse("a.d")), Lookup::Absent);
/// assert_eq!(lookup(&event, &ValuePath::root()), Lookup::Found(&event));
/// ```
#[must_use]
pub fn lookup<'a>(event: &'a Event, path: &ValuePath) -> Lookup<'a> {
    let mut node = event;
    for segment in &path.segments {
        match node.as_object().and_then(|map| map.get(segment)) {
            Some(child) => node = child,
            None => return Lookup::Absent,
        }
    }
    Lookup::Found(node)
}

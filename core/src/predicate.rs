//! `Predicate` - Unary tests over a resolved event value
//!
//! Predicates are the leaves of the condition algebra. They are intentionally
//! **shape-agnostic**: every predicate takes a `&serde_json::Value`, whatever
//! that value happens to be, so the same predicate works for any path in any
//! event.
//!
//! # Available Predicates
//!
//! | Constructor | Type | Matches when |
//! |---|---|---|
//! | [`truthy()`] | [`Truthy`] | the value is truthy (see [`is_truthy`]) |
//! | [`equals()`] | [`Equals`] | the value equals the expected value |
//! | [`one_of()`] | [`OneOf`] | the value equals one of the options |
//! | [`contains()`] | [`Contains`] | the value contains every item |
//! | [`is_empty()`] / [`is_not_empty()`] | [`IsEmpty`] | a sized value is (not) empty |
//! | [`is_length()`] | [`IsLength`] | a sized value has exactly `n` elements |
//! | [`match_regex()`] | [`MatchRegex`] | the value, as text, matches a pattern |
//! | [`custom()`] / [`try_custom()`] | [`Custom`] / [`TryCustom`] | a caller-supplied closure says so |
//! | [`combine()`] | [`Combined`] | every inner predicate matches (short-circuit) |
//! | [`negate()`] | [`Negate`] | the inner predicate does not match |
//!
//! Built-in predicates never fail. A value of an incompatible shape (e.g.
//! `is_length` on a number) simply does not match.

use crate::BoxError;
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use std::borrow::Cow;
use std::fmt::{self, Debug};
use std::sync::Arc;

/// A test over a single resolved value.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so conditions can be shared across
/// threads once built.
///
/// # Example
///
/// ```
/// use evroute::predicate::{self, Predicate};
/// use serde_json::json;
///
/// let p = predicate::one_of(["create", "update"]);
/// assert!(p.test(&json!("update")).unwrap());
/// assert!(!p.test(&json!("delete")).unwrap());
/// ```
#[diagnostic::on_unimplemented(
    message = "`{Self}` does not implement `Predicate`",
    label = "this type cannot test an event value",
    note = "use a built-in predicate (equals, one_of, match_regex, ...) or wrap a closure with `predicate::custom`"
)]
pub trait Predicate: Send + Sync + Debug {
    /// Test the value.
    ///
    /// # Errors
    ///
    /// Only caller-supplied predicates fail; the error is propagated to the
    /// caller of `check`/`resolve` untouched.
    fn test(&self, value: &Value) -> Result<bool, BoxError>;
}

/// A predicate shared between conditions.
pub type SharedPredicate = Arc<dyn Predicate>;

#[diagnostic::do_not_recommend]
impl Predicate for Box<dyn Predicate> {
    fn test(&self, value: &Value) -> Result<bool, BoxError> {
        (**self).test(value)
    }
}

#[diagnostic::do_not_recommend]
impl Predicate for Arc<dyn Predicate> {
    fn test(&self, value: &Value) -> Result<bool, BoxError> {
        (**self).test(value)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Value semantics
// ═══════════════════════════════════════════════════════════════════════════════

/// Truthiness of a JSON value.
///
/// `null`, `false`, zero, the empty string, the empty array and the empty
/// object are falsy. Everything else is truthy.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Structural equality where numbers compare by value (`1 == 1.0`).
///
/// Values keep their JSON type otherwise: booleans are not numbers, so
/// `true` never equals `1` and `false` never equals `0`.
#[must_use]
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(i), Some(j)) => i == j,
            _ => match (x.as_u64(), y.as_u64()) {
                (Some(i), Some(j)) => i == j,
                _ => x.as_f64() == y.as_f64(),
            },
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| values_equal(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, v)| y.get(k).is_some_and(|w| values_equal(v, w)))
        }
        _ => a == b,
    }
}

/// Size of a sized value: array length, string length in chars, object
/// entry count. `None` for scalars.
#[must_use]
pub fn size_of(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(a) => Some(a.len()),
        Value::Object(o) => Some(o.len()),
        _ => None,
    }
}

/// Text form of a value for regex matching: strings as-is, anything else as
/// compact JSON.
#[must_use]
pub fn as_text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s),
        other => Cow::Owned(other.to_string()),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Built-in predicates
// ═══════════════════════════════════════════════════════════════════════════════

/// Matches truthy values. See [`is_truthy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Truthy;

impl Predicate for Truthy {
    fn test(&self, value: &Value) -> Result<bool, BoxError> {
        Ok(is_truthy(value))
    }
}

/// Structural equality with an expected value.
///
/// ```
/// use evroute::predicate::{Equals, Predicate};
/// use serde_json::json;
///
/// let p = Equals::new(json!({"kind": "order", "qty": 2}));
/// assert!(p.test(&json!({"qty": 2.0, "kind": "order"})).unwrap());
/// assert!(!p.test(&json!({"qty": 3, "kind": "order"})).unwrap());
/// ```
#[derive(Debug, Clone)]
pub struct Equals {
    expected: Value,
}

impl Equals {
    /// Create an equality predicate.
    pub fn new(expected: impl Into<Value>) -> Self {
        Self {
            expected: expected.into(),
        }
    }

    /// Returns the expected value.
    #[must_use]
    pub fn expected(&self) -> &Value {
        &self.expected
    }
}

impl Predicate for Equals {
    fn test(&self, value: &Value) -> Result<bool, BoxError> {
        Ok(values_equal(value, &self.expected))
    }
}

/// Membership in a set of options.
#[derive(Debug, Clone)]
pub struct OneOf {
    options: Vec<Value>,
}

impl OneOf {
    /// Create a membership predicate.
    pub fn new<I>(options: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Self {
            options: options.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the options.
    #[must_use]
    pub fn options(&self) -> &[Value] {
        &self.options
    }
}

impl Predicate for OneOf {
    fn test(&self, value: &Value) -> Result<bool, BoxError> {
        Ok(self.options.iter().any(|o| values_equal(value, o)))
    }
}

/// The value contains every item.
///
/// - arrays: every item is an element
/// - strings: every item is a string and a substring
/// - objects: every item is a string and a key
/// - anything else: no match
#[derive(Debug, Clone)]
pub struct Contains {
    items: Vec<Value>,
}

impl Contains {
    /// Create a containment predicate.
    pub fn new<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Self {
            items: items.into_iter().map(Into::into).collect(),
        }
    }

    fn contains_item(container: &Value, item: &Value) -> bool {
        match container {
            Value::Array(elements) => elements.iter().any(|e| values_equal(e, item)),
            Value::String(s) => item.as_str().is_some_and(|needle| s.contains(needle)),
            Value::Object(map) => item.as_str().is_some_and(|key| map.contains_key(key)),
            _ => false,
        }
    }
}

impl Predicate for Contains {
    fn test(&self, value: &Value) -> Result<bool, BoxError> {
        Ok(self
            .items
            .iter()
            .all(|item| Self::contains_item(value, item)))
    }
}

/// Emptiness of a sized value. Scalars are neither empty nor non-empty.
#[derive(Debug, Clone, Copy)]
pub struct IsEmpty {
    empty: bool,
}

impl Predicate for IsEmpty {
    fn test(&self, value: &Value) -> Result<bool, BoxError> {
        Ok(size_of(value).is_some_and(|n| (n == 0) == self.empty))
    }
}

/// A sized value has exactly `len` elements.
#[derive(Debug, Clone, Copy)]
pub struct IsLength {
    len: usize,
}

impl Predicate for IsLength {
    fn test(&self, value: &Value) -> Result<bool, BoxError> {
        Ok(size_of(value) == Some(self.len))
    }
}

/// Options for [`match_regex()`].
///
/// ```
/// use evroute::RegexFlags;
///
/// let flags = RegexFlags {
///     ignore_case: true,
///     full_match: true,
///     ..RegexFlags::default()
/// };
/// assert!(flags.ignore_case);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegexFlags {
    /// Case-insensitive matching.
    pub ignore_case: bool,
    /// `^` and `$` match at line boundaries.
    pub multi_line: bool,
    /// `.` also matches `\n`.
    pub dot_all: bool,
    /// The whole text must match, not just a part of it.
    pub full_match: bool,
}

/// The value, coerced to text (see [`as_text`]), matches a regex.
///
/// Uses Rust's `regex` crate, which guarantees linear-time matching.
#[derive(Debug, Clone)]
pub struct MatchRegex {
    regex: Regex,
}

impl MatchRegex {
    /// Compile `pattern` with `flags`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the pattern is invalid.
    pub fn new(pattern: &str, flags: RegexFlags) -> Result<Self, regex::Error> {
        let pattern = if flags.full_match {
            Cow::Owned(format!(r"\A(?:{pattern})\z"))
        } else {
            Cow::Borrowed(pattern)
        };
        RegexBuilder::new(&pattern)
            .case_insensitive(flags.ignore_case)
            .multi_line(flags.multi_line)
            .dot_matches_new_line(flags.dot_all)
            .build()
            .map(|regex| Self { regex })
    }

    /// Wrap an already compiled regex (partial match).
    #[must_use]
    pub fn from_regex(regex: Regex) -> Self {
        Self { regex }
    }

    /// Returns the compiled pattern.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl Predicate for MatchRegex {
    fn test(&self, value: &Value) -> Result<bool, BoxError> {
        Ok(self.regex.is_match(&as_text(value)))
    }
}

/// A caller-supplied infallible predicate.
pub struct Custom<F> {
    f: F,
}

impl<F> Debug for Custom<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Custom")
            .field(&std::any::type_name::<F>())
            .finish()
    }
}

impl<F> Predicate for Custom<F>
where
    F: Fn(&Value) -> bool + Send + Sync,
{
    fn test(&self, value: &Value) -> Result<bool, BoxError> {
        Ok((self.f)(value))
    }
}

/// A caller-supplied predicate that may fail.
///
/// A failure is a logic error, not a routing outcome: it propagates to the
/// caller of `check`/`resolve`.
pub struct TryCustom<F> {
    f: F,
}

impl<F> Debug for TryCustom<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TryCustom")
            .field(&std::any::type_name::<F>())
            .finish()
    }
}

impl<F> Predicate for TryCustom<F>
where
    F: Fn(&Value) -> Result<bool, BoxError> + Send + Sync,
{
    fn test(&self, value: &Value) -> Result<bool, BoxError> {
        (self.f)(value)
    }
}

/// Logical AND of predicates, evaluated left to right.
///
/// # INV: short-circuit
///
/// Evaluation stops at the first predicate that returns `false` or fails;
/// later predicates are never called.
#[derive(Debug, Clone)]
pub struct Combined {
    predicates: Vec<SharedPredicate>,
}

impl Combined {
    /// Returns the inner predicates in evaluation order.
    #[must_use]
    pub fn predicates(&self) -> &[SharedPredicate] {
        &self.predicates
    }
}

impl Predicate for Combined {
    fn test(&self, value: &Value) -> Result<bool, BoxError> {
        for p in &self.predicates {
            if !p.test(value)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Logical inverse of a predicate. Errors pass through.
#[derive(Debug, Clone)]
pub struct Negate {
    inner: SharedPredicate,
}

impl Predicate for Negate {
    fn test(&self, value: &Value) -> Result<bool, BoxError> {
        self.inner.test(value).map(|matched| !matched)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Constructors
// ═══════════════════════════════════════════════════════════════════════════════

/// Matches truthy values.
#[must_use]
pub fn truthy() -> Truthy {
    Truthy
}

/// Matches values equal to `expected`.
pub fn equals(expected: impl Into<Value>) -> Equals {
    Equals::new(expected)
}

/// Matches values equal to one of `options`.
pub fn one_of<I>(options: I) -> OneOf
where
    I: IntoIterator,
    I::Item: Into<Value>,
{
    OneOf::new(options)
}

/// Matches values containing every one of `items`.
pub fn contains<I>(items: I) -> Contains
where
    I: IntoIterator,
    I::Item: Into<Value>,
{
    Contains::new(items)
}

/// Matches empty strings, arrays and objects.
#[must_use]
pub fn is_empty() -> IsEmpty {
    IsEmpty { empty: true }
}

/// Matches non-empty strings, arrays and objects.
#[must_use]
pub fn is_not_empty() -> IsEmpty {
    IsEmpty { empty: false }
}

/// Matches strings, arrays and objects of size `len`.
#[must_use]
pub fn is_length(len: usize) -> IsLength {
    IsLength { len }
}

/// Matches values whose text form matches `pattern`.
///
/// # Errors
///
/// Returns `Err` if the pattern is invalid.
pub fn match_regex(pattern: &str, flags: RegexFlags) -> Result<MatchRegex, regex::Error> {
    MatchRegex::new(pattern, flags)
}

/// Wrap an infallible closure.
pub fn custom<F>(f: F) -> Custom<F>
where
    F: Fn(&Value) -> bool + Send + Sync,
{
    Custom { f }
}

/// Wrap a fallible closure.
pub fn try_custom<F>(f: F) -> TryCustom<F>
where
    F: Fn(&Value) -> Result<bool, BoxError> + Send + Sync,
{
    TryCustom { f }
}

/// AND the given predicates together, short-circuiting left to right.
///
/// An empty combination matches everything (vacuous truth).
///
/// ```
/// use evroute::predicate::{self, Predicate, SharedPredicate};
/// use serde_json::json;
/// use std::sync::Arc;
///
/// let p = predicate::combine([
///     Arc::new(predicate::is_length(2)) as SharedPredicate,
///     Arc::new(predicate::contains(["maypy"])),
/// ]);
/// assert!(p.test(&json!(["power-events", "maypy"])).unwrap());
/// assert!(!p.test(&json!(["mapy"])).unwrap());
/// ```
pub fn combine<I>(predicates: I) -> Combined
where
    I: IntoIterator<Item = SharedPredicate>,
{
    Combined {
        predicates: predicates.into_iter().collect(),
    }
}

/// Invert a predicate.
pub fn negate(inner: SharedPredicate) -> Negate {
    Negate { inner }
}

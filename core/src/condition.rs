//! Condition - Boolean expressions over event values
//!
//! A [`ValueCondition`] looks up one value by path and tests it with a
//! predicate chain. [`Condition`] composes value conditions with AND, OR and
//! NOT.
//!
//! # INV: Absent → false
//!
//! If a value condition's path does not resolve, the condition is `false`.
//! Neither the transform nor the predicate runs, and nothing fails. This is
//! what lets one resolver route heterogeneous events: a route keyed on a field
//! some events lack simply does not match them.
//!
//! # Example
//!
//! ```
//! use evroute::{Condition, RegexFlags};
//! use serde_json::json;
//!
//! let order_created = Condition::value("detail.type").equals("order.created")
//!     & Condition::value("detail.items").is_not_empty();
//! let from_shop = Condition::value("source")
//!     .match_regex(r"^shop\.")
//!     .unwrap();
//!
//! let condition = order_created & !from_shop;
//!
//! let event = json!({
//!     "source": "backoffice",
//!     "detail": {"type": "order.created", "items": [1]}
//! });
//! assert!(condition.check(&event).unwrap());
//! ```

use crate::path::{lookup, Lookup, ValuePath};
use crate::predicate::{self, Predicate, RegexFlags, SharedPredicate};
use crate::trace::ConditionTrace;
use crate::{BoxError, ConditionError, Event, MAX_DEPTH};
use regex::Regex;
use serde_json::Value;
use std::fmt::{self, Debug};
use std::ops::{BitAnd, BitOr, Not};
use std::sync::Arc;

/// Transform applied to a found value before the predicate sees it.
pub type Transform = Arc<dyn Fn(&Value) -> Result<Value, BoxError> + Send + Sync>;

/// Whether a value condition has a predicate yet.
///
/// Checked explicitly: a [`ValueCondition`] in the `NotSet` state refuses to
/// evaluate.
#[derive(Clone, Default)]
pub enum PredicateState {
    /// No predicate attached yet.
    #[default]
    NotSet,
    /// The combined predicate chain.
    Set(SharedPredicate),
}

impl PredicateState {
    /// Returns `true` if a predicate is attached.
    #[must_use]
    pub fn is_set(&self) -> bool {
        matches!(self, Self::Set(_))
    }

    fn and(self, next: SharedPredicate) -> Self {
        match self {
            Self::NotSet => Self::Set(next),
            Self::Set(current) => Self::Set(Arc::new(predicate::combine([current, next]))),
        }
    }
}

impl Debug for PredicateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotSet => f.write_str("NotSet"),
            Self::Set(p) => f.debug_tuple("Set").field(p).finish(),
        }
    }
}

/// A condition on the value found at a path.
///
/// Built with an owned builder: every method consumes the condition and
/// returns a new one with one more predicate ANDed onto the chain. Once
/// built, a value condition is immutable and can be shared freely.
///
/// ```
/// use evroute::ValueCondition;
/// use serde_json::json;
///
/// let condition = ValueCondition::new("a").contains([1]).is_length(3);
/// assert!(condition.check(&json!({"a": [3, 2, 1]})).unwrap());
/// assert!(!condition.check(&json!({"a": [3, 1]})).unwrap());
/// assert!(!condition.check(&json!({"b": [1, 2, 3]})).unwrap()); // absent → false
/// ```
#[derive(Clone)]
pub struct ValueCondition {
    path: ValuePath,
    transform: Option<Transform>,
    predicate: PredicateState,
}

// Builder methods read like the checks they add (`is_truthy`, `is_length`)
#[allow(clippy::wrong_self_convention)]
impl ValueCondition {
    /// Create a condition on `path` with no predicate yet.
    pub fn new(path: impl Into<ValuePath>) -> Self {
        Self {
            path: path.into(),
            transform: None,
            predicate: PredicateState::NotSet,
        }
    }

    /// Create a condition whose found value goes through `transform` first.
    ///
    /// ```
    /// use evroute::ValueCondition;
    /// use serde_json::{json, Value};
    ///
    /// let condition = ValueCondition::with_transform("count", |v: &Value| {
    ///     let text = v.as_str().ok_or("count must be a string")?;
    ///     Ok(Value::from(text.parse::<i64>()?))
    /// })
    /// .matches(|v| v.as_i64().is_some_and(|n| n > 10));
    ///
    /// assert!(condition.check(&json!({"count": "42"})).unwrap());
    /// assert!(condition.check(&json!({"count": 42})).is_err());
    /// ```
    pub fn with_transform<F>(path: impl Into<ValuePath>, transform: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        Self::new(path).transform(transform)
    }

    /// Replace the value transform.
    #[must_use]
    pub fn transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    /// The path this condition reads.
    #[must_use]
    pub fn path(&self) -> &ValuePath {
        &self.path
    }

    /// The predicate state.
    #[must_use]
    pub fn predicate(&self) -> &PredicateState {
        &self.predicate
    }

    /// Returns `true` if a value transform is set.
    #[must_use]
    pub fn has_transform(&self) -> bool {
        self.transform.is_some()
    }

    /// AND an arbitrary predicate onto the chain.
    #[must_use]
    pub fn with_predicate(self, predicate: impl Predicate + 'static) -> Self {
        self.and_predicate(Arc::new(predicate))
    }

    /// AND an already shared predicate onto the chain.
    #[must_use]
    pub fn and_predicate(mut self, predicate: SharedPredicate) -> Self {
        self.predicate = self.predicate.and(predicate);
        self
    }

    /// The value is truthy.
    #[must_use]
    pub fn is_truthy(self) -> Self {
        self.with_predicate(predicate::truthy())
    }

    /// The value equals `expected`.
    #[must_use]
    pub fn equals(self, expected: impl Into<Value>) -> Self {
        self.with_predicate(predicate::equals(expected))
    }

    /// The value, as text, matches `pattern` somewhere.
    ///
    /// # Errors
    ///
    /// Returns [`ConditionError::InvalidPattern`] if the pattern is invalid.
    pub fn match_regex(self, pattern: &str) -> Result<Self, ConditionError> {
        self.match_regex_with(pattern, RegexFlags::default())
    }

    /// The value, as text, matches `pattern` under `flags`.
    ///
    /// # Errors
    ///
    /// Returns [`ConditionError::InvalidPattern`] if the pattern is invalid.
    pub fn match_regex_with(self, pattern: &str, flags: RegexFlags) -> Result<Self, ConditionError> {
        let p = predicate::match_regex(pattern, flags).map_err(|source| {
            ConditionError::InvalidPattern {
                pattern: pattern.to_owned(),
                source,
            }
        })?;
        Ok(self.with_predicate(p))
    }

    /// The value, as text, matches a precompiled regex.
    #[must_use]
    pub fn match_pattern(self, regex: Regex) -> Self {
        self.with_predicate(predicate::MatchRegex::from_regex(regex))
    }

    /// The value equals one of `options`.
    #[must_use]
    pub fn one_of<I>(self, options: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.with_predicate(predicate::one_of(options))
    }

    /// The value contains every one of `items`.
    #[must_use]
    pub fn contains<I>(self, items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.with_predicate(predicate::contains(items))
    }

    /// The value is a non-empty string, array or object.
    #[must_use]
    pub fn is_not_empty(self) -> Self {
        self.with_predicate(predicate::is_not_empty())
    }

    /// The value is an empty string, array or object.
    #[must_use]
    pub fn is_empty(self) -> Self {
        self.with_predicate(predicate::is_empty())
    }

    /// The value is a string, array or object of size `len`.
    #[must_use]
    pub fn is_length(self, len: usize) -> Self {
        self.with_predicate(predicate::is_length(len))
    }

    /// The value satisfies `f`.
    #[must_use]
    pub fn matches<F>(self, f: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.with_predicate(predicate::custom(f))
    }

    /// The value satisfies the fallible `f`. Failures propagate from `check`.
    #[must_use]
    pub fn try_matches<F>(self, f: F) -> Self
    where
        F: Fn(&Value) -> Result<bool, BoxError> + Send + Sync + 'static,
    {
        self.with_predicate(predicate::try_custom(f))
    }

    /// Negate the predicate chain, keeping path and transform.
    ///
    /// Unlike [`Condition::not`], absence still yields `false`: the negated
    /// predicate only runs on a found value.
    ///
    /// ```
    /// use evroute::{Condition, ValueCondition};
    /// use serde_json::json;
    ///
    /// let negated = ValueCondition::new("a.b").equals(2).negate();
    /// assert!(negated.check(&json!({"a": {"b": 1}})).unwrap());
    /// assert!(!negated.check(&json!({})).unwrap());
    ///
    /// let not = Condition::not(ValueCondition::new("a.b").equals(2));
    /// assert!(not.check(&json!({})).unwrap());
    /// ```
    #[must_use]
    pub fn negate(mut self) -> Self {
        self.predicate = match self.predicate {
            PredicateState::NotSet => PredicateState::NotSet,
            PredicateState::Set(p) => PredicateState::Set(Arc::new(predicate::negate(p))),
        };
        self
    }

    /// Evaluate against `event`.
    ///
    /// # Returns
    ///
    /// - `Ok(false)` if the path is absent (INV: Absent → false)
    /// - otherwise the predicate's verdict on the (transformed) value
    ///
    /// # Errors
    ///
    /// - [`ConditionError::NoPredicate`] if no predicate was attached, for any event
    /// - [`ConditionError::Transform`] / [`ConditionError::Predicate`] if
    ///   caller-supplied code failed
    pub fn check(&self, event: &Event) -> Result<bool, ConditionError> {
        let predicate = self.require_predicate()?;
        match lookup(event, &self.path) {
            Lookup::Absent => Ok(false),
            Lookup::Found(value) => self.test(predicate, value),
        }
    }

    /// Evaluate with a trace of the looked-up value.
    ///
    /// # Errors
    ///
    /// Same as [`check`](Self::check).
    pub fn check_with_trace(&self, event: &Event) -> Result<ConditionTrace, ConditionError> {
        let predicate = self.require_predicate()?;
        let found = lookup(event, &self.path);
        let matched = match found {
            Lookup::Absent => false,
            Lookup::Found(value) => self.test(predicate, value)?,
        };
        Ok(ConditionTrace::Value {
            matched,
            path: self.path.to_string(),
            value: found.value().cloned(),
            predicate: format!("{predicate:?}"),
        })
    }

    fn require_predicate(&self) -> Result<&SharedPredicate, ConditionError> {
        match &self.predicate {
            PredicateState::Set(p) => Ok(p),
            PredicateState::NotSet => Err(ConditionError::NoPredicate {
                path: self.path.to_string(),
            }),
        }
    }

    fn test(&self, predicate: &SharedPredicate, value: &Value) -> Result<bool, ConditionError> {
        let predicate_error = |source| ConditionError::Predicate {
            path: self.path.to_string(),
            source,
        };
        match &self.transform {
            None => predicate.test(value).map_err(predicate_error),
            Some(transform) => {
                let mapped = transform(value).map_err(|source| ConditionError::Transform {
                    path: self.path.to_string(),
                    source,
                })?;
                predicate.test(&mapped).map_err(predicate_error)
            }
        }
    }
}

impl Debug for ValueCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueCondition")
            .field("path", &self.path.as_str())
            .field("has_transform", &self.transform.is_some())
            .field("predicate", &self.predicate)
            .finish()
    }
}

/// Composite condition with boolean logic.
///
/// # Variants
///
/// - `Value` - A single value condition
/// - `And` - All must hold (short-circuit on first `false`; empty is `true`)
/// - `Or` - Any must hold (short-circuit on first `true`; empty is `false`)
/// - `Not` - Inverts the final result of the inner condition
///
/// The operators `&`, `|` and `!` build `And`, `Or` and `Not`.
#[derive(Clone)]
pub enum Condition {
    /// A value condition.
    Value(ValueCondition),

    /// All conditions must hold (logical AND).
    And(Vec<Condition>),

    /// Any condition must hold (logical OR).
    Or(Vec<Condition>),

    /// Inverts the inner condition (logical NOT).
    Not(Box<Condition>),
}

impl Condition {
    /// Start a value condition on `path`.
    pub fn value(path: impl Into<ValuePath>) -> ValueCondition {
        ValueCondition::new(path)
    }

    /// `left AND right`.
    pub fn and(left: impl Into<Condition>, right: impl Into<Condition>) -> Self {
        Self::And(vec![left.into(), right.into()])
    }

    /// `left OR right`.
    pub fn or(left: impl Into<Condition>, right: impl Into<Condition>) -> Self {
        Self::Or(vec![left.into(), right.into()])
    }

    /// `NOT inner`.
    pub fn not(inner: impl Into<Condition>) -> Self {
        Self::Not(Box::new(inner.into()))
    }

    /// AND of any number of conditions.
    pub fn all<I>(conditions: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Condition>,
    {
        Self::And(conditions.into_iter().map(Into::into).collect())
    }

    /// OR of any number of conditions.
    pub fn any<I>(conditions: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Condition>,
    {
        Self::Or(conditions.into_iter().map(Into::into).collect())
    }

    /// Evaluate this condition against `event`.
    ///
    /// # Errors
    ///
    /// Propagates the first [`ConditionError`] hit. Conditions skipped by
    /// short-circuiting are never evaluated, so they cannot fail.
    pub fn check(&self, event: &Event) -> Result<bool, ConditionError> {
        match self {
            Self::Value(v) => v.check(event),
            Self::And(conditions) => {
                for c in conditions {
                    if !c.check(event)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::Or(conditions) => {
                for c in conditions {
                    if c.check(event)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Self::Not(c) => c.check(event).map(|matched| !matched),
        }
    }

    /// Evaluate with full trace for debugging.
    ///
    /// Unlike [`check()`](Self::check), this does NOT short-circuit And/Or:
    /// every child is evaluated. The `matched` result is still the same.
    ///
    /// # Errors
    ///
    /// Propagates the first [`ConditionError`] hit, including from children
    /// `check` would have skipped.
    pub fn check_with_trace(&self, event: &Event) -> Result<ConditionTrace, ConditionError> {
        match self {
            Self::Value(v) => v.check_with_trace(event),
            Self::And(conditions) => {
                let children = conditions
                    .iter()
                    .map(|c| c.check_with_trace(event))
                    .collect::<Result<Vec<_>, _>>()?;
                let matched = children.iter().all(ConditionTrace::matched);
                Ok(ConditionTrace::And { matched, children })
            }
            Self::Or(conditions) => {
                let children = conditions
                    .iter()
                    .map(|c| c.check_with_trace(event))
                    .collect::<Result<Vec<_>, _>>()?;
                let matched = children.iter().any(ConditionTrace::matched);
                Ok(ConditionTrace::Or { matched, children })
            }
            Self::Not(c) => {
                let inner = c.check_with_trace(event)?;
                Ok(ConditionTrace::Not {
                    matched: !inner.matched(),
                    inner: Box::new(inner),
                })
            }
        }
    }

    /// Depth of this condition tree. A value condition has depth 1.
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Self::Value(_) => 1,
            Self::And(cs) | Self::Or(cs) => 1 + cs.iter().map(Self::depth).max().unwrap_or(0),
            Self::Not(c) => 1 + c.depth(),
        }
    }

    /// Validate ahead of evaluation.
    ///
    /// Checks:
    /// - Nesting depth does not exceed [`MAX_DEPTH`]
    /// - Every value condition has a predicate
    ///
    /// Call this when loading routes to catch mistakes before the first event.
    ///
    /// # Errors
    ///
    /// [`ConditionError::DepthExceeded`] or [`ConditionError::NoPredicate`].
    pub fn validate(&self) -> Result<(), ConditionError> {
        let depth = self.depth();
        if depth > MAX_DEPTH {
            return Err(ConditionError::DepthExceeded {
                depth,
                max: MAX_DEPTH,
            });
        }
        self.validate_predicates()
    }

    fn validate_predicates(&self) -> Result<(), ConditionError> {
        match self {
            Self::Value(v) => v.require_predicate().map(|_| ()),
            Self::And(cs) | Self::Or(cs) => cs.iter().try_for_each(Self::validate_predicates),
            Self::Not(c) => c.validate_predicates(),
        }
    }

    /// Returns `true` if this is a `Value` condition.
    #[must_use]
    pub fn is_value(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    /// Returns `true` if this is an `And` condition.
    #[must_use]
    pub fn is_and(&self) -> bool {
        matches!(self, Self::And(_))
    }

    /// Returns `true` if this is an `Or` condition.
    #[must_use]
    pub fn is_or(&self) -> bool {
        matches!(self, Self::Or(_))
    }

    /// Returns `true` if this is a `Not` condition.
    #[must_use]
    pub fn is_not(&self) -> bool {
        matches!(self, Self::Not(_))
    }
}

impl Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::And(cs) => f.debug_tuple("And").field(cs).finish(),
            Self::Or(cs) => f.debug_tuple("Or").field(cs).finish(),
            Self::Not(c) => f.debug_tuple("Not").field(c).finish(),
        }
    }
}

impl From<ValueCondition> for Condition {
    fn from(value: ValueCondition) -> Self {
        Self::Value(value)
    }
}

// `a & b & c` extends one `And` instead of nesting; AND is associative, and
// the flat form keeps the same left-to-right evaluation order.
impl<Rhs: Into<Condition>> BitAnd<Rhs> for Condition {
    type Output = Condition;

    fn bitand(self, rhs: Rhs) -> Condition {
        match self {
            Self::And(mut cs) => {
                cs.push(rhs.into());
                Self::And(cs)
            }
            other => Self::and(other, rhs),
        }
    }
}

impl<Rhs: Into<Condition>> BitOr<Rhs> for Condition {
    type Output = Condition;

    fn bitor(self, rhs: Rhs) -> Condition {
        match self {
            Self::Or(mut cs) => {
                cs.push(rhs.into());
                Self::Or(cs)
            }
            other => Self::or(other, rhs),
        }
    }
}

impl Not for Condition {
    type Output = Condition;

    fn not(self) -> Condition {
        Condition::Not(Box::new(self))
    }
}

impl<Rhs: Into<Condition>> BitAnd<Rhs> for ValueCondition {
    type Output = Condition;

    fn bitand(self, rhs: Rhs) -> Condition {
        Condition::and(self, rhs)
    }
}

impl<Rhs: Into<Condition>> BitOr<Rhs> for ValueCondition {
    type Output = Condition;

    fn bitor(self, rhs: Rhs) -> Condition {
        Condition::or(self, rhs)
    }
}

impl Not for ValueCondition {
    type Output = Condition;

    fn not(self) -> Condition {
        Condition::not(self)
    }
}

// Note: No unsafe impl needed. Transform and SharedPredicate are
// `Send + Sync` trait objects, so conditions are `Send + Sync`.

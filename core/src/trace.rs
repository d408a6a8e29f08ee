//! Evaluation trace types for debugging routing decisions.
//!
//! Trace types mirror [`Condition`](crate::Condition) but capture evaluation
//! results instead of inputs.
//!
//! # Two Levels of Trace
//!
//! - [`ConditionTrace`] - Per-condition: which sub-expressions held, which values were seen?
//! - [`RouteTrace`] - Per-route: did this route's condition match?
//!
//! # Example
//!
//! ```
//! use evroute::{Condition, Resolver};
//! use serde_json::json;
//!
//! let mut resolver = Resolver::new();
//! resolver
//!     .register_named("created", Condition::value("type").equals("created"), |_| Ok("c"))
//!     .register_named("deleted", Condition::value("type").equals("deleted"), |_| Ok("d"));
//!
//! for step in resolver.trace(&json!({"type": "created"})).unwrap() {
//!     println!("{}: matched={}\n{}", step.name, step.matched, step.condition);
//! }
//! ```

use serde_json::Value;
use std::fmt;

/// Trace of a condition evaluation.
///
/// In And/Or, ALL children are evaluated (no short-circuit) so the trace
/// shows every value. The `matched` result is still correct.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionTrace {
    /// A value condition evaluation.
    Value {
        /// Whether this condition held.
        matched: bool,
        /// The path as written.
        path: String,
        /// The value found at the path, `None` if absent.
        value: Option<Value>,
        /// Debug description of the predicate chain.
        predicate: String,
    },
    /// AND: all children must hold.
    And {
        /// Whether all children held.
        matched: bool,
        /// Trace of each child.
        children: Vec<ConditionTrace>,
    },
    /// OR: any child must hold.
    Or {
        /// Whether any child held.
        matched: bool,
        /// Trace of each child.
        children: Vec<ConditionTrace>,
    },
    /// NOT: inverts inner result.
    Not {
        /// Whether the NOT condition held (i.e., inner did NOT).
        matched: bool,
        /// Trace of the inner condition.
        inner: Box<ConditionTrace>,
    },
}

impl ConditionTrace {
    /// Get the overall result of this condition.
    #[must_use]
    pub fn matched(&self) -> bool {
        match self {
            Self::Value { matched, .. }
            | Self::And { matched, .. }
            | Self::Or { matched, .. }
            | Self::Not { matched, .. } => *matched,
        }
    }

    fn render(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let mark = if self.matched() { '+' } else { '-' };
        let pad = "  ".repeat(indent);
        match self {
            Self::Value {
                path,
                value,
                predicate,
                ..
            } => {
                let seen = value
                    .as_ref()
                    .map_or_else(|| "<absent>".to_owned(), Value::to_string);
                writeln!(f, "{pad}{mark} {path} = {seen} ? {predicate}")
            }
            Self::And { children, .. } | Self::Or { children, .. } => {
                let op = if matches!(self, Self::And { .. }) { "and" } else { "or" };
                writeln!(f, "{pad}{mark} {op}")?;
                children.iter().try_for_each(|c| c.render(f, indent + 1))
            }
            Self::Not { inner, .. } => {
                writeln!(f, "{pad}{mark} not")?;
                inner.render(f, indent + 1)
            }
        }
    }
}

/// Renders an indented tree, one node per line, `+` for held and `-` for not.
impl fmt::Display for ConditionTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, 0)
    }
}

/// One route's evaluation in a trace.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteTrace {
    /// Route name.
    pub name: String,
    /// Did the route's condition hold?
    pub matched: bool,
    /// Full condition evaluation trace.
    pub condition: ConditionTrace,
}

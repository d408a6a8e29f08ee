//! Error types.
//!
//! | Error | Raised by | Meaning |
//! |---|---|---|
//! | [`ConditionError`] | `Condition::check`, condition builders | misconfigured condition, or a caller-supplied transform/predicate failed |
//! | [`ResolveError`] | `Resolver::resolve` | the multiplicity policy was violated, or a condition/handler failed |
//!
//! Path absence is never an error: a missing value makes a condition `false`.

use crate::{BoxError, Event};
use thiserror::Error;

/// Errors from building or evaluating a condition.
///
/// `NoPredicate`, `InvalidPattern` and `DepthExceeded` are programming
/// mistakes; fix the condition and rebuild it. `Predicate` and `Transform`
/// carry the caller's own error as `source`, unmodified.
#[derive(Debug, Error)]
pub enum ConditionError {
    /// A value condition was checked before any predicate was attached.
    #[error("value condition on path \"{path}\" has no predicate; attach one (equals, one_of, ...) before checking")]
    NoPredicate {
        /// The condition's path.
        path: String,
    },

    /// A caller-supplied predicate failed.
    #[error("predicate on path \"{path}\" failed: {source}")]
    Predicate {
        /// The condition's path.
        path: String,
        /// The predicate's own error.
        #[source]
        source: BoxError,
    },

    /// The value transform failed.
    #[error("value transform on path \"{path}\" failed: {source}")]
    Transform {
        /// The condition's path.
        path: String,
        /// The transform's own error.
        #[source]
        source: BoxError,
    },

    /// A regex pattern failed to compile.
    #[error("invalid pattern \"{pattern}\": {source}")]
    InvalidPattern {
        /// The pattern as written.
        pattern: String,
        /// The compile error.
        #[source]
        source: regex::Error,
    },

    /// Condition nesting exceeds [`MAX_DEPTH`](crate::MAX_DEPTH).
    #[error("condition nesting depth is {depth}, but maximum allowed is {max}; flatten the condition")]
    DepthExceeded {
        /// Actual depth.
        depth: usize,
        /// Maximum allowed depth.
        max: usize,
    },
}

/// Errors from [`Resolver::resolve`](crate::Resolver::resolve).
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No route matched and the resolver does not allow that.
    #[error("no route found for event (registered routes: [{}])", .routes.join(", "))]
    NoRoute {
        /// The event that was being resolved.
        event: Event,
        /// Every registered route name, in registration order.
        routes: Vec<String>,
    },

    /// More than one route matched and the resolver does not allow that.
    #[error("multiple routes matched event: [{}]", .routes.join(", "))]
    MultipleRoutes {
        /// The event that was being resolved.
        event: Event,
        /// The matched route names, in registration order.
        routes: Vec<String>,
    },

    /// A route's condition could not be evaluated.
    #[error("condition of route \"{route}\" failed: {source}")]
    Condition {
        /// The route name.
        route: String,
        /// The underlying condition error.
        #[source]
        source: ConditionError,
    },

    /// A handler failed. Handlers before it have already run.
    #[error("handler \"{route}\" failed: {source}")]
    Handler {
        /// The route name.
        route: String,
        /// The handler's own error.
        #[source]
        source: BoxError,
    },
}

impl ResolveError {
    /// The route names carried by `NoRoute` / `MultipleRoutes`.
    #[must_use]
    pub fn routes(&self) -> &[String] {
        match self {
            Self::NoRoute { routes, .. } | Self::MultipleRoutes { routes, .. } => routes,
            Self::Condition { .. } | Self::Handler { .. } => &[],
        }
    }

    /// A short, stable identifier for the error kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoRoute { .. } => "no_route",
            Self::MultipleRoutes { .. } => "multiple_routes",
            Self::Condition { .. } => "condition",
            Self::Handler { .. } => "handler",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_no_route_display_lists_routes() {
        let err = ResolveError::NoRoute {
            event: json!({"a": 1}),
            routes: vec!["handle_a".into(), "handle_b".into()],
        };
        assert_eq!(
            err.to_string(),
            "no route found for event (registered routes: [handle_a, handle_b])"
        );
        assert_eq!(err.kind(), "no_route");
        assert_eq!(err.routes().len(), 2);
    }

    #[test]
    fn test_handler_error_keeps_source() {
        let err = ResolveError::Handler {
            route: "handle".into(),
            source: "boom".into(),
        };
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("boom"));
        assert!(err.routes().is_empty());
    }

    #[test]
    fn test_errors_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ConditionError>();
        assert_send_sync::<ResolveError>();
    }
}

//! evroute - declarative event routing
//!
//! Decide which handlers run for an inbound event, based on conditions over
//! values nested inside the event.
//!
//! # Architecture
//!
//! - [`ValuePath`] + [`lookup`] - Locate a value by dotted path, or report it absent
//! - [`Predicate`] - Test a found value (built-ins live in [`predicate`])
//! - [`ValueCondition`] - Path + optional transform + predicate chain
//! - [`Condition`] - Boolean composition (Value, And, Or, Not)
//! - [`Route<R>`] - Condition + handler
//! - [`Resolver<R>`] - Evaluates every route and applies the multiplicity policy
//!
//! # Key Design Insights
//!
//! 1. **Absent → false**: When a path does not resolve, the value condition is
//!    `false`. Transforms and predicates never see missing data.
//!
//! 2. **Immutable conditions**: builder methods consume and return, so a
//!    condition can be extended without affecting copies already registered.
//!
//! 3. **Explicit unset state**: a value condition without a predicate is a
//!    programming error, reported by [`ConditionError::NoPredicate`] on every
//!    check and by [`Condition::validate`] up front.
//!
//! # Example
//!
//! ```
//! use evroute::prelude::*;
//! use serde_json::json;
//!
//! fn handle_test(_: &Event) -> Result<&'static str, BoxError> {
//!     Ok("test")
//! }
//!
//! fn handle_d(_: &Event) -> Result<&'static str, BoxError> {
//!     Ok("d")
//! }
//!
//! let mut resolver = Resolver::with_policy(true, true);
//! resolver.when(Condition::value("a.b.c").one_of(["TEST"])).to(handle_test);
//! resolver.equal("a.d", 1).to(handle_d);
//!
//! let event = json!({"a": {"b": {"c": "TEST"}, "d": 1}});
//! assert_eq!(resolver.resolve(&event).unwrap(), ["test", "d"]);
//! ```
//!
//! # Features
//!
//! - `config` (default) - JSON/YAML route tables via [`ResolverConfig`] and
//!   [`HandlerRegistry`]

// ═══════════════════════════════════════════════════════════════════════════════
// Modules
// ═══════════════════════════════════════════════════════════════════════════════

mod condition;
mod error;
mod observer;
mod path;
pub mod predicate;
mod resolver;
mod route;
mod trace;

#[cfg(feature = "config")]
mod config;
#[cfg(feature = "config")]
mod registry;

// ═══════════════════════════════════════════════════════════════════════════════
// Public API
// ═══════════════════════════════════════════════════════════════════════════════

// Core types
pub use condition::{Condition, PredicateState, Transform, ValueCondition};
pub use observer::{NoopObserver, ResolveObserver, TracingObserver};
pub use path::{lookup, Lookup, ValuePath};
pub use predicate::{Predicate, RegexFlags, SharedPredicate};
pub use resolver::{Registration, Resolver, ResolverBuilder};
pub use route::{handler_name, Handler, Route};

// Errors
pub use error::{ConditionError, ResolveError};

// Trace types
pub use trace::{ConditionTrace, RouteTrace};

// Config (feature-gated)
#[cfg(feature = "config")]
pub use config::{
    AllConfig, AnyConfig, ConditionConfig, ConfigError, DetailedRegexConfig, NotConfig,
    RegexConfig, ResolverConfig, RouteConfig, ValueConditionConfig,
};
#[cfg(feature = "config")]
pub use registry::{HandlerRegistry, HandlerRegistryBuilder};

/// An inbound event: a nested key/value record.
pub type Event = serde_json::Value;

/// Error type for caller-supplied code (handlers, transforms, custom predicates).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// ═══════════════════════════════════════════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════════════════════════════════════════

/// Prelude module for convenient imports.
///
/// ```
/// use evroute::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        // Aliases
        BoxError,
        // Core types
        Condition,
        // Errors
        ConditionError,
        // Trace types
        ConditionTrace,
        Event,
        // Traits
        Handler,
        Predicate,
        RegexFlags,
        ResolveError,
        ResolveObserver,
        Resolver,
        Route,
        RouteTrace,
        ValueCondition,
        ValuePath,
    };

    #[cfg(feature = "config")]
    pub use crate::{ConfigError, HandlerRegistry, ResolverConfig};
}

// ═══════════════════════════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════════════════════════

/// Maximum allowed nesting depth of a [`Condition`].
///
/// Protects against stack overflow from deeply nested conditions.
/// Checked by [`Condition::validate`] and at config load time.
pub const MAX_DEPTH: usize = 32;

/// Maximum number of routes in a loaded route table.
pub const MAX_ROUTES: usize = 256;

/// Maximum number of children in a single configured `and` / `or`.
///
/// Width limit complementing [`MAX_DEPTH`].
pub const MAX_CONDITIONS_PER_COMPOUND: usize = 256;

/// Maximum length of a configured regex pattern.
///
/// Compilation cost grows with pattern size even with the linear-time `regex` crate.
pub const MAX_REGEX_PATTERN_LENGTH: usize = 4096;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_types_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Condition>();
        assert_send_sync::<Resolver<String>>();
        assert_send_sync::<ConditionError>();
        assert_send_sync::<ResolveError>();
        assert_send_sync::<ConditionTrace>();
    }
}

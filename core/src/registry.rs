//! Handler registry for config-driven resolver construction.
//!
//! Route tables name their handlers; the registry maps those names to
//! functions. Handlers are type-erased behind `Arc<dyn Handler<R>>` at
//! registration time, so one registry can build any number of resolvers.
//!
//! # Example
//!
//! ```
//! use evroute::{BoxError, Event, HandlerRegistry, ResolverConfig};
//! use serde_json::json;
//!
//! fn handle_test(_: &Event) -> Result<&'static str, BoxError> {
//!     Ok("lol")
//! }
//!
//! let registry = HandlerRegistry::builder()
//!     .handler("handle_test", handle_test)
//!     .build();
//!
//! let config = ResolverConfig::from_yaml(
//!     "routes:\n  - handler: handle_test\n    when: { path: a.b, equals: TEST }\n",
//! )?;
//! let resolver = registry.load_resolver(&config)?;
//!
//! assert_eq!(resolver.resolve(&json!({"a": {"b": "TEST"}}))?, ["lol"]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::config::{ConfigError, ResolverConfig};
use crate::{BoxError, Event, Handler, Resolver, Route, MAX_ROUTES};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Builder for constructing a [`HandlerRegistry`].
///
/// Register handlers by name, then call [`build()`](Self::build) to freeze
/// the registry. Registering a name twice keeps the last handler.
pub struct HandlerRegistryBuilder<R> {
    handlers: HashMap<String, Arc<dyn Handler<R>>>,
}

impl<R: 'static> HandlerRegistryBuilder<R> {
    /// Create a new empty registry builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler function under `name`.
    #[must_use]
    pub fn handler<F>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Event) -> Result<R, BoxError> + Send + Sync + 'static,
    {
        self.shared(name, Arc::new(handler))
    }

    /// Register an already shared handler, e.g. a type implementing
    /// [`Handler`] directly.
    #[must_use]
    pub fn shared(mut self, name: impl Into<String>, handler: Arc<dyn Handler<R>>) -> Self {
        self.handlers.insert(name.into(), handler);
        self
    }

    /// Freeze the registry. No further registration is possible.
    #[must_use]
    pub fn build(self) -> HandlerRegistry<R> {
        HandlerRegistry {
            handlers: self.handlers,
        }
    }
}

impl<R: 'static> Default for HandlerRegistryBuilder<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable map from handler names to handlers.
pub struct HandlerRegistry<R> {
    handlers: HashMap<String, Arc<dyn Handler<R>>>,
}

impl<R: 'static> HandlerRegistry<R> {
    /// Start building a registry.
    #[must_use]
    pub fn builder() -> HandlerRegistryBuilder<R> {
        HandlerRegistryBuilder::new()
    }

    /// Build a [`Resolver`] from a route table.
    ///
    /// Routes keep their configured order. Every condition is validated, so
    /// a loaded resolver never fails with [`ConditionError::NoPredicate`](crate::ConditionError::NoPredicate).
    ///
    /// # Errors
    ///
    /// - [`ConfigError::TooManyRoutes`] - more than [`MAX_ROUTES`] routes
    /// - [`ConfigError::UnknownHandler`] - a route names an unregistered handler
    /// - any error from [`ConditionConfig::build`](crate::ConditionConfig::build)
    pub fn load_resolver(&self, config: &ResolverConfig) -> Result<Resolver<R>, ConfigError> {
        if config.routes.len() > MAX_ROUTES {
            return Err(ConfigError::TooManyRoutes {
                count: config.routes.len(),
                max: MAX_ROUTES,
            });
        }

        let mut resolver =
            Resolver::with_policy(config.allow_multiple_routes, config.allow_no_route);
        for route in &config.routes {
            let handler =
                self.handlers
                    .get(&route.handler)
                    .ok_or_else(|| ConfigError::UnknownHandler {
                        name: route.handler.clone(),
                        available: self.names().into_iter().map(str::to_owned).collect(),
                    })?;
            let name = route.route_name();
            let condition = route.when.build(name)?;
            resolver.add_route(Route::from_shared(name, condition, Arc::clone(handler)));
        }
        tracing::debug!(routes = resolver.len(), "loaded resolver");
        Ok(resolver)
    }
}

impl<R> HandlerRegistry<R> {
    /// Returns the number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Returns `true` if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Returns the registered handler names (sorted).
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl<R> fmt::Debug for HandlerRegistry<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConditionError, ResolveError};
    use serde_json::json;

    fn registry() -> HandlerRegistry<String> {
        HandlerRegistry::builder()
            .handler("handle_test", |_: &Event| Ok("test".to_owned()))
            .handler("handle_d", |_: &Event| Ok("d".to_owned()))
            .build()
    }

    #[test]
    fn test_builder_and_queries() {
        let registry = registry();
        assert_eq!(registry.len(), 2);
        assert!(!registry.is_empty());
        assert!(registry.contains("handle_d"));
        assert!(!registry.contains("handle_x"));
        assert_eq!(registry.names(), ["handle_d", "handle_test"]);
    }

    #[test]
    fn test_load_resolver_keeps_order_and_policy() {
        let config = ResolverConfig::from_yaml(
            r"
allow_multiple_routes: true
routes:
  - handler: handle_test
    when: { path: a.b.c, one_of: [TEST] }
  - handler: handle_d
    when: { path: a.d, equals: 1 }
",
        )
        .unwrap();
        let resolver = registry().load_resolver(&config).unwrap();

        assert!(resolver.allows_multiple_routes());
        assert_eq!(resolver.route_names(), ["handle_test", "handle_d"]);
        let event = json!({"a": {"b": {"c": "TEST"}, "d": 1}});
        assert_eq!(resolver.resolve(&event).unwrap(), ["test", "d"]);
    }

    #[test]
    fn test_one_handler_under_several_routes() {
        let config = ResolverConfig::from_yaml(
            r"
allow_no_route: false
routes:
  - { handler: handle_d, name: first, when: { path: a, equals: 1 } }
  - { handler: handle_d, name: second, when: { path: a, equals: 2 } }
",
        )
        .unwrap();
        let resolver = registry().load_resolver(&config).unwrap();

        assert_eq!(resolver.route_names(), ["first", "second"]);
        assert_eq!(resolver.resolve(&json!({"a": 2})).unwrap(), ["d"]);
        let err = resolver.resolve(&json!({"a": 3})).unwrap_err();
        assert!(matches!(err, ResolveError::NoRoute { ref routes, .. } if routes == &["first", "second"]));
    }

    #[test]
    fn test_unknown_handler() {
        let config = ResolverConfig::from_yaml(
            "routes:\n  - { handler: nope, when: { path: a, is_truthy: true } }\n",
        )
        .unwrap();
        let err = registry().load_resolver(&config).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnknownHandler { ref name, ref available }
                if name == "nope" && available == &["handle_d", "handle_test"]
        ));
    }

    #[test]
    fn test_condition_without_predicate_rejected_at_load() {
        let config =
            ResolverConfig::from_yaml("routes:\n  - { handler: handle_d, when: { path: a } }\n")
                .unwrap();
        let err = registry().load_resolver(&config).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Condition { source: ConditionError::NoPredicate { .. }, .. }
        ));
    }

    #[test]
    fn test_too_many_routes() {
        let route = "  - { handler: handle_d, when: { path: a, is_truthy: true } }\n";
        let yaml = format!("routes:\n{}", route.repeat(MAX_ROUTES + 1));
        let config = ResolverConfig::from_yaml(&yaml).unwrap();
        assert!(matches!(
            registry().load_resolver(&config),
            Err(ConfigError::TooManyRoutes { .. })
        ));
    }

    #[test]
    fn test_registry_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<HandlerRegistry<String>>();
    }
}

//! Resolver - match an event against every registered route
//!
//! # Resolution
//!
//! 1. Evaluate every route's condition in registration order.
//! 2. Apply the multiplicity policy:
//!
//! | matched | policy | outcome |
//! |---|---|---|
//! | 0 | `allow_no_route = false` | [`ResolveError::NoRoute`] |
//! | 0 | `allow_no_route = true` | observer notified, empty result |
//! | > 1 | `allow_multiple_routes = false` | [`ResolveError::MultipleRoutes`] |
//! | > 1 | `allow_multiple_routes = true` | observer notified, all handlers run |
//!
//! 3. Invoke the matched handlers in registration order and collect results.
//!
//! The no-route check comes first. Handlers only run once the whole match set
//! is known and accepted.
//!
//! # Example
//!
//! ```
//! use evroute::{BoxError, Condition, Event, Resolver};
//! use serde_json::json;
//!
//! fn handle_created(event: &Event) -> Result<String, BoxError> {
//!     Ok(format!("created {}", event["id"]))
//! }
//!
//! let mut resolver = Resolver::new();
//! resolver.equal("type", "created").to(handle_created);
//! let _ = resolver
//!     .when(Condition::value("type").one_of(["deleted", "archived"]))
//!     .named("gone")
//!     .to(|_: &Event| Ok("gone".to_owned()));
//!
//! assert_eq!(
//!     resolver.resolve(&json!({"type": "created", "id": 7})).unwrap(),
//!     ["created 7"]
//! );
//! assert!(resolver.resolve(&json!({"type": "updated"})).unwrap().is_empty());
//! ```

use crate::observer::{ResolveObserver, TracingObserver};
use crate::path::ValuePath;
use crate::route::Route;
use crate::trace::RouteTrace;
use crate::{BoxError, Condition, Event, ResolveError};
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Builder for a [`Resolver`] with a non-default policy or observer.
///
/// ```
/// use evroute::{NoopObserver, Resolver};
///
/// let resolver = Resolver::<()>::builder()
///     .allow_multiple_routes(true)
///     .allow_no_route(false)
///     .observer(NoopObserver)
///     .build();
/// assert!(resolver.allows_multiple_routes());
/// assert!(!resolver.allows_no_route());
/// ```
pub struct ResolverBuilder<R> {
    allow_multiple_routes: bool,
    allow_no_route: bool,
    observer: Option<Arc<dyn ResolveObserver>>,
    _result: PhantomData<fn() -> R>,
}

impl<R: 'static> ResolverBuilder<R> {
    /// Start from the default policy: at most one match, zero matches accepted.
    #[must_use]
    pub fn new() -> Self {
        Self {
            allow_multiple_routes: false,
            allow_no_route: true,
            observer: None,
            _result: PhantomData,
        }
    }

    /// Accept events matched by more than one route.
    #[must_use]
    pub fn allow_multiple_routes(mut self, allow: bool) -> Self {
        self.allow_multiple_routes = allow;
        self
    }

    /// Accept events matched by no route.
    #[must_use]
    pub fn allow_no_route(mut self, allow: bool) -> Self {
        self.allow_no_route = allow;
        self
    }

    /// Replace the default [`TracingObserver`].
    #[must_use]
    pub fn observer(mut self, observer: impl ResolveObserver + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Create an empty resolver with this policy.
    #[must_use]
    pub fn build(self) -> Resolver<R> {
        Resolver {
            routes: Vec::new(),
            allow_multiple_routes: self.allow_multiple_routes,
            allow_no_route: self.allow_no_route,
            observer: self.observer.unwrap_or_else(|| Arc::new(TracingObserver)),
        }
    }
}

impl<R: 'static> Default for ResolverBuilder<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> fmt::Debug for ResolverBuilder<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverBuilder")
            .field("allow_multiple_routes", &self.allow_multiple_routes)
            .field("allow_no_route", &self.allow_no_route)
            .field("observer", &self.observer)
            .finish()
    }
}

/// Routes events to handlers.
///
/// Routes are appended with `&mut self` and never removed; resolution takes
/// `&self`, so a fully registered resolver can be shared across threads.
pub struct Resolver<R> {
    routes: Vec<Route<R>>,
    allow_multiple_routes: bool,
    allow_no_route: bool,
    observer: Arc<dyn ResolveObserver>,
}

impl<R: 'static> Resolver<R> {
    /// Create a resolver with the default policy
    /// (`allow_multiple_routes = false`, `allow_no_route = true`).
    #[must_use]
    pub fn new() -> Self {
        ResolverBuilder::new().build()
    }

    /// Start building a resolver.
    #[must_use]
    pub fn builder() -> ResolverBuilder<R> {
        ResolverBuilder::new()
    }

    /// Create a resolver with an explicit policy.
    #[must_use]
    pub fn with_policy(allow_multiple_routes: bool, allow_no_route: bool) -> Self {
        ResolverBuilder::new()
            .allow_multiple_routes(allow_multiple_routes)
            .allow_no_route(allow_no_route)
            .build()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Registration
    // ═══════════════════════════════════════════════════════════════════════

    /// Register `handler` under `condition` and hand the handler back.
    ///
    /// The route is named after the handler (see [`handler_name`](crate::handler_name)).
    /// A returned closure that is not kept trips `unused_must_use`; bind it
    /// to `let _ =` or use [`register_named`](Self::register_named).
    pub fn register<F>(&mut self, condition: impl Into<Condition>, handler: F) -> F
    where
        F: Fn(&Event) -> Result<R, BoxError> + Clone + Send + Sync + 'static,
    {
        self.add_route(Route::new(condition, handler.clone()));
        handler
    }

    /// Register a route under an explicit name.
    pub fn register_named<F>(
        &mut self,
        name: impl Into<String>,
        condition: impl Into<Condition>,
        handler: F,
    ) -> &mut Self
    where
        F: Fn(&Event) -> Result<R, BoxError> + Send + Sync + 'static,
    {
        self.add_route(Route::named(name, condition, handler))
    }

    /// Register `handler` for events whose value at `path` equals `expected`.
    pub fn register_equal<F>(
        &mut self,
        path: impl Into<ValuePath>,
        expected: impl Into<Value>,
        handler: F,
    ) -> F
    where
        F: Fn(&Event) -> Result<R, BoxError> + Clone + Send + Sync + 'static,
    {
        self.register(Condition::value(path).equals(expected), handler)
    }

    /// Register `handler` for events whose value at `path` is one of `options`.
    pub fn register_one_of<F, I>(&mut self, path: impl Into<ValuePath>, options: I, handler: F) -> F
    where
        F: Fn(&Event) -> Result<R, BoxError> + Clone + Send + Sync + 'static,
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.register(Condition::value(path).one_of(options), handler)
    }

    /// Append a prebuilt route.
    pub fn add_route(&mut self, route: Route<R>) -> &mut Self {
        self.routes.push(route);
        self
    }

    /// Start a registration under `condition`; finish it with
    /// [`Registration::to`].
    pub fn when(&mut self, condition: impl Into<Condition>) -> Registration<'_, R> {
        Registration {
            resolver: self,
            condition: condition.into(),
            name: None,
        }
    }

    /// Start a registration for `path == expected`.
    pub fn equal(
        &mut self,
        path: impl Into<ValuePath>,
        expected: impl Into<Value>,
    ) -> Registration<'_, R> {
        self.when(Condition::value(path).equals(expected))
    }

    /// Start a registration for `path` in `options`.
    pub fn one_of<I>(&mut self, path: impl Into<ValuePath>, options: I) -> Registration<'_, R>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.when(Condition::value(path).one_of(options))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Resolution
    // ═══════════════════════════════════════════════════════════════════════

    /// Resolve `event` and run the selected handlers.
    ///
    /// Returns one result per matched route, in registration order.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::Condition`] - a route condition failed; no handler ran
    /// - [`ResolveError::NoRoute`] / [`ResolveError::MultipleRoutes`] - the
    ///   policy rejected the match set; no handler ran
    /// - [`ResolveError::Handler`] - a handler failed; handlers registered
    ///   before it have already run and later ones have not
    pub fn resolve(&self, event: &Event) -> Result<Vec<R>, ResolveError> {
        let matched = self.matched(event)?;

        if matched.is_empty() {
            let routes = self.route_names();
            if !self.allow_no_route {
                return Err(ResolveError::NoRoute {
                    event: event.clone(),
                    routes: routes.into_iter().map(str::to_owned).collect(),
                });
            }
            self.observer.on_no_route(event, &routes);
            return Ok(Vec::new());
        }

        let names: Vec<&str> = matched.iter().map(|r| r.name()).collect();
        if names.len() > 1 {
            if !self.allow_multiple_routes {
                return Err(ResolveError::MultipleRoutes {
                    event: event.clone(),
                    routes: names.into_iter().map(str::to_owned).collect(),
                });
            }
            self.observer.on_multiple_routes(event, &names);
        }
        tracing::debug!(routes = ?names, "resolved event");

        matched
            .into_iter()
            .map(|route| {
                route.call(event).map_err(|source| ResolveError::Handler {
                    route: route.name().to_owned(),
                    source,
                })
            })
            .collect()
    }

    /// Names of the routes matching `event`, without applying the policy or
    /// running handlers.
    ///
    /// # Errors
    ///
    /// [`ResolveError::Condition`] if a route condition failed.
    pub fn matching_routes(&self, event: &Event) -> Result<Vec<&str>, ResolveError> {
        Ok(self.matched(event)?.into_iter().map(Route::name).collect())
    }

    /// Evaluate every route with a full condition trace.
    ///
    /// # Errors
    ///
    /// [`ResolveError::Condition`] if a route condition failed.
    pub fn trace(&self, event: &Event) -> Result<Vec<RouteTrace>, ResolveError> {
        self.routes
            .iter()
            .map(|route| {
                let condition = route
                    .condition()
                    .check_with_trace(event)
                    .map_err(|source| ResolveError::Condition {
                        route: route.name().to_owned(),
                        source,
                    })?;
                Ok(RouteTrace {
                    name: route.name().to_owned(),
                    matched: condition.matched(),
                    condition,
                })
            })
            .collect()
    }

    fn matched(&self, event: &Event) -> Result<Vec<&Route<R>>, ResolveError> {
        let mut matched = Vec::new();
        for route in &self.routes {
            let hit = route
                .matches(event)
                .map_err(|source| ResolveError::Condition {
                    route: route.name().to_owned(),
                    source,
                })?;
            if hit {
                matched.push(route);
            }
        }
        Ok(matched)
    }

    /// Registered routes, in registration order.
    #[must_use]
    pub fn routes(&self) -> &[Route<R>] {
        &self.routes
    }

    /// Registered route names, in registration order.
    #[must_use]
    pub fn route_names(&self) -> Vec<&str> {
        self.routes.iter().map(|r| r.name()).collect()
    }

    /// Number of registered routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` if no route is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Whether more than one matching route is accepted.
    #[must_use]
    pub fn allows_multiple_routes(&self) -> bool {
        self.allow_multiple_routes
    }

    /// Whether an event matching no route is accepted.
    #[must_use]
    pub fn allows_no_route(&self) -> bool {
        self.allow_no_route
    }
}

impl<R: 'static> Default for Resolver<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> fmt::Debug for Resolver<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("routes", &self.routes)
            .field("allow_multiple_routes", &self.allow_multiple_routes)
            .field("allow_no_route", &self.allow_no_route)
            .field("observer", &self.observer)
            .finish()
    }
}

/// A pending registration returned by [`Resolver::when`], [`Resolver::equal`]
/// and [`Resolver::one_of`].
#[must_use = "a registration does nothing until `.to(handler)` is called"]
pub struct Registration<'a, R> {
    resolver: &'a mut Resolver<R>,
    condition: Condition,
    name: Option<String>,
}

impl<R: 'static> Registration<'_, R> {
    /// Override the route name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Register `handler` and hand it back.
    ///
    /// Discarding a returned closure trips `unused_must_use`; write
    /// `let _ = resolver.when(..).to(|_| ..);`.
    pub fn to<F>(self, handler: F) -> F
    where
        F: Fn(&Event) -> Result<R, BoxError> + Clone + Send + Sync + 'static,
    {
        let route = match self.name {
            Some(name) => Route::named(name, self.condition, handler.clone()),
            None => Route::new(self.condition, handler.clone()),
        };
        self.resolver.add_route(route);
        handler
    }
}

impl<R> fmt::Debug for Registration<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("condition", &self.condition)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConditionError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn handle_a(_: &Event) -> Result<&'static str, BoxError> {
        Ok("a")
    }

    fn handle_b(_: &Event) -> Result<&'static str, BoxError> {
        Ok("b")
    }

    fn fail(_: &Event) -> Result<&'static str, BoxError> {
        Err("handler failed".into())
    }

    #[derive(Debug, Default)]
    struct Recording {
        none: Mutex<Vec<Vec<String>>>,
        multiple: Mutex<Vec<Vec<String>>>,
    }

    impl ResolveObserver for Arc<Recording> {
        fn on_no_route(&self, _: &Event, routes: &[&str]) {
            let routes = routes.iter().map(ToString::to_string).collect();
            self.none.lock().unwrap().push(routes);
        }

        fn on_multiple_routes(&self, _: &Event, matched: &[&str]) {
            let matched = matched.iter().map(ToString::to_string).collect();
            self.multiple.lock().unwrap().push(matched);
        }
    }

    // ========== Policy ==========

    #[test]
    fn test_default_policy() {
        let resolver = Resolver::<()>::new();
        assert!(!resolver.allows_multiple_routes());
        assert!(resolver.allows_no_route());
        assert!(resolver.is_empty());
    }

    #[test]
    fn test_no_route_allowed_returns_empty_and_notifies() {
        let recording = Arc::new(Recording::default());
        let mut resolver = Resolver::builder().observer(Arc::clone(&recording)).build();
        resolver.register_equal("a", 1, handle_a);

        assert!(resolver.resolve(&json!({"a": 2})).unwrap().is_empty());
        assert_eq!(*recording.none.lock().unwrap(), vec![vec!["handle_a".to_owned()]]);
    }

    #[test]
    fn test_no_route_disallowed() {
        let mut resolver = Resolver::with_policy(false, false);
        resolver.register_equal("a", 1, handle_a);
        resolver.register_equal("a", 2, handle_b);

        let err = resolver.resolve(&json!({"a": 3})).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::NoRoute { ref routes, .. } if routes == &["handle_a", "handle_b"]
        ));
    }

    #[test]
    fn test_no_route_disallowed_on_empty_resolver() {
        let resolver = Resolver::<()>::with_policy(false, false);
        let err = resolver.resolve(&json!({"a": 1})).unwrap_err();
        assert!(matches!(err, ResolveError::NoRoute { ref routes, .. } if routes.is_empty()));
    }

    #[test]
    fn test_multiple_routes_disallowed_runs_no_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut resolver = Resolver::new();
        for name in ["first", "second"] {
            let calls = Arc::clone(&calls);
            resolver.register_named(name, Condition::value("a").equals(1), move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        let err = resolver.resolve(&json!({"a": 1})).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::MultipleRoutes { ref routes, .. } if routes == &["first", "second"]
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_multiple_routes_allowed_notifies_and_runs_in_order() {
        let recording = Arc::new(Recording::default());
        let mut resolver = Resolver::builder()
            .allow_multiple_routes(true)
            .observer(Arc::clone(&recording))
            .build();
        resolver.register_equal("a", 1, handle_b);
        resolver.register(Condition::value("a").is_truthy(), handle_a);

        assert_eq!(resolver.resolve(&json!({"a": 1})).unwrap(), ["b", "a"]);
        assert_eq!(
            *recording.multiple.lock().unwrap(),
            vec![vec!["handle_b".to_owned(), "handle_a".to_owned()]]
        );
    }

    #[test]
    fn test_no_route_checked_before_multiple() {
        let mut resolver = Resolver::with_policy(false, false);
        resolver.register_equal("a", 1, handle_a);
        resolver.register_equal("a", 1, handle_b);
        assert!(matches!(
            resolver.resolve(&json!({})),
            Err(ResolveError::NoRoute { .. })
        ));
    }

    // ========== Errors ==========

    #[test]
    fn test_condition_error_aborts_before_handlers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let mut resolver = Resolver::with_policy(true, true);
        resolver.register_named("counted", Condition::value("a").is_truthy(), move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        resolver.register_named("broken", Condition::value("a"), |_| Ok(()));

        let err = resolver.resolve(&json!({"a": 1})).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::Condition { ref route, source: ConditionError::NoPredicate { .. } }
                if route == "broken"
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_handler_error_stops_later_handlers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut resolver = Resolver::with_policy(true, true);
        let before = Arc::clone(&calls);
        resolver.register_named("before", Condition::value("a").is_truthy(), move |_| {
            before.fetch_add(1, Ordering::SeqCst);
            Ok("before")
        });
        resolver.register(Condition::value("a").is_truthy(), fail);
        let after = Arc::clone(&calls);
        resolver.register_named("after", Condition::value("a").is_truthy(), move |_| {
            after.fetch_add(10, Ordering::SeqCst);
            Ok("after")
        });

        let err = resolver.resolve(&json!({"a": 1})).unwrap_err();
        assert!(matches!(err, ResolveError::Handler { ref route, .. } if route == "fail"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    // ========== Registration ==========

    #[test]
    fn test_register_returns_handler() {
        let mut resolver = Resolver::new();
        let handler = resolver.register(Condition::value("a").equals(1), handle_a);
        assert_eq!(handler(&json!({})).unwrap(), "a");

        let handler = resolver.equal("b", 2).to(handle_b);
        assert_eq!(handler(&json!({})).unwrap(), "b");
        assert_eq!(resolver.route_names(), ["handle_a", "handle_b"]);
    }

    #[test]
    fn test_registration_named() {
        let mut resolver = Resolver::new();
        resolver.one_of("kind", ["x", "y"]).named("xy").to(handle_a);
        assert_eq!(resolver.route_names(), ["xy"]);
        assert_eq!(resolver.resolve(&json!({"kind": "y"})).unwrap(), ["a"]);
    }

    #[test]
    fn test_closure_route_name() {
        let mut resolver = Resolver::new();
        let _ = resolver.when(Condition::value("a").is_truthy()).to(|_: &Event| Ok(1));
        assert_eq!(resolver.route_names(), ["{{closure}}"]);
    }

    #[test]
    fn test_register_one_of() {
        let mut resolver = Resolver::new();
        resolver.register_one_of("a", ["BAR", "FOO"], handle_a);
        assert_eq!(resolver.resolve(&json!({"a": "FOO"})).unwrap(), ["a"]);
        assert_eq!(resolver.len(), 1);
    }

    // ========== Dry run & trace ==========

    #[test]
    fn test_matching_routes_ignores_policy() {
        let mut resolver = Resolver::with_policy(false, false);
        resolver.register_equal("a", 1, fail);
        resolver.register(Condition::value("a").is_truthy(), handle_a);

        assert_eq!(resolver.matching_routes(&json!({"a": 1})).unwrap(), ["fail", "handle_a"]);
        assert!(resolver.matching_routes(&json!({})).unwrap().is_empty());
    }

    #[test]
    fn test_trace_agrees_with_matching_routes() {
        let mut resolver = Resolver::new();
        resolver.register_equal("a", 1, handle_a);
        resolver.register(!Condition::value("b").is_truthy(), handle_b);

        let event = json!({"a": 1, "b": true});
        let traces = resolver.trace(&event).unwrap();
        let traced: Vec<_> = traces.iter().filter(|t| t.matched).map(|t| t.name.as_str()).collect();
        assert_eq!(traced, resolver.matching_routes(&event).unwrap());
    }

    #[test]
    fn test_accessors_over_any_result_type() {
        fn describe<R: 'static>(resolver: &Resolver<R>) -> (usize, Vec<&str>) {
            (resolver.len(), resolver.route_names())
        }
        fn call_first<R: 'static>(resolver: &Resolver<R>) -> Result<R, BoxError> {
            resolver.routes()[0].call(&json!({}))
        }

        let mut resolver = Resolver::new();
        resolver.register_named("only", Condition::value("a").is_truthy(), handle_a);
        assert_eq!(describe(&resolver), (1, vec!["only"]));
        assert_eq!(call_first(&resolver).unwrap(), "a");
    }

    #[test]
    fn test_resolver_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Resolver<String>>();
        assert_send_sync::<ResolverBuilder<String>>();
    }
}

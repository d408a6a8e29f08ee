//! Observer hooks for resolution policy events.
//!
//! A resolver reports two situations that are allowed by its policy but
//! usually worth knowing about: an event no route matched, and an event
//! several routes matched. The default [`TracingObserver`] turns them into
//! `tracing` warnings; [`NoopObserver`] ignores them.

use crate::Event;
use std::fmt::Debug;

/// Receives policy notifications from a [`Resolver`](crate::Resolver).
///
/// Both methods default to doing nothing, so an observer only overrides the
/// events it cares about.
pub trait ResolveObserver: Send + Sync + Debug {
    /// No route matched and `allow_no_route` is set.
    ///
    /// `routes` lists every registered route name.
    fn on_no_route(&self, event: &Event, routes: &[&str]) {
        let _ = (event, routes);
    }

    /// More than one route matched and `allow_multiple_routes` is set.
    ///
    /// `matched` lists the matched route names in registration order.
    fn on_multiple_routes(&self, event: &Event, matched: &[&str]) {
        let _ = (event, matched);
    }
}

/// Logs policy events as `tracing` warnings. The default observer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ResolveObserver for TracingObserver {
    fn on_no_route(&self, event: &Event, routes: &[&str]) {
        tracing::warn!(?routes, %event, "no route found for event");
    }

    fn on_multiple_routes(&self, event: &Event, matched: &[&str]) {
        tracing::warn!(routes = ?matched, %event, "multiple routes matched event");
    }
}

/// Ignores all policy events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ResolveObserver for NoopObserver {}

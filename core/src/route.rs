//! Route - a condition paired with the handler it selects

use crate::{BoxError, Condition, ConditionError, Event};
use std::any::type_name;
use std::fmt;
use std::sync::Arc;

/// A function invoked with the event when its route is selected.
///
/// Implemented for every `Fn(&Event) -> Result<R, BoxError>` that is
/// `Send + Sync + 'static`, so plain `fn` items and closures both work.
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot be used as a handler returning `{R}`",
    label = "expected `Fn(&Event) -> Result<{R}, BoxError> + Send + Sync + 'static`",
    note = "handlers receive `&serde_json::Value` and return `Result<{R}, evroute::BoxError>`"
)]
pub trait Handler<R>: Send + Sync + 'static {
    /// Run the handler.
    ///
    /// # Errors
    ///
    /// Whatever the handler itself reports.
    fn call(&self, event: &Event) -> Result<R, BoxError>;
}

#[diagnostic::do_not_recommend]
impl<R, F> Handler<R> for F
where
    F: Fn(&Event) -> Result<R, BoxError> + Send + Sync + 'static,
{
    fn call(&self, event: &Event) -> Result<R, BoxError> {
        self(event)
    }
}

/// Default route name for a handler type.
///
/// The last path segment of the type name with generic arguments removed:
/// `fn` items yield their own name (`handle_order`), closures yield
/// `{{closure}}`, even when defined inside a generic function.
#[must_use]
pub fn handler_name<H: ?Sized>() -> &'static str {
    let full = type_name::<H>();
    let bytes = full.as_bytes();
    let mut depth = 0usize;
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'<' => depth += 1,
            b'>' => depth = depth.saturating_sub(1),
            // `::` outside generic arguments starts a new segment
            b':' if depth == 0 && bytes.get(i + 1) == Some(&b':') => {
                start = i + 2;
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }
    let last = &full[start..];
    last.find('<').map_or(last, |end| &last[..end])
}

/// A registered route.
///
/// Immutable once created. Cloning shares the handler.
pub struct Route<R> {
    name: String,
    condition: Condition,
    handler: Arc<dyn Handler<R>>,
}

impl<R: 'static> Route<R> {
    /// Create a route named after the handler's type.
    pub fn new<F>(condition: impl Into<Condition>, handler: F) -> Self
    where
        F: Fn(&Event) -> Result<R, BoxError> + Send + Sync + 'static,
    {
        Self::named(handler_name::<F>(), condition, handler)
    }

    /// Create a route with an explicit name.
    pub fn named<F>(name: impl Into<String>, condition: impl Into<Condition>, handler: F) -> Self
    where
        F: Fn(&Event) -> Result<R, BoxError> + Send + Sync + 'static,
    {
        Self::from_shared(name, condition, Arc::new(handler))
    }

    /// Create a route around an already shared handler.
    ///
    /// Use this for handler types implementing [`Handler`] directly.
    pub fn from_shared(
        name: impl Into<String>,
        condition: impl Into<Condition>,
        handler: Arc<dyn Handler<R>>,
    ) -> Self {
        Self {
            name: name.into(),
            condition: condition.into(),
            handler,
        }
    }

    /// The route name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The route condition.
    #[must_use]
    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    /// Evaluate the route condition.
    ///
    /// # Errors
    ///
    /// Propagates [`ConditionError`] from the condition.
    pub fn matches(&self, event: &Event) -> Result<bool, ConditionError> {
        self.condition.check(event)
    }

    /// Invoke the handler, regardless of the condition.
    ///
    /// # Errors
    ///
    /// Whatever the handler reports.
    pub fn call(&self, event: &Event) -> Result<R, BoxError> {
        self.handler.call(event)
    }
}

impl<R> Clone for Route<R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            condition: self.condition.clone(),
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<R> fmt::Debug for Route<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name)
            .field("condition", &self.condition)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn handle_order(_: &Event) -> Result<&'static str, BoxError> {
        Ok("order")
    }

    fn generic_handler<T: Default>(_: &Event) -> Result<T, BoxError> {
        Ok(T::default())
    }

    #[test]
    fn test_fn_item_name() {
        let route = Route::new(Condition::value("a").is_truthy(), handle_order);
        assert_eq!(route.name(), "handle_order");
    }

    #[test]
    fn test_generic_fn_name_strips_arguments() {
        let route = Route::new(Condition::value("a").is_truthy(), generic_handler::<u8>);
        assert_eq!(route.name(), "generic_handler");
    }

    fn make_handler<T>() -> impl Fn(&Event) -> Result<i32, BoxError> + Send + Sync + 'static {
        |_: &Event| Ok(1)
    }

    #[test]
    fn test_closure_in_generic_fn_name() {
        let route = Route::new(Condition::value("a").is_truthy(), make_handler::<u8>());
        assert_eq!(route.name(), "{{closure}}");
        assert_eq!(handler_name::<Vec<Option<u8>>>(), "Vec");
    }

    #[test]
    fn test_closure_name() {
        let route = Route::new(Condition::value("a").is_truthy(), |_: &Event| Ok(1));
        assert_eq!(route.name(), "{{closure}}");
    }

    #[test]
    fn test_named_route() {
        let route = Route::named("orders", Condition::value("a").is_truthy(), handle_order);
        assert_eq!(route.name(), "orders");
    }

    #[test]
    fn test_matches_and_call() {
        let route = Route::new(Condition::value("a").equals(1), handle_order);
        assert!(route.matches(&json!({"a": 1})).unwrap());
        assert!(!route.matches(&json!({"a": 2})).unwrap());
        assert_eq!(route.call(&json!({})).unwrap(), "order");
    }

    #[test]
    fn test_clone_shares_handler() {
        let route = Route::new(Condition::value("a").equals(1), handle_order);
        let copy = route.clone();
        assert!(Arc::ptr_eq(&route.handler, &copy.handler));
    }

    #[test]
    fn test_route_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Route<String>>();
    }
}

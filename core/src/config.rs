//! Config types for declarative route tables.
//!
//! These types mirror the runtime routing types but are serde-deserializable,
//! so a resolver can be described in JSON or YAML and built with
//! [`HandlerRegistry::load_resolver()`](crate::HandlerRegistry::load_resolver).
//!
//! # Relationship to runtime types
//!
//! | Config type | Runtime type |
//! |-------------|-------------|
//! | [`ResolverConfig`] | [`Resolver`](crate::Resolver) |
//! | [`RouteConfig`] | [`Route`](crate::Route) |
//! | [`ConditionConfig`] | [`Condition`](crate::Condition) |
//! | [`ValueConditionConfig`] | [`ValueCondition`](crate::ValueCondition) |
//!
//! # Format
//!
//! ```yaml
//! allow_multiple_routes: false
//! allow_no_route: true
//! routes:
//!   - handler: handle_test
//!     when: { path: a.b, equals: TEST }
//!   - handler: handle_any
//!     name: any_d
//!     when:
//!       or:
//!         - { path: a.d, one_of: [1, 2] }
//!         - not: { path: a.x, is_truthy: true }
//! ```
//!
//! A condition is exactly one of `{and: [...]}`, `{or: [...]}`, `{not: ...}`
//! or a value condition. Unknown keys are rejected.

use crate::predicate::{self, RegexFlags};
use crate::{
    Condition, ConditionError, ValueCondition, MAX_CONDITIONS_PER_COMPOUND,
    MAX_REGEX_PATTERN_LENGTH,
};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors from loading a route table.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        /// The file path.
        path: PathBuf,
        /// The I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The JSON document is malformed or does not fit the schema.
    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    /// The YAML document is malformed or does not fit the schema.
    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A route references a handler that is not registered.
    #[error("unknown handler \"{name}\"{}", registered(.available))]
    UnknownHandler {
        /// The handler name as written.
        name: String,
        /// The registered handler names (sorted).
        available: Vec<String>,
    },

    /// A route's condition is invalid.
    #[error("route \"{route}\": {source}")]
    Condition {
        /// The route name.
        route: String,
        /// The underlying condition error.
        #[source]
        source: ConditionError,
    },

    /// More routes than [`MAX_ROUTES`](crate::MAX_ROUTES).
    #[error("{count} routes exceed the maximum of {max}")]
    TooManyRoutes {
        /// Actual number of routes.
        count: usize,
        /// Maximum allowed.
        max: usize,
    },

    /// An `and`/`or` with more children than [`MAX_CONDITIONS_PER_COMPOUND`].
    #[error("route \"{route}\": compound condition has {count} children, maximum is {max}")]
    TooManyConditions {
        /// The route name.
        route: String,
        /// Actual number of children.
        count: usize,
        /// Maximum allowed.
        max: usize,
    },

    /// A regex pattern longer than [`MAX_REGEX_PATTERN_LENGTH`].
    #[error("route \"{route}\": regex pattern is {len} bytes, maximum is {max}")]
    PatternTooLong {
        /// The route name.
        route: String,
        /// Actual pattern length.
        len: usize,
        /// Maximum allowed.
        max: usize,
    },
}

fn registered(available: &[String]) -> String {
    if available.is_empty() {
        " (no handlers registered)".to_owned()
    } else {
        format!("; registered: {}", available.join(", "))
    }
}

/// Configuration for a [`Resolver`](crate::Resolver).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolverConfig {
    /// Accept events matched by more than one route.
    #[serde(default)]
    pub allow_multiple_routes: bool,

    /// Accept events matched by no route.
    #[serde(default = "default_allow_no_route")]
    pub allow_no_route: bool,

    /// Routes in registration order.
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

fn default_allow_no_route() -> bool {
    true
}

impl ResolverConfig {
    /// Parse a JSON route table.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Json`] on malformed input.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Parse a YAML route table.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Yaml`] on malformed input.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Read a route table from a file: `.json` as JSON, anything else as YAML.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`from_json`](Self::from_json) / [`from_yaml`](Self::from_yaml).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        if path.extension().is_some_and(|ext| ext == "json") {
            Self::from_json(&text)
        } else {
            Self::from_yaml(&text)
        }
    }

    /// Route names in registration order.
    #[must_use]
    pub fn route_names(&self) -> Vec<&str> {
        self.routes.iter().map(RouteConfig::route_name).collect()
    }
}

/// Configuration for one route.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteConfig {
    /// Name of a handler registered in the [`HandlerRegistry`](crate::HandlerRegistry).
    pub handler: String,

    /// Route name; defaults to the handler name.
    #[serde(default)]
    pub name: Option<String>,

    /// The route condition.
    pub when: ConditionConfig,
}

impl RouteConfig {
    /// The route name: `name` if set, otherwise `handler`.
    #[must_use]
    pub fn route_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.handler)
    }
}

/// Configuration for a [`Condition`](crate::Condition).
///
/// Untagged; the variant is recognized by its keys:
///
/// ```json
/// { "and": [ ... ] }
/// { "or": [ ... ] }
/// { "not": { ... } }
/// { "path": "a.b", "equals": 1 }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ConditionConfig {
    /// All conditions must hold.
    All(AllConfig),
    /// Any condition must hold.
    Any(AnyConfig),
    /// Inverts the inner condition.
    Not(NotConfig),
    /// A value condition.
    Value(ValueConditionConfig),
}

/// `{and: [...]}`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AllConfig {
    /// Children, all must hold.
    pub and: Vec<ConditionConfig>,
}

/// `{or: [...]}`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnyConfig {
    /// Children, any must hold.
    pub or: Vec<ConditionConfig>,
}

/// `{not: ...}`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotConfig {
    /// The condition to invert.
    pub not: Box<ConditionConfig>,
}

/// Configuration for a [`ValueCondition`](crate::ValueCondition).
///
/// Every present check is ANDed onto the chain, in field order. A value
/// condition with no check is rejected at load time.
///
/// The boolean checks accept `false` to require the opposite on a found
/// value: `is_truthy: false` holds for a falsy value, not for an absent one.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValueConditionConfig {
    /// Dotted path into the event.
    pub path: String,

    /// Truthiness check.
    #[serde(default)]
    pub is_truthy: Option<bool>,

    /// Equality check. `equals: null` compares against null.
    #[serde(default, deserialize_with = "present")]
    pub equals: Option<Value>,

    /// Membership check.
    #[serde(default)]
    pub one_of: Option<Vec<Value>>,

    /// Every item must be contained.
    #[serde(default)]
    pub contains: Option<Vec<Value>>,

    /// Non-emptiness check.
    #[serde(default)]
    pub is_not_empty: Option<bool>,

    /// Emptiness check.
    #[serde(default)]
    pub is_empty: Option<bool>,

    /// Exact size check.
    #[serde(default)]
    pub is_length: Option<usize>,

    /// Regex check.
    #[serde(default)]
    pub match_regex: Option<RegexConfig>,

    /// Negate the whole chain (absence still yields `false`).
    #[serde(default)]
    pub negate: bool,
}

/// A present key always yields `Some`, even when its value is `null`.
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

/// Regex check: a bare pattern, or a pattern with flags.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RegexConfig {
    /// Bare pattern with default flags.
    Pattern(String),
    /// Pattern with flags.
    Detailed(DetailedRegexConfig),
}

/// A regex pattern with explicit flags.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DetailedRegexConfig {
    /// The pattern.
    pub pattern: String,
    /// Case-insensitive matching.
    #[serde(default)]
    pub ignore_case: bool,
    /// `^`/`$` match at line boundaries.
    #[serde(default)]
    pub multi_line: bool,
    /// `.` matches newlines.
    #[serde(default)]
    pub dot_all: bool,
    /// The whole value must match.
    #[serde(default)]
    pub full_match: bool,
}

impl RegexConfig {
    /// The pattern and its flags.
    #[must_use]
    pub fn parts(&self) -> (&str, RegexFlags) {
        match self {
            Self::Pattern(pattern) => (pattern, RegexFlags::default()),
            Self::Detailed(detailed) => (
                &detailed.pattern,
                RegexFlags {
                    ignore_case: detailed.ignore_case,
                    multi_line: detailed.multi_line,
                    dot_all: detailed.dot_all,
                    full_match: detailed.full_match,
                },
            ),
        }
    }
}

impl ConditionConfig {
    /// Build the runtime condition. `route` names the owning route in errors.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::TooManyConditions`] - an `and`/`or` is too wide
    /// - [`ConfigError::PatternTooLong`] - a regex pattern is too long
    /// - [`ConfigError::Condition`] - an invalid pattern, a value condition
    ///   without checks, or nesting deeper than [`MAX_DEPTH`](crate::MAX_DEPTH)
    pub fn build(&self, route: &str) -> Result<Condition, ConfigError> {
        let condition = self.build_node(route)?;
        condition
            .validate()
            .map_err(|source| ConfigError::Condition {
                route: route.to_owned(),
                source,
            })?;
        Ok(condition)
    }

    fn build_node(&self, route: &str) -> Result<Condition, ConfigError> {
        match self {
            Self::All(AllConfig { and }) => Ok(Condition::And(build_children(and, route)?)),
            Self::Any(AnyConfig { or }) => Ok(Condition::Or(build_children(or, route)?)),
            Self::Not(NotConfig { not }) => Ok(Condition::not(not.build_node(route)?)),
            Self::Value(value) => value.build(route).map(Condition::Value),
        }
    }
}

fn build_children(children: &[ConditionConfig], route: &str) -> Result<Vec<Condition>, ConfigError> {
    if children.len() > MAX_CONDITIONS_PER_COMPOUND {
        return Err(ConfigError::TooManyConditions {
            route: route.to_owned(),
            count: children.len(),
            max: MAX_CONDITIONS_PER_COMPOUND,
        });
    }
    children.iter().map(|c| c.build_node(route)).collect()
}

impl ValueConditionConfig {
    /// Build the runtime value condition. `route` names the owning route in errors.
    ///
    /// A config with no checks builds a condition without a predicate;
    /// [`ConditionConfig::build`] rejects it.
    ///
    /// # Errors
    ///
    /// [`ConfigError::PatternTooLong`] or [`ConfigError::Condition`] for an
    /// invalid regex.
    pub fn build(&self, route: &str) -> Result<ValueCondition, ConfigError> {
        let mut condition = ValueCondition::new(self.path.as_str());

        if let Some(truthy) = self.is_truthy {
            condition = condition.and_predicate(polarity(Arc::new(predicate::truthy()), truthy));
        }
        if let Some(expected) = &self.equals {
            condition = condition.equals(expected.clone());
        }
        if let Some(options) = &self.one_of {
            condition = condition.one_of(options.iter().cloned());
        }
        if let Some(items) = &self.contains {
            condition = condition.contains(items.iter().cloned());
        }
        if let Some(not_empty) = self.is_not_empty {
            condition =
                condition.and_predicate(polarity(Arc::new(predicate::is_not_empty()), not_empty));
        }
        if let Some(empty) = self.is_empty {
            condition = condition.and_predicate(polarity(Arc::new(predicate::is_empty()), empty));
        }
        if let Some(len) = self.is_length {
            condition = condition.is_length(len);
        }
        if let Some(regex) = &self.match_regex {
            let (pattern, flags) = regex.parts();
            if pattern.len() > MAX_REGEX_PATTERN_LENGTH {
                return Err(ConfigError::PatternTooLong {
                    route: route.to_owned(),
                    len: pattern.len(),
                    max: MAX_REGEX_PATTERN_LENGTH,
                });
            }
            condition = condition
                .match_regex_with(pattern, flags)
                .map_err(|source| ConfigError::Condition {
                    route: route.to_owned(),
                    source,
                })?;
        }
        if self.negate {
            condition = condition.negate();
        }
        Ok(condition)
    }
}

fn polarity(p: predicate::SharedPredicate, keep: bool) -> predicate::SharedPredicate {
    if keep {
        p
    } else {
        Arc::new(predicate::negate(p))
    }
}

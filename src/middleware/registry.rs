//! Middleware identifiers and the registry that resolves them.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::{Cors, Middleware, RequestLog, Stage};
use crate::error::Error;

/// Identifier naming a middleware in controller metadata, e.g. `"auth"`.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct MiddlewareRef(Cow<'static, str>);

impl MiddlewareRef {
    pub fn as_str(&self) -> &str { &self.0 }
}

impl From<&'static str> for MiddlewareRef {
    fn from(id: &'static str) -> Self { Self(Cow::Borrowed(id)) }
}

impl From<String> for MiddlewareRef {
    fn from(id: String) -> Self { Self(Cow::Owned(id)) }
}

impl fmt::Display for MiddlewareRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

type Factory = Box<dyn Fn() -> Arc<dyn Middleware> + Send + Sync>;

/// Maps stable identifiers to middleware factories.
///
/// ```rust
/// use portico::middleware::{Cors, MiddlewareRegistry};
///
/// let registry = MiddlewareRegistry::new()
///     .register::<Cors>("cors")
///     .register_with("strict-cors", || Cors::default().allow_origin("https://example.com"));
///
/// assert!(registry.contains("strict-cors"));
/// ```
#[derive(Default)]
pub struct MiddlewareRegistry {
    factories: HashMap<String, Factory>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with `"log"` ([`RequestLog`]) and `"cors"`
    /// ([`Cors`] with its defaults).
    pub fn with_builtins() -> Self {
        Self::new()
            .register::<RequestLog>("log")
            .register::<Cors>("cors")
    }

    /// Registers a zero-argument-constructible middleware under `id`.
    /// A later registration under the same id replaces the earlier one.
    pub fn register<M: Middleware + Default>(self, id: impl Into<String>) -> Self {
        self.register_with(id, M::default)
    }

    /// Registers a factory under `id`.
    pub fn register_with<M, F>(mut self, id: impl Into<String>, factory: F) -> Self
    where
        M: Middleware,
        F: Fn() -> M + Send + Sync + 'static,
    {
        let id = id.into();
        debug!(middleware = %id, "middleware registered");
        self.factories.insert(id, Box::new(move || Arc::new(factory()) as Arc<dyn Middleware>));
        self
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Builds a fresh instance for `id`.
    pub(crate) fn resolve(&self, id: &MiddlewareRef) -> Result<Stage, Error> {
        let factory = self.factories
            .get(id.as_str())
            .ok_or_else(|| Error::UnknownMiddleware(id.to_string()))?;
        Ok(Stage::new(id.clone(), factory()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered() {
        let registry = MiddlewareRegistry::with_builtins();
        assert!(registry.contains("log"));
        assert!(registry.contains("cors"));
        assert!(!registry.contains("auth"));
    }

    #[test]
    fn resolve_tags_stage_with_its_id() {
        let registry = MiddlewareRegistry::new().register::<RequestLog>("log");
        let stage = registry.resolve(&"log".into()).unwrap();
        assert_eq!(stage.id().as_str(), "log");
    }

    #[test]
    fn unknown_identifier_is_an_error() {
        let registry = MiddlewareRegistry::new();
        let err = registry.resolve(&MiddlewareRef::from("auth".to_owned())).unwrap_err();
        assert!(matches!(err, Error::UnknownMiddleware(id) if id == "auth"));
    }
}

//! Controller registration and the exact-match route table.
//!
//! One table per HTTP method, keyed by normalized path. There is no pattern
//! matching: `/users/42` and `/users/{id}` are simply different strings.
//!
//! [`Router`] is the only way to write to a table. [`Router::build`]
//! consumes it and hands back a [`Dispatcher`], which can only read, so
//! every registration has finished before the first request is served.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::controller::Controller;
use crate::dispatcher::Dispatcher;
use crate::error::Error;
use crate::handler::HandlerRef;
use crate::metadata;
use crate::method::Method;
use crate::middleware::{MiddlewareRef, MiddlewareRegistry, Stage};
use crate::response::TemplateRenderer;

/// Collapses every run of two or more `/` into one.
///
/// ```rust
/// assert_eq!(portico::normalize("//api///users/"), "/api/users/");
/// ```
pub fn normalize(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut prev_slash = false;
    for c in path.chars() {
        let slash = c == '/';
        if !(slash && prev_slash) {
            out.push(c);
        }
        prev_slash = slash;
    }
    out
}

// ── RouteTable ────────────────────────────────────────────────────────────────

/// A registered route's handler and its resolved middleware chain.
#[derive(Clone, Debug)]
pub struct EndpointEntry {
    handler: HandlerRef,
    chain: Vec<Stage>,
}

impl EndpointEntry {
    pub fn handler(&self) -> &HandlerRef { &self.handler }
    pub fn chain(&self) -> &[Stage] { &self.chain }

    /// Identifiers of the chain, in execution order.
    pub fn middleware_ids(&self) -> Vec<&str> {
        self.chain.iter().map(|stage| stage.id().as_str()).collect()
    }
}

/// Exact-match mapping of `(method, normalized path)` to [`EndpointEntry`].
#[derive(Default)]
pub struct RouteTable {
    routes: HashMap<Method, HashMap<String, EndpointEntry>>,
}

impl RouteTable {
    /// Exact lookup; `path` must already be normalized.
    pub fn lookup(&self, method: Method, path: &str) -> Option<&EndpointEntry> {
        self.routes.get(&method)?.get(path)
    }

    pub fn len(&self) -> usize {
        self.routes.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every registered `(method, path)` pair, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = (Method, &str)> {
        self.routes.iter().flat_map(|(method, paths)| {
            paths.keys().map(move |path| (*method, path.as_str()))
        })
    }

    /// Upserts; returns the entry it replaced.
    fn insert(&mut self, method: Method, path: String, entry: EndpointEntry) -> Option<EndpointEntry> {
        self.routes.entry(method).or_default().insert(path, entry)
    }
}

// ── Router ────────────────────────────────────────────────────────────────────

/// Startup-time builder for the route table.
///
/// ```rust,no_run
/// # use portico::{Controller, Descriptor, Router};
/// # struct IndexController;
/// # impl Controller for IndexController { fn describe(&self) -> Descriptor<Self> { Descriptor::new() } }
/// # struct MainController;
/// # impl Controller for MainController { fn describe(&self) -> Descriptor<Self> { Descriptor::new() } }
/// # fn main() -> Result<(), portico::Error> {
/// let dispatcher = Router::new()
///     .global("log")?
///     .register(IndexController, "/api")?
///     .register_root(MainController)?
///     .build();
/// # Ok(())
/// # }
/// ```
pub struct Router {
    table: RouteTable,
    registry: MiddlewareRegistry,
    global: Vec<Stage>,
    renderer: Option<Arc<dyn TemplateRenderer>>,
}

impl Router {
    /// A router whose registry holds the built-in middleware.
    pub fn new() -> Self {
        Self::with_registry(MiddlewareRegistry::with_builtins())
    }

    pub fn with_registry(registry: MiddlewareRegistry) -> Self {
        Self {
            table: RouteTable::default(),
            registry,
            global: Vec::new(),
            renderer: None,
        }
    }

    /// Registers every routed action of `controller` under `prefix`.
    ///
    /// Each route lands at `normalize("/" + prefix + "/" + path)`. A route
    /// key that is already taken is overwritten. Fails if any middleware
    /// identifier on a routed action is not in the registry.
    pub fn register<C: Controller>(mut self, controller: C, prefix: &str) -> Result<Self, Error> {
        let controller = Arc::new(controller);

        for decl in metadata::extract(controller.as_ref()) {
            if decl.routes.is_empty() {
                continue;
            }

            let chain = decl.middleware
                .iter()
                .map(|id| self.registry.resolve(id))
                .collect::<Result<Vec<_>, _>>()?;
            let handler = HandlerRef::bind(Arc::clone(&controller), decl.name, decl.handler);

            for route in decl.routes {
                let path = normalize(&format!("/{prefix}/{}", route.path));
                let entry = EndpointEntry { handler: handler.clone(), chain: chain.clone() };

                debug!(method = %route.method, path = %path, handler = ?handler, "route registered");
                if let Some(old) = self.table.insert(route.method, path.clone(), entry) {
                    warn!(
                        method = %route.method,
                        path = %path,
                        replaced = ?old.handler,
                        by = ?handler,
                        "route overwritten"
                    );
                }
            }
        }

        Ok(self)
    }

    /// [`register`](Router::register) with prefix `/`.
    pub fn register_root<C: Controller>(self, controller: C) -> Result<Self, Error> {
        self.register(controller, "/")
    }

    /// Appends a process-wide middleware. Global middleware runs before
    /// route lookup, in the order added; one that does not continue ends
    /// the request there.
    pub fn global(mut self, id: impl Into<MiddlewareRef>) -> Result<Self, Error> {
        let stage = self.registry.resolve(&id.into())?;
        self.global.push(stage);
        Ok(self)
    }

    /// Installs the renderer used by [`Response::send_template`](crate::Response::send_template).
    pub fn renderer(mut self, renderer: impl TemplateRenderer) -> Self {
        self.renderer = Some(Arc::new(renderer));
        self
    }

    /// Freezes the table.
    pub fn build(self) -> Dispatcher {
        Dispatcher::new(self.table, self.global, self.renderer)
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

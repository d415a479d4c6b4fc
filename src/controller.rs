//! The controller contract and its declarative metadata.
//!
//! A controller is any type that describes its own actions. Metadata comes
//! through two channels, and both may be used on the same controller:
//!
//! - **structured**: [`Descriptor::middleware`], [`Action::route`] and
//!   [`Action::middleware`] calls;
//! - **annotations**: free text passed to [`Descriptor::doc`] or
//!   [`Action::doc`] and parsed for `@Route("GET", "/path")` and
//!   `@RouteMiddleware(a, b)`.
//!
//! ```rust
//! use portico::{Action, Controller, Descriptor, Error, Method, Request, Response};
//!
//! struct IndexController;
//!
//! impl IndexController {
//!     fn home(&self, _req: &mut Request, res: &mut Response) -> Result<(), Error> {
//!         res.send("welcome");
//!         Ok(())
//!     }
//!
//!     fn legacy(&self, _req: &mut Request, res: &mut Response) -> Result<(), Error> {
//!         res.send("still here");
//!         Ok(())
//!     }
//! }
//!
//! impl Controller for IndexController {
//!     fn describe(&self) -> Descriptor<Self> {
//!         Descriptor::new()
//!             .middleware(["log"])
//!             .action(Action::new("home", Self::home).route(Method::Get, "/"))
//!             .action(Action::new("legacy", Self::legacy).doc(r#"@Route("GET", "/old")"#))
//!     }
//! }
//! ```

use crate::handler::ActionFn;
use crate::method::Method;
use crate::middleware::MiddlewareRef;

/// A type whose actions can be registered on a [`Router`](crate::Router).
pub trait Controller: Send + Sync + Sized + 'static {
    fn describe(&self) -> Descriptor<Self>;
}

/// One `(method, path)` an action answers on, before prefixing.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RouteDeclaration {
    pub method: Method,
    pub path: String,
}

/// Class-level metadata plus the controller's actions.
pub struct Descriptor<C> {
    pub(crate) middleware: Vec<MiddlewareRef>,
    pub(crate) doc: String,
    pub(crate) actions: Vec<Action<C>>,
}

impl<C> Descriptor<C> {
    pub fn new() -> Self {
        Self { middleware: Vec::new(), doc: String::new(), actions: Vec::new() }
    }

    /// Middleware applied to every action, ahead of the action's own.
    /// Repeatable; calls accumulate in order.
    pub fn middleware<I, M>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<MiddlewareRef>,
    {
        self.middleware.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Annotation text for the controller. Only `@RouteMiddleware` is
    /// meaningful at this level.
    pub fn doc(mut self, text: &str) -> Self {
        push_doc(&mut self.doc, text);
        self
    }

    pub fn action(mut self, action: Action<C>) -> Self {
        self.actions.push(action);
        self
    }
}

impl<C> Default for Descriptor<C> {
    fn default() -> Self { Self::new() }
}

/// One controller method with its routes and middleware.
pub struct Action<C> {
    pub(crate) name: &'static str,
    pub(crate) handler: ActionFn<C>,
    pub(crate) routes: Vec<RouteDeclaration>,
    pub(crate) middleware: Vec<MiddlewareRef>,
    pub(crate) doc: String,
}

impl<C> Action<C> {
    pub fn new(name: &'static str, handler: ActionFn<C>) -> Self {
        Self {
            name,
            handler,
            routes: Vec::new(),
            middleware: Vec::new(),
            doc: String::new(),
        }
    }

    /// Declares a route. Repeatable: one action may answer on several keys.
    pub fn route(mut self, method: Method, path: &str) -> Self {
        self.routes.push(RouteDeclaration { method, path: path.to_owned() });
        self
    }

    pub fn get(self, path: &str) -> Self { self.route(Method::Get, path) }
    pub fn post(self, path: &str) -> Self { self.route(Method::Post, path) }
    pub fn put(self, path: &str) -> Self { self.route(Method::Put, path) }
    pub fn delete(self, path: &str) -> Self { self.route(Method::Delete, path) }

    pub fn middleware<I, M>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<MiddlewareRef>,
    {
        self.middleware.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Annotation text for the action: `@Route(...)` lines and
    /// `@RouteMiddleware(...)`.
    pub fn doc(mut self, text: &str) -> Self {
        push_doc(&mut self.doc, text);
        self
    }
}

fn push_doc(doc: &mut String, text: &str) {
    if !doc.is_empty() {
        doc.push('\n');
    }
    doc.push_str(text);
}

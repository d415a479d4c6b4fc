//! # portico
//!
//! Controller routing and middleware composition for small HTTP services.
//!
//! ## The model
//!
//! - A **controller** is a plain struct implementing [`Controller`]. It
//!   describes its actions: which `(method, path)` pairs each one answers on,
//!   and which middleware wraps it.
//! - A **router** registers controllers under path prefixes, resolves every
//!   middleware identifier up front, and freezes into a [`Dispatcher`].
//! - The **dispatcher** runs global middleware, looks the request up by
//!   exact `(method, normalized path)`, and runs the matched route's
//!   middleware chain followed by the action. No match is a `404` with body
//!   `404 Not Found`.
//!
//! Metadata can be written two ways, and both merge into one chain:
//! builder calls ([`Action::route`], [`Action::middleware`]) and legacy
//! annotation text ([`Action::doc`] with `@Route("GET", "/")` and
//! `@RouteMiddleware(auth)`). See [`metadata`] for the merge order.
//!
//! What portico leaves to you: template engines (plug one in through
//! [`TemplateRenderer`]), multipart parsing, sessions, persistence.
//! Paths are matched as exact strings; there are no `{param}` segments.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use portico::{Action, Controller, Descriptor, Error, Request, Response, Router, Server};
//!
//! struct Users;
//!
//! impl Users {
//!     fn list(&self, _req: &mut Request, res: &mut Response) -> Result<(), Error> {
//!         res.json(&["ada", "grace"])
//!     }
//! }
//!
//! impl Controller for Users {
//!     fn describe(&self) -> Descriptor<Self> {
//!         Descriptor::new()
//!             .middleware(["log"])
//!             .action(Action::new("list", Self::list).get("/users"))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let app = Router::new()
//!         .global("cors")?
//!         .register(Users, "/api")?
//!         .build();
//!
//!     Server::bind("0.0.0.0:3000")?.serve(app).await
//! }
//! ```

mod config;
mod controller;
mod dispatcher;
mod error;
mod handler;
mod method;
mod request;
mod response;
mod router;
mod server;

pub mod metadata;
pub mod middleware;

pub use config::{ADDR_VAR, Config, TEMPLATE_DIR_VAR};
pub use controller::{Action, Controller, Descriptor, RouteDeclaration};
pub use dispatcher::{Dispatcher, NOT_FOUND_BODY};
pub use error::{BoxError, Error};
pub use handler::{ActionFn, HandlerRef};
pub use http::StatusCode;
pub use method::Method;
pub use request::{Request, UploadedFile};
pub use response::{Response, TemplateRenderer};
pub use router::{EndpointEntry, RouteTable, Router, normalize};
pub use server::Server;

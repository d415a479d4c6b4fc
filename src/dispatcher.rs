//! Request dispatch: global middleware, route lookup, route pipeline.
//!
//! A request moves through two states:
//!
//! ```text
//! ROUTING    (method, path) → RouteTable::lookup
//!              miss → 404 "404 Not Found", done
//!              hit  ↓
//! EXECUTING  route middleware → controller action
//! ```
//!
//! Global middleware wraps both states. Its terminal `next` *is* the routing
//! step, so a global middleware that does not continue (a CORS preflight,
//! say) ends the request before any lookup happens.
//!
//! Dispatch is synchronous and runs on the caller's thread from start to
//! finish. The dispatcher never catches errors: whatever a middleware or
//! action returns comes straight back out of [`Dispatcher::dispatch`], and
//! the response keeps every mutation made before the error.

use std::sync::Arc;

use http::StatusCode;
use tracing::{debug, debug_span};

use crate::error::Error;
use crate::method::Method;
use crate::middleware::{Pipeline, Stage};
use crate::request::Request;
use crate::response::{Response, TemplateRenderer};
use crate::router::{EndpointEntry, RouteTable};

/// Body of every not-found response.
pub const NOT_FOUND_BODY: &str = "404 Not Found";

/// A frozen route table plus global middleware. Built by
/// [`Router::build`](crate::Router::build).
///
/// Share it across threads with an `Arc`; it has no interior mutability.
pub struct Dispatcher {
    table: RouteTable,
    global: Vec<Stage>,
    renderer: Option<Arc<dyn TemplateRenderer>>,
}

impl Dispatcher {
    pub(crate) fn new(
        table: RouteTable,
        global: Vec<Stage>,
        renderer: Option<Arc<dyn TemplateRenderer>>,
    ) -> Self {
        Self { table, global, renderer }
    }

    pub fn routes(&self) -> &RouteTable { &self.table }

    pub fn lookup(&self, method: Method, path: &str) -> Option<&EndpointEntry> {
        self.table.lookup(method, path)
    }

    /// A fresh default response wired to this dispatcher's template renderer.
    pub fn response(&self) -> Response {
        Response::with_renderer(self.renderer.clone())
    }

    /// Runs `req` through global middleware, routing, and the matched
    /// route's pipeline, mutating `res` along the way.
    pub fn dispatch(&self, req: &mut Request, res: &mut Response) -> Result<(), Error> {
        let span = debug_span!("dispatch", method = %req.method(), path = req.path());
        let _guard = span.enter();

        Pipeline::new(&self.global).run(req, res, |req, res| self.route(req, res))
    }

    fn route(&self, req: &mut Request, res: &mut Response) -> Result<(), Error> {
        let Some(entry) = self.table.lookup(req.method(), req.path()) else {
            debug!("no route matched");
            res.set_status_code(StatusCode::NOT_FOUND)
                .set_content_type("text/plain; charset=utf-8")
                .send(NOT_FOUND_BODY);
            return Ok(());
        };

        debug!(handler = ?entry.handler(), "route matched");
        let handler = entry.handler();
        Pipeline::new(entry.chain()).run(req, res, |req, res| handler.call(req, res))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::controller::{Action, Controller, Descriptor};
    use crate::middleware::{MiddlewareRegistry, from_fn};
    use crate::router::Router;

    type Log = Arc<Mutex<Vec<&'static str>>>;

    struct Home {
        log: Log,
    }

    impl Home {
        fn index(&self, _: &mut Request, res: &mut Response) -> Result<(), Error> {
            self.log.lock().unwrap().push("handler");
            res.send("home");
            Ok(())
        }
    }

    impl Controller for Home {
        fn describe(&self) -> Descriptor<Self> {
            Descriptor::new().action(Action::new("index", Self::index).get("/"))
        }
    }

    fn registry(log: &Log) -> MiddlewareRegistry {
        let pass = Arc::clone(log);
        let stop = Arc::clone(log);
        MiddlewareRegistry::new()
            .register_with("pass", move || {
                let log = Arc::clone(&pass);
                from_fn(move |req, res, next| {
                    log.lock().unwrap().push("pass");
                    next.run(req, res)
                })
            })
            .register_with("stop", move || {
                let log = Arc::clone(&stop);
                from_fn(move |_, res, _| {
                    log.lock().unwrap().push("stop");
                    res.set_status_code(StatusCode::FORBIDDEN);
                    Ok(())
                })
            })
    }

    fn dispatch(dispatcher: &Dispatcher, target: &str) -> Response {
        let mut req = Request::new(Method::Get, target);
        let mut res = dispatcher.response();
        dispatcher.dispatch(&mut req, &mut res).unwrap();
        res
    }

    #[test]
    fn miss_is_a_plain_404() {
        let log = Log::default();
        let dispatcher = Router::with_registry(registry(&log))
            .register_root(Home { log: Arc::clone(&log) })
            .unwrap()
            .build();

        let res = dispatch(&dispatcher, "/missing");

        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(res.body(), NOT_FOUND_BODY.as_bytes());
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn global_middleware_runs_before_routing() {
        let log = Log::default();
        let dispatcher = Router::with_registry(registry(&log))
            .global("pass")
            .unwrap()
            .register_root(Home { log: Arc::clone(&log) })
            .unwrap()
            .build();

        let res = dispatch(&dispatcher, "/");

        assert_eq!(*log.lock().unwrap(), ["pass", "handler"]);
        assert_eq!(res.body(), b"home");
    }

    #[test]
    fn global_middleware_also_sees_misses() {
        let log = Log::default();
        let dispatcher = Router::with_registry(registry(&log)).global("pass").unwrap().build();

        let res = dispatch(&dispatcher, "/nowhere");

        assert_eq!(*log.lock().unwrap(), ["pass"]);
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn global_short_circuit_aborts_the_request() {
        let log = Log::default();
        let dispatcher = Router::with_registry(registry(&log))
            .global("stop")
            .unwrap()
            .register_root(Home { log: Arc::clone(&log) })
            .unwrap()
            .build();

        let res = dispatch(&dispatcher, "/");

        assert_eq!(*log.lock().unwrap(), ["stop"]);
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        assert!(res.body().is_empty());
    }
}

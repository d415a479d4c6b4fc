//! Middleware and the pipeline that chains it.
//!
//! Middleware is the place for cross-cutting concerns: request logging,
//! CORS preflight answers, authentication checks. A middleware receives the
//! request, the response, and a [`Next`] handle:
//!
//! - call `next.run(req, res)` to hand control to the rest of the chain, and
//!   do any post-processing once it returns;
//! - return without calling it to short-circuit. Nothing after this stage
//!   runs, the controller action included.
//!
//! `Next::run` takes `self`, so a stage can continue the chain at most once.
//!
//! ```rust
//! use portico::middleware::{Middleware, Next};
//! use portico::{Error, Request, Response, StatusCode};
//!
//! #[derive(Default)]
//! struct RequireToken;
//!
//! impl Middleware for RequireToken {
//!     fn handle(&self, req: &mut Request, res: &mut Response, next: Next<'_>) -> Result<(), Error> {
//!         if req.header("authorization").is_none() {
//!             res.set_status_code(StatusCode::UNAUTHORIZED);
//!             return Ok(());
//!         }
//!         next.run(req, res)
//!     }
//! }
//! ```
//!
//! Middleware is referenced by identifier from controller metadata and
//! resolved through a [`MiddlewareRegistry`] when the controller is
//! registered, so a typo in an identifier fails at startup rather than on
//! the first request.

mod cors;
mod request_log;
mod registry;

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::error::Error;
use crate::request::Request;
use crate::response::Response;

pub use cors::Cors;
pub use request_log::RequestLog;
pub use registry::{MiddlewareRef, MiddlewareRegistry};

// ── Middleware trait ──────────────────────────────────────────────────────────

/// One stage of a request pipeline.
///
/// Instances are built once, at registration, and shared by every request
/// that reaches the route. Keep per-request state on the request or
/// response, not on `self`.
pub trait Middleware: Send + Sync + 'static {
    fn handle(&self, req: &mut Request, res: &mut Response, next: Next<'_>) -> Result<(), Error>;
}

/// Wraps a closure as a [`Middleware`].
///
/// ```rust
/// use portico::middleware::from_fn;
///
/// let stamp = from_fn(|req, res, next| {
///     res.set_header("x-served-by", "portico");
///     next.run(req, res)
/// });
/// ```
pub fn from_fn<F>(f: F) -> FnMiddleware<F>
where
    F: Fn(&mut Request, &mut Response, Next<'_>) -> Result<(), Error> + Send + Sync + 'static,
{
    FnMiddleware(f)
}

/// Middleware built from a closure by [`from_fn`].
pub struct FnMiddleware<F>(F);

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&mut Request, &mut Response, Next<'_>) -> Result<(), Error> + Send + Sync + 'static,
{
    fn handle(&self, req: &mut Request, res: &mut Response, next: Next<'_>) -> Result<(), Error> {
        (self.0)(req, res, next)
    }
}

// ── Stage ─────────────────────────────────────────────────────────────────────

/// A resolved middleware instance, tagged with the identifier it was
/// resolved from.
#[derive(Clone)]
pub struct Stage {
    id: MiddlewareRef,
    middleware: Arc<dyn Middleware>,
}

impl Stage {
    pub(crate) fn new(id: MiddlewareRef, middleware: Arc<dyn Middleware>) -> Self {
        Self { id, middleware }
    }

    pub fn id(&self) -> &MiddlewareRef { &self.id }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Stage").field(&self.id.as_str()).finish()
    }
}

// ── Next ──────────────────────────────────────────────────────────────────────

type Terminal<'a> = Box<dyn FnOnce(&mut Request, &mut Response) -> Result<(), Error> + 'a>;

/// The remainder of a pipeline: the stages not yet run, then the terminal
/// action.
pub struct Next<'a> {
    stages: &'a [Stage],
    terminal: Terminal<'a>,
}

impl Next<'_> {
    /// Runs the next stage, or the terminal action once every stage has
    /// continued. Errors from further down come back unchanged.
    pub fn run(self, req: &mut Request, res: &mut Response) -> Result<(), Error> {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                trace!(middleware = %stage.id, "entering middleware");
                let next = Next { stages: rest, terminal: self.terminal };
                stage.middleware.handle(req, res, next)
            }
            None => (self.terminal)(req, res),
        }
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

/// An ordered list of stages composed with a terminal action.
///
/// The pipeline borrows its stages; building one per request is free apart
/// from boxing the terminal closure.
pub struct Pipeline<'a> {
    stages: &'a [Stage],
}

impl<'a> Pipeline<'a> {
    pub fn new(stages: &'a [Stage]) -> Self {
        Self { stages }
    }

    /// Runs the stages in order and, if every stage continues, `terminal`.
    pub fn run<F>(self, req: &mut Request, res: &mut Response, terminal: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Request, &mut Response) -> Result<(), Error> + 'a,
    {
        Next { stages: self.stages, terminal: Box::new(terminal) }.run(req, res)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use http::StatusCode;

    use super::*;
    use crate::method::Method;

    type Log = Arc<Mutex<Vec<&'static str>>>;

    fn recording(log: &Log, name: &'static str, continues: bool) -> Stage {
        let log = Arc::clone(log);
        let mw = from_fn(move |req, res, next| {
            log.lock().unwrap().push(name);
            if continues { next.run(req, res) } else { Ok(()) }
        });
        Stage::new(MiddlewareRef::from(name), Arc::new(mw))
    }

    fn run(stages: &[Stage], log: &Log) -> Result<Response, Error> {
        let mut req = Request::new(Method::Get, "/");
        let mut res = Response::new();
        let log = Arc::clone(log);
        Pipeline::new(stages).run(&mut req, &mut res, move |_, res| {
            log.lock().unwrap().push("handler");
            res.send("done");
            Ok(())
        })?;
        Ok(res)
    }

    #[test]
    fn runs_stages_in_order_then_terminal() {
        let log = Log::default();
        let stages = [recording(&log, "a", true), recording(&log, "b", true)];

        let res = run(&stages, &log).unwrap();

        assert_eq!(*log.lock().unwrap(), ["a", "b", "handler"]);
        assert_eq!(res.body(), b"done");
    }

    #[test]
    fn empty_pipeline_runs_terminal() {
        let log = Log::default();
        run(&[], &log).unwrap();
        assert_eq!(*log.lock().unwrap(), ["handler"]);
    }

    #[test]
    fn stage_that_skips_next_stops_the_chain() {
        let log = Log::default();
        let stages = [
            recording(&log, "a", true),
            recording(&log, "b", false),
            recording(&log, "c", true),
        ];

        let res = run(&stages, &log).unwrap();

        assert_eq!(*log.lock().unwrap(), ["a", "b"]);
        assert!(res.body().is_empty());
    }

    #[test]
    fn post_processing_sees_downstream_mutations() {
        let wrap = from_fn(|req, res, next| {
            next.run(req, res)?;
            let status = res.status();
            res.set_header("x-status", status.as_str());
            Ok(())
        });
        let stages = [Stage::new("wrap".into(), Arc::new(wrap))];
        let mut req = Request::new(Method::Get, "/");
        let mut res = Response::new();

        Pipeline::new(&stages)
            .run(&mut req, &mut res, |_, res| {
                res.set_status_code(StatusCode::ACCEPTED);
                Ok(())
            })
            .unwrap();

        assert_eq!(res.header("x-status"), Some("202"));
    }

    #[test]
    fn errors_propagate_and_mutations_persist() {
        let stamp = from_fn(|req, res, next| {
            res.set_header("x-seen", "yes");
            next.run(req, res)
        });
        let stages = [Stage::new("stamp".into(), Arc::new(stamp))];
        let mut req = Request::new(Method::Get, "/");
        let mut res = Response::new();

        let err = Pipeline::new(&stages)
            .run(&mut req, &mut res, |_, _| Err(Error::handler("boom")))
            .unwrap_err();

        assert_eq!(err.to_string(), "boom");
        assert_eq!(res.header("x-seen"), Some("yes"));
    }
}

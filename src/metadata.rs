//! Metadata extraction: merging structured declarations and annotations.
//!
//! The merge order is fixed:
//!
//! 1. class-level structured middleware
//! 2. class-level `@RouteMiddleware`
//! 3. action-level structured middleware
//! 4. action-level `@RouteMiddleware`
//!
//! Within each source, declaration order is kept. Routes follow the same
//! rule: structured routes first, then `@Route` annotations in text order.
//!
//! Annotation text that does not match the grammar contributes nothing. It
//! is not an error; the text may simply be prose.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::controller::{Controller, RouteDeclaration};
use crate::handler::ActionFn;
use crate::method::Method;
use crate::middleware::MiddlewareRef;

static ROUTE_ANNOTATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"@Route\(\s*"([^"]*)"\s*,\s*"([^"]*)"\s*\)"#).expect("route annotation pattern")
});

static MIDDLEWARE_ANNOTATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"@RouteMiddleware\(([^)]*)\)").expect("middleware annotation pattern")
});

/// Everything needed to register one action.
pub struct Declaration<C> {
    pub name: &'static str,
    pub handler: ActionFn<C>,
    pub routes: Vec<RouteDeclaration>,
    pub middleware: Vec<MiddlewareRef>,
}

/// Collects the merged declarations for every action of `controller`.
///
/// Actions without routes are returned too, with an empty `routes` list.
pub fn extract<C: Controller>(controller: &C) -> Vec<Declaration<C>> {
    let descriptor = controller.describe();

    let mut class_middleware = descriptor.middleware;
    class_middleware.extend(parse_middleware(&descriptor.doc));

    descriptor.actions
        .into_iter()
        .map(|action| {
            let mut routes = action.routes;
            routes.extend(parse_routes(&action.doc));

            let mut middleware = class_middleware.clone();
            middleware.extend(action.middleware);
            middleware.extend(parse_middleware(&action.doc));

            Declaration { name: action.name, handler: action.handler, routes, middleware }
        })
        .collect()
}

/// Parses every `@Route("<METHOD>", "<path>")` in `doc`.
///
/// Annotations naming a method portico does not know are skipped.
pub fn parse_routes(doc: &str) -> Vec<RouteDeclaration> {
    ROUTE_ANNOTATION
        .captures_iter(doc)
        .filter_map(|caps| {
            let method = match caps[1].parse::<Method>() {
                Ok(method) => method,
                Err(e) => {
                    debug!(annotation = &caps[0], "skipping route annotation: {e}");
                    return None;
                }
            };
            Some(RouteDeclaration { method, path: caps[2].to_owned() })
        })
        .collect()
}

/// Parses every `@RouteMiddleware(a, b, ...)` in `doc`, in order.
pub fn parse_middleware(doc: &str) -> Vec<MiddlewareRef> {
    MIDDLEWARE_ANNOTATION
        .captures_iter(doc)
        .flat_map(|caps| {
            caps[1]
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(|id| MiddlewareRef::from(id.to_owned()))
                .collect::<Vec<_>>()
        })
        .collect()
}

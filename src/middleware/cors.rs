//! Cross-origin headers and preflight answers.

use http::StatusCode;

use super::{Middleware, Next};
use crate::error::Error;
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;

/// Adds CORS headers and answers `OPTIONS` preflights with `204`.
///
/// A preflight never reaches the controller: the chain stops here.
///
/// Defaults allow any origin, `GET, POST, PUT, DELETE, OPTIONS`, the
/// `Content-Type` and `Authorization` headers, no credentials, and a 24 h
/// preflight cache.
#[derive(Clone, Debug)]
pub struct Cors {
    allowed_origins: Vec<String>,
    allowed_methods: Vec<Method>,
    allowed_headers: Vec<String>,
    allow_credentials: bool,
    max_age: u32,
}

impl Default for Cors {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_owned()],
            allowed_methods: vec![Method::Get, Method::Post, Method::Put, Method::Delete, Method::Options],
            allowed_headers: vec!["Content-Type".to_owned(), "Authorization".to_owned()],
            allow_credentials: false,
            max_age: 86_400,
        }
    }
}

impl Cors {
    /// Restricts allowed origins. The first call replaces the `*` default;
    /// later calls add to the list.
    pub fn allow_origin(mut self, origin: &str) -> Self {
        self.allowed_origins.retain(|o| o != "*");
        self.allowed_origins.push(origin.to_owned());
        self
    }

    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.allow_credentials = allow;
        self
    }

    pub fn max_age(mut self, seconds: u32) -> Self {
        self.max_age = seconds;
        self
    }

    fn is_origin_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|o| o == "*" || o == origin)
    }

    fn add_headers(&self, origin: &str, res: &mut Response) {
        let methods = self.allowed_methods.iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        res.set_header("Access-Control-Allow-Origin", origin)
            .set_header("Access-Control-Allow-Methods", &methods)
            .set_header("Access-Control-Allow-Headers", &self.allowed_headers.join(", "))
            .set_header("Access-Control-Max-Age", &self.max_age.to_string());
        if self.allow_credentials {
            res.set_header("Access-Control-Allow-Credentials", "true");
        }
    }
}

impl Middleware for Cors {
    fn handle(&self, req: &mut Request, res: &mut Response, next: Next<'_>) -> Result<(), Error> {
        let origin = req.header("origin").unwrap_or("*");
        if self.is_origin_allowed(origin) {
            self.add_headers(origin, res);
        }

        if req.method() == Method::Options {
            res.set_status_code(StatusCode::NO_CONTENT).send("");
            return Ok(());
        }

        next.run(req, res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{Pipeline, Stage};
    use std::sync::Arc;

    fn run(cors: Cors, mut req: Request) -> (Response, bool) {
        let stages = [Stage::new("cors".into(), Arc::new(cors))];
        let mut res = Response::new();
        let mut reached = false;
        Pipeline::new(&stages)
            .run(&mut req, &mut res, |_, _| {
                reached = true;
                Ok(())
            })
            .unwrap();
        (res, reached)
    }

    #[test]
    fn preflight_short_circuits_with_no_content() {
        let (res, reached) = run(Cors::default(), Request::new(Method::Options, "/"));
        assert!(!reached);
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert!(res.body().is_empty());
        assert_eq!(res.header("access-control-allow-origin"), Some("*"));
        assert_eq!(res.header("access-control-max-age"), Some("86400"));
    }

    #[test]
    fn other_methods_continue_with_headers() {
        let req = Request::new(Method::Get, "/").with_header("Origin", "https://a.example");
        let (res, reached) = run(Cors::default(), req);
        assert!(reached);
        assert_eq!(res.header("access-control-allow-origin"), Some("https://a.example"));
        assert_eq!(
            res.header("access-control-allow-methods"),
            Some("GET, POST, PUT, DELETE, OPTIONS"),
        );
    }

    #[test]
    fn disallowed_origin_gets_no_headers() {
        let cors = Cors::default().allow_origin("https://a.example").allow_credentials(true);
        let req = Request::new(Method::Get, "/").with_header("Origin", "https://evil.example");
        let (res, reached) = run(cors, req);
        assert!(reached);
        assert!(res.headers().is_empty());
    }
}

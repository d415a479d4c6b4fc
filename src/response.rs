//! Outgoing HTTP response type and the template-rendering hook.
//!
//! Unlike a return-value response, a portico [`Response`] is handed to every
//! middleware and to the controller action as `&mut Response`. Each stage
//! mutates it in place, and whatever state it holds when the chain returns
//! is what the client receives. Nothing is rolled back: a header set by a
//! middleware that later short-circuits is still sent.

use std::sync::Arc;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::StatusCode;
use http_body_util::Full;
use serde::Serialize;
use tracing::warn;

use crate::error::{BoxError, Error};

const DEFAULT_CONTENT_TYPE: &str = "text/html";

// ── TemplateRenderer ──────────────────────────────────────────────────────────

/// Renders named templates for [`Response::send_template`].
///
/// portico ships no template engine. Install one on the router with
/// [`Router::renderer`](crate::Router::renderer):
///
/// ```rust
/// use portico::{BoxError, TemplateRenderer};
///
/// struct Greeting;
///
/// impl TemplateRenderer for Greeting {
///     fn render(&self, _name: &str, params: &serde_json::Value) -> Result<String, BoxError> {
///         Ok(format!("<h1>Hello, {}</h1>", params["name"].as_str().unwrap_or("you")))
///     }
/// }
/// ```
pub trait TemplateRenderer: Send + Sync + 'static {
    fn render(&self, name: &str, params: &serde_json::Value) -> Result<String, BoxError>;
}

// ── Response ──────────────────────────────────────────────────────────────────

/// An outgoing HTTP response, mutated in place by the handler chain.
///
/// Starts as `200 OK`, `text/html`, empty body.
pub struct Response {
    status: StatusCode,
    content_type: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    renderer: Option<Arc<dyn TemplateRenderer>>,
}

impl Response {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            content_type: DEFAULT_CONTENT_TYPE.to_owned(),
            headers: Vec::new(),
            body: Vec::new(),
            renderer: None,
        }
    }

    pub(crate) fn with_renderer(renderer: Option<Arc<dyn TemplateRenderer>>) -> Self {
        Self { renderer, ..Self::new() }
    }

    pub fn set_status_code(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    pub fn set_content_type(&mut self, content_type: &str) -> &mut Self {
        self.content_type = content_type.to_owned();
        self
    }

    /// Sets a header, replacing any existing value with the same
    /// (case-insensitive) name.
    pub fn set_header(&mut self, name: &str, value: &str) -> &mut Self {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Appends to the body. Calling `send` twice writes both chunks.
    pub fn send(&mut self, body: impl AsRef<[u8]>) {
        self.body.extend_from_slice(body.as_ref());
    }

    /// Serializes `value` as the body and marks it `application/json`.
    pub fn json<T: Serialize>(&mut self, value: &T) -> Result<(), Error> {
        let bytes = serde_json::to_vec(value)?;
        self.set_content_type("application/json");
        self.send(bytes);
        Ok(())
    }

    /// Renders `name` with the installed [`TemplateRenderer`] and sends the
    /// output.
    pub fn send_template(&mut self, name: &str, params: &serde_json::Value) -> Result<(), Error> {
        let renderer = self.renderer.as_ref().ok_or(Error::NoRenderer)?;
        let html = renderer
            .render(name, params)
            .map_err(|source| Error::Template { name: name.to_owned(), source })?;
        self.send(html);
        Ok(())
    }

    pub fn status(&self) -> StatusCode { self.status }
    pub fn content_type(&self) -> &str { &self.content_type }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Converts into a hyper response. Headers that are not valid HTTP are
    /// dropped with a warning.
    pub(crate) fn into_http(self) -> http::Response<Full<Bytes>> {
        let has_body = !self.body.is_empty();
        let mut res = http::Response::new(Full::new(Bytes::from(self.body)));
        *res.status_mut() = self.status;

        let headers = res.headers_mut();
        if has_body {
            match HeaderValue::from_str(&self.content_type) {
                Ok(value) => { headers.insert(CONTENT_TYPE, value); }
                Err(_) => warn!(content_type = %self.content_type, "dropping invalid content type"),
            }
        }
        for (name, value) in &self.headers {
            match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => { headers.append(name, value); }
                _ => warn!(header = %name, "dropping invalid response header"),
            }
        }
        res
    }
}

impl Default for Response {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Upper;

    impl TemplateRenderer for Upper {
        fn render(&self, name: &str, params: &serde_json::Value) -> Result<String, BoxError> {
            if name == "broken.html" {
                return Err("syntax error".into());
            }
            Ok(format!("{name}:{}", params["title"].as_str().unwrap_or("").to_uppercase()))
        }
    }

    #[test]
    fn defaults_to_ok_and_empty() {
        let res = Response::new();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.content_type(), "text/html");
        assert!(res.body().is_empty());
    }

    #[test]
    fn send_appends() {
        let mut res = Response::new();
        res.send("a");
        res.send(b"b");
        assert_eq!(res.body(), b"ab");
    }

    #[test]
    fn set_header_replaces_existing_value() {
        let mut res = Response::new();
        res.set_header("X-Trace", "1").set_header("x-trace", "2");
        assert_eq!(res.headers().len(), 1);
        assert_eq!(res.header("X-TRACE"), Some("2"));
    }

    #[test]
    fn json_sets_content_type() {
        let mut res = Response::new();
        res.json(&json!({ "ok": true })).unwrap();
        assert_eq!(res.content_type(), "application/json");
        assert_eq!(res.body(), br#"{"ok":true}"#);
    }

    #[test]
    fn send_template_without_renderer_fails() {
        let mut res = Response::new();
        let err = res.send_template("home.html", &json!({})).unwrap_err();
        assert!(matches!(err, Error::NoRenderer));
    }

    #[test]
    fn send_template_uses_renderer() {
        let mut res = Response::with_renderer(Some(Arc::new(Upper)));
        res.send_template("home.html", &json!({ "title": "hi" })).unwrap();
        assert_eq!(res.body(), b"home.html:HI");

        let err = res.send_template("broken.html", &json!({})).unwrap_err();
        assert!(matches!(err, Error::Template { name, .. } if name == "broken.html"));
    }

    #[test]
    fn into_http_carries_status_and_headers() {
        let mut res = Response::new();
        res.set_status_code(StatusCode::CREATED).set_header("location", "/users/1");
        res.send("made");

        let http = res.into_http();
        assert_eq!(http.status(), StatusCode::CREATED);
        assert_eq!(http.headers()["location"], "/users/1");
        assert_eq!(http.headers()[CONTENT_TYPE], "text/html");
    }

    #[test]
    fn into_http_skips_content_type_for_empty_body() {
        let mut res = Response::new();
        res.set_status_code(StatusCode::NO_CONTENT);
        assert!(res.into_http().headers().get(CONTENT_TYPE).is_none());
    }
}

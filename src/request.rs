//! Incoming HTTP request type.

use std::collections::HashMap;

use serde::de::DeserializeOwned;

use crate::error::Error;
use crate::method::Method;
use crate::router::normalize;

/// A file uploaded with the request.
///
/// portico does not parse multipart bodies. Whatever sits in front of the
/// dispatcher attaches files with [`Request::with_file`].
#[derive(Clone, Debug)]
pub struct UploadedFile {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// An incoming HTTP request.
///
/// The path is normalized and stripped of its query string on construction,
/// so `path()` is exactly what the route table is keyed on.
pub struct Request {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    files: HashMap<String, UploadedFile>,
}

impl Request {
    /// Builds a request from a method and a request target such as
    /// `/users?page=2`.
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, query),
            None => (target, ""),
        };
        let query = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();

        Self {
            method,
            path: normalize(path),
            query,
            headers: Vec::new(),
            body: Vec::new(),
            files: HashMap::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.insert_header(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_file(mut self, file: UploadedFile) -> Self {
        self.files.insert(file.field.clone(), file);
        self
    }

    pub fn method(&self) -> Method { self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn query_params(&self) -> &[(String, String)] { &self.query }

    /// First value of a query parameter.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Appends a header. Middleware uses this to annotate the request for
    /// stages further down the chain.
    pub fn insert_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_owned(), value.to_owned()));
    }

    /// Deserializes the query string into `T`.
    ///
    /// ```rust
    /// # use portico::{Method, Request};
    /// #[derive(serde::Deserialize)]
    /// struct Page { page: u32 }
    ///
    /// let req = Request::new(Method::Get, "/users?page=2");
    /// assert_eq!(req.query_as::<Page>().unwrap().page, 2);
    /// ```
    pub fn query_as<T: DeserializeOwned>(&self) -> Result<T, Error> {
        Ok(serde_urlencoded::from_str(self.query_string().as_str())?)
    }

    /// Decodes an `application/x-www-form-urlencoded` body into `T`.
    pub fn form<T: DeserializeOwned>(&self) -> Result<T, Error> {
        Ok(serde_urlencoded::from_bytes(&self.body)?)
    }

    /// Decodes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    fn query_string(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&self.query)
            .finish()
    }

    pub fn file(&self, field: &str) -> Option<&UploadedFile> {
        self.files.get(field)
    }

    pub fn files(&self) -> impl Iterator<Item = &UploadedFile> {
        self.files.values()
    }
}

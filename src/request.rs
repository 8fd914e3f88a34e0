//! Incoming HTTP request type.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http_body_util::BodyExt;

use crate::error::Error;

/// An incoming HTTP request with its body fully read.
///
/// Cloning is cheap enough to keep a copy around for the error handler: body
/// and headers are reference counted.
#[derive(Clone, Debug)]
pub struct Request {
    pub(crate) method: http::Method,
    pub(crate) path: String,
    pub(crate) query: Option<String>,
    pub(crate) headers: Arc<HeaderMap>,
    pub(crate) body: Bytes,
    pub(crate) params: HashMap<String, String>,
}

impl Request {
    /// Builds a request by hand. Mostly useful for tests and in-process dispatch.
    pub fn new(method: http::Method, uri: &str) -> Self {
        let (path, query) = match uri.split_once('?') {
            Some((p, q)) => (p.to_owned(), Some(q.to_owned())),
            None => (uri.to_owned(), None),
        };
        Self {
            method,
            path,
            query,
            headers: Arc::default(),
            body: Bytes::new(),
            params: HashMap::new(),
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        Arc::make_mut(&mut self.headers).append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Reads the whole body of a hyper request.
    pub(crate) async fn from_http<B>(req: http::Request<B>) -> Result<Self, Error>
    where
        B: hyper::body::Body,
        B::Error: Into<crate::error::BoxError>,
    {
        let (parts, body) = req.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))?
            .to_bytes();
        Ok(Self {
            method: parts.method,
            path: parts.uri.path().to_owned(),
            query: parts.uri.query().map(str::to_owned),
            headers: Arc::new(parts.headers),
            body,
            params: HashMap::new(),
        })
    }

    pub fn method(&self) -> &http::Method { &self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn query(&self) -> Option<&str> { self.query.as_deref() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Case-insensitive header lookup. Non-UTF-8 values are skipped.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_query_from_path() {
        let req = Request::new(http::Method::GET, "/search?q=rust&page=2");
        assert_eq!(req.path(), "/search");
        assert_eq!(req.query(), Some("q=rust&page=2"));
    }

    #[test]
    fn header_lookup_ignores_case() {
        let req = Request::new(http::Method::GET, "/")
            .with_header(http::header::ACCEPT, HeaderValue::from_static("text/html"));
        assert_eq!(req.header("Accept"), Some("text/html"));
        assert_eq!(req.header("x-missing"), None);
    }

    #[test]
    fn clones_share_headers_until_written() {
        let req = Request::new(http::Method::GET, "/")
            .with_header(http::header::ACCEPT, HeaderValue::from_static("text/html"));
        let kept = req.clone();
        assert!(Arc::ptr_eq(&req.headers, &kept.headers));

        let changed = kept.clone().with_header(http::header::ACCEPT, HeaderValue::from_static("*/*"));
        assert_eq!(req.headers().get_all(http::header::ACCEPT).iter().count(), 1);
        assert_eq!(changed.headers().get_all(http::header::ACCEPT).iter().count(), 2);
    }
}

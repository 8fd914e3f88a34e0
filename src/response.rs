//! Outgoing HTTP response handle.
//!
//! A [`Response`] is what a handler writes into: status, headers, body bytes.
//! It is a cheap clonable handle, so middleware and handlers can hold it by
//! value while the dispatcher keeps its own copy to build the final
//! `http::Response` once the handler returns.
//!
//! Behind the handle sits a [`ResponseSink`]. Normally that is the wire
//! response; for fallback pages the dispatcher swaps in a
//! [`CaptureBuffer`](crate::capture::CaptureBuffer) so the output can be
//! inspected before anything reaches the client. Both share one header map.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use http::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use http_body_util::Full;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::Error;
use crate::render::Renderer;

/// Header map shared between a response and any buffer standing in for it.
pub type SharedHeaders = Arc<Mutex<HeaderMap>>;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for use with [`Response::bytes`].
pub enum ContentType {
    Csv,          // text/csv
    EventStream,  // text/event-stream  (SSE)
    FormData,     // application/x-www-form-urlencoded
    Html,         // text/html; charset=utf-8
    Json,         // application/json
    MsgPack,      // application/msgpack
    OctetStream,  // application/octet-stream  (binary / file download)
    Pdf,          // application/pdf
    Text,         // text/plain; charset=utf-8
    Xml,          // application/xml
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv         => "text/csv",
            Self::EventStream => "text/event-stream",
            Self::FormData    => "application/x-www-form-urlencoded",
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json",
            Self::MsgPack     => "application/msgpack",
            Self::OctetStream => "application/octet-stream",
            Self::Pdf         => "application/pdf",
            Self::Text        => "text/plain; charset=utf-8",
            Self::Xml         => "application/xml",
        }
    }
}

// ── Sinks ─────────────────────────────────────────────────────────────────────

/// Where a [`Response`] stores what handlers write.
pub(crate) trait ResponseSink: Send {
    fn headers(&self) -> &SharedHeaders;
    /// `None` until a handler sets a status.
    fn status(&self) -> Option<StatusCode>;
    fn set_status(&mut self, status: StatusCode);
    fn write(&mut self, bytes: &[u8]);
    fn written(&self) -> usize;
    fn take_body(&mut self) -> Bytes;
}

/// The response that will actually go out on the connection.
struct WireResponse {
    status: Option<StatusCode>,
    headers: SharedHeaders,
    body: BytesMut,
}

impl ResponseSink for WireResponse {
    fn headers(&self) -> &SharedHeaders { &self.headers }
    fn status(&self) -> Option<StatusCode> { self.status }
    fn set_status(&mut self, status: StatusCode) { self.status = Some(status); }
    fn write(&mut self, bytes: &[u8]) { self.body.extend_from_slice(bytes); }
    fn written(&self) -> usize { self.body.len() }
    fn take_body(&mut self) -> Bytes { self.body.split().freeze() }
}

// ── ViewBag ───────────────────────────────────────────────────────────────────

/// Response-scoped key/value side channel.
///
/// Middleware stashes values here for later handlers and templates; the
/// dispatcher puts a recovered panic message under `"error"` before calling
/// the error handler.
#[derive(Clone, Default)]
pub struct ViewBag(Arc<Mutex<HashMap<String, Value>>>);

impl ViewBag {
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.lock().insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.lock().get(key).cloned()
    }

    /// Snapshot of every entry, as handed to a [`Renderer`].
    pub fn to_map(&self) -> HashMap<String, Value> {
        self.0.lock().clone()
    }
}

// ── Response ──────────────────────────────────────────────────────────────────

/// Writable side of one HTTP exchange.
///
/// ```rust
/// # async fn demo(res: ferrule::Response) -> Result<(), ferrule::Error> {
/// use http::StatusCode;
///
/// res.set_status(StatusCode::CREATED);
/// res.set_header("location", "/users/42")?;
/// res.json(br#"{"id":42}"#);
/// # Ok(()) }
/// ```
#[derive(Clone)]
pub struct Response {
    sink: Arc<Mutex<dyn ResponseSink>>,
    bag: ViewBag,
}

impl Default for Response {
    fn default() -> Self { Self::new() }
}

impl Response {
    /// A fresh wire response: status unset (sent as 200), no headers, no body.
    pub fn new() -> Self {
        let sink = WireResponse {
            status: None,
            headers: SharedHeaders::default(),
            body: BytesMut::new(),
        };
        Self { sink: Arc::new(Mutex::new(sink)), bag: ViewBag::default() }
    }

    /// A response writing into `sink` that shares this response's view bag.
    pub(crate) fn redirected(&self, sink: Arc<Mutex<dyn ResponseSink>>) -> Self {
        Self { sink, bag: self.bag.clone() }
    }

    pub fn status(&self) -> StatusCode {
        self.sink.lock().status().unwrap_or(StatusCode::OK)
    }

    pub fn set_status(&self, status: StatusCode) {
        self.sink.lock().set_status(status);
    }

    /// Inserts a header, replacing any previous value under the same name.
    pub fn set_header<K, V>(&self, name: K, value: V) -> Result<(), Error>
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        let name = HeaderName::try_from(name).map_err(Into::into)?;
        let value = HeaderValue::try_from(value).map_err(Into::into)?;
        self.headers().lock().insert(name, value);
        Ok(())
    }

    pub fn header(&self, name: &str) -> Option<HeaderValue> {
        self.headers().lock().get(name).cloned()
    }

    /// The header map behind this response, shared with any capture buffer.
    pub fn headers(&self) -> SharedHeaders {
        Arc::clone(self.sink.lock().headers())
    }

    /// Appends raw bytes to the body.
    pub fn write(&self, bytes: impl AsRef<[u8]>) {
        self.sink.lock().write(bytes.as_ref());
    }

    /// Number of body bytes written so far.
    pub fn written(&self) -> usize {
        self.sink.lock().written()
    }

    pub fn bag(&self) -> &ViewBag {
        &self.bag
    }

    /// Writes a `text/plain` body.
    pub fn text(&self, body: impl AsRef<str>) {
        self.bytes(ContentType::Text, body.as_ref());
    }

    /// Writes an `application/json` body.
    pub fn json(&self, body: impl AsRef<[u8]>) {
        self.bytes(ContentType::Json, body);
    }

    pub fn html(&self, body: impl AsRef<str>) {
        self.bytes(ContentType::Html, body.as_ref());
    }

    /// Sets `content-type` and writes `body`.
    pub fn bytes(&self, content_type: ContentType, body: impl AsRef<[u8]>) {
        self.headers()
            .lock()
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type.as_str()));
        self.write(body);
    }

    /// Renders `view` with this response's bag and writes it as HTML.
    pub fn view(&self, renderer: &dyn Renderer, view: &str) -> Result<(), Error> {
        let page = renderer.render(view, &self.bag)?;
        self.html(page);
        Ok(())
    }

    /// Drops status, headers and body so another handler can start over.
    pub(crate) fn reset(&self) {
        let mut sink = self.sink.lock();
        sink.headers().lock().clear();
        sink.take_body();
        sink.set_status(StatusCode::OK);
    }

    /// Turns everything written so far into the message hyper sends.
    pub fn into_http(self) -> http::Response<Full<Bytes>> {
        let (status, headers, body) = {
            let mut sink = self.sink.lock();
            let headers = std::mem::take(&mut *sink.headers().lock());
            (sink.status().unwrap_or(StatusCode::OK), headers, sink.take_body())
        };
        let mut out = http::Response::new(Full::new(body));
        *out.status_mut() = status;
        *out.headers_mut() = headers;
        out
    }
}

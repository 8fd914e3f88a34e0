//! Response capture buffer for fallback dispatch.
//!
//! A streaming response cannot have its `Content-Type` corrected after bytes
//! hit the wire. The default handler therefore writes into a [`CaptureBuffer`]
//! first; [`CaptureBuffer::flush`] sniffs the body, fills in the header if the
//! handler did not, and only then copies status and body to the real response.
//!
//! Headers are not buffered: the buffer holds the real response's
//! [`SharedHeaders`], so anything the handler sets is already in place.

use std::sync::Arc;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderValue};
use http::StatusCode;
use parking_lot::Mutex;

use crate::response::{Response, ResponseSink, SharedHeaders};
use crate::sniff::{self, SNIFF_LEN};

/// In-memory stand-in for a response, owned by one request.
pub struct CaptureBuffer {
    status: Option<StatusCode>,
    headers: SharedHeaders,
    body: Vec<u8>,
}

impl CaptureBuffer {
    pub fn new(headers: SharedHeaders) -> Self {
        Self { status: None, headers, body: Vec::new() }
    }

    /// Wraps a fresh buffer in a [`Response`] handle sharing `real`'s headers
    /// and view bag. The returned `Arc` gives the buffer back after the
    /// handler is done.
    pub(crate) fn attach(real: &Response) -> (Arc<Mutex<CaptureBuffer>>, Response) {
        let buffer = Arc::new(Mutex::new(Self::new(real.headers())));
        let response = real.redirected(buffer.clone());
        (buffer, response)
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Content type to announce for the buffered body, if the handler left
    /// it unset and there is something to look at.
    pub fn sniffed_content_type(&self) -> Option<&'static str> {
        if self.body.is_empty() || self.headers.lock().contains_key(CONTENT_TYPE) {
            return None;
        }
        let window = &self.body[..self.body.len().min(SNIFF_LEN)];
        Some(sniff::detect_content_type(window))
    }

    /// Commits the buffer to `real`: content type, then status, then body.
    ///
    /// A status the handler never set is not copied, so `real` keeps its own
    /// default of `200 OK`.
    pub fn flush(self, real: &Response) {
        if let Some(ct) = self.sniffed_content_type() {
            self.headers.lock().insert(CONTENT_TYPE, HeaderValue::from_static(ct));
        }
        if let Some(status) = self.status {
            real.set_status(status);
        }
        if !self.body.is_empty() {
            real.write(&self.body);
        }
    }

    /// Moves the captured output out, leaving an empty buffer behind.
    pub(crate) fn take(&mut self) -> CaptureBuffer {
        CaptureBuffer {
            status: self.status.take(),
            headers: Arc::clone(&self.headers),
            body: std::mem::take(&mut self.body),
        }
    }
}

impl ResponseSink for CaptureBuffer {
    fn headers(&self) -> &SharedHeaders { &self.headers }
    fn status(&self) -> Option<StatusCode> { self.status }
    fn set_status(&mut self, status: StatusCode) { self.status = Some(status); }
    fn write(&mut self, bytes: &[u8]) { self.body.extend_from_slice(bytes); }
    fn written(&self) -> usize { self.body.len() }
    fn take_body(&mut self) -> Bytes { Bytes::from(std::mem::take(&mut self.body)) }
}

//! Request dispatch and fault recovery.
//!
//! Per request:
//!
//! ```text
//! ┌─────────────── catch_unwind boundary ───────────────┐
//! │ matcher hit  → handler.serve(req, res)               │
//! │ matcher miss → no default handler → bare 404         │
//! │              → default handler → CaptureBuffer       │
//! │                               → sniff → flush to res │
//! └──────────────────────────────────────────────────────┘
//!          │ panic
//!          ▼
//!   error handler set?  yes → reset res, bag["error"] = message, serve
//!                       no  → log, Err(HandlerFault)
//! ```
//!
//! The error handler runs outside the boundary: if it panics too, the panic
//! travels up to the connection task, which is the end of that connection and
//! nothing else.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use http::StatusCode;
use tracing::{error, warn};

use crate::capture::CaptureBuffer;
use crate::error::{Error, Fault};
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

/// Polls `fut` to completion, turning a panic into a [`Fault`].
pub(crate) async fn supervise<F: Future>(fut: F) -> Result<F::Output, Fault> {
    AssertUnwindSafe(fut).catch_unwind().await.map_err(Fault::from_payload)
}

impl Router {
    /// Routes one request and writes the outcome into `res`.
    ///
    /// - `Ok(())`: a handler (matched, default or error) completed.
    /// - `Err(Error::HandlerReturned)`: a handler reported failure; whatever
    ///   it wrote is still in `res`.
    /// - `Err(Error::HandlerFault)`: a handler panicked and no error handler
    ///   is set. The caller should abandon the response.
    pub async fn dispatch(&self, req: Request, res: Response) -> Result<(), Error> {
        let retained = req.clone();
        match supervise(self.route(req, res.clone())).await {
            Ok(outcome) => outcome,
            Err(fault) => self.recover(fault, retained, res).await,
        }
    }

    async fn route(&self, mut req: Request, res: Response) -> Result<(), Error> {
        let hit = Method::try_from(req.method())
            .ok()
            .and_then(|method| self.matcher().find(method, req.path()));

        match hit {
            Some((handler, params)) => {
                req.params = params;
                handler.serve(req, res).await
            }
            None => self.serve_not_found(req, res).await,
        }
    }

    async fn serve_not_found(&self, req: Request, res: Response) -> Result<(), Error> {
        let Some(default) = self.default_handler.load_full() else {
            res.set_status(StatusCode::NOT_FOUND);
            return Ok(());
        };

        let (buffer, buffered) = CaptureBuffer::attach(&res);
        let outcome = default.serve(req, buffered).await;
        let captured = buffer.lock().take();
        captured.flush(&res);
        outcome
    }

    async fn recover(&self, fault: Fault, req: Request, res: Response) -> Result<(), Error> {
        let Some(handler) = self.error_handler.load_full() else {
            error!(method = %req.method(), path = req.path(), %fault, "handler panicked");
            return Err(Error::HandlerFault(fault));
        };

        warn!(method = %req.method(), path = req.path(), %fault, "handler panicked, running error handler");
        res.reset();
        res.bag().set("error", fault.message());
        handler.serve(req, res).await
    }
}

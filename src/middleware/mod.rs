//! Middleware layer.
//!
//! Middleware intercepts requests and responses and is the right place for
//! cross-cutting concerns: structured tracing, request-id injection,
//! authentication-header inspection.
//!
//! A [`Middleware`] is an async function receiving the request, the response
//! handle and a [`Next`] continuation. Calling [`Next::run`] hands control to
//! the rest of the chain; not calling it short-circuits the handler.
//!
//! ```rust
//! use ferrule::middleware::{Middleware, Next};
//!
//! let auth = Middleware::new("auth", |req: ferrule::Request, res: ferrule::Response, next: Next| async move {
//!     if req.header("authorization").is_none() {
//!         res.set_status(http::StatusCode::UNAUTHORIZED);
//!         return Ok(());
//!     }
//!     next.run(req, res).await
//! });
//! ```
//!
//! Built-in middleware:
//! - [`trace`]: per-request span recording status and latency

use std::future::Future;
use std::sync::Arc;

use crate::handler::{BoxFuture, Endpoint, HandlerResult, IntoOutcome};
use crate::request::Request;
use crate::response::Response;

mod trace;

pub use trace::trace;

type MiddlewareFn = dyn Fn(Request, Response, Next) -> BoxFuture<HandlerResult> + Send + Sync;

/// A named wrapper around a handler's chain.
#[derive(Clone)]
pub struct Middleware {
    name: Arc<str>,
    func: Arc<MiddlewareFn>,
}

impl Middleware {
    pub fn new<F, Fut, R>(name: &str, f: F) -> Self
    where
        F: Fn(Request, Response, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoOutcome + 'static,
    {
        let func = move |req: Request, res: Response, next: Next| -> BoxFuture<HandlerResult> {
            let fut = f(req, res, next);
            Box::pin(async move { fut.await.into_outcome() })
        };
        Self { name: Arc::from(name), func: Arc::new(func) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, req: Request, res: Response, next: Next) -> BoxFuture<HandlerResult> {
        (self.func)(req, res, next)
    }
}

impl std::fmt::Debug for Middleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Middleware").field(&self.name).finish()
    }
}

/// The remainder of a handler's chain.
pub struct Next {
    chain: Arc<Vec<Middleware>>,
    /// Middleware at indices below this have not run yet.
    remaining: usize,
    endpoint: Arc<dyn Endpoint>,
}

impl Next {
    pub(crate) fn new(chain: Arc<Vec<Middleware>>, endpoint: Arc<dyn Endpoint>) -> Self {
        let remaining = chain.len();
        Self { chain, remaining, endpoint }
    }

    /// Runs the next middleware, or the endpoint once the chain is exhausted.
    pub fn run(mut self, req: Request, res: Response) -> BoxFuture<HandlerResult> {
        if self.remaining == 0 {
            return self.endpoint.call(req, res);
        }
        self.remaining -= 1;
        let mw = self.chain[self.remaining].clone();
        mw.call(req, res, self)
    }
}

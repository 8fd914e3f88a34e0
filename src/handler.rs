//! Handler type and type erasure.
//!
//! # How handlers are stored
//!
//! The router holds handlers built from many different closure types, so the
//! callable is erased behind a trait object (`dyn Endpoint`) and wrapped in a
//! [`Handler`], which adds the handler's own middleware chain:
//!
//! ```text
//! async fn hello(req, res) { … }                   ← user writes this
//!        ↓ router.get("/", hello)
//! hello.into_handler_source()                      ← IntoHandlerSource blanket impl
//!        ↓
//! HandlerSource::Callable(Arc<FnEndpoint(hello)>)  ← resolved once, here
//!        ↓ registration
//! Handler { endpoint, chain: ArcSwap<Vec<Middleware>> }
//!        ↓ at request time
//! chain[n-1] → … → chain[0] → endpoint             ← newest middleware runs first
//! ```
//!
//! The chain sits behind an `ArcSwap`, so attaching middleware to a handler
//! that is already serving traffic never blocks or races a request: each
//! request walks whichever chain snapshot it loaded.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::error::{BoxError, Error};
use crate::middleware::{Middleware, Next};
use crate::request::Request;
use crate::response::Response;

/// Default upper bound on a single handler's middleware chain.
pub const DEFAULT_MAX_MIDDLEWARE: usize = 64;

/// A heap-allocated, type-erased future.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// What a handler or middleware reports once it is done writing.
pub type HandlerResult = Result<(), BoxError>;

// ── Outcome conversion ────────────────────────────────────────────────────────

/// Return types accepted from handler and middleware functions.
///
/// `()` always succeeds; `Result<(), E>` fails with `E`.
pub trait IntoOutcome {
    fn into_outcome(self) -> HandlerResult;
}

impl IntoOutcome for () {
    fn into_outcome(self) -> HandlerResult { Ok(()) }
}

impl<E: Into<BoxError>> IntoOutcome for Result<(), E> {
    fn into_outcome(self) -> HandlerResult { self.map_err(Into::into) }
}

// ── Erased endpoint ───────────────────────────────────────────────────────────

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in
/// [`HandlerSource::Callable`].
#[doc(hidden)]
pub trait Endpoint: Send + Sync + 'static {
    fn call(&self, req: Request, res: Response) -> BoxFuture<HandlerResult>;
}

/// Newtype bridging a concrete callable to [`Endpoint`].
struct FnEndpoint<F>(F);

impl<F, Fut, R> Endpoint for FnEndpoint<F>
where
    F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome,
{
    fn call(&self, req: Request, res: Response) -> BoxFuture<HandlerResult> {
        let fut = (self.0)(req, res);
        Box::pin(async move { fut.await.into_outcome() })
    }
}

// ── Handler ───────────────────────────────────────────────────────────────────

/// A unit of request processing plus the middleware wrapped around it.
///
/// Cloning yields another handle to the *same* handler; middleware attached
/// through one handle is seen by all of them.
#[derive(Clone)]
pub struct Handler {
    inner: Arc<Inner>,
}

struct Inner {
    endpoint: Arc<dyn Endpoint>,
    chain: ArcSwap<Vec<Middleware>>,
}

impl Handler {
    /// Wraps an async function `(Request, Response) -> ()` or
    /// `(Request, Response) -> Result<(), E>`.
    pub fn new<F, Fut, R>(f: F) -> Self
    where
        F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoOutcome + 'static,
    {
        Self::from_endpoint(Arc::new(FnEndpoint(f)))
    }

    fn from_endpoint(endpoint: Arc<dyn Endpoint>) -> Self {
        Self {
            inner: Arc::new(Inner { endpoint, chain: ArcSwap::from_pointee(Vec::new()) }),
        }
    }

    /// A separate handler sharing this one's endpoint, starting from a copy of
    /// its current chain.
    pub(crate) fn fork(&self) -> Self {
        Self {
            inner: Arc::new(Inner {
                endpoint: Arc::clone(&self.inner.endpoint),
                chain: ArcSwap::new(self.inner.chain.load_full()),
            }),
        }
    }

    /// Wraps the current chain in `mw`.
    ///
    /// Fails once the chain holds [`DEFAULT_MAX_MIDDLEWARE`] entries.
    pub fn attach_middleware(&self, mw: Middleware) -> Result<(), Error> {
        self.attach_bounded(&mw, DEFAULT_MAX_MIDDLEWARE)
            .map_err(|reason| Error::MiddlewareAttach { route: "handler".to_owned(), reason })
    }

    pub(crate) fn attach_bounded(&self, mw: &Middleware, limit: usize) -> Result<(), String> {
        let mut outcome = Ok(());
        self.inner.chain.rcu(|chain| {
            if chain.len() >= limit {
                outcome = Err(format!(
                    "middleware `{}` would exceed the chain limit of {limit}",
                    mw.name()
                ));
                return Arc::clone(chain);
            }
            outcome = Ok(());
            let mut next = Vec::with_capacity(chain.len() + 1);
            next.extend(chain.iter().cloned());
            next.push(mw.clone());
            Arc::new(next)
        });
        outcome
    }

    /// Names of the attached middleware, in attachment order.
    pub fn middleware_names(&self) -> Vec<String> {
        self.inner.chain.load().iter().map(|mw| mw.name().to_owned()).collect()
    }

    /// Runs the middleware chain and the endpoint.
    ///
    /// An error reported by the handler or any middleware comes back as
    /// [`Error::HandlerReturned`]. Panics are not caught here.
    pub async fn serve(&self, req: Request, res: Response) -> Result<(), Error> {
        let next = Next::new(self.inner.chain.load_full(), Arc::clone(&self.inner.endpoint));
        next.run(req, res).await.map_err(Error::HandlerReturned)
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("middleware", &self.middleware_names())
            .finish()
    }
}

// ── HandlerSource ─────────────────────────────────────────────────────────────

/// What a route can be registered with.
///
/// Resolved once at registration; `Empty` is rejected with
/// [`Error::InvalidHandlerKind`].
pub enum HandlerSource {
    /// A handler built elsewhere. The router registers a fork of it.
    Existing(Handler),
    /// A bare async function.
    Callable(Arc<dyn Endpoint>),
    Empty,
}

impl HandlerSource {
    pub(crate) fn into_handler(self) -> Result<Handler, Error> {
        match self {
            Self::Existing(h) => Ok(h.fork()),
            Self::Callable(endpoint) => Ok(Handler::from_endpoint(endpoint)),
            Self::Empty => Err(Error::InvalidHandlerKind),
        }
    }
}

impl From<Handler> for HandlerSource {
    fn from(h: Handler) -> Self { Self::Existing(h) }
}

impl From<Option<Handler>> for HandlerSource {
    fn from(h: Option<Handler>) -> Self {
        h.map_or(Self::Empty, Self::Existing)
    }
}

/// Anything accepted where a route handler is expected.
///
/// Satisfied by [`Handler`], [`HandlerSource`], and every
/// `Fn(Request, Response) -> impl Future<Output = impl IntoOutcome>`.
/// The trait is sealed.
pub trait IntoHandlerSource: private::Sealed {
    fn into_handler_source(self) -> HandlerSource;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + 'static,
{
}

impl<F, Fut, R> IntoHandlerSource for F
where
    F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + 'static,
{
    fn into_handler_source(self) -> HandlerSource {
        HandlerSource::Callable(Arc::new(FnEndpoint(self)))
    }
}

impl private::Sealed for Handler {}
impl IntoHandlerSource for Handler {
    fn into_handler_source(self) -> HandlerSource { HandlerSource::Existing(self) }
}

impl private::Sealed for HandlerSource {}
impl IntoHandlerSource for HandlerSource {
    fn into_handler_source(self) -> HandlerSource { self }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording(log: Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> Middleware {
        Middleware::new(name, move |req, res, next: Next| {
            log.lock().unwrap().push(name);
            next.run(req, res)
        })
    }

    #[tokio::test]
    async fn newest_middleware_runs_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let inner = log.clone();
        let h = Handler::new(move |_req, _res| {
            let inner = inner.clone();
            async move { inner.lock().unwrap().push("handler") }
        });
        h.attach_middleware(recording(log.clone(), "first")).unwrap();
        h.attach_middleware(recording(log.clone(), "second")).unwrap();

        h.serve(Request::new(http::Method::GET, "/"), Response::new()).await.unwrap();
        assert_eq!(*log.lock().unwrap(), ["second", "first", "handler"]);
        assert_eq!(h.middleware_names(), ["first", "second"]);
    }

    #[tokio::test]
    async fn returned_errors_surface_as_handler_returned() {
        let h = Handler::new(|_req, _res| async { Err::<(), _>("db down") });
        let err = h.serve(Request::new(http::Method::GET, "/"), Response::new()).await;
        assert!(matches!(err, Err(Error::HandlerReturned(e)) if e.to_string() == "db down"));
    }

    #[test]
    fn fork_does_not_share_later_middleware() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let h = Handler::new(|_req, _res| async {});
        h.attach_middleware(recording(log.clone(), "a")).unwrap();
        let fork = h.fork();
        fork.attach_middleware(recording(log, "b")).unwrap();

        assert_eq!(h.middleware_names(), ["a"]);
        assert_eq!(fork.middleware_names(), ["a", "b"]);
    }

    #[test]
    fn chain_limit_is_enforced() {
        let h = Handler::new(|_req, _res| async {});
        let mw = Middleware::new("noop", |req, res, next: Next| next.run(req, res));
        assert!(h.attach_bounded(&mw, 1).is_ok());
        assert!(h.attach_bounded(&mw, 1).is_err());
        assert_eq!(h.middleware_names().len(), 1);
    }

    #[test]
    fn empty_source_is_rejected() {
        let src = HandlerSource::from(None::<Handler>);
        assert!(matches!(src.into_handler(), Err(Error::InvalidHandlerKind)));
    }
}

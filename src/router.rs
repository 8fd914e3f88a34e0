//! Route table and registration.
//!
//! One radix tree per HTTP method, O(path-length) lookup via [`matchit`].
//! Unlike a build-once router, this one stays writable after the server has
//! started: routes, middleware and the default/error handlers can all change
//! while requests are in flight.
//!
//! # Read and write paths
//!
//! ```text
//! register / attach_middleware / set_*_handler
//!        ↓ one parking_lot::Mutex<Registry>
//! Registry { routes: (method, path) → Handler, middleware: [..] }
//!        ↓ rebuilt on every route change
//! ArcSwap<Matcher>  ←── dispatch loads a snapshot, never takes the mutex
//! ```
//!
//! The registry is the single source of truth; the matcher is derived from it.
//! Middleware does not touch the matcher at all: both sides hold the same
//! [`Handler`], whose chain is swapped in place.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};
use matchit::Router as MatchitRouter;
use parking_lot::Mutex;
use tracing::{debug, error};

use crate::config::{DuplicateRoutes, RouterConfig};
use crate::error::Error;
use crate::group::RouteGroup;
use crate::handler::{Handler, IntoHandlerSource};
use crate::method::Method;
use crate::middleware::Middleware;

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
struct RouteKey {
    method: Method,
    path: String,
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

#[derive(Default)]
struct Registry {
    routes: HashMap<RouteKey, Handler>,
    middleware: Vec<Middleware>,
}

/// Immutable lookup structure published to the request path.
#[derive(Default)]
pub(crate) struct Matcher {
    trees: HashMap<Method, MatchitRouter<Handler>>,
}

impl Matcher {
    fn build(routes: &HashMap<RouteKey, Handler>) -> Result<Self, Error> {
        let mut trees: HashMap<Method, MatchitRouter<Handler>> = HashMap::new();
        for (key, handler) in routes {
            trees
                .entry(key.method)
                .or_default()
                .insert(key.path.clone(), handler.clone())
                .map_err(|source| Error::InvalidRoute { path: key.path.clone(), source })?;
        }
        Ok(Self { trees })
    }

    pub(crate) fn find(
        &self,
        method: Method,
        path: &str,
    ) -> Option<(Handler, HashMap<String, String>)> {
        let tree = self.trees.get(&method)?;
        let matched = tree.at(path).ok()?;
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((matched.value.clone(), params))
    }
}

/// The application router.
///
/// Share it behind an `Arc`; every method takes `&self`.
///
/// ```rust
/// use ferrule::{Method, Request, Response, Router};
///
/// async fn get_user(req: Request, res: Response) {
///     let id = req.param("id").unwrap_or("unknown");
///     res.json(format!(r#"{{"id":"{id}"}}"#));
/// }
///
/// let router = Router::new();
/// router.get("/users/{id}", get_user).unwrap();
/// router.register(Method::Post, "/users", |_req: Request, res: Response| async move {
///     res.set_status(http::StatusCode::CREATED);
/// }).unwrap();
/// ```
pub struct Router {
    registry: Mutex<Registry>,
    matcher: ArcSwap<Matcher>,
    pub(crate) default_handler: ArcSwapOption<Handler>,
    pub(crate) error_handler: ArcSwapOption<Handler>,
    config: RouterConfig,
}

impl Router {
    pub fn new() -> Self {
        Self::with_config(RouterConfig::default())
    }

    pub fn with_config(config: RouterConfig) -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            matcher: ArcSwap::from_pointee(Matcher::default()),
            default_handler: ArcSwapOption::empty(),
            error_handler: ArcSwapOption::empty(),
            config,
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub(crate) fn matcher(&self) -> Arc<Matcher> {
        self.matcher.load_full()
    }

    /// Registers a handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax, catch-alls `{*rest}`. Every
    /// router-wide middleware attached so far is chained onto the new handler.
    /// On error nothing changes.
    pub fn register(
        &self,
        method: Method,
        path: &str,
        handler: impl IntoHandlerSource,
    ) -> Result<(), Error> {
        let mut registry = self.registry.lock();

        let handler = handler.into_handler_source().into_handler().inspect_err(|e| {
            error!(%method, path, "rejected route handler: {e}");
        })?;

        if !method.is_routable() {
            error!(%method, path, "the matching engine does not support this method");
            return Err(Error::UnsupportedMethod(method.to_string()));
        }

        let key = RouteKey { method, path: path.to_owned() };
        if registry.routes.contains_key(&key) {
            match self.config.duplicate_routes {
                DuplicateRoutes::Replace => debug!(route = %key, "replacing route"),
                DuplicateRoutes::Reject => {
                    return Err(Error::DuplicateRoute { method: method.to_string(), path: key.path });
                }
            }
        }

        for mw in &registry.middleware {
            handler.attach_bounded(mw, self.config.max_middleware).map_err(|reason| {
                error!(route = %key, "failed to chain middleware to route: {reason}");
                Error::MiddlewareAttach { route: key.to_string(), reason }
            })?;
        }

        let mut routes = registry.routes.clone();
        routes.insert(key.clone(), handler);
        let matcher = Matcher::build(&routes).inspect_err(|e| {
            error!(route = %key, "{e}");
        })?;

        registry.routes = routes;
        self.matcher.store(Arc::new(matcher));
        debug!(route = %key, "route registered");
        Ok(())
    }

    pub fn connect(&self, path: &str, handler: impl IntoHandlerSource) -> Result<(), Error> {
        self.register(Method::Connect, path, handler)
    }

    pub fn delete(&self, path: &str, handler: impl IntoHandlerSource) -> Result<(), Error> {
        self.register(Method::Delete, path, handler)
    }

    pub fn get(&self, path: &str, handler: impl IntoHandlerSource) -> Result<(), Error> {
        self.register(Method::Get, path, handler)
    }

    pub fn head(&self, path: &str, handler: impl IntoHandlerSource) -> Result<(), Error> {
        self.register(Method::Head, path, handler)
    }

    pub fn options(&self, path: &str, handler: impl IntoHandlerSource) -> Result<(), Error> {
        self.register(Method::Options, path, handler)
    }

    pub fn patch(&self, path: &str, handler: impl IntoHandlerSource) -> Result<(), Error> {
        self.register(Method::Patch, path, handler)
    }

    pub fn post(&self, path: &str, handler: impl IntoHandlerSource) -> Result<(), Error> {
        self.register(Method::Post, path, handler)
    }

    pub fn put(&self, path: &str, handler: impl IntoHandlerSource) -> Result<(), Error> {
        self.register(Method::Put, path, handler)
    }

    pub fn trace(&self, path: &str, handler: impl IntoHandlerSource) -> Result<(), Error> {
        self.register(Method::Trace, path, handler)
    }

    /// Adds a router-wide middleware.
    ///
    /// It is chained onto every handler registered so far right away, and onto
    /// every later registration at registration time. If chaining fails for
    /// one handler the call stops there: handlers already visited keep the
    /// middleware, later registrations do not get it.
    pub fn attach_middleware(&self, mw: Middleware) -> Result<(), Error> {
        let mut registry = self.registry.lock();
        for (key, handler) in &registry.routes {
            handler.attach_bounded(&mw, self.config.max_middleware).map_err(|reason| {
                error!(route = %key, middleware = mw.name(), "failed to attach middleware: {reason}");
                Error::MiddlewareAttach { route: key.to_string(), reason }
            })?;
        }
        debug!(middleware = mw.name(), routes = registry.routes.len(), "middleware attached");
        registry.middleware.push(mw);
        Ok(())
    }

    /// Sets the handler for requests no route matches.
    ///
    /// It runs against a capture buffer; see [`CaptureBuffer`](crate::capture::CaptureBuffer).
    /// Router-wide middleware is not applied to it.
    pub fn set_default_handler(&self, handler: impl IntoHandlerSource) -> Result<(), Error> {
        let _registry = self.registry.lock();
        let handler = handler.into_handler_source().into_handler()?;
        self.default_handler.store(Some(Arc::new(handler)));
        Ok(())
    }

    /// Sets the handler for requests whose handler panicked.
    ///
    /// The panic message is available as `res.bag().get("error")`.
    /// Router-wide middleware is not applied to it.
    pub fn set_error_handler(&self, handler: impl IntoHandlerSource) -> Result<(), Error> {
        let _registry = self.registry.lock();
        let handler = handler.into_handler_source().into_handler()?;
        self.error_handler.store(Some(Arc::new(handler)));
        Ok(())
    }

    /// Registers every route of a group under `prefix`.
    ///
    /// ```rust
    /// # use ferrule::{Request, Response, Router};
    /// # async fn list(_: Request, _: Response) {}
    /// # async fn show(_: Request, _: Response) {}
    /// let router = Router::new();
    /// router.group("/api/users", |g| {
    ///     g.get("/", list).get("/{id}", show);
    /// }).unwrap();
    /// ```
    pub fn group(&self, prefix: &str, build: impl FnOnce(&mut RouteGroup)) -> Result<(), Error> {
        let mut group = RouteGroup::new();
        build(&mut group);
        group.apply_to(self, prefix)
    }

    /// Registered routes, sorted by path then method name.
    pub fn routes(&self) -> Vec<(Method, String)> {
        let registry = self.registry.lock();
        let mut routes: Vec<_> = registry.routes.keys()
            .map(|k| (k.method, k.path.clone()))
            .collect();
        routes.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));
        routes
    }

    /// The registered handler for an exact method + path pattern.
    pub fn handler(&self, method: Method, path: &str) -> Option<Handler> {
        let key = RouteKey { method, path: path.to_owned() };
        self.registry.lock().routes.get(&key).cloned()
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router").field("routes", &self.routes()).finish()
    }
}

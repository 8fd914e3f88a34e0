//! Route groups: a shared prefix plus group-local middleware.

use crate::error::Error;
use crate::handler::{HandlerSource, IntoHandlerSource};
use crate::method::Method;
use crate::middleware::Middleware;
use crate::router::Router;

/// Routes collected by [`Router::group`] before they are registered.
///
/// Group middleware wraps only the group's handlers and sits inside any
/// router-wide middleware.
#[derive(Default)]
pub struct RouteGroup {
    routes: Vec<(Method, String, HandlerSource)>,
    middleware: Vec<Middleware>,
}

impl RouteGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&mut self, method: Method, path: &str, handler: impl IntoHandlerSource) -> &mut Self {
        self.routes.push((method, path.to_owned(), handler.into_handler_source()));
        self
    }

    pub fn get(&mut self, path: &str, handler: impl IntoHandlerSource) -> &mut Self {
        self.route(Method::Get, path, handler)
    }

    pub fn post(&mut self, path: &str, handler: impl IntoHandlerSource) -> &mut Self {
        self.route(Method::Post, path, handler)
    }

    pub fn put(&mut self, path: &str, handler: impl IntoHandlerSource) -> &mut Self {
        self.route(Method::Put, path, handler)
    }

    pub fn patch(&mut self, path: &str, handler: impl IntoHandlerSource) -> &mut Self {
        self.route(Method::Patch, path, handler)
    }

    pub fn delete(&mut self, path: &str, handler: impl IntoHandlerSource) -> &mut Self {
        self.route(Method::Delete, path, handler)
    }

    pub fn head(&mut self, path: &str, handler: impl IntoHandlerSource) -> &mut Self {
        self.route(Method::Head, path, handler)
    }

    pub fn options(&mut self, path: &str, handler: impl IntoHandlerSource) -> &mut Self {
        self.route(Method::Options, path, handler)
    }

    /// Adds middleware for every route in this group, regardless of when the
    /// route was added to the group.
    pub fn middleware(&mut self, mw: Middleware) -> &mut Self {
        self.middleware.push(mw);
        self
    }

    /// Registers the group's routes one by one, stopping at the first error.
    pub(crate) fn apply_to(self, router: &Router, prefix: &str) -> Result<(), Error> {
        let limit = router.config().max_middleware;
        for (method, path, source) in self.routes {
            let full = join(prefix, &path);
            let handler = source.into_handler()?;
            for mw in &self.middleware {
                handler.attach_bounded(mw, limit).map_err(|reason| Error::MiddlewareAttach {
                    route: format!("{method} {full}"),
                    reason,
                })?;
            }
            router.register(method, &full, handler)?;
        }
        Ok(())
    }
}

fn join(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    match (prefix.is_empty(), path.is_empty()) {
        (true, true) => "/".to_owned(),
        (_, true) => prefix.to_owned(),
        _ => format!("{prefix}/{path}"),
    }
}

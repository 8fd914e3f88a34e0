//! # ferrule
//!
//! The request-dispatch core of an embeddable HTTP router.
//!
//! ferrule registers method + path handlers, chains middleware onto them, and
//! dispatches requests, with a safety net: a handler that panics never takes
//! the server down, and an unmatched route can still produce a well-formed
//! fallback page.
//!
//! ## What it does
//!
//! - **Live route table**: register routes, middleware, default and error
//!   handlers at any time, including while serving. Writers share one mutex;
//!   the request path never takes it.
//! - **Retroactive middleware**: a router-wide middleware wraps every route,
//!   whether it was registered before or after the middleware was attached.
//! - **Sniffed fallback pages**: the default handler writes into a capture
//!   buffer so its `Content-Type` can be inferred before anything is sent.
//! - **Fault isolation**: every request runs inside a `catch_unwind`
//!   boundary; panics go to the error handler or end only that connection.
//!
//! Path matching is [`matchit`]; the transport is hyper on tokio.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use ferrule::{Request, Response, Router, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ferrule::Error> {
//!     let router = Arc::new(Router::new());
//!     router.get("/hello", hello)?;
//!     router.set_default_handler(not_found)?;
//!     router.attach_middleware(ferrule::middleware::trace())?;
//!
//!     Server::new(router).listen_and_serve("0.0.0.0:3000").await
//! }
//!
//! async fn hello(_req: Request, res: Response) {
//!     res.write("hi");
//! }
//!
//! // No content type set: `application/json` is sniffed from the body.
//! async fn not_found(_req: Request, res: Response) {
//!     res.set_status(http::StatusCode::NOT_FOUND);
//!     res.write(r#"{"error":"not found"}"#);
//! }
//! ```

mod dispatch;
mod error;
mod group;
mod handler;
mod method;
mod request;
mod response;
mod router;
mod server;

pub mod capture;
pub mod config;
pub mod logging;
pub mod middleware;
pub mod render;
pub mod sniff;

pub use config::Config;
pub use error::{BoxError, Error, Fault};
pub use group::RouteGroup;
pub use handler::{BoxFuture, Handler, HandlerResult, HandlerSource, IntoHandlerSource, IntoOutcome};
pub use method::Method;
pub use request::Request;
pub use response::{ContentType, Response, SharedHeaders, ViewBag};
pub use router::Router;
pub use server::Server;

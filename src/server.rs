//! HTTP server and graceful shutdown.
//!
//! # Graceful shutdown and Kubernetes
//!
//! When Kubernetes terminates a pod it sends **SIGTERM** and waits
//! `terminationGracePeriodSeconds` (default 30 s) before sending SIGKILL.
//! [`Server::shutdown`] triggers the same sequence programmatically.
//!
//! The server reacts by:
//! 1. Immediately stopping `listener.accept()`; no new connections are made.
//! 2. Telling every open connection to finish its in-flight request and close.
//! 3. Returning from [`Server::listen_and_serve`] once every connection task
//!    has ended.
//!
//! # Failure isolation
//!
//! Each connection runs in its own tokio task. A request whose handler
//! panicked with no error handler set makes the hyper service fail, which
//! drops that connection only. A panicking error handler takes its task down;
//! the accept loop logs it and keeps going.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::{FailurePolicy, ServerConfig};
use crate::error::Error;
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

/// The HTTP server.
///
/// Holds the router behind an `Arc`, so routes can keep changing while the
/// server runs.
pub struct Server {
    router: Arc<Router>,
    config: ServerConfig,
    stop: watch::Sender<bool>,
    running: watch::Sender<bool>,
}

impl Server {
    pub fn new(router: Arc<Router>) -> Self {
        Self::with_config(router, ServerConfig::default())
    }

    pub fn with_config(router: Arc<Router>, config: ServerConfig) -> Self {
        Self {
            router,
            config,
            stop: watch::Sender::new(false),
            running: watch::Sender::new(false),
        }
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Binds `addr` and serves until shut down.
    ///
    /// Returns [`Error::ServerClosed`] if [`shutdown`](Server::shutdown) was
    /// already called, and `Ok(())` after a graceful shutdown.
    pub async fn listen_and_serve(&self, addr: &str) -> Result<(), Error> {
        let addr: SocketAddr = addr.parse().map_err(|_| Error::InvalidAddress(addr.to_owned()))?;
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Binds the address from this server's [`ServerConfig`].
    pub async fn run(&self) -> Result<(), Error> {
        let addr = self.config.addr.clone();
        self.listen_and_serve(&addr).await
    }

    /// Serves connections from an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), Error> {
        let mut stop = self.stop.subscribe();
        self.running.send_replace(true);
        if *stop.borrow_and_update() {
            self.running.send_replace(false);
            return Err(Error::ServerClosed);
        }

        info!(addr = %listener.local_addr()?, "ferrule listening");

        let mut tasks = JoinSet::new();

        let signal = shutdown_signal(self.config.handle_signals);
        tokio::pin!(signal);

        loop {
            tokio::select! {
                // `biased` checks the shutdown arms first, so a stop request
                // wins over connections still queued in the backlog.
                biased;

                () = stopped(&mut stop) => {
                    info!(in_flight = tasks.len(), "shutdown requested, draining connections");
                    break;
                }

                () = &mut signal => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    self.stop.send_replace(true);
                    break;
                }

                res = listener.accept() => {
                    let (stream, peer) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };
                    tasks.spawn(serve_connection(
                        Arc::clone(&self.router),
                        self.config.on_handler_error,
                        self.stop.subscribe(),
                        stream,
                        peer,
                    ));
                }

                Some(joined) = tasks.join_next(), if !tasks.is_empty() => log_join(joined),
            }
        }

        drop(listener);
        while let Some(joined) = tasks.join_next().await {
            log_join(joined);
        }

        self.running.send_replace(false);
        info!("ferrule stopped");
        Ok(())
    }

    /// Stops accepting connections and waits for in-flight requests to finish.
    ///
    /// Returns immediately if the server is not running. Any later
    /// `listen_and_serve` call fails with [`Error::ServerClosed`].
    pub async fn shutdown(&self) -> Result<(), Error> {
        self.stop.send_replace(true);
        let mut running = self.running.subscribe();
        let _ = running.wait_for(|running| !*running).await;
        Ok(())
    }
}

/// Resolves once `stop` flips to `true`.
async fn stopped(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|stop| *stop).await;
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            error!("connection task panicked: {e}");
        }
    }
}

async fn serve_connection(
    router: Arc<Router>,
    policy: FailurePolicy,
    mut stop: watch::Receiver<bool>,
    stream: tokio::net::TcpStream,
    peer: SocketAddr,
) {
    // `service_fn` is called once per request on the connection, not once
    // per connection.
    let svc = service_fn(move |req| {
        let router = Arc::clone(&router);
        async move { handle(router, req, policy).await }
    });

    // `auto::Builder` handles both HTTP/1.1 and HTTP/2, whatever the client
    // negotiates.
    let builder = ConnBuilder::new(TokioExecutor::new());
    let conn = builder.serve_connection(TokioIo::new(stream), svc);
    tokio::pin!(conn);

    let outcome = tokio::select! {
        res = conn.as_mut() => res,
        () = stopped(&mut stop) => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };

    if let Err(e) = outcome {
        debug!(%peer, "connection closed: {e}");
    }
}

/// Core hot path: routes one request and produces one response.
///
/// An unrecovered handler fault is returned as the service error, which makes
/// hyper drop the connection without a response.
async fn handle(
    router: Arc<Router>,
    req: hyper::Request<Incoming>,
    policy: FailurePolicy,
) -> Result<http::Response<Full<Bytes>>, Error> {
    let req = Request::from_http(req).await?;
    let (method, path) = (req.method().clone(), req.path().to_owned());
    let res = Response::new();

    match router.dispatch(req, res.clone()).await {
        Ok(()) => {}
        Err(e @ Error::HandlerFault(_)) => return Err(e),
        Err(e) => {
            warn!(%method, path, "request failed: {e}");
            if policy == FailurePolicy::InternalServerError {
                res.reset();
                res.set_status(StatusCode::INTERNAL_SERVER_ERROR);
            }
        }
    }

    Ok(res.into_http())
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** and **SIGINT** (Ctrl-C). With
/// `enabled == false`, or if a handler cannot be installed, it never resolves.
async fn shutdown_signal(enabled: bool) {
    if !enabled {
        return std::future::pending().await;
    }

    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    // `pending()` is a future that never resolves; on non-Unix platforms
    // the SIGTERM arm is effectively disabled.
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

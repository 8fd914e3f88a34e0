//! End-to-end tests over a real TCP socket.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use ferrule::config::{FailurePolicy, ServerConfig};
use ferrule::{Error, Request, Response, Router, Server};
use http::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

struct Running {
    server: Arc<Server>,
    addr: SocketAddr,
    task: JoinHandle<Result<(), Error>>,
}

async fn start(router: Router, policy: FailurePolicy) -> Running {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = ServerConfig {
        handle_signals: false,
        on_handler_error: policy,
        ..ServerConfig::default()
    };
    let server = Arc::new(Server::with_config(Arc::new(router), config));
    let task = tokio::spawn({
        let server = Arc::clone(&server);
        async move { server.serve(listener).await }
    });
    Running { server, addr, task }
}

/// Sends one raw HTTP/1.1 request and returns whatever came back, lowercased.
async fn roundtrip(addr: SocketAddr, method: &str, path: &str, body: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "{method} {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut buf = Vec::new();
    // an aborted connection may surface as a reset instead of a clean EOF
    let _ = stream.read_to_end(&mut buf).await;
    String::from_utf8_lossy(&buf).to_ascii_lowercase()
}

async fn explode(_req: Request, _res: Response) {
    panic!("kaboom");
}

fn app() -> Router {
    let router = Router::new();
    router
        .get("/hello", |_req: Request, res: Response| async move {
            res.write("hi");
        })
        .unwrap();
    router
        .post("/echo", |req: Request, res: Response| async move {
            res.set_status(StatusCode::CREATED);
            res.write(req.body());
        })
        .unwrap();
    router
        .get("/users/{id}", |req: Request, res: Response| async move {
            res.text(format!("user {}", req.param("id").unwrap_or_default()));
        })
        .unwrap();
    router.get("/boom", explode).unwrap();
    router
        .get("/flaky", |_req: Request, res: Response| async move {
            res.write("half written");
            Err::<(), _>("backend unavailable")
        })
        .unwrap();
    router
        .get("/slow", |_req: Request, res: Response| async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            res.write("done");
        })
        .unwrap();
    router
}

#[tokio::test]
async fn serves_routes_over_tcp() {
    let running = start(app(), FailurePolicy::Ignore).await;

    let resp = roundtrip(running.addr, "GET", "/hello", "").await;
    assert!(resp.starts_with("http/1.1 200 ok"), "{resp}");
    assert!(resp.ends_with("\r\n\r\nhi"), "{resp}");

    let resp = roundtrip(running.addr, "GET", "/users/7", "").await;
    assert!(resp.ends_with("user 7"), "{resp}");

    let resp = roundtrip(running.addr, "POST", "/echo", "ping").await;
    assert!(resp.starts_with("http/1.1 201 created"), "{resp}");
    assert!(resp.ends_with("ping"), "{resp}");

    running.server.shutdown().await.unwrap();
}

#[tokio::test]
async fn unmatched_requests_get_the_sniffed_fallback() {
    let router = app();
    let running = start(router, FailurePolicy::Ignore).await;

    let resp = roundtrip(running.addr, "GET", "/missing", "").await;
    assert!(resp.starts_with("http/1.1 404 not found"), "{resp}");
    assert!(resp.ends_with("\r\n\r\n"), "{resp}");

    running
        .server
        .router()
        .set_default_handler(|req: Request, res: Response| async move {
            if req.path() == "/missing" {
                res.set_status(StatusCode::NOT_FOUND);
            }
            res.write(r#"{"error":"not found"}"#);
        })
        .unwrap();

    let resp = roundtrip(running.addr, "GET", "/missing", "").await;
    assert!(resp.starts_with("http/1.1 404 not found"), "{resp}");
    assert!(resp.contains("content-type: application/json"), "{resp}");

    let resp = roundtrip(running.addr, "GET", "/landing", "").await;
    assert!(resp.starts_with("http/1.1 200 ok"), "{resp}");
    assert!(resp.contains("content-type: application/json"), "{resp}");

    running.server.shutdown().await.unwrap();
}

#[tokio::test]
async fn a_panicking_handler_only_drops_its_own_connection() {
    let running = start(app(), FailurePolicy::Ignore).await;

    let resp = roundtrip(running.addr, "GET", "/boom", "").await;
    assert!(resp.is_empty(), "{resp}");

    let resp = roundtrip(running.addr, "GET", "/hello", "").await;
    assert!(resp.starts_with("http/1.1 200 ok"), "{resp}");

    running.server.shutdown().await.unwrap();
}

#[tokio::test]
async fn error_handler_answers_for_a_panicking_route() {
    let running = start(app(), FailurePolicy::Ignore).await;
    running
        .server
        .router()
        .set_error_handler(|_req: Request, res: Response| async move {
            let message = res.bag().get("error").and_then(|v| v.as_str().map(str::to_owned));
            res.set_status(StatusCode::INTERNAL_SERVER_ERROR);
            res.text(message.unwrap_or_default());
        })
        .unwrap();

    let resp = roundtrip(running.addr, "GET", "/boom", "").await;
    assert!(resp.starts_with("http/1.1 500 internal server error"), "{resp}");
    assert!(resp.ends_with("kaboom"), "{resp}");

    running.server.shutdown().await.unwrap();
}

#[tokio::test]
async fn failure_policy_controls_returned_errors() {
    let ignoring = start(app(), FailurePolicy::Ignore).await;
    let resp = roundtrip(ignoring.addr, "GET", "/flaky", "").await;
    assert!(resp.starts_with("http/1.1 200 ok"), "{resp}");
    assert!(resp.ends_with("half written"), "{resp}");
    ignoring.server.shutdown().await.unwrap();

    let strict = start(app(), FailurePolicy::InternalServerError).await;
    let resp = roundtrip(strict.addr, "GET", "/flaky", "").await;
    assert!(resp.starts_with("http/1.1 500 internal server error"), "{resp}");
    assert!(!resp.contains("half written"), "{resp}");
    strict.server.shutdown().await.unwrap();
}

#[tokio::test]
async fn shutdown_drains_in_flight_requests_then_closes() {
    let running = start(app(), FailurePolicy::Ignore).await;

    let in_flight = tokio::spawn(roundtrip(running.addr, "GET", "/slow", ""));
    tokio::time::sleep(Duration::from_millis(50)).await;

    running.server.shutdown().await.unwrap();
    let resp = in_flight.await.unwrap();
    assert!(resp.starts_with("http/1.1 200 ok"), "{resp}");
    assert!(resp.ends_with("done"), "{resp}");

    assert!(matches!(running.task.await.unwrap(), Ok(())));
    assert!(TcpStream::connect(running.addr).await.is_err());

    let again = running.server.listen_and_serve("127.0.0.1:0").await;
    assert!(matches!(again, Err(Error::ServerClosed)));
}

#[tokio::test]
async fn shutdown_before_serving_closes_the_server() {
    let server = Server::with_config(
        Arc::new(Router::new()),
        ServerConfig { handle_signals: false, ..ServerConfig::default() },
    );
    server.shutdown().await.unwrap();
    assert!(matches!(server.listen_and_serve("127.0.0.1:0").await, Err(Error::ServerClosed)));
}

#[tokio::test]
async fn invalid_addresses_are_rejected() {
    let server = Server::new(Arc::new(Router::new()));
    let err = server.listen_and_serve("not an address").await.unwrap_err();
    assert!(matches!(err, Error::InvalidAddress(a) if a == "not an address"));
}

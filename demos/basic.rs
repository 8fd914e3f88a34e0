//! Minimal ferrule example: JSON endpoints, a sniffed 404 page and an error page.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:3000/users/42
//!   curl -i -X POST http://localhost:3000/users -d '{"name":"alice"}'
//!   curl -i http://localhost:3000/nowhere        # default handler, sniffed JSON
//!   curl -i http://localhost:3000/boom           # panics, error handler answers

use std::sync::Arc;

use ferrule::middleware::{self, Middleware, Next};
use ferrule::{Config, Request, Response, Router, Server, logging};
use http::StatusCode;

#[tokio::main]
async fn main() -> Result<(), ferrule::Error> {
    let config = Config::default();
    logging::init(&config.log);

    let router = Arc::new(Router::with_config(config.router.clone()));

    router.get("/users/{id}", get_user)?;
    router.post("/users", create_user)?;
    router.get("/boom", boom)?;
    router.group("/admin", |g| {
        g.middleware(Middleware::new("require-token", require_token))
            .get("/stats", stats);
    })?;

    // attached after the routes above, still wraps all of them
    router.attach_middleware(middleware::trace())?;

    router.set_default_handler(not_found)?;
    router.set_error_handler(internal_error)?;

    Server::with_config(router, config.server).run().await
}

// GET /users/{id}
async fn get_user(req: Request, res: Response) {
    let id = req.param("id").unwrap_or("unknown");
    res.json(format!(r#"{{"id":"{id}","name":"alice"}}"#));
}

// POST /users
async fn create_user(req: Request, res: Response) -> Result<(), ferrule::Error> {
    if req.body().is_empty() {
        res.set_status(StatusCode::BAD_REQUEST);
        return Ok(());
    }
    res.set_status(StatusCode::CREATED);
    res.set_header("location", "/users/99")?;
    res.json(r#"{"id":"99","name":"new_user"}"#);
    Ok(())
}

async fn boom(_req: Request, _res: Response) {
    panic!("something went very wrong");
}

async fn stats(_req: Request, res: Response) {
    res.text("uptime: forever");
}

async fn require_token(req: Request, res: Response, next: Next) -> ferrule::HandlerResult {
    if req.header("x-admin-token").is_none() {
        res.set_status(StatusCode::UNAUTHORIZED);
        return Ok(());
    }
    next.run(req, res).await
}

// No content-type: the capture buffer sniffs `application/json`.
async fn not_found(req: Request, res: Response) {
    res.set_status(StatusCode::NOT_FOUND);
    res.write(format!(r#"{{"error":"not found","path":"{}"}}"#, req.path()));
}

async fn internal_error(_req: Request, res: Response) {
    let reason = res.bag()
        .get("error")
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_default();
    res.set_status(StatusCode::INTERNAL_SERVER_ERROR);
    res.html(format!("<html><body><h1>500</h1><p>{reason}</p></body></html>"));
}

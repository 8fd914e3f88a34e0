use std::time::Instant;

use tracing::{Instrument, info, info_span, warn};

use super::{Middleware, Next};

/// Per-request span with method, path, status and latency.
///
/// Emits one `info` event when the chain below it returns, or a `warn` event
/// if it returned an error.
pub fn trace() -> Middleware {
    Middleware::new("trace", |req, res, next: Next| {
        let span = info_span!("request", method = %req.method(), path = %req.path());
        async move {
            let started = Instant::now();
            let outcome = next.run(req, res.clone()).await;
            let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
            match &outcome {
                Ok(()) => info!(status = res.status().as_u16(), latency_ms, "request served"),
                Err(e) => warn!(status = res.status().as_u16(), latency_ms, error = %e, "handler failed"),
            }
            outcome
        }
        .instrument(span)
    })
}

use std::time::Instant;

use tracing::{info, warn};

use super::{Middleware, Next};
use crate::context::Context;
use crate::error::Error;

/// Logs one event per request: method, path, final status and latency.
///
/// Register it first so the latency covers the whole chain:
///
/// ```rust,no_run
/// use weft::{Router, middleware};
///
/// let app = Router::new().middleware(middleware::trace());
/// ```
///
/// A chain that ends in an error is logged at `warn` with the status the
/// error maps to; the error handler has not run yet at this point.
pub fn trace() -> Middleware {
    Middleware::from_fn(log_request)
}

async fn log_request(c: &mut Context, next: Next<'_>) -> Result<(), Error> {
    let started = Instant::now();
    let result = next.run(c).await;
    let latency_us = started.elapsed().as_micros() as u64;

    match &result {
        Ok(()) => info!(
            method = %c.method(),
            path = c.path(),
            status = c.status_code().as_u16(),
            latency_us,
            "request"
        ),
        Err(e) => warn!(
            method = %c.method(),
            path = c.path(),
            status = e.status().as_u16(),
            latency_us,
            error = %e,
            "request failed"
        ),
    }
    result
}

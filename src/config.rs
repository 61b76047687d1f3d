//! Server-wide settings shared read-only by every request context.

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use tracing::debug;

use crate::context::Context;
use crate::error::Error;

/// Default number of idle contexts the pool keeps around.
pub const DEFAULT_POOL_CAPACITY: usize = 1024;

/// Turns a chain error into a response.
///
/// Returning `Err` makes the server fall back to a bare
/// `500 Internal Server Error`.
pub type ErrorHandler = Arc<dyn Fn(&mut Context, Error) -> Result<(), Error> + Send + Sync>;

/// Configuration the [`Server`](crate::Server) builder fills in.
#[derive(Clone)]
pub struct Config {
    pub(crate) error_handler: ErrorHandler,
    pub(crate) trusted_proxies: Vec<IpAddr>,
    pub(crate) pool_capacity: usize,
}

impl Config {
    pub fn error_handler<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Context, Error) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.error_handler = Arc::new(f);
        self
    }

    /// Peers whose `X-Forwarded-For` and `X-Forwarded-Proto` headers are
    /// believed. Exact address match; no CIDR ranges.
    pub fn trusted_proxies(mut self, proxies: impl IntoIterator<Item = IpAddr>) -> Self {
        self.trusted_proxies = proxies.into_iter().collect();
        self
    }

    /// Upper bound on idle pooled contexts. Zero is bumped to one.
    pub fn pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity.max(1);
        self
    }

    pub(crate) fn is_trusted_proxy(&self, ip: IpAddr) -> bool {
        self.trusted_proxies.contains(&ip)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            error_handler: Arc::new(default_error_handler),
            trusted_proxies: Vec::new(),
            pool_capacity: DEFAULT_POOL_CAPACITY,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("trusted_proxies", &self.trusted_proxies)
            .field("pool_capacity", &self.pool_capacity)
            .finish_non_exhaustive()
    }
}

/// Writes the error's status with a plain-text body.
///
/// Server errors get the canonical reason phrase so internals never leak to
/// clients; everything else gets the error message.
pub fn default_error_handler(c: &mut Context, err: Error) -> Result<(), Error> {
    let status = err.status();
    debug!(status = status.as_u16(), error = %err, "request aborted");

    let body = match err {
        Error::Http(e) => e.message().to_owned(),
        _ if status.is_server_error() => status
            .canonical_reason()
            .unwrap_or("Internal Server Error")
            .to_owned(),
        other => other.to_string(),
    };
    c.status(status).text(body)
}

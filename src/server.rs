//! HTTP server, request dispatch and graceful shutdown.
//!
//! # Request cycle
//!
//! Every request hyper hands over goes through [`Dispatcher::dispatch`]:
//! collect the body, resolve the route, acquire a pooled [`Context`], run the
//! composed chain, translate an `Err` through the configured error handler,
//! take the response out and release the context.
//!
//! # Graceful shutdown
//!
//! On SIGTERM or Ctrl-C (or when the future given to
//! [`Server::serve_with_shutdown`] resolves) the server stops accepting,
//! lets every in-flight connection finish, then returns from `serve`.

use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bytes::Bytes;
use futures::FutureExt;
use http::{HeaderValue, StatusCode, header};
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::context::Context;
use crate::error::{Error, HttpError};
use crate::pool::ContextPool;
use crate::request::Request;
use crate::response::{ContentType, Response};
use crate::router::{Lookup, RouteTable, Router};

/// The HTTP server.
///
/// ```rust,no_run
/// use weft::{Router, Server};
///
/// # async fn run(app: Router) -> Result<(), weft::Error> {
/// Server::bind("0.0.0.0:3000")
///     .trusted_proxies(["10.0.0.1".parse().unwrap()])
///     .serve(app)
///     .await
/// # }
/// ```
pub struct Server {
    addr: String,
    config: Config,
}

impl Server {
    /// Configures the server to bind to `addr` when it starts serving.
    /// Address errors surface from [`serve`](Server::serve).
    pub fn bind(addr: impl Into<String>) -> Self {
        Self { addr: addr.into(), config: Config::default() }
    }

    /// Replaces [`default_error_handler`](crate::default_error_handler).
    pub fn error_handler<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Context, Error) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.config = self.config.error_handler(f);
        self
    }

    /// Peers allowed to set `X-Forwarded-For` and `X-Forwarded-Proto`.
    pub fn trusted_proxies(mut self, proxies: impl IntoIterator<Item = IpAddr>) -> Self {
        self.config = self.config.trusted_proxies(proxies);
        self
    }

    pub fn pool_capacity(mut self, capacity: usize) -> Self {
        self.config = self.config.pool_capacity(capacity);
        self
    }

    /// Starts accepting connections and dispatching them through `router`.
    ///
    /// Returns only after a full graceful shutdown (SIGTERM or Ctrl-C,
    /// followed by all in-flight requests completing).
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        self.serve_with_shutdown(router, shutdown_signal()).await
    }

    /// Like [`serve`](Server::serve), but stops accepting when `signal`
    /// resolves instead of waiting for a process signal.
    pub async fn serve_with_shutdown(
        self,
        router: Router,
        signal: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr.as_str()).await?;
        let local_addr = listener.local_addr()?;

        // Shared by every connection task; the route table is frozen from here on.
        let dispatcher = Arc::new(Dispatcher::new(router, self.config));

        info!(addr = %local_addr, "weft listening");

        let mut tasks = tokio::task::JoinSet::new();
        tokio::pin!(signal);

        loop {
            tokio::select! {
                // Shutdown is checked first so a signal stops accepting even
                // while connections are queued.
                biased;

                () = &mut signal => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let dispatcher = Arc::clone(&dispatcher);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        let svc = service_fn(move |req| {
                            let dispatcher = Arc::clone(&dispatcher);
                            async move {
                                Ok::<_, std::convert::Infallible>(
                                    dispatcher.dispatch(req, Some(remote_addr)).await,
                                )
                            }
                        });

                        // HTTP/1.1 or HTTP/2, whichever the client speaks.
                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished tasks so the set does not grow on long-running servers.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("weft stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Route table, context pool and configuration shared by all connections.
pub(crate) struct Dispatcher {
    routes: RouteTable,
    pool: ContextPool,
}

impl Dispatcher {
    pub(crate) fn new(router: Router, config: Config) -> Self {
        Self {
            routes: router.into_table(),
            pool: ContextPool::new(Arc::new(config)),
        }
    }

    /// Routes one request and produces one response. Never fails: routing
    /// misses, handler errors and panics all become error responses.
    pub(crate) async fn dispatch<B>(
        &self,
        req: http::Request<B>,
        remote_addr: Option<SocketAddr>,
    ) -> http::Response<Full<Bytes>>
    where
        B: hyper::body::Body,
        B::Error: Display,
    {
        let (parts, body) = req.into_parts();
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!(error = %e, "failed to read request body");
                return Response::status(StatusCode::BAD_REQUEST).into_inner();
            }
        };

        let secure = remote_addr.is_some_and(|a| self.pool.config().is_trusted_proxy(a.ip()))
            && parts
                .headers
                .get("x-forwarded-proto")
                .is_some_and(|v| v.as_bytes().eq_ignore_ascii_case(b"https"));

        let mut request = Request::from_parts(parts, body).with_secure(secure);
        if let Some(addr) = remote_addr {
            request = request.with_remote_addr(addr);
        }
        let mut ctx = self.pool.acquire(request);

        let outcome = match ctx.route(&self.routes) {
            Lookup::Found(handler) => AssertUnwindSafe(handler.call(&mut ctx)).catch_unwind().await,
            Lookup::MethodNotAllowed(allowed) => {
                let allow = allowed.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ");
                if let Ok(value) = HeaderValue::from_str(&allow) {
                    ctx.set_header(header::ALLOW, value);
                }
                Ok(Err(HttpError::from_status(StatusCode::METHOD_NOT_ALLOWED).into()))
            }
            Lookup::NotFound => Ok(Err(HttpError::from_status(StatusCode::NOT_FOUND).into())),
        };

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => self.handle_error(&mut ctx, err),
            Err(panic) => {
                error!(
                    method = %ctx.method(),
                    path = ctx.path(),
                    panic = panic_message(&*panic),
                    "handler panicked"
                );
                // The context may be half-written; it is dropped, not pooled.
                return Response::status(StatusCode::INTERNAL_SERVER_ERROR).into_inner();
            }
        }

        let response = ctx.take_response();
        self.pool.release(ctx);
        response.into_inner()
    }

    /// Runs the configured error handler. When it fails or panics the client
    /// gets a bare 500 instead.
    fn handle_error(&self, ctx: &mut Context, err: Error) {
        let handler = &*self.pool.config().error_handler;
        match std::panic::catch_unwind(AssertUnwindSafe(|| handler(ctx, err))) {
            Ok(Ok(())) => return,
            Ok(Err(e)) => error!(error = %e, "error handler failed"),
            Err(panic) => error!(panic = panic_message(&*panic), "error handler panicked"),
        }
        let mut fallback = Response::status(StatusCode::INTERNAL_SERVER_ERROR);
        fallback.set_body(ContentType::Text, b"Internal Server Error".to_vec());
        ctx.response = fallback;
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives: SIGTERM
/// (container orchestrators) or SIGINT (Ctrl-C). Windows only has Ctrl-C.
///
/// A signal that cannot be installed is logged and never fires.
async fn shutdown_signal() {
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

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c  => {}
        () = sigterm => {}
    }
}

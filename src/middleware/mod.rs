//! Middleware and chain composition.
//!
//! A middleware is a step that runs code before and/or after delegating to the
//! next step, or short-circuits by not delegating at all. Internally there is
//! exactly one representation: a function from the next handler to a new
//! handler. Two ways to write one:
//!
//! - **Wrapping** — [`Middleware::wrap`] takes that function directly.
//! - **Next-call** — [`Middleware::from_fn`] takes an
//!   `async fn(&mut Context, Next<'_>)` and adapts it into the wrapping form.
//!
//! ```rust
//! use weft::{Context, Error, Middleware, Next, StatusCode};
//!
//! async fn require_token(c: &mut Context, next: Next<'_>) -> Result<(), Error> {
//!     if c.header("authorization").is_none() {
//!         return Err(Error::http(StatusCode::UNAUTHORIZED, "missing token"));
//!     }
//!     next.run(c).await
//! }
//!
//! let auth = Middleware::from_fn(require_token);
//! ```
//!
//! Built-in middleware:
//! - [`trace()`] — one log event per request with method, path, status, latency

mod from_fn;
mod trace;

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::context::Context;
use crate::handler::{BoxedHandler, Handler, HandlerResult};

pub use from_fn::MiddlewareFn;
pub use trace::trace;

type Wrap = dyn Fn(BoxedHandler) -> BoxedHandler + Send + Sync;

/// A composable step in front of a handler. Cheap to clone.
#[derive(Clone)]
pub struct Middleware(Arc<Wrap>);

impl Middleware {
    /// Decorator form: receives the next handler, returns the handler that
    /// replaces it.
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use weft::{BoxFuture, BoxedHandler, Context, Handler, HandlerResult, Middleware};
    /// use weft::http::{HeaderValue, header::SERVER};
    ///
    /// struct ServerHeader { next: BoxedHandler }
    ///
    /// impl Handler for ServerHeader {
    ///     fn call<'a>(&'a self, c: &'a mut Context) -> BoxFuture<'a, HandlerResult> {
    ///         Box::pin(async move {
    ///             c.set_header(SERVER, HeaderValue::from_static("weft"));
    ///             self.next.call(c).await
    ///         })
    ///     }
    /// }
    ///
    /// let mw = Middleware::wrap(|next| -> BoxedHandler { Arc::new(ServerHeader { next }) });
    /// ```
    pub fn wrap<F>(f: F) -> Self
    where
        F: Fn(BoxedHandler) -> BoxedHandler + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Next-call form: an async fn that receives the context and a [`Next`]
    /// and decides whether to call it.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: for<'a> MiddlewareFn<'a>,
    {
        from_fn::adapt(f)
    }

    pub(crate) fn apply(&self, next: BoxedHandler) -> BoxedHandler {
        (self.0)(next)
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Middleware")
    }
}

/// The rest of the chain, as seen from a next-call middleware.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    handler: &'a dyn Handler,
}

impl<'a> Next<'a> {
    pub(crate) fn new(handler: &'a dyn Handler) -> Self {
        Self { handler }
    }

    /// Runs the remaining middleware and the route handler.
    pub fn run<'b>(self, ctx: &'b mut Context) -> BoxFuture<'b, HandlerResult>
    where
        'a: 'b,
    {
        self.handler.call(ctx)
    }
}

/// Wraps `handler` so that `middleware[0]` runs first and `handler` last.
///
/// Composition goes right to left: the last middleware wraps the handler,
/// the one before it wraps that, and so on. Nothing runs until the returned
/// handler is called.
pub fn chain(handler: BoxedHandler, middleware: &[Middleware]) -> BoxedHandler {
    middleware.iter().rev().fold(handler, |next, mw| mw.apply(next))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;
    use http::{HeaderValue, StatusCode};

    use super::*;
    use crate::config::Config;
    use crate::error::Error;
    use crate::handler::boxed;
    use crate::pool::ContextPool;
    use crate::request::Request;

    fn context() -> Box<Context> {
        let pool = ContextPool::new(Arc::new(Config::default()));
        pool.acquire(Request::new(http::Request::get("/").body(Bytes::new()).unwrap()))
    }

    fn order(c: &Context) -> Vec<String> {
        c.response_headers()
            .get_all("x-order")
            .iter()
            .map(|v| v.to_str().unwrap().to_owned())
            .collect()
    }

    async fn m1(c: &mut Context, next: Next<'_>) -> Result<(), Error> {
        c.append_header("x-order", HeaderValue::from_static("m1"));
        next.run(c).await
    }

    async fn m2(c: &mut Context, next: Next<'_>) -> Result<(), Error> {
        c.append_header("x-order", HeaderValue::from_static("m2"));
        next.run(c).await
    }

    async fn m2_rejects(c: &mut Context, _next: Next<'_>) -> Result<(), Error> {
        c.append_header("x-order", HeaderValue::from_static("m2"));
        Err(Error::http(StatusCode::FORBIDDEN, "stop"))
    }

    async fn m3(c: &mut Context, next: Next<'_>) -> Result<(), Error> {
        c.append_header("x-order", HeaderValue::from_static("m3"));
        next.run(c).await
    }

    async fn after(c: &mut Context, next: Next<'_>) -> Result<(), Error> {
        next.run(c).await?;
        c.append_header("x-order", HeaderValue::from_static("after"));
        Ok(())
    }

    async fn h(c: &mut Context) -> Result<(), Error> {
        c.append_header("x-order", HeaderValue::from_static("h"));
        Ok(())
    }

    /// Wrapping-form middleware with its own state.
    struct Tag {
        tag: &'static str,
        next: BoxedHandler,
    }

    impl Handler for Tag {
        fn call<'a>(&'a self, c: &'a mut Context) -> BoxFuture<'a, HandlerResult> {
            Box::pin(async move {
                c.append_header("x-order", HeaderValue::from_static(self.tag));
                self.next.call(c).await
            })
        }
    }

    fn tag(tag: &'static str) -> Middleware {
        Middleware::wrap(move |next| -> BoxedHandler { Arc::new(Tag { tag, next }) })
    }

    #[tokio::test]
    async fn runs_in_registration_order() {
        let chained = chain(
            boxed(h),
            &[Middleware::from_fn(m1), Middleware::from_fn(m2), Middleware::from_fn(m3)],
        );
        let mut c = context();
        chained.call(&mut c).await.unwrap();
        assert_eq!(order(&c), ["m1", "m2", "m3", "h"]);
    }

    #[tokio::test]
    async fn error_stops_the_chain() {
        let chained = chain(
            boxed(h),
            &[Middleware::from_fn(m1), Middleware::from_fn(m2_rejects), Middleware::from_fn(m3)],
        );
        let mut c = context();
        let err = chained.call(&mut c).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(order(&c), ["m1", "m2"]);
    }

    #[tokio::test]
    async fn both_shapes_compose_together() {
        let chained = chain(boxed(h), &[tag("outer"), Middleware::from_fn(after), tag("inner")]);
        let mut c = context();
        chained.call(&mut c).await.unwrap();
        assert_eq!(order(&c), ["outer", "inner", "h", "after"]);
    }

    #[tokio::test]
    async fn empty_chain_is_the_handler() {
        let chained = chain(boxed(h), &[]);
        let mut c = context();
        chained.call(&mut c).await.unwrap();
        assert_eq!(order(&c), ["h"]);
    }

    #[tokio::test]
    async fn composed_chains_are_reusable() {
        let chained = chain(boxed(h), &[tag("a")]);
        for _ in 0..3 {
            let mut c = context();
            chained.call(&mut c).await.unwrap();
            assert_eq!(order(&c), ["a", "h"]);
        }
    }
}

//! Handler trait and type erasure.
//!
//! # How async handlers are stored
//!
//! Routes of different handler types live in one table, so every handler is
//! stored behind a trait object:
//!
//! ```text
//! async fn hello(c: &mut Context) -> Result<(), Error> { … }   ← user writes this
//!        ↓ router.get("/", hello)
//! Arc::new(hello) as BoxedHandler                             ← blanket Handler impl
//!        ↓ wrapped by each middleware, outermost first
//! handler.call(&mut ctx) at request time                      ← one vtable call per link
//!        ↓
//! Box::pin(hello(ctx))                                        ← BoxFuture borrowing ctx
//! ```
//!
//! The future borrows both the handler and the context for as long as it runs,
//! so calling down the chain clones nothing.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::context::Context;
use crate::error::Error;

/// What every link of a chain returns. `Err` stops the chain.
pub type HandlerResult = Result<(), Error>;

/// A type-erased handler shared across concurrent requests.
pub type BoxedHandler = Arc<dyn Handler>;

/// One step of request handling: a route handler, or a middleware already
/// bound to the handler it delegates to.
///
/// Implemented automatically for every `async fn` of the shape
///
/// ```text
/// async fn name(c: &mut Context) -> Result<(), Error>
/// ```
///
/// Implement it by hand when a step needs state of its own:
///
/// ```rust
/// use weft::{BoxFuture, Context, Handler, HandlerResult};
///
/// struct Greeting(&'static str);
///
/// impl Handler for Greeting {
///     fn call<'a>(&'a self, c: &'a mut Context) -> BoxFuture<'a, HandlerResult> {
///         Box::pin(async move { c.text(self.0) })
///     }
/// }
/// ```
pub trait Handler: Send + Sync + 'static {
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, HandlerResult>;
}

/// Names the future an async fn returns for one particular borrow of the
/// context. `for<'a> HandlerFn<'a>` then means "works for every borrow", which
/// plain `Fn(&mut Context) -> Fut` cannot express because `Fut` would have to
/// be a single type.
#[doc(hidden)]
pub trait HandlerFn<'a>: Send + Sync + 'static {
    type Future: Future<Output = HandlerResult> + Send + 'a;

    fn invoke(&self, ctx: &'a mut Context) -> Self::Future;
}

impl<'a, F, Fut> HandlerFn<'a> for F
where
    F: Fn(&'a mut Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'a,
{
    type Future = Fut;

    fn invoke(&self, ctx: &'a mut Context) -> Fut {
        (self)(ctx)
    }
}

impl<F> Handler for F
where
    F: for<'a> HandlerFn<'a>,
{
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, HandlerResult> {
        Box::pin(<F as HandlerFn<'a>>::invoke(self, ctx))
    }
}

pub(crate) fn boxed(handler: impl Handler) -> BoxedHandler {
    Arc::new(handler)
}

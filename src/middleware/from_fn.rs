//! Adapter from the next-call shape to the wrapping shape.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use super::{Middleware, Next};
use crate::context::Context;
use crate::handler::{BoxedHandler, Handler, HandlerResult};

/// Implemented for every `async fn(&mut Context, Next<'_>) -> Result<(), Error>`.
///
/// Same trick as [`HandlerFn`](crate::handler::HandlerFn): the lifetime
/// parameter lets the returned future borrow the context and the rest of the
/// chain.
pub trait MiddlewareFn<'a>: Send + Sync + 'static {
    type Future: Future<Output = HandlerResult> + Send + 'a;

    fn invoke(&self, ctx: &'a mut Context, next: Next<'a>) -> Self::Future;
}

impl<'a, F, Fut> MiddlewareFn<'a> for F
where
    F: Fn(&'a mut Context, Next<'a>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'a,
{
    type Future = Fut;

    fn invoke(&self, ctx: &'a mut Context, next: Next<'a>) -> Fut {
        (self)(ctx, next)
    }
}

/// A next-call function bound to the handler after it.
struct FromFn<F> {
    f: Arc<F>,
    next: BoxedHandler,
}

impl<F> Handler for FromFn<F>
where
    F: for<'a> MiddlewareFn<'a>,
{
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, HandlerResult> {
        Box::pin(<F as MiddlewareFn<'a>>::invoke(&*self.f, ctx, Next::new(&*self.next)))
    }
}

pub(super) fn adapt<F>(f: F) -> Middleware
where
    F: for<'a> MiddlewareFn<'a>,
{
    let f = Arc::new(f);
    Middleware::wrap(move |next| -> BoxedHandler {
        Arc::new(FromFn { f: Arc::clone(&f), next })
    })
}

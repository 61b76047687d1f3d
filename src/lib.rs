//! # weft
//!
//! The request-handling core of a small HTTP framework on hyper.
//!
//! ## What is in here
//!
//! - **Middleware chains**: decorator-style and next-call-style middleware,
//!   composed once at registration into a single handler per route.
//! - **Pooled request contexts**: one [`Context`] per in-flight request,
//!   recycled through a lock-free [`ContextPool`] and fully cleared in
//!   between.
//! - **Content negotiation**: weighted `Accept*` matching, see
//!   [`negotiate`] and [`Context::accepts`].
//! - **Byte ranges**: RFC 7233 `Range` parsing, see [`range`] and
//!   [`Context::range`].
//!
//! Routing is `matchit` (one radix tree per method); HTTP/1.1 and HTTP/2 are
//! hyper's; serialisation is serde's.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use weft::{Context, Error, Middleware, Next, Router, Server, StatusCode, middleware};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let app = Router::new()
//!         .middleware(middleware::trace())
//!         .get("/users/{id}", get_user)
//!         .group("/admin", |admin| {
//!             admin
//!                 .middleware(Middleware::from_fn(require_token))
//!                 .delete("/users/{id}", delete_user)
//!         });
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await
//! }
//!
//! async fn get_user(c: &mut Context) -> Result<(), Error> {
//!     let id = c.param("id").unwrap_or_default().to_owned();
//!     match c.accepts(&["application/json", "text/plain"]) {
//!         Some("text/plain") => c.text(format!("user {id}")),
//!         _ => c.json(&serde_json::json!({ "id": id })),
//!     }
//! }
//!
//! async fn delete_user(c: &mut Context) -> Result<(), Error> {
//!     c.send_status(StatusCode::NO_CONTENT)
//! }
//!
//! async fn require_token(c: &mut Context, next: Next<'_>) -> Result<(), Error> {
//!     if c.header("authorization").is_none() {
//!         return Err(Error::http(StatusCode::UNAUTHORIZED, "missing token"));
//!     }
//!     next.run(c).await
//! }
//! ```

mod config;
mod context;
mod error;
mod handler;
mod pool;
mod request;
mod response;
mod router;
mod server;

pub mod middleware;
pub mod negotiate;
pub mod range;

pub use config::{Config, DEFAULT_POOL_CAPACITY, ErrorHandler, default_error_handler};
pub use context::Context;
pub use error::{Error, HttpError};
#[doc(hidden)]
pub use handler::HandlerFn;
pub use handler::{BoxedHandler, Handler, HandlerResult};
pub use middleware::{Middleware, Next};
pub use pool::ContextPool;
pub use request::Request;
pub use response::{ContentType, Response};
pub use router::{Group, Router};
pub use server::Server;

pub use futures::future::BoxFuture;
pub use http;
pub use http::{Method, StatusCode};

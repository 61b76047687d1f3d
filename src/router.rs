//! Radix-tree request router with middleware scopes.
//!
//! One `matchit` tree per HTTP method. A [`Router`] carries the root scope
//! (global middleware, empty prefix); [`Router::group`] derives a [`Group`]
//! whose scope is a snapshot of its parent's plus a path prefix. Handlers are
//! wrapped in their scope's middleware when they are registered, so nothing is
//! composed on the request path.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use matchit::Router as MatchitRouter;
use tracing::debug;

use crate::handler::{self, BoxedHandler, Handler};
use crate::middleware::{Middleware, chain};

/// Methods [`Router::any`] registers.
const STANDARD_METHODS: [Method; 9] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::HEAD,
    Method::OPTIONS,
    Method::CONNECT,
    Method::TRACE,
];

// ── Route table ───────────────────────────────────────────────────────────────

/// Outcome of resolving a method and path.
pub(crate) enum Lookup<'t> {
    Found(&'t BoxedHandler),
    /// The path exists under other methods, listed here.
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

/// Every registered route, already wrapped in its middleware.
#[derive(Default)]
pub(crate) struct RouteTable {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
}

impl RouteTable {
    fn insert(&mut self, method: Method, path: &str, handler: BoxedHandler) {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler)
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
    }

    /// Resolves `method` and `path`, appending path parameters to `params` on
    /// a match.
    pub(crate) fn lookup<'t>(
        &'t self,
        method: &Method,
        path: &str,
        params: &mut Vec<(String, String)>,
    ) -> Lookup<'t> {
        if let Some(matched) = self.routes.get(method).and_then(|tree| tree.at(path).ok()) {
            params.extend(matched.params.iter().map(|(k, v)| (k.to_owned(), v.to_owned())));
            return Lookup::Found(matched.value);
        }

        let mut allowed: Vec<Method> = self
            .routes
            .iter()
            .filter(|(_, tree)| tree.at(path).is_ok())
            .map(|(m, _)| m.clone())
            .collect();
        if allowed.is_empty() {
            return Lookup::NotFound;
        }
        allowed.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Lookup::MethodNotAllowed(allowed)
    }
}

// ── Scope ─────────────────────────────────────────────────────────────────────

/// Path prefix and middleware a router or group registers routes under.
///
/// Groups clone their parent's scope when they are created, so later changes
/// on either side never reach the other.
#[derive(Clone, Default)]
struct Scope {
    base: String,
    middleware: Vec<Middleware>,
}

impl Scope {
    fn nest(&self, prefix: &str) -> Self {
        Self {
            base: format!("{}{prefix}", self.base),
            middleware: self.middleware.clone(),
        }
    }

    fn register(
        &self,
        table: &mut RouteTable,
        method: Method,
        path: &str,
        handler: BoxedHandler,
        route_middleware: &[Middleware],
    ) {
        let full = format!("{}{path}", self.base);
        // Scope middleware outermost, then the route's own, then the handler.
        let handler = chain(chain(handler, route_middleware), &self.middleware);
        debug!(
            method = %method,
            path = %full,
            middleware = self.middleware.len() + route_middleware.len(),
            "route registered"
        );
        table.insert(method, &full, handler);
    }
}

// ── Registration API ──────────────────────────────────────────────────────────

/// Registration methods shared by [`Router`] and [`Group`]. Both types define
/// `add` and `table_mut`.
macro_rules! registration_methods {
    ($($name:ident, $name_with:ident => $method:ident;)*) => {
        /// Registers `handler` for `method` on `path` (relative to the prefix).
        ///
        /// Path parameters use `{name}` syntax; read them with
        /// [`Context::param`](crate::Context::param).
        ///
        /// # Panics
        ///
        /// Panics when `path` is not a valid pattern or conflicts with a route
        /// already registered for `method`.
        pub fn on(self, method: Method, path: &str, handler: impl Handler) -> Self {
            self.on_with(method, path, handler, &[])
        }

        /// Like [`on`](Self::on), with middleware that runs for this route
        /// only, after the scope's middleware.
        pub fn on_with(
            mut self,
            method: Method,
            path: &str,
            handler: impl Handler,
            middleware: &[Middleware],
        ) -> Self {
            self.add(method, path, handler::boxed(handler), middleware);
            self
        }

        $(
            #[doc = concat!("Registers a `", stringify!($method), "` route.")]
            pub fn $name(self, path: &str, handler: impl Handler) -> Self {
                self.on(Method::$method, path, handler)
            }

            #[doc = concat!("Registers a `", stringify!($method), "` route with route middleware.")]
            pub fn $name_with(self, path: &str, handler: impl Handler, middleware: &[Middleware]) -> Self {
                self.on_with(Method::$method, path, handler, middleware)
            }
        )*

        /// Registers `handler` under all nine standard methods.
        pub fn any(mut self, path: &str, handler: impl Handler) -> Self {
            let handler = handler::boxed(handler);
            for method in STANDARD_METHODS {
                self.add(method, path, Arc::clone(&handler), &[]);
            }
            self
        }

        /// Appends middleware to this scope. Only routes registered afterwards,
        /// here or in groups created afterwards, are wrapped by it.
        pub fn middleware(mut self, middleware: Middleware) -> Self {
            self.scope.middleware.push(middleware);
            self
        }

        /// Registers routes under `prefix`, inheriting a snapshot of this
        /// scope's middleware.
        ///
        /// ```rust
        /// use weft::{Context, Error, Middleware, Next, Router};
        ///
        /// async fn auth(c: &mut Context, next: Next<'_>) -> Result<(), Error> { next.run(c).await }
        /// async fn list(c: &mut Context) -> Result<(), Error> { c.text("[]") }
        /// async fn show(c: &mut Context) -> Result<(), Error> { c.text("{}") }
        ///
        /// let app = Router::new().group("/api", |api| {
        ///     api.middleware(Middleware::from_fn(auth))
        ///         .get("/users", list)
        ///         .group("/v1", |v1| v1.get("/users/{id}", show))
        /// });
        /// ```
        pub fn group(mut self, prefix: &str, routes: impl FnOnce(Group<'_>) -> Group<'_>) -> Self {
            let scope = self.scope.nest(prefix);
            routes(Group { table: self.table_mut(), scope });
            self
        }
    };
}

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve).
/// Every method returns `self`, so registrations chain:
///
/// ```rust
/// use weft::{Context, Error, Router, middleware};
///
/// async fn get_user(c: &mut Context) -> Result<(), Error> {
///     let id = c.param("id").unwrap_or_default().to_owned();
///     c.text(id)
/// }
/// # async fn create_user(c: &mut Context) -> Result<(), Error> { Ok(()) }
///
/// let app = Router::new()
///     .middleware(middleware::trace())
///     .get("/users/{id}", get_user)
///     .post("/users", create_user);
/// ```
#[derive(Default)]
pub struct Router {
    table: RouteTable,
    scope: Scope,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn into_table(self) -> RouteTable {
        self.table
    }

    fn table_mut(&mut self) -> &mut RouteTable {
        &mut self.table
    }

    fn add(&mut self, method: Method, path: &str, handler: BoxedHandler, middleware: &[Middleware]) {
        self.scope.register(&mut self.table, method, path, handler, middleware);
    }

    registration_methods! {
        get, get_with => GET;
        post, post_with => POST;
        put, put_with => PUT;
        patch, patch_with => PATCH;
        delete, delete_with => DELETE;
        head, head_with => HEAD;
        options, options_with => OPTIONS;
        connect, connect_with => CONNECT;
        trace, trace_with => TRACE;
    }
}

/// Routes under a shared prefix and middleware snapshot, created by
/// [`Router::group`]. Writes into its router's table.
pub struct Group<'r> {
    table: &'r mut RouteTable,
    scope: Scope,
}

impl Group<'_> {
    fn table_mut(&mut self) -> &mut RouteTable {
        self.table
    }

    fn add(&mut self, method: Method, path: &str, handler: BoxedHandler, middleware: &[Middleware]) {
        self.scope.register(self.table, method, path, handler, middleware);
    }

    registration_methods! {
        get, get_with => GET;
        post, post_with => POST;
        put, put_with => PUT;
        patch, patch_with => PATCH;
        delete, delete_with => DELETE;
        head, head_with => HEAD;
        options, options_with => OPTIONS;
        connect, connect_with => CONNECT;
        trace, trace_with => TRACE;
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use futures::future::BoxFuture;
    use http::HeaderValue;

    use super::*;
    use crate::config::Config;
    use crate::context::Context;
    use crate::error::Error;
    use crate::handler::HandlerResult;
    use crate::pool::ContextPool;
    use crate::request::Request;

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

    async fn h(c: &mut Context) -> Result<(), Error> {
        c.append_header("x-order", HeaderValue::from_static("h"));
        Ok(())
    }

    async fn echo_id(c: &mut Context) -> Result<(), Error> {
        let id = c.param("id").unwrap_or_default().to_owned();
        c.text(id)
    }

    /// Runs `method path` against the table; returns the recorded order, or
    /// `None` when the route does not resolve.
    async fn run(table: &RouteTable, method: Method, path: &str) -> Option<(Vec<String>, Vec<u8>)> {
        let pool = ContextPool::new(Arc::new(Config::default()));
        let req = http::Request::builder().method(method).uri(path).body(Bytes::new()).unwrap();
        let mut c = pool.acquire(Request::new(req));
        let Lookup::Found(handler) = c.route(table) else {
            return None;
        };
        handler.call(&mut c).await.unwrap();
        let order = c
            .response_headers()
            .get_all("x-order")
            .iter()
            .map(|v| v.to_str().unwrap().to_owned())
            .collect();
        Some((order, c.response_body().to_vec()))
    }

    async fn order(table: &RouteTable, path: &str) -> Vec<String> {
        run(table, Method::GET, path).await.unwrap().0
    }

    #[tokio::test]
    async fn group_inherits_parent_middleware() {
        let table = Router::new()
            .middleware(tag("A"))
            .group("/api", |api| api.middleware(tag("B")).get("/x", h))
            .get("/y", h)
            .into_table();

        assert_eq!(order(&table, "/api/x").await, ["A", "B", "h"]);
        assert_eq!(order(&table, "/y").await, ["A", "h"]);
    }

    #[tokio::test]
    async fn later_parent_middleware_does_not_reach_existing_routes() {
        let table = Router::new()
            .middleware(tag("A"))
            .get("/early", h)
            .group("/g", |g| g.get("/x", h))
            .middleware(tag("C"))
            .get("/late", h)
            .into_table();

        assert_eq!(order(&table, "/early").await, ["A", "h"]);
        assert_eq!(order(&table, "/g/x").await, ["A", "h"]);
        assert_eq!(order(&table, "/late").await, ["A", "C", "h"]);
    }

    #[tokio::test]
    async fn route_middleware_runs_after_scope_middleware() {
        let table = Router::new()
            .middleware(tag("global"))
            .get_with("/r", h, &[tag("r1"), tag("r2")])
            .into_table();

        assert_eq!(order(&table, "/r").await, ["global", "r1", "r2", "h"]);
    }

    #[tokio::test]
    async fn nested_groups_join_prefixes() {
        let table = Router::new()
            .group("/api", |api| {
                api.middleware(tag("api"))
                    .group("/v1", |v1| v1.middleware(tag("v1")).get("/users/{id}", echo_id))
            })
            .into_table();

        let (order, body) = run(&table, Method::GET, "/api/v1/users/42").await.unwrap();
        assert_eq!(order, ["api", "v1"]);
        assert_eq!(body, b"42");
        assert!(run(&table, Method::GET, "/users/42").await.is_none());
    }

    #[tokio::test]
    async fn any_registers_every_standard_method() {
        let table = Router::new().any("/all", h).into_table();
        for method in STANDARD_METHODS {
            assert!(run(&table, method, "/all").await.is_some());
        }
    }

    #[test]
    fn lookup_reports_allowed_methods() {
        let table = Router::new()
            .post("/items", h)
            .get("/items", h)
            .delete("/items/{id}", h)
            .into_table();

        let mut params = Vec::new();
        match table.lookup(&Method::PUT, "/items", &mut params) {
            Lookup::MethodNotAllowed(allowed) => assert_eq!(allowed, [Method::GET, Method::POST]),
            _ => panic!("expected 405"),
        }
        assert!(matches!(table.lookup(&Method::GET, "/nothing", &mut params), Lookup::NotFound));
        assert!(params.is_empty());

        assert!(matches!(table.lookup(&Method::DELETE, "/items/7", &mut params), Lookup::Found(_)));
        assert_eq!(params, [("id".to_owned(), "7".to_owned())]);
    }

    #[test]
    #[should_panic(expected = "invalid route")]
    fn conflicting_routes_panic() {
        let _ = Router::new().get("/{a}", h).get("/{b}", h);
    }
}

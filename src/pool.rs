//! Reusable request contexts.
//!
//! Every request borrows a [`Context`] from the pool for its whole chain and
//! gives it back afterwards. The free list is a bounded lock-free queue, so
//! concurrent connection tasks acquire and release without a mutex and an
//! idle server holds at most `capacity` contexts.

use std::sync::Arc;

use crossbeam::queue::ArrayQueue;

use crate::config::Config;
use crate::context::Context;
use crate::request::Request;

/// A pool of [`Context`]s bound to one server configuration.
pub struct ContextPool {
    free: ArrayQueue<Box<Context>>,
    config: Arc<Config>,
}

impl ContextPool {
    /// A pool sized by `config.pool_capacity`.
    pub fn new(config: Arc<Config>) -> Self {
        let capacity = config.pool_capacity.max(1);
        Self { free: ArrayQueue::new(capacity), config }
    }

    /// Hands out a context wrapping `request`: a recycled one when available,
    /// otherwise a fresh allocation. Both are indistinguishable to the caller.
    pub fn acquire(&self, request: Request) -> Box<Context> {
        let mut ctx = self
            .free
            .pop()
            .unwrap_or_else(|| Box::new(Context::new(Arc::clone(&self.config))));
        ctx.request = request;
        ctx
    }

    /// Clears every per-request field and returns the context to the free
    /// list. When the list is full, or the context came from another pool,
    /// it is dropped instead.
    ///
    /// Taking the box by value means a context cannot be released twice.
    pub fn release(&self, mut ctx: Box<Context>) {
        if !Arc::ptr_eq(&ctx.config, &self.config) {
            return;
        }
        ctx.reset();
        // `push` hands the context back when the queue is full; dropping it is fine.
        let _ = self.free.push(ctx);
    }

    /// Number of contexts waiting to be reused.
    pub fn idle(&self) -> usize {
        self.free.len()
    }

    pub fn capacity(&self) -> usize {
        self.free.capacity()
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use bytes::Bytes;

    use super::*;

    fn request(uri: &str, host: &str) -> Request {
        Request::new(
            http::Request::get(uri)
                .header("host", host)
                .body(Bytes::new())
                .unwrap(),
        )
    }

    fn pool(capacity: usize) -> ContextPool {
        ContextPool::new(Arc::new(Config::default().pool_capacity(capacity)))
    }

    #[test]
    fn reused_context_shows_only_the_new_request() {
        let pool = pool(4);

        let mut c = pool.acquire(request("/old?x=1", "old.example.com:8080"));
        c.set_params(vec![("id".into(), "1".into())]);
        assert_eq!(c.path(), "/old");
        assert_eq!(c.hostname(), "old.example.com");
        assert_eq!(c.original_url(), "/old?x=1");
        assert_eq!(c.query("x"), Some("1"));
        c.text("old body").unwrap();
        pool.release(c);
        assert_eq!(pool.idle(), 1);

        let c = pool.acquire(request("/new", "new.example.com"));
        assert_eq!(pool.idle(), 0);
        assert_eq!(c.path(), "/new");
        assert_eq!(c.hostname(), "new.example.com");
        assert_eq!(c.original_url(), "/new");
        assert_eq!(c.base_url(), "http://new.example.com");
        assert_eq!(c.query("x"), None);
        assert_eq!(c.param("id"), None);
        assert!(c.response_body().is_empty());
        assert!(c.response_headers().is_empty());
    }

    #[test]
    fn repeated_release_cycles_stay_clean() {
        let pool = pool(1);
        for i in 0..5 {
            let path = format!("/item/{i}");
            let c = pool.acquire(request(&path, "example.com"));
            assert_eq!(c.original_url(), path);
            pool.release(c);
            assert_eq!(pool.idle(), 1);
        }
    }

    #[test]
    fn full_pool_drops_extra_contexts() {
        let pool = pool(1);
        let a = pool.acquire(request("/a", "h"));
        let b = pool.acquire(request("/b", "h"));
        pool.release(a);
        pool.release(b);
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn foreign_contexts_are_not_adopted() {
        let ours = pool(2);
        let theirs = pool(2);
        let c = theirs.acquire(request("/", "h"));
        ours.release(c);
        assert_eq!(ours.idle(), 0);
    }

    #[test]
    fn zero_capacity_still_works() {
        let pool = pool(0);
        assert_eq!(pool.capacity(), 1);
        let c = pool.acquire(request("/", "h"));
        pool.release(c);
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn concurrent_acquire_release() {
        let pool = Arc::new(pool(8));
        let workers: Vec<_> = (0..8)
            .map(|t| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    for i in 0..200 {
                        let path = format!("/t{t}/{i}");
                        let c = pool.acquire(request(&path, "example.com"));
                        assert_eq!(c.path(), path);
                        assert_eq!(c.original_url(), path);
                        pool.release(c);
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }
        assert!(pool.idle() <= 8);
    }
}

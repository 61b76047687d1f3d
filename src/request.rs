//! The raw request carrier a [`Context`](crate::Context) wraps.
//!
//! Built once per request by the server from hyper's request parts and the
//! collected body. Contexts borrow everything they expose from here.

use std::net::SocketAddr;

use bytes::Bytes;
use http::{HeaderMap, Method, Uri, Version};

/// An incoming HTTP request with its body fully read.
#[derive(Debug, Default)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) uri: Uri,
    pub(crate) version: Version,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
    pub(crate) remote_addr: Option<SocketAddr>,
    pub(crate) secure: bool,
}

impl Request {
    /// Wraps an `http::Request` whose body has already been collected.
    ///
    /// ```rust
    /// use weft::Request;
    ///
    /// let req = Request::new(
    ///     http::Request::get("/users/7?full=1")
    ///         .header("host", "api.example.com")
    ///         .body(bytes::Bytes::new())
    ///         .unwrap(),
    /// );
    /// assert_eq!(req.uri().path(), "/users/7");
    /// ```
    pub fn new(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self::from_parts(parts, body)
    }

    pub(crate) fn from_parts(parts: http::request::Parts, body: Bytes) -> Self {
        Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            body,
            remote_addr: None,
            secure: false,
        }
    }

    /// Records the peer address of the connection.
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Marks the request as having arrived over an encrypted connection.
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn version(&self) -> Version { self.version }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }
    pub fn is_secure(&self) -> bool { self.secure }

    /// Case-insensitive header lookup. Values that are not visible ASCII are
    /// treated as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The raw host, port included: the `Host` header, else the URI authority
    /// (HTTP/2 requests carry it there).
    pub fn host(&self) -> &str {
        self.header("host")
            .or_else(|| self.uri.authority().map(|a| a.as_str()))
            .unwrap_or("")
    }
}

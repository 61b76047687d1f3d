//! The response buffer a [`Context`](crate::Context) writes into.
//!
//! Handlers never build one directly: they call the context's response
//! methods, and the server converts the buffer into a hyper response once the
//! chain finishes.

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, StatusCode, header};
use http_body_util::Full;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for use with [`Context::bytes`](crate::Context::bytes).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContentType {
    Cbor,         // application/cbor
    Csv,          // text/csv
    EventStream,  // text/event-stream  (SSE)
    FormData,     // application/x-www-form-urlencoded
    Html,         // text/html; charset=utf-8
    Json,         // application/json
    MsgPack,      // application/msgpack
    OctetStream,  // application/octet-stream  (binary / file download)
    Pdf,          // application/pdf
    Text,         // text/plain; charset=utf-8
    Toml,         // application/toml
    Xml,          // application/xml
    Yaml,         // application/x-yaml
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cbor        => "application/cbor",
            Self::Csv         => "text/csv",
            Self::EventStream => "text/event-stream",
            Self::FormData    => "application/x-www-form-urlencoded",
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json",
            Self::MsgPack     => "application/msgpack",
            Self::OctetStream => "application/octet-stream",
            Self::Pdf         => "application/pdf",
            Self::Text        => "text/plain; charset=utf-8",
            Self::Toml        => "application/toml",
            Self::Xml         => "application/xml",
            Self::Yaml        => "application/x-yaml",
        }
    }

    pub(crate) fn header_value(self) -> HeaderValue {
        HeaderValue::from_static(self.as_str())
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// Status, headers and body of an outgoing response.
#[derive(Debug, Default)]
pub struct Response {
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Vec<u8>,
}

impl Response {
    /// Response with no body.
    pub(crate) fn status(code: StatusCode) -> Self {
        Self { status: code, ..Self::default() }
    }

    pub fn status_code(&self) -> StatusCode { self.status }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    pub(crate) fn set_body(&mut self, content_type: ContentType, body: Vec<u8>) {
        self.headers.insert(header::CONTENT_TYPE, content_type.header_value());
        self.body = body;
    }

    /// Converts into the type hyper writes to the socket. `content-length` is
    /// derived by hyper from the `Full` body.
    pub(crate) fn into_inner(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(Bytes::from(self.body)));
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_an_empty_ok() {
        let res = Response::default();
        assert_eq!(res.status_code(), StatusCode::OK);
        assert!(res.headers().is_empty());
        assert!(res.body().is_empty());
    }

    #[test]
    fn set_body_replaces_content_type() {
        let mut res = Response::default();
        res.set_body(ContentType::Text, b"one".to_vec());
        res.set_body(ContentType::Json, b"{}".to_vec());
        assert_eq!(res.headers().get_all(header::CONTENT_TYPE).iter().count(), 1);
        assert_eq!(res.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(res.body(), b"{}");
    }

    #[test]
    fn into_inner_keeps_status_and_headers() {
        let mut res = Response::status(StatusCode::CREATED);
        res.headers.insert(header::LOCATION, HeaderValue::from_static("/users/42"));
        let inner = res.into_inner();
        assert_eq!(inner.status(), StatusCode::CREATED);
        assert_eq!(inner.headers()[header::LOCATION], "/users/42");
    }
}

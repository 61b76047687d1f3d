//! The per-request state object handlers work with.
//!
//! A [`Context`] wraps one [`Request`] and the [`Response`] being built for
//! it. Contexts are pooled: the server acquires one per request, passes
//! `&mut Context` down the chain, then clears it and puts it back.
//!
//! Accessors are views over the raw request. Values that cost an allocation
//! to produce (the base URL, decoded query pairs) are computed on first use
//! and cached until the context is released.

use std::net::IpAddr;
use std::sync::{Arc, OnceLock};

use http::header::{self, IntoHeaderName};
use http::{HeaderMap, HeaderValue, Method, StatusCode, Version};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::Config;
use crate::error::Error;
use crate::negotiate;
use crate::range::{self, RangeError, Ranges};
use crate::request::Request;
use crate::response::{ContentType, Response};
use crate::router::{Lookup, RouteTable};

/// Lazily computed values for the current request, plus path parameters.
#[derive(Debug, Default)]
struct Cache {
    base_url: OnceLock<String>,
    queries: OnceLock<Vec<(String, String)>>,
    params: Vec<(String, String)>,
}

impl Cache {
    fn clear(&mut self) {
        self.base_url.take();
        self.queries.take();
        // Keeps the allocation for the next request.
        self.params.clear();
    }
}

/// Mutable state of one in-flight request.
///
/// ```rust
/// use weft::{Context, Error};
///
/// async fn show_user(c: &mut Context) -> Result<(), Error> {
///     let id = c.param("id").unwrap_or("unknown").to_owned();
///     match c.accepts(&["application/json", "text/plain"]) {
///         Some("application/json") => c.json(&serde_json::json!({ "id": id })),
///         _ => c.text(format!("user {id}")),
///     }
/// }
/// ```
#[derive(Debug)]
pub struct Context {
    pub(crate) request: Request,
    pub(crate) response: Response,
    pub(crate) config: Arc<Config>,
    cache: Cache,
}

impl Context {
    pub(crate) fn new(config: Arc<Config>) -> Self {
        Self {
            request: Request::default(),
            response: Response::default(),
            config,
            cache: Cache::default(),
        }
    }

    /// Drops everything tied to the current request.
    pub(crate) fn reset(&mut self) {
        self.request = Request::default();
        self.response = Response::default();
        self.cache.clear();
    }

    /// Resolves the current request against `table`, filling in path
    /// parameters on a match.
    pub(crate) fn route<'t>(&mut self, table: &'t RouteTable) -> Lookup<'t> {
        self.cache.params.clear();
        table.lookup(&self.request.method, self.request.uri.path(), &mut self.cache.params)
    }

    #[cfg(test)]
    pub(crate) fn set_params(&mut self, params: impl IntoIterator<Item = (String, String)>) {
        self.cache.params.clear();
        self.cache.params.extend(params);
    }

    pub(crate) fn take_response(&mut self) -> Response {
        std::mem::take(&mut self.response)
    }

    pub fn config(&self) -> &Config { &self.config }
    pub fn request(&self) -> &Request { &self.request }

    // ── Request line ─────────────────────────────────────────────────────────

    pub fn method(&self) -> &Method { &self.request.method }

    /// The path without the query string.
    pub fn path(&self) -> &str { self.request.uri.path() }

    /// Path and query exactly as requested (`/search?q=rust`).
    pub fn original_url(&self) -> &str {
        self.request
            .uri
            .path_and_query()
            .map_or_else(|| self.request.uri.path(), |pq| pq.as_str())
    }

    /// `"HTTP/1.1"`, `"HTTP/2.0"`, …
    pub fn protocol(&self) -> &'static str {
        match self.request.version {
            Version::HTTP_09 => "HTTP/0.9",
            Version::HTTP_10 => "HTTP/1.0",
            Version::HTTP_11 => "HTTP/1.1",
            Version::HTTP_2  => "HTTP/2.0",
            Version::HTTP_3  => "HTTP/3.0",
            _                => "HTTP/1.1",
        }
    }

    // ── Host and connection ──────────────────────────────────────────────────

    /// The raw host, port included.
    pub fn host(&self) -> &str { self.request.host() }

    /// The host without its port. Hosts that cannot be split are returned
    /// unchanged.
    pub fn hostname(&self) -> &str {
        let host = self.request.host();
        split_host_port(host).unwrap_or(host)
    }

    /// `scheme://host[:port]`, computed once per request.
    pub fn base_url(&self) -> &str {
        self.cache
            .base_url
            .get_or_init(|| format!("{}://{}", self.scheme(), self.request.host()))
    }

    pub fn scheme(&self) -> &'static str {
        if self.secure() { "https" } else { "http" }
    }

    /// Whether the request arrived encrypted (directly, or via a trusted
    /// proxy that said so).
    pub fn secure(&self) -> bool { self.request.secure }

    /// Peer port of the connection.
    pub fn port(&self) -> Option<u16> {
        self.request.remote_addr.map(|a| a.port())
    }

    pub fn is_from_local(&self) -> bool {
        self.request.remote_addr.is_some_and(|a| a.ip().is_loopback())
    }

    /// Whether the connected peer is one of the configured trusted proxies.
    pub fn is_proxy_trusted(&self) -> bool {
        self.request
            .remote_addr
            .is_some_and(|a| self.config.is_trusted_proxy(a.ip()))
    }

    /// Entries of `X-Forwarded-For`, client first.
    pub fn forwarded_ips(&self) -> Vec<&str> {
        match self.header("x-forwarded-for") {
            Some(v) if !v.is_empty() => v.split(',').map(str::trim).collect(),
            _ => Vec::new(),
        }
    }

    /// The client address: the first `X-Forwarded-For` entry when the peer is
    /// a trusted proxy, otherwise the peer itself.
    pub fn real_ip(&self) -> Option<IpAddr> {
        let forwarded = self
            .is_proxy_trusted()
            .then(|| self.forwarded_ips().first().and_then(|ip| ip.parse().ok()))
            .flatten();
        forwarded.or_else(|| self.request.remote_addr.map(|a| a.ip()))
    }

    /// Host labels left of the last `offset` ones: `a.b.example.com` with
    /// offset 2 gives `["a", "b"]`.
    pub fn subdomains(&self, offset: usize) -> Vec<&str> {
        let labels: Vec<&str> = self.hostname().split('.').collect();
        if labels.len() <= offset {
            return Vec::new();
        }
        labels[..labels.len() - offset].to_vec()
    }

    // ── Headers, params, query, body ─────────────────────────────────────────

    /// Case-insensitive request header lookup.
    pub fn header(&self, name: &str) -> Option<&str> { self.request.header(name) }
    pub fn headers(&self) -> &HeaderMap { &self.request.headers }

    /// A named path parameter: `/users/{id}` on `/users/42` gives `"42"`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.cache
            .params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn params(&self) -> &[(String, String)] { &self.cache.params }

    /// Percent-decoded query pairs in request order.
    pub fn queries(&self) -> &[(String, String)] {
        self.cache.queries.get_or_init(|| {
            self.request
                .uri
                .query()
                .and_then(|q| serde_urlencoded::from_str(q).ok())
                .unwrap_or_default()
        })
    }

    /// The first value of query parameter `key`.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.queries()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> &[u8] { &self.request.body }

    /// Decodes the request body as JSON.
    pub fn json_body<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_slice(&self.request.body).map_err(|e| Error::Decode(Box::new(e)))
    }

    pub fn is_xhr(&self) -> bool {
        self.header("x-requested-with") == Some("XMLHttpRequest")
    }

    // ── Negotiation and ranges ───────────────────────────────────────────────

    /// Best of `offers` for the `Accept` header.
    pub fn accepts<'o>(&self, offers: &[&'o str]) -> Option<&'o str> {
        self.negotiate(header::ACCEPT, offers)
    }

    pub fn accepts_charsets<'o>(&self, offers: &[&'o str]) -> Option<&'o str> {
        self.negotiate(header::ACCEPT_CHARSET, offers)
    }

    pub fn accepts_encodings<'o>(&self, offers: &[&'o str]) -> Option<&'o str> {
        self.negotiate(header::ACCEPT_ENCODING, offers)
    }

    pub fn accepts_languages<'o>(&self, offers: &[&'o str]) -> Option<&'o str> {
        self.negotiate(header::ACCEPT_LANGUAGE, offers)
    }

    fn negotiate<'o>(&self, name: header::HeaderName, offers: &[&'o str]) -> Option<&'o str> {
        let value = self
            .request
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        negotiate::accepts(value, offers)
    }

    /// Parses the `Range` header against a resource of `size` bytes.
    pub fn range(&self, size: u64) -> Result<Ranges, RangeError> {
        range::parse_range(self.header("range").unwrap_or(""), size)
    }

    // ── Caching ──────────────────────────────────────────────────────────────

    /// Whether the client's cached copy is still valid for the response being
    /// built: `If-None-Match` against the response `ETag` (weak comparison),
    /// then `If-Modified-Since` against the response `Last-Modified`.
    pub fn fresh(&self) -> bool {
        let response_header = |name: header::HeaderName| {
            self.response.headers.get(name).and_then(|v| v.to_str().ok())
        };

        if let (Some(tag), Some(etag)) = (self.header("if-none-match"), response_header(header::ETAG)) {
            let weak_match = tag.strip_prefix("W/").is_some_and(|t| etag.ends_with(t));
            if tag == etag || weak_match {
                return true;
            }
        }

        if let (Some(since), Some(modified)) =
            (self.header("if-modified-since"), response_header(header::LAST_MODIFIED))
        {
            if let (Ok(since), Ok(modified)) =
                (httpdate::parse_http_date(since), httpdate::parse_http_date(modified))
            {
                return modified <= since;
            }
        }
        false
    }

    pub fn stale(&self) -> bool { !self.fresh() }

    // ── Response ─────────────────────────────────────────────────────────────

    pub fn status(&mut self, code: StatusCode) -> &mut Self {
        self.response.status = code;
        self
    }

    pub fn status_code(&self) -> StatusCode { self.response.status }

    /// Sets a response header, replacing earlier values.
    pub fn set_header<K: IntoHeaderName>(&mut self, name: K, value: HeaderValue) -> &mut Self {
        self.response.headers.insert(name, value);
        self
    }

    /// Adds a response header value, keeping earlier ones.
    pub fn append_header<K: IntoHeaderName>(&mut self, name: K, value: HeaderValue) -> &mut Self {
        self.response.headers.append(name, value);
        self
    }

    pub fn set_content_type(&mut self, content_type: ContentType) -> &mut Self {
        self.set_header(header::CONTENT_TYPE, content_type.header_value())
    }

    pub fn response_headers(&self) -> &HeaderMap { &self.response.headers }
    pub fn response_body(&self) -> &[u8] { &self.response.body }

    /// `text/plain; charset=utf-8` body.
    pub fn text(&mut self, body: impl Into<String>) -> Result<(), Error> {
        self.bytes(ContentType::Text, body.into().into_bytes())
    }

    /// `text/html; charset=utf-8` body.
    pub fn html(&mut self, body: impl Into<String>) -> Result<(), Error> {
        self.bytes(ContentType::Html, body.into().into_bytes())
    }

    /// Body of any type. Use this for pre-encoded payloads.
    pub fn bytes(&mut self, content_type: ContentType, body: impl Into<Vec<u8>>) -> Result<(), Error> {
        self.response.set_body(content_type, body.into());
        Ok(())
    }

    /// Serialises `value` with `serde_json`.
    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        let body = serde_json::to_vec(value).map_err(|e| Error::Encode(Box::new(e)))?;
        self.bytes(ContentType::Json, body)
    }

    /// Serialises `value` with `serde_yaml`.
    pub fn yaml<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        let body = serde_yaml::to_string(value).map_err(|e| Error::Encode(Box::new(e)))?;
        self.bytes(ContentType::Yaml, body)
    }

    /// Serialises `value` with `toml`. Only tables encode at the top level.
    pub fn toml<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        let body = toml::to_string(value).map_err(|e| Error::Encode(Box::new(e)))?;
        self.bytes(ContentType::Toml, body)
    }

    /// Serialises `value` with `quick-xml`. Structs use their type name as
    /// the root element.
    pub fn xml<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        let body = quick_xml::se::to_string(value).map_err(|e| Error::Encode(Box::new(e)))?;
        self.bytes(ContentType::Xml, body)
    }

    /// Serialises `value` as CBOR with `ciborium`.
    pub fn cbor<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        let mut body = Vec::new();
        ciborium::into_writer(value, &mut body).map_err(|e| Error::Encode(Box::new(e)))?;
        self.bytes(ContentType::Cbor, body)
    }

    /// Sets `code` and uses its reason phrase as a plain-text body. Statuses
    /// that cannot carry a body (1xx, 204, 205, 304) are sent without one.
    pub fn send_status(&mut self, code: StatusCode) -> Result<(), Error> {
        self.status(code);
        if forbids_body(code) {
            self.response.headers.remove(header::CONTENT_TYPE);
            self.response.body.clear();
            return Ok(());
        }
        self.text(code.canonical_reason().unwrap_or(""))
    }
}

fn forbids_body(code: StatusCode) -> bool {
    code.is_informational()
        || matches!(code, StatusCode::NO_CONTENT | StatusCode::RESET_CONTENT | StatusCode::NOT_MODIFIED)
}

/// The host part of `host:port` or `[v6]:port`; `None` when there is no port
/// or the string is not a valid pair.
fn split_host_port(raw: &str) -> Option<&str> {
    if let Some(rest) = raw.strip_prefix('[') {
        let (host, after) = rest.split_once(']')?;
        after.strip_prefix(':')?;
        return (!host.contains('[')).then_some(host);
    }
    let (host, _port) = raw.rsplit_once(':')?;
    (!host.contains(':')).then_some(host)
}

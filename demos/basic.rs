//! Minimal weft example: a small item API with negotiation, ranges and
//! middleware.
//!
//! Run with:
//!   cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/items/42
//!   curl -H 'accept: application/x-yaml' http://localhost:3000/items/42
//!   curl -X POST http://localhost:3000/items \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"bolt","qty":3}'
//!   curl -H 'range: bytes=0-9' http://localhost:3000/blob
//!   curl -X DELETE http://localhost:3000/admin/items/42 -H 'authorization: t'

use serde::{Deserialize, Serialize};
use tracing::info;
use weft::http::{HeaderValue, header};
use weft::{ContentType, Context, Error, Middleware, Next, Router, Server, StatusCode, middleware};

const BLOB: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Deserialize, Serialize)]
struct Item {
    name: String,
    qty: u32,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let app = Router::new()
        .middleware(middleware::trace())
        .get("/items/{id}", get_item)
        .post("/items", create_item)
        .get("/blob", blob)
        .group("/admin", |admin| {
            admin
                .middleware(Middleware::from_fn(require_token))
                .delete("/items/{id}", delete_item)
        });

    Server::bind("0.0.0.0:3000").serve(app).await
}

// GET /items/{id}: JSON, YAML or plain text depending on `Accept`.
async fn get_item(c: &mut Context) -> Result<(), Error> {
    let item = Item {
        name: format!("item-{}", c.param("id").unwrap_or_default()),
        qty: 1,
    };
    match c.accepts(&["application/json", "application/x-yaml", "text/plain"]) {
        Some("application/x-yaml") => c.yaml(&item),
        Some("text/plain") => c.text(format!("{} x{}", item.name, item.qty)),
        _ => c.json(&item),
    }
}

// POST /items
async fn create_item(c: &mut Context) -> Result<(), Error> {
    let item: Item = c.json_body()?;
    info!(name = %item.name, qty = item.qty, "item created");
    c.set_header(header::LOCATION, HeaderValue::from_static("/items/99"));
    c.status(StatusCode::CREATED).json(&item)
}

// GET /blob: honours a single byte range.
async fn blob(c: &mut Context) -> Result<(), Error> {
    c.set_header(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    if c.header("range").is_none() {
        return c.bytes(ContentType::OctetStream, BLOB);
    }

    let ranges = c.range(BLOB.len() as u64)?;
    let r = ranges.ranges()[0];
    let content_range = format!("bytes {}-{}/{}", r.start, r.end, BLOB.len());
    if let Ok(value) = HeaderValue::from_str(&content_range) {
        c.set_header(header::CONTENT_RANGE, value);
    }
    c.status(StatusCode::PARTIAL_CONTENT)
        .bytes(ContentType::OctetStream, &BLOB[r.start as usize..=r.end as usize])
}

// DELETE /admin/items/{id}
async fn delete_item(c: &mut Context) -> Result<(), Error> {
    c.send_status(StatusCode::NO_CONTENT)
}

async fn require_token(c: &mut Context, next: Next<'_>) -> Result<(), Error> {
    if c.header("authorization").is_none() {
        return Err(Error::http(StatusCode::UNAUTHORIZED, "missing token"));
    }
    next.run(c).await
}

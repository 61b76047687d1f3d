//! Unified error type.
//!
//! Handlers and middleware return `Result<(), Error>`. An `Err` stops the
//! chain; the server hands it to the configured error handler, which turns it
//! into a status code and a body.

use std::borrow::Cow;
use std::fmt;

use http::StatusCode;

use crate::range::RangeError;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by handlers, middleware and the server.
#[derive(Debug)]
pub enum Error {
    /// Binding, accepting or any other socket failure.
    Io(std::io::Error),
    /// An error that already knows its HTTP status.
    Http(HttpError),
    /// The `Range` header could not be satisfied.
    Range(RangeError),
    /// The request body could not be decoded.
    Decode(BoxError),
    /// A response value could not be encoded.
    Encode(BoxError),
    /// Anything else a handler wants to bail out with.
    Custom(BoxError),
}

impl Error {
    /// Shortcut for an [`HttpError`] with a custom message.
    pub fn http(status: StatusCode, message: impl Into<Cow<'static, str>>) -> Self {
        Self::Http(HttpError::new(status, message))
    }

    /// Wraps any error type as [`Error::Custom`].
    pub fn custom(err: impl Into<BoxError>) -> Self {
        Self::Custom(err.into())
    }

    /// The status code the default error handler answers with.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Http(e) => e.status,
            Self::Range(RangeError::NoValidRanges) => StatusCode::RANGE_NOT_SATISFIABLE,
            Self::Range(_) | Self::Decode(_) => StatusCode::BAD_REQUEST,
            Self::Io(_) | Self::Encode(_) | Self::Custom(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e)     => write!(f, "io: {e}"),
            Self::Http(e)   => write!(f, "{e}"),
            Self::Range(e)  => write!(f, "range: {e}"),
            Self::Decode(e) => write!(f, "decode: {e}"),
            Self::Encode(e) => write!(f, "encode: {e}"),
            Self::Custom(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Http(e) => Some(e),
            Self::Range(e) => Some(e),
            Self::Decode(e) | Self::Encode(e) | Self::Custom(e) => Some(e.as_ref()),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<HttpError> for Error {
    fn from(e: HttpError) -> Self {
        Self::Http(e)
    }
}

impl From<RangeError> for Error {
    fn from(e: RangeError) -> Self {
        Self::Range(e)
    }
}

// ── HttpError ─────────────────────────────────────────────────────────────────

/// An error carrying the status code and message to send back.
///
/// ```rust
/// use weft::{Context, Error, HttpError, StatusCode};
///
/// async fn admin(c: &mut Context) -> Result<(), Error> {
///     if c.header("x-admin-token").is_none() {
///         return Err(HttpError::new(StatusCode::FORBIDDEN, "admins only").into());
///     }
///     c.text("welcome")
/// }
/// ```
#[derive(Debug, Clone)]
pub struct HttpError {
    status: StatusCode,
    message: Cow<'static, str>,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<Cow<'static, str>>) -> Self {
        Self { status, message: message.into() }
    }

    /// An error whose message is the canonical reason phrase (`"Not Found"`).
    pub fn from_status(status: StatusCode) -> Self {
        Self::new(status, status.canonical_reason().unwrap_or("Unknown Status"))
    }

    pub fn status(&self) -> StatusCode { self.status }
    pub fn message(&self) -> &str { &self.message }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HttpError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(Error::http(StatusCode::CONFLICT, "taken").status(), StatusCode::CONFLICT);
        assert_eq!(Error::from(RangeError::NoValidRanges).status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(Error::from(RangeError::Missing).status(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::custom("boom").status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn http_error_displays_its_message() {
        let err = HttpError::from_status(StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Not Found");
        assert_eq!(Error::from(err).to_string(), "Not Found");
    }
}

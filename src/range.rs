//! `Range` request header parsing (RFC 7233 byte ranges).
//!
//! ```rust
//! use weft::range::{parse_range, ByteRange};
//!
//! let set = parse_range("bytes=0-499, -100", 1000).unwrap();
//! assert_eq!(set.unit(), "bytes");
//! assert_eq!(set.ranges(), &[ByteRange { start: 0, end: 499 }, ByteRange { start: 900, end: 999 }]);
//! ```
//!
//! Ranges past the end of the resource are dropped one by one. Only a header
//! in which *every* range falls outside the resource is an error.

use std::fmt;

const BYTES: &str = "bytes";

/// One inclusive byte interval, `start..=end`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered; zero when `end < start`.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        self.end
            .checked_sub(self.start)
            .map_or(0, |span| span.saturating_add(1))
    }
}

/// The parsed header: unit plus surviving ranges in header order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Ranges {
    unit: &'static str,
    ranges: Vec<ByteRange>,
}

impl Ranges {
    pub fn unit(&self) -> &str { self.unit }
    pub fn ranges(&self) -> &[ByteRange] { &self.ranges }
    pub fn into_ranges(self) -> Vec<ByteRange> { self.ranges }
}

/// Why a `Range` header was rejected.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RangeError {
    /// The header is absent or empty.
    Missing,
    /// No `=` between unit and range list.
    Malformed,
    UnsupportedUnit(String),
    /// A range without `-`.
    InvalidSegment(String),
    InvalidSuffix(String),
    InvalidStart(String),
    InvalidEnd(String),
    /// Every range lies outside the resource.
    NoValidRanges,
}

impl fmt::Display for RangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing            => f.write_str("no Range header"),
            Self::Malformed          => f.write_str("invalid Range header format"),
            Self::UnsupportedUnit(u) => write!(f, "unsupported range unit: {u}"),
            Self::InvalidSegment(s)  => write!(f, "invalid range segment: {s}"),
            Self::InvalidSuffix(s)   => write!(f, "invalid suffix range value: {s}"),
            Self::InvalidStart(s)    => write!(f, "invalid start range value: {s}"),
            Self::InvalidEnd(s)      => write!(f, "invalid end range value: {s}"),
            Self::NoValidRanges      => f.write_str("no valid byte ranges found in header"),
        }
    }
}

impl std::error::Error for RangeError {}

/// Parses `header` against a resource of `size` bytes.
///
/// Structural problems fail immediately with the offending segment. A suffix
/// longer than the resource is clamped, so `bytes=-5000` on a 1000-byte
/// resource selects the whole thing.
pub fn parse_range(header: &str, size: u64) -> Result<Ranges, RangeError> {
    if header.is_empty() {
        return Err(RangeError::Missing);
    }

    let (unit, list) = header.split_once('=').ok_or(RangeError::Malformed)?;
    let unit = unit.trim();
    if unit != BYTES {
        return Err(RangeError::UnsupportedUnit(unit.to_owned()));
    }

    let mut ranges = Vec::new();
    for part in list.split(',') {
        let part = part.trim();
        if let Some(range) = parse_one(part, size)? {
            ranges.push(range);
        }
    }

    if ranges.is_empty() {
        return Err(RangeError::NoValidRanges);
    }
    Ok(Ranges { unit: BYTES, ranges })
}

/// `Ok(None)` means the range is well formed but outside the resource.
fn parse_one(part: &str, size: u64) -> Result<Option<ByteRange>, RangeError> {
    let (first, last) = part
        .split_once('-')
        .ok_or_else(|| RangeError::InvalidSegment(part.to_owned()))?;

    let (start, end) = if first.is_empty() {
        let suffix = match last.parse::<u64>() {
            Ok(n) if n > 0 => n.min(size),
            _ => return Err(RangeError::InvalidSuffix(part.to_owned())),
        };
        (size - suffix, size.checked_sub(1))
    } else {
        let start = first
            .parse::<u64>()
            .map_err(|_| RangeError::InvalidStart(part.to_owned()))?;
        let end = if last.is_empty() {
            size.checked_sub(1)
        } else {
            match last.parse::<u64>() {
                Ok(end) if end >= start => Some(match size.checked_sub(1) {
                    Some(max) => end.min(max),
                    None => end,
                }),
                _ => return Err(RangeError::InvalidEnd(part.to_owned())),
            }
        };
        (start, end)
    };

    // An empty resource has no last byte, so nothing in it is addressable.
    match end {
        Some(end) if start < size && start <= end => Ok(Some(ByteRange { start, end })),
        _ => Ok(None),
    }
}

//! Range planning.
//!
//! Turns an optional client `Range` header into a [`RelayPlan`] for one
//! request. Policy for inputs the HTTP spec leaves open:
//!
//! - an `end` past the last byte is clamped to `total_size - 1`
//! - a syntactically malformed header is rejected with [`RangeError::Malformed`]
//! - multi-range headers are ignored and the full object is served
//! - range headers on non-video media, or on objects of unknown size, are ignored

use crate::error::RangeError;

use super::types::{ByteRange, ContentDescriptor};

/// A single range parsed from a `Range: bytes=...` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeRequest {
    /// `bytes=<start>-<end>?`
    FromStart { start: u64, end: Option<u64> },

    /// `bytes=-<length>`: the final `length` bytes
    Suffix { length: u64 },
}

/// How the relay should answer one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayPlan {
    Full,
    Partial { start: u64, end: u64 },
    Unsatisfiable,
}

impl RelayPlan {
    /// Upstream range to forward, if any.
    pub fn byte_range(&self) -> Option<ByteRange> {
        match *self {
            RelayPlan::Partial { start, end } => Some(ByteRange::new(start, end)),
            RelayPlan::Full | RelayPlan::Unsatisfiable => None,
        }
    }
}

impl RangeRequest {
    /// Parse a `Range` header value.
    ///
    /// Returns `Ok(None)` for multi-range requests, which are served in full.
    pub fn parse(header: &str) -> Result<Option<Self>, RangeError> {
        let malformed = || RangeError::Malformed {
            header: header.to_string(),
        };

        let trimmed = header.trim();
        let (unit, spec) = trimmed.split_once('=').ok_or_else(malformed)?;
        if !unit.trim().eq_ignore_ascii_case("bytes") {
            return Err(malformed());
        }

        let spec = spec.trim();
        if spec.contains(',') {
            return Ok(None);
        }

        let (start, end) = spec.split_once('-').ok_or_else(malformed)?;
        let (start, end) = (start.trim(), end.trim());

        if start.is_empty() {
            let length = parse_bound(end).ok_or_else(malformed)?;
            return Ok(Some(RangeRequest::Suffix { length }));
        }

        let start = parse_bound(start).ok_or_else(malformed)?;
        let end = if end.is_empty() {
            None
        } else {
            let end = parse_bound(end).ok_or_else(malformed)?;
            if end < start {
                return Err(malformed());
            }
            Some(end)
        };

        Ok(Some(RangeRequest::FromStart { start, end }))
    }

    /// Resolve against a known object size.
    pub fn resolve(self, total_size: u64) -> RelayPlan {
        match self {
            RangeRequest::FromStart { start, end } => {
                if start >= total_size {
                    return RelayPlan::Unsatisfiable;
                }
                let last = total_size - 1;
                let end = end.map_or(last, |end| end.min(last));
                RelayPlan::Partial { start, end }
            }
            RangeRequest::Suffix { length } => {
                if length == 0 || total_size == 0 {
                    return RelayPlan::Unsatisfiable;
                }
                RelayPlan::Partial {
                    start: total_size.saturating_sub(length),
                    end: total_size - 1,
                }
            }
        }
    }
}

/// Digits only; `+5` or ` 5` are not valid bounds.
fn parse_bound(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Choose the relay plan for a request.
pub fn plan(
    descriptor: &ContentDescriptor,
    range_header: Option<&str>,
) -> Result<RelayPlan, RangeError> {
    let Some(header) = range_header else {
        return Ok(RelayPlan::Full);
    };

    if !descriptor.supports_range {
        return Ok(RelayPlan::Full);
    }

    let Some(total_size) = descriptor.total_size else {
        return Ok(RelayPlan::Full);
    };

    match RangeRequest::parse(header)? {
        Some(request) => Ok(request.resolve(total_size)),
        None => Ok(RelayPlan::Full),
    }
}

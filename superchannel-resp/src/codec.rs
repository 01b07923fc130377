//! RESP2 codec
//!
//! Requests are always arrays of bulk strings. Replies are decoded
//! incrementally: `decode` returns `Ok(None)` until a whole value is
//! buffered, and consumes nothing in that case.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt::Write as _;
use superchannel_core::error::StoreError;
use thiserror::Error;

use crate::config::{DEFAULT_MAX_BULK_LEN, DEFAULT_MAX_DEPTH, DEFAULT_MAX_LINE_LEN};

/// RESP protocol errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RespError {
    #[error("Protocol violation: unknown type byte 0x{0:02x}")]
    UnknownType(u8),

    #[error("Protocol violation: invalid length")]
    InvalidLength,

    #[error("Protocol violation: invalid integer")]
    InvalidInteger,

    #[error("Protocol violation: bulk string of {len} bytes exceeds limit of {max}")]
    BulkTooLarge { len: usize, max: usize },

    #[error("Protocol violation: reply line longer than {max} bytes")]
    LineTooLong { max: usize },

    #[error("Protocol violation: nesting deeper than {0}")]
    TooDeep(usize),

    #[error("Protocol violation: missing CRLF terminator")]
    MissingTerminator,
}

/// Result type alias for RESP operations
pub type Result<T> = std::result::Result<T, RespError>;

impl From<RespError> for StoreError {
    fn from(err: RespError) -> Self {
        Self::Protocol(err.to_string())
    }
}

/// A decoded RESP value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// `+OK`
    Simple(Bytes),
    /// `-ERR ...`
    Error(Bytes),
    /// `:1`
    Integer(i64),
    /// `$3\r\nfoo`, `None` for `$-1`
    Bulk(Option<Bytes>),
    /// `*2\r\n...`, `None` for `*-1`
    Array(Option<Vec<RespValue>>),
}

impl RespValue {
    /// Whether this is the simple string `text`.
    #[must_use]
    pub fn is_simple(&self, text: &str) -> bool {
        matches!(self, Self::Simple(s) if s == text.as_bytes())
    }

    /// Error reply text, if this is one.
    #[must_use]
    pub fn error_text(&self) -> Option<String> {
        match self {
            Self::Error(msg) => Some(String::from_utf8_lossy(msg).into_owned()),
            _ => None,
        }
    }
}

/// Stateless-between-values RESP decoder with size limits.
#[derive(Debug, Clone, Copy)]
pub struct RespDecoder {
    max_bulk_len: usize,
    max_line_len: usize,
    max_depth: usize,
}

impl Default for RespDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl RespDecoder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_bulk_len: DEFAULT_MAX_BULK_LEN,
            max_line_len: DEFAULT_MAX_LINE_LEN,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    #[must_use]
    pub const fn with_max_bulk_len(mut self, max: usize) -> Self {
        self.max_bulk_len = max;
        self
    }

    #[must_use]
    pub const fn with_max_line_len(mut self, max: usize) -> Self {
        self.max_line_len = max;
        self
    }

    #[must_use]
    pub const fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Decode one value from the front of `src`.
    ///
    /// Returns:
    /// - Ok(Some(value)) → value decoded and consumed
    /// - Ok(None) → need more data, `src` untouched
    /// - Err → protocol violation, connection unusable
    pub fn decode(&self, src: &mut BytesMut) -> Result<Option<RespValue>> {
        match self.parse(src, 0, 0)? {
            Some((value, consumed)) => {
                src.advance(consumed);
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn parse(&self, buf: &[u8], pos: usize, depth: usize) -> Result<Option<(RespValue, usize)>> {
        if depth > self.max_depth {
            return Err(RespError::TooDeep(self.max_depth));
        }
        let Some(&kind) = buf.get(pos) else {
            return Ok(None);
        };
        let Some((line, next)) = read_line(buf, pos + 1) else {
            // A peer streaming bytes without CRLF must not grow the buffer forever.
            if buf.len() - (pos + 1) > self.max_line_len {
                return Err(RespError::LineTooLong {
                    max: self.max_line_len,
                });
            }
            return Ok(None);
        };
        if line.len() > self.max_line_len {
            return Err(RespError::LineTooLong {
                max: self.max_line_len,
            });
        }

        match kind {
            b'+' => Ok(Some((RespValue::Simple(Bytes::copy_from_slice(line)), next))),
            b'-' => Ok(Some((RespValue::Error(Bytes::copy_from_slice(line)), next))),
            b':' => Ok(Some((RespValue::Integer(parse_int(line)?), next))),
            b'$' => {
                let Some(len) = parse_len(line)? else {
                    return Ok(Some((RespValue::Bulk(None), next)));
                };
                if len > self.max_bulk_len {
                    return Err(RespError::BulkTooLarge {
                        len,
                        max: self.max_bulk_len,
                    });
                }
                let end = next + len;
                if buf.len() < end + 2 {
                    return Ok(None);
                }
                if &buf[end..end + 2] != b"\r\n" {
                    return Err(RespError::MissingTerminator);
                }
                let payload = Bytes::copy_from_slice(&buf[next..end]);
                Ok(Some((RespValue::Bulk(Some(payload)), end + 2)))
            }
            b'*' => {
                let Some(count) = parse_len(line)? else {
                    return Ok(Some((RespValue::Array(None), next)));
                };
                // Capacity is capped: the count is untrusted until elements arrive.
                let mut items = Vec::with_capacity(count.min(1024));
                let mut cursor = next;
                for _ in 0..count {
                    match self.parse(buf, cursor, depth + 1)? {
                        Some((item, after)) => {
                            items.push(item);
                            cursor = after;
                        }
                        None => return Ok(None),
                    }
                }
                Ok(Some((RespValue::Array(Some(items)), cursor)))
            }
            other => Err(RespError::UnknownType(other)),
        }
    }
}

/// Line starting at `start`, without its CRLF, and the offset after it.
fn read_line(buf: &[u8], start: usize) -> Option<(&[u8], usize)> {
    let rest = buf.get(start..)?;
    let cr = rest.windows(2).position(|w| w == b"\r\n")?;
    Some((&rest[..cr], start + cr + 2))
}

fn parse_int(line: &[u8]) -> Result<i64> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(RespError::InvalidInteger)
}

/// `-1` is null; anything else negative is invalid.
fn parse_len(line: &[u8]) -> Result<Option<usize>> {
    match parse_int(line).map_err(|_| RespError::InvalidLength)? {
        -1 => Ok(None),
        n if n < 0 => Err(RespError::InvalidLength),
        n => usize::try_from(n)
            .map(Some)
            .map_err(|_| RespError::InvalidLength),
    }
}

/// Append `args` to `dst` as a RESP array of bulk strings.
pub fn encode_command<B: BufMut>(args: &[&[u8]], dst: &mut B) {
    let mut header = String::with_capacity(16);
    let _ = write!(header, "*{}\r\n", args.len());
    dst.put_slice(header.as_bytes());
    for arg in args {
        header.clear();
        let _ = write!(header, "${}\r\n", arg.len());
        dst.put_slice(header.as_bytes());
        dst.put_slice(arg);
        dst.put_slice(b"\r\n");
    }
}

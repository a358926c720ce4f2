//! Self-describing field sequences packed into one transport message.
//!
//! A message is a concatenation of fields; each field is a `u32`
//! network-order length followed by that many raw bytes. Typing is
//! positional: the message's type tag (field 0) governs how the
//! remaining fields are interpreted, nothing is carried per-field.
//! Zero-length fields are legal.
//!
//! ```text
//! field:    u32 length (network byte order) + length bytes
//! u32/i32:  4 bytes, big-endian
//! u64:      8 bytes, big-endian
//! f64:      8 bytes, big-endian encoding of the IEEE-754 bit pattern
//! ```
//!
//! The parser tracks the remaining buffer at every step: an index past
//! the last field, a truncated length prefix, or a declared length
//! running past the end of the message all fail with a typed error —
//! nothing is ever read out of bounds.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::SsrdError;

/// Width of a field's length prefix.
const FIELD_PREFIX: usize = 4;

// ── PayloadBuilder ───────────────────────────────────────────────

/// Accumulates length-prefixed fields into one message buffer.
#[derive(Debug, Default)]
pub struct PayloadBuilder {
    buf: BytesMut,
}

impl PayloadBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_field(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.reserve(FIELD_PREFIX + bytes.len());
        self.buf.put_u32(bytes.len() as u32);
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Append a UTF-8 string field.
    pub fn push_str(&mut self, value: &str) -> &mut Self {
        self.push_field(value.as_bytes())
    }

    /// Append a big-endian `u32` field.
    pub fn push_u32(&mut self, value: u32) -> &mut Self {
        self.push_field(&value.to_be_bytes())
    }

    /// Append a big-endian `i32` field.
    pub fn push_i32(&mut self, value: i32) -> &mut Self {
        self.push_field(&value.to_be_bytes())
    }

    /// Append a big-endian `u64` field.
    pub fn push_u64(&mut self, value: u64) -> &mut Self {
        self.push_field(&value.to_be_bytes())
    }

    /// Append an `f64` field as the big-endian encoding of its bit
    /// pattern.
    pub fn push_f64(&mut self, value: f64) -> &mut Self {
        self.push_field(&value.to_bits().to_be_bytes())
    }

    /// Append an opaque byte field.
    pub fn push_bytes(&mut self, value: &[u8]) -> &mut Self {
        self.push_field(value)
    }

    /// Finish the message, yielding the wire buffer.
    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

// ── Fields ───────────────────────────────────────────────────────

/// Bounds-checked reader over a received field sequence.
#[derive(Debug, Clone, Copy)]
pub struct Fields<'a> {
    buf: &'a [u8],
}

impl<'a> Fields<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Raw bytes of the field at `index`.
    ///
    /// Walks the sequence from the start, skipping prior fields by
    /// their declared lengths.
    pub fn raw(&self, index: usize) -> Result<&'a [u8], SsrdError> {
        let mut offset = 0usize;
        let mut current = 0usize;

        while offset < self.buf.len() {
            if self.buf.len() - offset < FIELD_PREFIX {
                return Err(SsrdError::TruncatedField { offset });
            }
            let len = u32::from_be_bytes(
                self.buf[offset..offset + FIELD_PREFIX].try_into().unwrap(),
            ) as usize;
            offset += FIELD_PREFIX;

            if self.buf.len() - offset < len {
                return Err(SsrdError::TruncatedField { offset });
            }

            if current == index {
                return Ok(&self.buf[offset..offset + len]);
            }

            offset += len;
            current += 1;
        }

        Err(SsrdError::FieldOutOfRange {
            index,
            available: current,
        })
    }

    /// Number of fields in the message.
    pub fn count(&self) -> Result<usize, SsrdError> {
        let mut offset = 0usize;
        let mut count = 0usize;

        while offset < self.buf.len() {
            if self.buf.len() - offset < FIELD_PREFIX {
                return Err(SsrdError::TruncatedField { offset });
            }
            let len = u32::from_be_bytes(
                self.buf[offset..offset + FIELD_PREFIX].try_into().unwrap(),
            ) as usize;
            offset += FIELD_PREFIX;

            if self.buf.len() - offset < len {
                return Err(SsrdError::TruncatedField { offset });
            }
            offset += len;
            count += 1;
        }

        Ok(count)
    }

    fn fixed<const N: usize>(&self, index: usize) -> Result<[u8; N], SsrdError> {
        let raw = self.raw(index)?;
        raw.try_into().map_err(|_| SsrdError::FieldSizeMismatch {
            index,
            expected: N,
            actual: raw.len(),
        })
    }

    /// Field at `index` as UTF-8 text.
    pub fn str_at(&self, index: usize) -> Result<&'a str, SsrdError> {
        Ok(std::str::from_utf8(self.raw(index)?)?)
    }

    /// Field at `index` as a big-endian `u32`.
    pub fn u32_at(&self, index: usize) -> Result<u32, SsrdError> {
        Ok(u32::from_be_bytes(self.fixed(index)?))
    }

    /// Field at `index` as a big-endian `i32`.
    pub fn i32_at(&self, index: usize) -> Result<i32, SsrdError> {
        Ok(i32::from_be_bytes(self.fixed(index)?))
    }

    /// Field at `index` as a big-endian `u64`.
    pub fn u64_at(&self, index: usize) -> Result<u64, SsrdError> {
        Ok(u64::from_be_bytes(self.fixed(index)?))
    }

    /// Field at `index` as an `f64` recovered from its big-endian bit
    /// pattern.
    pub fn f64_at(&self, index: usize) -> Result<f64, SsrdError> {
        Ok(f64::from_bits(u64::from_be_bytes(self.fixed(index)?)))
    }
}

// ── Tests ────────────────────────────────────────────────────────

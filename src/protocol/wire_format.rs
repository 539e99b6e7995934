//! Wire format primitives shared by every Host frame.
//!
//! The Host protocol has two kinds of length prefix:
//!
//! ```text
//! ┌──────────────────────┬──────────────────────────────┐
//! │ short (handshake,    │ u8 length, low 8 bits of the │
//! │ response frames)     │ true length                  │
//! ├──────────────────────┼──────────────────────────────┤
//! │ long (request        │ u32 length in the configured │
//! │ frames)              │ byte order                   │
//! └──────────────────────┴──────────────────────────────┘
//! ```
//!
//! Multi-byte integers use the configured [`ByteOrder`], which defaults to
//! the byte order of the machine running the bridge. The Host is expected to
//! run on the same machine.

use std::fmt;
use std::str::FromStr;

use bytes::{BufMut, BytesMut};

use crate::error::{BridgeError, Result};

/// First byte of every request frame. Anything else ends the session.
pub const REQUEST_MARKER: u8 = 0x00;

/// Marker byte plus the u16 port.
pub const REQUEST_PREFIX_SIZE: usize = 3;

/// Fixed field written after a non-empty response body.
pub const BODY_TRAILER: u32 = 0;

/// Byte order of numeric frame fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ByteOrder {
    /// Whatever the local machine uses.
    #[default]
    Native,
    /// Little endian regardless of the machine.
    Little,
    /// Big endian regardless of the machine.
    Big,
}

impl ByteOrder {
    /// Write a u16 in this byte order.
    #[inline]
    pub fn put_u16(self, buf: &mut BytesMut, value: u16) {
        match self {
            ByteOrder::Native => buf.put_u16_ne(value),
            ByteOrder::Little => buf.put_u16_le(value),
            ByteOrder::Big => buf.put_u16(value),
        }
    }

    /// Write a u32 in this byte order.
    #[inline]
    pub fn put_u32(self, buf: &mut BytesMut, value: u32) {
        match self {
            ByteOrder::Native => buf.put_u32_ne(value),
            ByteOrder::Little => buf.put_u32_le(value),
            ByteOrder::Big => buf.put_u32(value),
        }
    }

    /// Interpret two bytes as a u16 in this byte order.
    #[inline]
    pub fn u16_from_bytes(self, bytes: [u8; 2]) -> u16 {
        match self {
            ByteOrder::Native => u16::from_ne_bytes(bytes),
            ByteOrder::Little => u16::from_le_bytes(bytes),
            ByteOrder::Big => u16::from_be_bytes(bytes),
        }
    }

    /// Interpret four bytes as a u32 in this byte order.
    #[inline]
    pub fn u32_from_bytes(self, bytes: [u8; 4]) -> u32 {
        match self {
            ByteOrder::Native => u32::from_ne_bytes(bytes),
            ByteOrder::Little => u32::from_le_bytes(bytes),
            ByteOrder::Big => u32::from_be_bytes(bytes),
        }
    }

    /// Resolve `Native` to the concrete order of this machine.
    pub fn resolve(self) -> ByteOrder {
        match self {
            ByteOrder::Native if cfg!(target_endian = "little") => ByteOrder::Little,
            ByteOrder::Native => ByteOrder::Big,
            other => other,
        }
    }
}

impl FromStr for ByteOrder {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" | "" => Ok(ByteOrder::Native),
            "little" | "le" => Ok(ByteOrder::Little),
            "big" | "be" => Ok(ByteOrder::Big),
            other => Err(BridgeError::Config(format!(
                "unknown byte order '{}' (expected native, little or big)",
                other
            ))),
        }
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ByteOrder::Native => "native",
            ByteOrder::Little => "little",
            ByteOrder::Big => "big",
        };
        f.write_str(name)
    }
}

/// Write a count as a single byte. Counts above 255 keep their low 8 bits.
#[inline]
pub fn put_short_count(buf: &mut BytesMut, count: usize) {
    buf.put_u8(count as u8);
}

/// Write a u8 length prefix followed by the data.
///
/// The prefix is the low 8 bits of the true length, but the data is always
/// written in full.
#[inline]
pub fn put_short_bytes(buf: &mut BytesMut, data: &[u8]) {
    put_short_count(buf, data.len());
    buf.put_slice(data);
}

/// Write a u32 length prefix followed by the data.
#[inline]
pub fn put_long_bytes(buf: &mut BytesMut, order: ByteOrder, data: &[u8]) {
    order.put_u32(buf, data.len() as u32);
    buf.put_slice(data);
}

/// Cursor over an in-memory frame, used by the Host-side reference decoders.
pub(crate) struct SliceReader<'a> {
    buf: &'a [u8],
    order: ByteOrder,
}

impl<'a> SliceReader<'a> {
    pub(crate) fn new(buf: &'a [u8], order: ByteOrder) -> Self {
        Self { buf, order }
    }

    /// Bytes not yet consumed.
    pub(crate) fn remaining(&self) -> &'a [u8] {
        self.buf
    }

    pub(crate) fn bytes(&mut self, len: usize, field: &'static str) -> Result<&'a [u8]> {
        if self.buf.len() < len {
            return Err(BridgeError::TruncatedFrame {
                field,
                expected: len as u64,
                received: self.buf.len() as u64,
            });
        }
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    pub(crate) fn u8(&mut self, field: &'static str) -> Result<u8> {
        Ok(self.bytes(1, field)?[0])
    }

    pub(crate) fn u16(&mut self, field: &'static str) -> Result<u16> {
        let raw = self.bytes(2, field)?;
        Ok(self.order.u16_from_bytes([raw[0], raw[1]]))
    }

    pub(crate) fn u32(&mut self, field: &'static str) -> Result<u32> {
        let raw = self.bytes(4, field)?;
        Ok(self.order.u32_from_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    pub(crate) fn short_string(&mut self, field: &'static str) -> Result<String> {
        let len = self.u8(field)? as usize;
        Ok(String::from_utf8_lossy(self.bytes(len, field)?).into_owned())
    }
}

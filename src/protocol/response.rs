//! Response frames to the Host.
//!
//! ```text
//! u16 status
//! u8  header_count
//! repeat header_count times:
//!     u8 name_length ; u8[name_length] name
//!     u8 value_length ; u8[value_length] value
//! u32 body_length            0 if the body is empty or not valid base64
//! u8[body_length] body       only if body_length > 0
//! u32 0                      only if body_length > 0
//! u8  command_count
//! repeat command_count times:
//!     u8 part_count
//!     repeat part_count times:
//!         u8 part_length ; u8[part_length] part
//! ```
//!
//! Every single-byte count or length holds the low 8 bits of the true value.
//! Entries themselves are always written in full, so a Host reading a frame
//! with more than 255 headers or a header longer than 255 bytes loses sync.

use std::collections::BTreeMap;

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::lenient::{null_as_default, wrapping_u16};
use super::wire_format::{
    put_short_bytes, put_short_count, ByteOrder, SliceReader, BODY_TRAILER,
};
use crate::codec::BodyCodec;
use crate::error::Result;

/// Backend reply, as received on the JSON channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Status code.
    #[serde(default, deserialize_with = "wrapping_u16")]
    pub status: u16,
    /// Response headers.
    #[serde(default, deserialize_with = "null_as_default")]
    pub headers: BTreeMap<String, String>,
    /// Body as base64 text; empty means no body.
    #[serde(default, deserialize_with = "null_as_default")]
    pub body: String,
    /// Commands for the Host, each a list of string parts.
    #[serde(default, deserialize_with = "null_as_default")]
    pub commands: Vec<Vec<String>>,
}

impl Response {
    /// Create a response with only a status.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the body from raw bytes.
    pub fn with_body(mut self, body: &[u8]) -> Self {
        self.body = BodyCodec::encode(body);
        self
    }

    /// Append a command.
    pub fn with_command<I, S>(mut self, parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands.push(parts.into_iter().map(Into::into).collect());
        self
    }

    /// Decoded body bytes, or `None` if the body is empty or malformed.
    pub fn decoded_body(&self) -> Option<Bytes> {
        BodyCodec::decode(&self.body)
    }
}

/// Writes response frames to the Host output stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseEncoder {
    order: ByteOrder,
}

impl ResponseEncoder {
    /// Create an encoder for the given byte order.
    pub fn new(order: ByteOrder) -> Self {
        Self { order }
    }

    /// Encode one response frame.
    pub fn encode(&self, response: &Response) -> BytesMut {
        let mut buf = BytesMut::with_capacity(64 + response.body.len());

        self.order.put_u16(&mut buf, response.status);

        put_short_count(&mut buf, response.headers.len());
        for (name, value) in &response.headers {
            put_short_bytes(&mut buf, name.as_bytes());
            put_short_bytes(&mut buf, value.as_bytes());
        }

        match response.decoded_body() {
            Some(body) => {
                self.order.put_u32(&mut buf, body.len() as u32);
                buf.put_slice(&body);
                self.order.put_u32(&mut buf, BODY_TRAILER);
            }
            None => {
                if !response.body.is_empty() {
                    tracing::warn!(
                        status = response.status,
                        "response body is not valid base64, sending empty body"
                    );
                }
                self.order.put_u32(&mut buf, 0);
            }
        }

        put_short_count(&mut buf, response.commands.len());
        for command in &response.commands {
            put_short_count(&mut buf, command.len());
            for part in command {
                put_short_bytes(&mut buf, part.as_bytes());
            }
        }

        buf
    }

    /// Encode a response and write it to the Host as one flushed frame.
    ///
    /// # Errors
    ///
    /// Returns error if the write or flush fails.
    pub async fn write_to<W>(&self, response: &Response, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let frame = self.encode(response);
        writer.write_all(&frame).await?;
        writer.flush().await?;
        Ok(())
    }
}

/// A response frame as seen by the Host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseFrame {
    /// Status code.
    pub status: u16,
    /// Headers in frame order.
    pub headers: Vec<(String, String)>,
    /// Body bytes; `None` when `body_length` was 0.
    pub body: Option<Bytes>,
    /// Commands, each a list of parts.
    pub commands: Vec<Vec<String>>,
}

/// Decode a response frame the way a Host would.
///
/// Returns the frame and the number of bytes consumed. Only frames whose
/// single-byte fields did not overflow can be decoded.
///
/// # Example
///
/// ```
/// use extbridge::protocol::{decode_response, ByteOrder, Response, ResponseEncoder};
///
/// let response = Response::new(204).with_command(["reload"]);
/// let frame = ResponseEncoder::new(ByteOrder::Native).encode(&response);
///
/// let (decoded, used) = decode_response(&frame, ByteOrder::Native).unwrap();
/// assert_eq!(decoded.status, 204);
/// assert_eq!(decoded.commands, vec![vec!["reload".to_string()]]);
/// assert_eq!(used, frame.len());
/// ```
pub fn decode_response(frame: &[u8], order: ByteOrder) -> Result<(ResponseFrame, usize)> {
    let mut reader = SliceReader::new(frame, order);

    let status = reader.u16("status")?;

    let header_count = reader.u8("header count")?;
    let mut headers = Vec::with_capacity(header_count as usize);
    for _ in 0..header_count {
        let name = reader.short_string("header name")?;
        let value = reader.short_string("header value")?;
        headers.push((name, value));
    }

    let body_len = reader.u32("body length")? as usize;
    let body = if body_len > 0 {
        let body = Bytes::copy_from_slice(reader.bytes(body_len, "body")?);
        reader.u32("body trailer")?;
        Some(body)
    } else {
        None
    };

    let command_count = reader.u8("command count")?;
    let mut commands = Vec::with_capacity(command_count as usize);
    for _ in 0..command_count {
        let part_count = reader.u8("command part count")?;
        let parts = (0..part_count)
            .map(|_| reader.short_string("command part"))
            .collect::<Result<Vec<_>>>()?;
        commands.push(parts);
    }

    let used = frame.len() - reader.remaining().len();
    Ok((
        ResponseFrame {
            status,
            headers,
            body,
            commands,
        },
        used,
    ))
}

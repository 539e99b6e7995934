//! Request frames from the Host.
//!
//! ```text
//! u8  marker                 0x00, anything else ends the session
//! u16 port
//! [u8 path_length ; u8[path_length] path]      only with > 1 endpoint
//! u32 query_count
//! repeat query_count times:
//!     u32 name_length ; u8[name_length] name
//!     u32 value_length ; u8[value_length] value
//! u32 header_count
//! repeat header_count times: (same layout as query entries)
//! ```
//!
//! Unlike the handshake and response frames, counts and lengths here are
//! 4 bytes wide.
//!
//! Running out of input before the first 3 bytes are complete is the normal
//! end of a session. Running out anywhere later is a truncated frame and is
//! fatal.

use std::collections::BTreeMap;

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};

use super::wire_format::{
    put_long_bytes, put_short_bytes, ByteOrder, REQUEST_MARKER, REQUEST_PREFIX_SIZE,
};
use crate::error::{BridgeError, Result};

/// Upper bound on the buffer reserved ahead of a long field.
const MAX_PREALLOCATION: u64 = 64 * 1024;

/// One decoded request, in the shape sent to the Backend.
///
/// Empty fields are left out of the JSON document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Port the Host received the request on.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub port: u16,
    /// Endpoint path, only when the Backend declared several endpoints.
    #[serde(default, skip_serializing_if = "is_absent")]
    pub path: Option<String>,
    /// Query parameters.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, String>,
    /// Request headers.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

fn is_zero(port: &u16) -> bool {
    *port == 0
}

fn is_absent(path: &Option<String>) -> bool {
    path.as_deref().map_or(true, str::is_empty)
}

impl Request {
    /// Create a request for a port with no path, query or headers.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    /// Set the endpoint path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Add a query parameter.
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Which map a block of entries belongs to; names the fields in errors.
#[derive(Debug, Clone, Copy)]
enum MapKind {
    Query,
    Headers,
}

impl MapKind {
    fn count_field(self) -> &'static str {
        match self {
            MapKind::Query => "query count",
            MapKind::Headers => "header count",
        }
    }

    fn name_field(self) -> &'static str {
        match self {
            MapKind::Query => "query name",
            MapKind::Headers => "header name",
        }
    }

    fn value_field(self) -> &'static str {
        match self {
            MapKind::Query => "query value",
            MapKind::Headers => "header value",
        }
    }
}

/// Reads request frames from the Host input stream.
#[derive(Debug, Clone, Copy)]
pub struct RequestDecoder {
    order: ByteOrder,
    with_path: bool,
}

impl RequestDecoder {
    /// Create a decoder for a Backend that declared `endpoint_count`
    /// endpoints.
    pub fn new(order: ByteOrder, endpoint_count: usize) -> Self {
        Self {
            order,
            with_path: endpoint_count > 1,
        }
    }

    /// Whether frames carry a path field.
    #[inline]
    pub fn expects_path(&self) -> bool {
        self.with_path
    }

    /// Read the next request.
    ///
    /// Returns `Ok(None)` when the session ends cleanly: the stream closed
    /// before a full 3-byte prefix, or the marker byte was not `0x00`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::TruncatedFrame`] if the stream ends inside a
    /// frame, or an I/O error from the reader.
    pub async fn read_request<R>(&self, reader: &mut R) -> Result<Option<Request>>
    where
        R: AsyncRead + Unpin,
    {
        let mut prefix = [0u8; REQUEST_PREFIX_SIZE];
        let got = fill(reader, &mut prefix).await?;
        if got < REQUEST_PREFIX_SIZE {
            if got > 0 {
                tracing::debug!(received = got, "host input closed inside frame prefix");
            }
            return Ok(None);
        }
        if prefix[0] != REQUEST_MARKER {
            tracing::debug!(marker = prefix[0], "host sent end-of-session marker");
            return Ok(None);
        }

        let port = self.order.u16_from_bytes([prefix[1], prefix[2]]);

        let path = if self.with_path {
            let len = self.read_array::<_, 1>(reader, "path length").await?[0];
            Some(read_string(reader, u64::from(len), "path").await?)
        } else {
            None
        };

        let query = self.read_map(reader, MapKind::Query).await?;
        let headers = self.read_map(reader, MapKind::Headers).await?;

        Ok(Some(Request {
            port,
            path,
            query,
            headers,
        }))
    }

    async fn read_array<R, const N: usize>(
        &self,
        reader: &mut R,
        field: &'static str,
    ) -> Result<[u8; N]>
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = [0u8; N];
        let got = fill(reader, &mut buf).await?;
        if got < N {
            return Err(BridgeError::TruncatedFrame {
                field,
                expected: N as u64,
                received: got as u64,
            });
        }
        Ok(buf)
    }

    async fn read_u32<R>(&self, reader: &mut R, field: &'static str) -> Result<u32>
    where
        R: AsyncRead + Unpin,
    {
        let raw = self.read_array::<_, 4>(reader, field).await?;
        Ok(self.order.u32_from_bytes(raw))
    }

    async fn read_map<R>(&self, reader: &mut R, kind: MapKind) -> Result<BTreeMap<String, String>>
    where
        R: AsyncRead + Unpin,
    {
        let count = self.read_u32(reader, kind.count_field()).await?;
        let mut map = BTreeMap::new();
        for _ in 0..count {
            let name_len = self.read_u32(reader, kind.name_field()).await?;
            let name = read_string(reader, u64::from(name_len), kind.name_field()).await?;
            let value_len = self.read_u32(reader, kind.value_field()).await?;
            let value = read_string(reader, u64::from(value_len), kind.value_field()).await?;
            // duplicate names: last one wins
            map.insert(name, value);
        }
        Ok(map)
    }
}

/// Read until `buf` is full or the stream ends; returns the bytes read.
async fn fill<R>(reader: &mut R, buf: &mut [u8]) -> Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// Read exactly `len` bytes as a string. Invalid UTF-8 is replaced with
/// U+FFFD, since the value is headed for a JSON document.
async fn read_string<R>(reader: &mut R, len: u64, field: &'static str) -> Result<String>
where
    R: AsyncRead + Unpin,
{
    // Grow with the data instead of trusting the declared length up front.
    let mut buf = Vec::with_capacity(len.min(MAX_PREALLOCATION) as usize);
    (&mut *reader).take(len).read_to_end(&mut buf).await?;
    if (buf.len() as u64) < len {
        return Err(BridgeError::TruncatedFrame {
            field,
            expected: len,
            received: buf.len() as u64,
        });
    }
    Ok(match String::from_utf8(buf) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

/// Encode a request frame the way a Host would.
///
/// The path field is written if and only if `request.path` is set, so the
/// caller must match it to the Backend's endpoint count.
///
/// # Example
///
/// ```
/// use extbridge::protocol::{encode_request, ByteOrder, Request};
///
/// let frame = encode_request(&Request::new(80), ByteOrder::Little);
/// assert_eq!(&frame[..3], &[0x00, 0x50, 0x00]);
/// assert_eq!(frame.len(), 3 + 4 + 4);
/// ```
pub fn encode_request(request: &Request, order: ByteOrder) -> BytesMut {
    let mut buf = BytesMut::with_capacity(REQUEST_PREFIX_SIZE + 8);
    buf.put_u8(REQUEST_MARKER);
    order.put_u16(&mut buf, request.port);
    if let Some(path) = &request.path {
        put_short_bytes(&mut buf, path.as_bytes());
    }
    for map in [&request.query, &request.headers] {
        order.put_u32(&mut buf, map.len() as u32);
        for (name, value) in map {
            put_long_bytes(&mut buf, order, name.as_bytes());
            put_long_bytes(&mut buf, order, value.as_bytes());
        }
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn le_u32(v: u32) -> [u8; 4] {
        v.to_le_bytes()
    }

    async fn decode(bytes: &[u8], endpoints: usize) -> Result<Option<Request>> {
        let mut reader = bytes;
        RequestDecoder::new(ByteOrder::Little, endpoints)
            .read_request(&mut reader)
            .await
    }

    #[tokio::test]
    async fn test_minimal_frame() {
        let mut frame = vec![0x00, 0x50, 0x00];
        frame.extend_from_slice(&le_u32(0));
        frame.extend_from_slice(&le_u32(0));

        let request = decode(&frame, 1).await.unwrap().unwrap();
        assert_eq!(request, Request::new(80));
        assert_eq!(serde_json::to_string(&request).unwrap(), r#"{"port":80}"#);
    }

    #[tokio::test]
    async fn test_frame_with_path_query_and_headers() {
        let mut frame = vec![0x00, 0x90, 0x1F, 4];
        frame.extend_from_slice(b"/api");
        frame.extend_from_slice(&le_u32(1));
        frame.extend_from_slice(&le_u32(1));
        frame.extend_from_slice(b"q");
        frame.extend_from_slice(&le_u32(4));
        frame.extend_from_slice(b"rust");
        frame.extend_from_slice(&le_u32(1));
        frame.extend_from_slice(&le_u32(4));
        frame.extend_from_slice(b"Host");
        frame.extend_from_slice(&le_u32(9));
        frame.extend_from_slice(b"localhost");

        let request = decode(&frame, 2).await.unwrap().unwrap();
        assert_eq!(
            request,
            Request::new(8080)
                .with_path("/api")
                .with_query("q", "rust")
                .with_header("Host", "localhost")
        );
    }

    #[tokio::test]
    async fn test_path_absent_with_single_endpoint() {
        let mut frame = vec![0x00, 0x01, 0x00];
        frame.extend_from_slice(&le_u32(0));
        frame.extend_from_slice(&le_u32(0));

        let request = decode(&frame, 0).await.unwrap().unwrap();
        assert_eq!(request.path, None);
    }

    #[tokio::test]
    async fn test_empty_path_is_omitted_from_json() {
        let request = Request::new(1).with_path("");
        assert_eq!(serde_json::to_string(&request).unwrap(), r#"{"port":1}"#);
    }

    #[tokio::test]
    async fn test_non_zero_marker_terminates() {
        let frame = [0x01, 0x50, 0x00, 0, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(decode(&frame, 1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_closed_stream_terminates() {
        assert_eq!(decode(&[], 1).await.unwrap(), None);
        // a partial prefix is still a clean end
        assert_eq!(decode(&[0x00, 0x50], 1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_truncated_after_prefix_is_fatal() {
        let err = decode(&[0x00, 0x50, 0x00, 0x01], 1).await.unwrap_err();
        assert!(matches!(
            err,
            BridgeError::TruncatedFrame {
                field: "query count",
                expected: 4,
                received: 1
            }
        ));
    }

    #[tokio::test]
    async fn test_truncated_path_is_fatal() {
        let err = decode(&[0x00, 0x50, 0x00, 10, b'/'], 2).await.unwrap_err();
        assert!(matches!(
            err,
            BridgeError::TruncatedFrame {
                field: "path",
                expected: 10,
                received: 1
            }
        ));
    }

    #[tokio::test]
    async fn test_truncated_header_value_is_fatal() {
        let mut frame = vec![0x00, 0x50, 0x00];
        frame.extend_from_slice(&le_u32(0));
        frame.extend_from_slice(&le_u32(1));
        frame.extend_from_slice(&le_u32(1));
        frame.extend_from_slice(b"a");
        frame.extend_from_slice(&le_u32(u32::MAX));
        frame.extend_from_slice(b"short");

        let err = decode(&frame, 1).await.unwrap_err();
        assert!(matches!(
            err,
            BridgeError::TruncatedFrame {
                field: "header value",
                expected: 4_294_967_295,
                received: 5
            }
        ));
    }

    #[tokio::test]
    async fn test_duplicate_names_last_wins() {
        let mut frame = vec![0x00, 0x50, 0x00];
        frame.extend_from_slice(&le_u32(2));
        for value in [b"1", b"2"] {
            frame.extend_from_slice(&le_u32(1));
            frame.extend_from_slice(b"k");
            frame.extend_from_slice(&le_u32(1));
            frame.extend_from_slice(value);
        }
        frame.extend_from_slice(&le_u32(0));

        let request = decode(&frame, 1).await.unwrap().unwrap();
        assert_eq!(request.query.len(), 1);
        assert_eq!(request.query["k"], "2");
    }

    #[tokio::test]
    async fn test_invalid_utf8_replaced() {
        let mut frame = vec![0x00, 0x50, 0x00];
        frame.extend_from_slice(&le_u32(0));
        frame.extend_from_slice(&le_u32(1));
        frame.extend_from_slice(&le_u32(1));
        frame.extend_from_slice(b"h");
        frame.extend_from_slice(&le_u32(2));
        frame.extend_from_slice(&[0xFF, b'x']);

        let request = decode(&frame, 1).await.unwrap().unwrap();
        assert_eq!(request.headers["h"], "\u{FFFD}x");
    }

    #[tokio::test]
    async fn test_large_maps_and_long_strings() {
        let mut request = Request::new(443).with_path("/p");
        for i in 0..300 {
            request = request.with_query(format!("k{}", i), format!("v{}", i));
        }
        request = request.with_header("X-Long", "z".repeat(70_000));

        for order in [ByteOrder::Native, ByteOrder::Little, ByteOrder::Big] {
            let frame = encode_request(&request, order);
            let mut reader = &frame[..];
            let decoded = RequestDecoder::new(order, 2)
                .read_request(&mut reader)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(decoded, request);
            assert!(reader.is_empty());
        }
    }

    #[tokio::test]
    async fn test_consecutive_frames() {
        let mut stream = encode_request(&Request::new(1), ByteOrder::Big).to_vec();
        stream.extend_from_slice(&encode_request(&Request::new(2), ByteOrder::Big));
        stream.push(0xFF);

        let decoder = RequestDecoder::new(ByteOrder::Big, 1);
        let mut reader = &stream[..];
        assert_eq!(decoder.read_request(&mut reader).await.unwrap().unwrap().port, 1);
        assert_eq!(decoder.read_request(&mut reader).await.unwrap().unwrap().port, 2);
        assert_eq!(decoder.read_request(&mut reader).await.unwrap(), None);
    }

    #[test]
    fn test_expects_path() {
        assert!(!RequestDecoder::new(ByteOrder::Native, 1).expects_path());
        assert!(RequestDecoder::new(ByteOrder::Native, 2).expects_path());
    }
}

//! Handshake frame: the Backend's identity and endpoint list.
//!
//! Sent exactly once, before any request is served:
//!
//! ```text
//! u8  id_length
//! u8[id_length]  id_bytes
//! u8  endpoint_count
//! repeat endpoint_count times:
//!     u8  endpoint_length
//!     u8[endpoint_length]  endpoint_bytes
//! ```
//!
//! All prefixes are single bytes holding the low 8 bits of the true length.
//! The frame carries no multi-byte integers, so it does not depend on the
//! configured byte order.

use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use super::lenient::null_as_default;
use super::wire_format::{put_short_bytes, put_short_count, ByteOrder, SliceReader};
use crate::error::Result;
use crate::transport::BackendChannel;

/// Identity document the Backend writes on startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionInfo {
    /// Backend identifier.
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    /// Routable endpoints, in declaration order.
    #[serde(default, deserialize_with = "null_as_default")]
    pub endpoints: Vec<String>,
}

impl ExtensionInfo {
    /// Create an identity document.
    pub fn new<I, S>(id: impl Into<String>, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            endpoints: endpoints.into_iter().map(Into::into).collect(),
        }
    }

    /// Number of declared endpoints.
    #[inline]
    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    /// Request frames carry a path only when there is more than one
    /// endpoint to choose from.
    #[inline]
    pub fn requires_path(&self) -> bool {
        self.endpoint_count() > 1
    }

    /// Encode the handshake frame.
    pub fn encode(&self) -> BytesMut {
        let size = 2 + self.id.len() + self.endpoints.iter().map(|e| 1 + e.len()).sum::<usize>();
        let mut buf = BytesMut::with_capacity(size);
        put_short_bytes(&mut buf, self.id.as_bytes());
        put_short_count(&mut buf, self.endpoints.len());
        for endpoint in &self.endpoints {
            put_short_bytes(&mut buf, endpoint.as_bytes());
        }
        buf
    }
}

/// Decode a handshake frame the way a Host would.
///
/// Returns the identity and the number of bytes consumed.
///
/// # Example
///
/// ```
/// use extbridge::protocol::{decode_handshake, ExtensionInfo};
///
/// let info = ExtensionInfo::new("demo", ["/", "/admin"]);
/// let (decoded, used) = decode_handshake(&info.encode()).unwrap();
/// assert_eq!(decoded, info);
/// assert_eq!(used, info.encode().len());
/// ```
pub fn decode_handshake(frame: &[u8]) -> Result<(ExtensionInfo, usize)> {
    let mut reader = SliceReader::new(frame, ByteOrder::Native);
    let id = reader.short_string("extension id")?;
    let count = reader.u8("endpoint count")?;
    let endpoints = (0..count)
        .map(|_| reader.short_string("endpoint"))
        .collect::<Result<Vec<_>>>()?;
    let used = frame.len() - reader.remaining().len();
    Ok((ExtensionInfo { id, endpoints }, used))
}

/// Receive the Backend's identity and forward it to the Host.
///
/// # Errors
///
/// Fails if the Backend closes or sends something that is not an identity
/// document, or if the Host write fails.
pub async fn negotiate<R, W, H>(
    backend: &mut BackendChannel<R, W>,
    host_out: &mut H,
) -> Result<ExtensionInfo>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    H: AsyncWrite + Unpin,
{
    let info: ExtensionInfo = backend.recv().await?;
    let frame = info.encode();
    host_out.write_all(&frame).await?;
    host_out.flush().await?;

    tracing::info!(
        id = %info.id,
        endpoints = info.endpoint_count(),
        "handshake forwarded to host"
    );
    Ok(info)
}

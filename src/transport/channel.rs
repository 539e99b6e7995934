//! Backend channel - JSON documents over the Backend's stdin/stdout.
//!
//! Outgoing documents are one compact line each. Incoming documents are read
//! as a whitespace-separated stream, so pretty-printed output works too.
//!
//! The channel is generic over any `AsyncRead`/`AsyncWrite` pair so the
//! session can be driven by child-process pipes in production and by
//! in-memory `tokio::io::duplex` streams in tests.
//!
//! # Example
//!
//! ```ignore
//! use extbridge::transport::BackendChannel;
//! use extbridge::protocol::ExtensionInfo;
//!
//! let mut channel = BackendChannel::new(child_stdout, child_stdin);
//! let info: ExtensionInfo = channel.recv().await?;
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::codec::JsonCodec;
use crate::error::{BridgeError, Result};

/// Request/response pipe pair to the Backend.
pub struct BackendChannel<R, W> {
    reader: BufReader<R>,
    writer: W,
    line: Vec<u8>,
    /// Received text not yet consumed by a decoded document.
    pending: String,
}

impl<R, W> BackendChannel<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Wrap the Backend's output (`reader`) and input (`writer`).
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer,
            line: Vec::with_capacity(4 * 1024),
            pending: String::new(),
        }
    }

    /// Send one document as a single line and flush it.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or the pipe write fails.
    pub async fn send<T: Serialize>(&mut self, value: &T) -> Result<()> {
        let line = JsonCodec::encode_line(value)?;
        self.writer.write_all(&line).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Block until the next document arrives and decode it.
    ///
    /// Documents may span several lines and are separated by any amount of
    /// whitespace. Bytes after a document stay buffered for the next call.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::BackendClosed`] if the Backend's output ends
    /// before a document starts, or a JSON error if the input is not a
    /// document of type T or ends halfway through one.
    pub async fn recv<T: DeserializeOwned>(&mut self) -> Result<T> {
        loop {
            if let Some((value, used)) = JsonCodec::decode_next(&self.pending)? {
                self.pending.replace_range(..used, "");
                return Ok(value);
            }
            if JsonCodec::is_blank(self.pending.as_bytes()) {
                self.pending.clear();
            }

            self.line.clear();
            let n = self.reader.read_until(b'\n', &mut self.line).await?;
            if n == 0 {
                if self.pending.is_empty() {
                    return Err(BridgeError::BackendClosed);
                }
                return JsonCodec::decode(self.pending.as_bytes());
            }
            // A line never ends inside a UTF-8 sequence, so per-line
            // replacement matches whole-stream replacement.
            self.pending.push_str(&String::from_utf8_lossy(&self.line));
        }
    }

    /// Give back the underlying reader and writer.
    pub fn into_inner(self) -> (R, W) {
        (self.reader.into_inner(), self.writer)
    }
}

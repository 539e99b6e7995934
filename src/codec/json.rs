//! JSON codec for the Backend channel.
//!
//! Outgoing documents are written as a single line: compact JSON followed by
//! exactly one `\n`. Incoming documents are read as a whitespace-separated
//! stream, so a Backend may pretty-print across several lines or put more
//! than one document on a line.
//!
//! Invalid UTF-8 in incoming bytes is replaced with U+FFFD before parsing.
//!
//! # Example
//!
//! ```
//! use extbridge::codec::JsonCodec;
//! use extbridge::protocol::ExtensionInfo;
//!
//! let line = JsonCodec::encode_line(&ExtensionInfo::new("demo", ["/"])).unwrap();
//! assert!(line.ends_with(b"\n"));
//!
//! let info: ExtensionInfo = JsonCodec::decode(&line).unwrap();
//! assert_eq!(info.id, "demo");
//! ```

use crate::error::Result;

/// JSON codec for Backend documents.
pub struct JsonCodec;

impl JsonCodec {
    /// Encode a value as one compact JSON line, newline included.
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode_line<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut line = serde_json::to_vec(value)?;
        line.push(b'\n');
        Ok(line)
    }

    /// Decode one JSON document. Surrounding whitespace, including the line
    /// terminator, is ignored.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes are not a document of type T.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(serde_json::from_str(&String::from_utf8_lossy(bytes))?)
    }

    /// Decode the first document from buffered text.
    ///
    /// Returns the value and the number of bytes it used, or `None` if the
    /// text holds only whitespace or an incomplete document.
    ///
    /// # Errors
    ///
    /// Returns error if the text starts with something that can never become
    /// a document of type T.
    pub fn decode_next<T>(text: &str) -> Result<Option<(T, usize)>>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut stream = serde_json::Deserializer::from_str(text).into_iter::<T>();
        match stream.next() {
            Some(Ok(value)) => Ok(Some((value, stream.byte_offset()))),
            Some(Err(e)) if e.is_eof() => Ok(None),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// Check whether a received line carries no document at all.
    #[inline]
    pub fn is_blank(line: &[u8]) -> bool {
        line.iter().all(u8::is_ascii_whitespace)
    }
}

//! Base64 codec for response bodies.
//!
//! The Backend transports bodies as standard-alphabet, padded base64.
//! Decoding skips `\r` and `\n` so MIME-wrapped output is accepted, and
//! tolerates non-zero trailing bits. Anything else that fails to decode is
//! reported as "no body" rather than an error.
//!
//! # Example
//!
//! ```
//! use extbridge::codec::BodyCodec;
//!
//! assert_eq!(BodyCodec::decode("SGVsbG8=").as_deref(), Some(&b"Hello"[..]));
//! assert_eq!(BodyCodec::decode(""), None);
//! assert_eq!(BodyCodec::decode("%%%"), None);
//! ```

use std::borrow::Cow;

use base64::alphabet;
use base64::engine::{GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use bytes::Bytes;

const BODY_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// Codec for base64 response bodies.
pub struct BodyCodec;

impl BodyCodec {
    /// Decode a body string.
    ///
    /// Returns `None` for an empty string or for input that is not valid
    /// base64.
    pub fn decode(body: &str) -> Option<Bytes> {
        let body = strip_line_breaks(body);
        if body.is_empty() {
            return None;
        }
        BODY_ENGINE.decode(body.as_bytes()).ok().map(Bytes::from)
    }

    /// Encode raw bytes the way a Backend would.
    #[inline]
    pub fn encode(data: &[u8]) -> String {
        BODY_ENGINE.encode(data)
    }
}

fn strip_line_breaks(body: &str) -> Cow<'_, str> {
    if body.contains(['\r', '\n']) {
        Cow::Owned(body.chars().filter(|c| !matches!(c, '\r' | '\n')).collect())
    } else {
        Cow::Borrowed(body)
    }
}

//! Protocol module - the Host's binary frames and the documents behind them.
//!
//! This module implements the three Host frames:
//! - handshake: Backend identity, sent once
//! - request: Host → Backend, 4-byte lengths
//! - response: Backend → Host, 1-byte lengths
//!
//! Each frame has an encoder and a decoder. The bridge only uses one
//! direction of each; the other is exposed for Host implementations and
//! tests.

mod handshake;
mod lenient;
mod request;
mod response;
mod wire_format;

pub use handshake::{decode_handshake, negotiate, ExtensionInfo};
pub use request::{encode_request, Request, RequestDecoder};
pub use response::{decode_response, Response, ResponseEncoder, ResponseFrame};
pub use wire_format::{
    put_long_bytes, put_short_bytes, put_short_count, ByteOrder, BODY_TRAILER, REQUEST_MARKER,
    REQUEST_PREFIX_SIZE,
};

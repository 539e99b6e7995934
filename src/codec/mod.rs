//! Codec module - serialization for the two non-binary encodings.
//!
//! - [`JsonCodec`] - JSON documents on the Backend pipes
//! - [`BodyCodec`] - base64 response bodies
//!
//! Codecs are marker structs with static methods, like the rest of the
//! crate's stateless encoders.

mod body;
mod json;

pub use body::BodyCodec;
pub use json::JsonCodec;

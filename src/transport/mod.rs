//! Transport module - the Backend side of the bridge.
//!
//! Provides:
//! - [`BackendChannel`] - line-delimited JSON over any async pipe pair
//! - [`BackendProcess`] - spawns the Backend with piped stdio

mod channel;
mod process;

pub use channel::BackendChannel;
pub use process::{BackendProcess, ProcessChannel};

//! # extbridge
//!
//! Translator between a Host that speaks a compact length-prefixed binary
//! protocol on stdin/stdout and a Backend child process that speaks
//! line-delimited JSON.
//!
//! ## Architecture
//!
//! - **Host side** (stdio): binary handshake, request and response frames
//!   using the machine's native byte order by default
//! - **Backend side** (child pipes): one JSON document per line
//!
//! ```text
//! Host ──request frame──► RequestDecoder ──JSON──► Backend
//! Host ◄─response frame── ResponseEncoder ◄─JSON── Backend
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use extbridge::config::{BackendCommand, BridgeConfig};
//! use extbridge::session::Session;
//! use extbridge::transport::BackendProcess;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> extbridge::Result<()> {
//!     let config = BridgeConfig::from_env()?;
//!     let command = BackendCommand::new("./my-extension", ["--serve"]);
//!     let (_process, channel) = BackendProcess::spawn(&command)?;
//!
//!     let mut session = Session::new(
//!         tokio::io::stdin(),
//!         tokio::io::stdout(),
//!         channel,
//!         config.byte_order,
//!     );
//!     session.run().await?;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;

pub use config::{BackendCommand, BridgeConfig};
pub use error::{BridgeError, Result};
pub use session::{Session, SessionState};

//! Runtime configuration.
//!
//! The command line carries only the Backend executable and its arguments,
//! so tunables come from the environment:
//!
//! | Variable               | Values                       | Default  |
//! |------------------------|------------------------------|----------|
//! | `EXTBRIDGE_BYTE_ORDER` | `native`, `little`, `big`    | `native` |
//! | `EXTBRIDGE_LOG`        | tracing filter directive     | `warn`   |

use std::ffi::OsString;

use crate::error::Result;
use crate::protocol::ByteOrder;

/// Environment variable selecting the frame byte order.
pub const BYTE_ORDER_ENV: &str = "EXTBRIDGE_BYTE_ORDER";

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "EXTBRIDGE_LOG";

/// Log filter used when none is configured.
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Bridge settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Byte order of numeric fields in Host frames.
    pub byte_order: ByteOrder,
    /// `tracing_subscriber::EnvFilter` directive for stderr logging.
    pub log_filter: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            byte_order: ByteOrder::Native,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl BridgeConfig {
    /// Load settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the byte order is not recognized.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(order) = lookup(BYTE_ORDER_ENV) {
            config.byte_order = order.parse()?;
        }
        if let Some(filter) = lookup(LOG_ENV).filter(|f| !f.trim().is_empty()) {
            config.log_filter = filter;
        }
        Ok(config)
    }

    /// Override the byte order.
    pub fn byte_order(mut self, order: ByteOrder) -> Self {
        self.byte_order = order;
        self
    }
}

/// Backend executable and the arguments passed to it.
///
/// Held as OS strings so arguments that are not valid UTF-8 reach the
/// Backend unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendCommand {
    /// Executable path or name resolved through `PATH`.
    pub program: OsString,
    /// Arguments forwarded verbatim.
    pub args: Vec<OsString>,
}

impl BackendCommand {
    /// Create a command from a program and its arguments.
    pub fn new<P, I, S>(program: P, args: I) -> Self
    where
        P: Into<OsString>,
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Build from command-line arguments, program name already skipped.
    ///
    /// Returns `None` when no Backend was given.
    pub fn from_args<I>(args: I) -> Option<Self>
    where
        I: IntoIterator<Item = OsString>,
    {
        let mut args = args.into_iter();
        let program = args.next()?;
        Some(Self {
            program,
            args: args.collect(),
        })
    }
}

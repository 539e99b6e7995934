//! `extbridge <backend> [args...]`
//!
//! Spawns the Backend and bridges it to this process's stdin/stdout. Logs go
//! to stderr only, since stdout carries Host frames.

use std::process::ExitCode;

use tokio::io::BufReader;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use extbridge::config::DEFAULT_LOG_FILTER;
use extbridge::transport::BackendProcess;
use extbridge::{BackendCommand, BridgeConfig, Result, Session};

fn init_logging(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .init();
}

async fn run(config: BridgeConfig, command: BackendCommand) -> Result<()> {
    let (process, channel) = BackendProcess::spawn(&command)?;
    tracing::debug!(byte_order = %config.byte_order, pid = process.id(), "bridge starting");

    let mut session = Session::new(
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        channel,
        config.byte_order,
    );
    let exchanges = session.run().await?;

    tracing::debug!(exchanges, "bridge finished");
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let config = match BridgeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_logging(DEFAULT_LOG_FILTER);
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config.log_filter);

    let Some(command) = BackendCommand::from_args(std::env::args_os().skip(1)) else {
        tracing::warn!("usage: extbridge <backend> [args...]");
        return ExitCode::SUCCESS;
    };

    match run(config, command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("bridge aborted: {}", e);
            ExitCode::FAILURE
        }
    }
}

//! memd - Presence and membership server for peer-to-peer chat
//!
//! Accepts control connections, keeps the roster of registered members,
//! and announces joins and exits to every member over UDP.
//!
//! # Usage
//!
//! ```bash
//! # Listen for control connections on port 4000
//! memd 4000
//!
//! # Bind to loopback only, with a longer shutdown grace period
//! memd 4000 --bind 127.0.0.1 --grace-ms 500
//!
//! # Enable debug logging
//! RUST_LOG=memd=debug memd 4000
//! ```
//!
//! # Exit Codes
//!
//! - 0: clean shutdown
//! - 1: wrong number of arguments
//! - 2: port is not an integer in 1-65535
//! - 3: runtime failure (e.g. the port cannot be bound)
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: stop accepting, wait the grace period, close every
//!   open connection

use std::net::IpAddr;
use std::process::{self, ExitCode};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use memd::config::{ServerConfig, DEFAULT_BIND_ADDR, DEFAULT_SHUTDOWN_GRACE};
use memd::registry::spawn_registry;
use memd::server::MemberServer;
use memd::shutdown::ShutdownCoordinator;

const EXIT_USAGE: u8 = 1;
const EXIT_INVALID_PORT: u8 = 2;
const EXIT_RUNTIME: u8 = 3;

/// memd - chat presence and membership server
#[derive(Parser, Debug)]
#[command(name = "memd", version, about)]
struct Args {
    /// TCP port for the control channel (1-65535)
    #[arg(value_parser = clap::value_parser!(u16).range(1..))]
    port: u16,

    /// Address to bind the control listener to
    #[arg(long, default_value_t = DEFAULT_BIND_ADDR)]
    bind: IpAddr,

    /// Milliseconds to wait before force-closing connections on shutdown
    #[arg(long, default_value_t = DEFAULT_SHUTDOWN_GRACE.as_millis() as u64)]
    grace_ms: u64,
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        ServerConfig::new(self.port)
            .with_bind_addr(self.bind)
            .with_shutdown_grace(Duration::from_millis(self.grace_ms))
    }
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => return exit_for_usage_error(e),
    };

    match run_daemon(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "memd failed");
            eprintln!("memd: {e:#}");
            ExitCode::from(EXIT_RUNTIME)
        }
    }
}

/// Prints clap's message and exits with the matching code.
fn exit_for_usage_error(err: clap::Error) -> ExitCode {
    let _ = err.print();
    match usage_exit_code(&err) {
        Some(code) => ExitCode::from(code),
        None => ExitCode::SUCCESS,
    }
}

/// Exit code for an argument error; `None` for `--help`/`--version`.
fn usage_exit_code(err: &clap::Error) -> Option<u8> {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => None,
        ErrorKind::InvalidValue | ErrorKind::ValueValidation if is_port_error(err) => {
            Some(EXIT_INVALID_PORT)
        }
        _ => Some(EXIT_USAGE),
    }
}

fn is_port_error(err: &clap::Error) -> bool {
    matches!(
        err.get(ContextKind::InvalidArg),
        Some(ContextValue::String(arg)) if arg.contains("PORT")
    )
}

/// Runs the daemon (async entry point).
#[tokio::main]
async fn run_daemon(args: Args) -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("memd=info".parse()?)
                .add_directive("memd_server=info".parse()?),
        )
        .init();

    let config = args.server_config();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        port = config.port,
        "memd starting"
    );

    let registry = spawn_registry();
    let coordinator = ShutdownCoordinator::new(config.shutdown_grace);

    let server = MemberServer::bind(&config, registry, coordinator.clone())
        .await
        .with_context(|| format!("Failed to start control listener on {}", config.listen_addr()))?;

    // Setup signal handlers
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        coordinator.shutdown().await;
    });

    server.run().await?;

    info!("memd stopped");
    Ok(())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}

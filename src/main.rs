//! multibulk server
//!
//! Entry point: parses the command line, sets up logging, binds the
//! listener and runs the accept loop until Ctrl+C.

use clap::Parser;
use multibulk::{AckHandler, Server, ServerConfig};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

/// RESP multibulk request server
#[derive(Parser, Debug)]
#[command(name = "multibulk-server")]
#[command(about = "Decodes RESP multibulk requests and acknowledges every command")]
#[command(version)]
struct Args {
    /// Host to bind to
    #[arg(long, default_value = multibulk::DEFAULT_HOST)]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = multibulk::DEFAULT_PORT)]
    port: u16,

    /// Maximum concurrent connections (unlimited if not set)
    #[arg(short, long)]
    max_connections: Option<NonZeroUsize>,

    /// Close connections that send nothing for this many milliseconds
    #[arg(long)]
    read_timeout_ms: Option<u64>,

    /// Maximum buffered bytes per connection
    #[arg(long, default_value_t = multibulk::config::DEFAULT_MAX_BUFFER_SIZE)]
    max_buffer: usize,

    /// Close bad connections without sending an error reply
    #[arg(long)]
    no_error_replies: bool,

    /// Log filter, e.g. "debug" or "multibulk=trace" (overrides RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn to_config(&self) -> ServerConfig {
        ServerConfig::new()
            .with_bind_addr(self.bind_address())
            .with_max_connections(self.max_connections.map(NonZeroUsize::get))
            .with_read_timeout(self.read_timeout_ms.map(Duration::from_millis))
            .with_max_buffer_size(self.max_buffer)
            .with_reply_errors(!self.no_error_replies)
    }
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();
}

/// Resolves on Ctrl+C. If the handler cannot be installed, never resolves.
async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, stopping server...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_level.as_deref());

    let config = args.to_config();
    info!(
        version = multibulk::VERSION,
        addr = %config.bind_addr,
        max_connections = ?config.max_connections,
        read_timeout = ?config.read_timeout,
        "Starting multibulk server"
    );

    let server = Server::bind(config, Arc::new(AckHandler::new())).await?;
    info!("Listening on {}", server.local_addr()?);

    server.run(shutdown_signal()).await?;

    info!("Server shutdown complete");
    Ok(())
}

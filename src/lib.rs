//! # multibulk - A Streaming RESP Multibulk Request Server
//!
//! `multibulk` reconstructs command invocations from the Redis
//! multibulk request protocol as it arrives over TCP, in whatever pieces
//! the network delivers it. Every frame is dispatched exactly once, short
//! reads wait for more bytes, and malformed input closes the connection.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                              multibulk                              │
//! │                                                                     │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐              │
//! │  │ Accept Loop │───>│  Session    │───>│  Command    │              │
//! │  │  (Server)   │    │ (per conn)  │    │  Handler    │              │
//! │  └─────────────┘    └──────┬──────┘    └─────────────┘              │
//! │                            │                                        │
//! │                  ┌─────────┴─────────┐                              │
//! │                  ▼                   ▼                              │
//! │          ┌─────────────┐     ┌─────────────┐                        │
//! │          │ FrameReader │     │  Multibulk  │                        │
//! │          │ (fill buf)  │     │  Decoder    │                        │
//! │          └─────────────┘     └─────────────┘                        │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use multibulk::{AckHandler, Server, ServerConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::default().with_bind_addr("127.0.0.1:6380");
//!     let server = Server::bind(config, Arc::new(AckHandler::new())).await?;
//!
//!     server
//!         .run(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`protocol`]: Multibulk decoder, `Command` and reply types
//! - [`connection`]: Per-connection session loop and frame reader
//! - [`commands`]: The command handler boundary
//! - [`server`]: Accept loop and session registry
//! - [`config`]: Server configuration
//!
//! ## Wire Format
//!
//! ```text
//! *<bulklen>\r\n
//! $<len_1>\r\n<arg_1>\r\n
//! ...
//! ```
//!
//! Arguments are read by their declared length, so they may contain any
//! bytes, including CR LF.

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod shutdown;

// Re-export commonly used types for convenience
pub use commands::{AckHandler, CommandHandler};
pub use config::ServerConfig;
pub use connection::{handle_connection, ConnectionError, ConnectionStats, Session};
pub use protocol::{decode, Command, DecodeError, DecodeOutcome, MultibulkDecoder, RespValue};
pub use server::{Server, ServerError};

/// The default port multibulk listens on
pub const DEFAULT_PORT: u16 = 6380;

/// The default host multibulk binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of multibulk
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

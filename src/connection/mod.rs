//! Connection Module
//!
//! This module manages individual client connections.
//! Each client connection is handled by its own async task; within a
//! connection everything is strictly sequential, so the buffer needs no
//! locking.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Accept Loop                             │
//! │                   (server module)                           │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ spawn task per connection
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Session                              │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐      │
//! │  │ FrameReader │───>│  Decoder    │───>│  Handler    │      │
//! │  └─────────────┘    └─────────────┘    └─────────────┘      │
//! │         ▲                  │ Incomplete       │             │
//! │         └──────────────────┘                  ▼             │
//! │                                      ┌─────────────┐        │
//! │                                      │ Send reply  │        │
//! │                                      └─────────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use multibulk::commands::{AckHandler, CommandHandler};
//! use multibulk::connection::{handle_connection, ConnectionStats};
//! use std::sync::Arc;
//!
//! let stats = Arc::new(ConnectionStats::new());
//! let handler: Arc<dyn CommandHandler> = Arc::new(AckHandler::new());
//!
//! // For each accepted connection...
//! let (stream, addr) = listener.accept().await?;
//! tokio::spawn(handle_connection(stream, addr, handler, stats));
//! ```

pub mod reader;
pub mod session;

// Re-export commonly used types
pub use reader::FrameReader;
pub use session::{handle_connection, ConnectionError, ConnectionStats, Session};

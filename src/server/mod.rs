//! TCP Server Module
//!
//! Binds the listening socket and starts one [`Session`](crate::connection::Session)
//! per accepted connection.
//!
//! ## Example
//!
//! ```no_run
//! use multibulk::commands::AckHandler;
//! use multibulk::config::ServerConfig;
//! use multibulk::server::Server;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), multibulk::server::ServerError> {
//! let server = Server::bind(ServerConfig::default(), Arc::new(AckHandler::new())).await?;
//! server
//!     .run(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! # }
//! ```

pub mod listener;

pub use listener::{Server, ServerError};

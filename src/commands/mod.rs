//! Command Handling Module
//!
//! This module is the seam between the protocol layer and command
//! execution.
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │ Multibulk       │  (protocol module)
//! │ Decoder         │
//! └────────┬────────┘
//!          │ Command
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! └────────┬────────┘
//!          │ RespValue
//!          ▼
//!    Client Reply
//! ```

pub mod handler;

pub use handler::{AckHandler, CommandHandler};

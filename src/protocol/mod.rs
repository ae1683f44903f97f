//! Multibulk Protocol Implementation
//!
//! This module implements the request side of the Redis Serialization
//! Protocol (RESP): multibulk frames, arrays of length-prefixed bulk
//! strings, decoded from a byte stream that may arrive in arbitrary pieces.
//!
//! ## Modules
//!
//! - `types`: Defines `Command`, the `RespValue` reply type and wire constants
//! - `decoder`: Length-aware decoder for incoming frames
//!
//! ## Example
//!
//! ```
//! use multibulk::protocol::{decode, DecodeOutcome, RespValue};
//!
//! // Decoding incoming data
//! let data = b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n";
//! if let DecodeOutcome::Complete { command, consumed } = decode(data) {
//!     assert_eq!(command.arg_str(1), Some("name"));
//!     assert_eq!(consumed, data.len());
//! }
//!
//! // Creating replies
//! let reply = RespValue::simple_string("OK");
//! assert_eq!(reply.serialize(), b"+OK\r\n");
//! ```

pub mod decoder;
pub mod types;

// Re-export commonly used types for convenience
pub use decoder::{decode, DecodeError, DecodeOutcome, MultibulkDecoder};
pub use types::{Command, RespValue};

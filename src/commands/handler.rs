//! Command Handler Boundary
//!
//! The connection session hands every decoded [`Command`] to a
//! [`CommandHandler`] exactly once, in decode order, and writes the
//! returned reply back to the client.
//!
//! What a command actually does lives behind this trait. The built-in
//! [`AckHandler`] answers every command with the same fixed reply, which is
//! enough to close the request/response cycle for clients such as
//! `redis-cli` that probe the server with `COMMAND` on connect.

use crate::protocol::{Command, RespValue};
use bytes::Bytes;

/// Executes decoded commands.
///
/// Implementations are shared by every connection, so they must be
/// `Send + Sync`. Plain closures taking a [`Command`] work as handlers.
pub trait CommandHandler: Send + Sync + 'static {
    /// Executes `command` and returns the reply to send to the client.
    fn handle(&self, command: Command) -> RespValue;
}

impl<F> CommandHandler for F
where
    F: Fn(Command) -> RespValue + Send + Sync + 'static,
{
    fn handle(&self, command: Command) -> RespValue {
        self(command)
    }
}

/// Replies to every command with a fixed `COMMAND`-style acknowledgement.
#[derive(Debug, Clone, Default)]
pub struct AckHandler;

impl AckHandler {
    pub fn new() -> Self {
        Self
    }

    /// The reply sent for every command:
    /// `*7\r\n$7\r\nCOMMAND\r\n:0\r\n*1\r\n+readonly\r\n:0\r\n:0\r\n:0\r\n*1\r\n+@read\r\n`
    pub fn acknowledgement() -> RespValue {
        RespValue::array(vec![
            RespValue::bulk_string(Bytes::from_static(b"COMMAND")),
            RespValue::integer(0),
            RespValue::array(vec![RespValue::simple_string("readonly")]),
            RespValue::integer(0),
            RespValue::integer(0),
            RespValue::integer(0),
            RespValue::array(vec![RespValue::simple_string("@read")]),
        ])
    }
}

impl CommandHandler for AckHandler {
    fn handle(&self, command: Command) -> RespValue {
        tracing::debug!(command = %command, "Acknowledging command");
        Self::acknowledgement()
    }
}

//! Connection Session
//!
//! This module drives a single client connection from accept to close.
//! Each session runs in its own task, owns its buffer, and shares nothing
//! mutable with other sessions except the statistics counters.
//!
//! ## Session Lifecycle
//!
//! ```text
//! 1. Client connects, session created
//!        │
//!        ▼
//! 2. ┌──────────────────────────────────────────┐
//!    │  Reading: pull next chunk into buffer    │◄──────┐
//!    └──────────────────┬───────────────────────┘       │
//!                       ▼                               │
//!    ┌──────────────────────────────────────────┐       │
//!    │  Deciding: decode the buffered bytes     │       │
//!    └───────┬───────────────┬──────────────┬───┘       │
//!            │ Complete      │ Incomplete   │ Malformed │
//!            ▼               │              ▼           │
//!    ┌───────────────┐       │      ┌──────────────┐    │
//!    │  Dispatching  │───────┴─────>│  Terminated  │    │
//!    └───────┬───────┘   (waiting)  └──────────────┘    │
//!            └──────────────────────────────────────────┘
//! ```
//!
//! ## Buffer Management
//!
//! TCP is a stream protocol: one read may carry part of a frame, or more
//! than one frame. The session appends every chunk to a `BytesMut` and
//! only removes the bytes of a frame once it has been decoded and
//! dispatched. Anything after that frame stays buffered and is decoded
//! before the next read.

use crate::commands::CommandHandler;
use crate::config::ServerConfig;
use crate::connection::reader::FrameReader;
use crate::protocol::types::prefix;
use crate::protocol::{Command, DecodeError, DecodeOutcome, MultibulkDecoder, RespValue};
use crate::shutdown::Shutdown;
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufWriter, ReadHalf, WriteHalf};
use tracing::{debug, info, trace, warn};

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands dispatched
    pub commands_processed: AtomicU64,
    /// Sessions terminated for violating the protocol
    pub protocol_errors: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Errors that end a session.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The buffered bytes can never form a valid frame
    #[error("Protocol error: {0}")]
    Protocol(#[from] DecodeError),

    /// A new frame started with something other than `*`
    #[error("Protocol error: expected '*', got '{}'", .0.escape_default())]
    InvalidFrameStart(char),

    /// Client disconnected normally
    #[error("Client disconnected")]
    ClientDisconnected,

    /// Unexpected end of stream (partial command)
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    /// Buffer size limit exceeded
    #[error("Buffer size limit exceeded: {size} bytes (max: {max})")]
    BufferFull { size: usize, max: usize },

    /// No bytes arrived within the read timeout
    #[error("Read timed out after {0:?}")]
    ReadTimeout(Duration),
}

impl ConnectionError {
    /// True for errors caused by the client sending bytes that are not
    /// a valid request.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            ConnectionError::Protocol(_)
                | ConnectionError::InvalidFrameStart(_)
                | ConnectionError::BufferFull { .. }
        )
    }

    /// The error reply sent before closing, if this error warrants one.
    pub fn error_reply(&self) -> Option<RespValue> {
        match self {
            ConnectionError::BufferFull { .. } => {
                Some(RespValue::error("ERR Protocol error: too big request"))
            }
            e if e.is_protocol_violation() => Some(RespValue::error(format!("ERR {}", e))),
            _ => None,
        }
    }
}

/// One accepted connection and its read/decode/dispatch loop.
pub struct Session<S> {
    /// Read half of the stream
    reader: FrameReader<ReadHalf<S>>,

    /// Write half of the stream
    writer: BufWriter<WriteHalf<S>>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Unconsumed bytes received from the client
    buffer: BytesMut,

    decoder: MultibulkDecoder,

    /// Executes decoded commands (shared across connections)
    command_handler: Arc<dyn CommandHandler>,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,

    shutdown: Shutdown,

    /// Whether protocol violations get an error reply before the close
    reply_errors: bool,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a session with the default configuration.
    ///
    /// # Arguments
    ///
    /// * `stream` - The duplex byte stream for this connection
    /// * `addr` - The client's socket address
    /// * `command_handler` - Executes each decoded command
    /// * `stats` - Shared connection statistics
    pub fn new(
        stream: S,
        addr: SocketAddr,
        command_handler: Arc<dyn CommandHandler>,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        Self::with_config(stream, addr, command_handler, stats, &ServerConfig::default())
    }

    /// Creates a session using the limits in `config`.
    pub fn with_config(
        stream: S,
        addr: SocketAddr,
        command_handler: Arc<dyn CommandHandler>,
        stats: Arc<ConnectionStats>,
        config: &ServerConfig,
    ) -> Self {
        stats.connection_opened();

        let (read_half, write_half) = tokio::io::split(stream);

        Self {
            reader: FrameReader::new(read_half, config.read_timeout, config.max_buffer_size),
            writer: BufWriter::new(write_half),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            decoder: MultibulkDecoder::new().with_max_bulk_size(config.max_buffer_size),
            command_handler,
            stats,
            shutdown: Shutdown::never(),
            reply_errors: config.reply_errors,
        }
    }

    /// Ends the session at its next read once `shutdown` fires.
    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Runs the session until the client disconnects, sends a bad
    /// request, an I/O error occurs, or shutdown is signalled.
    ///
    /// The stream is shut down and released exactly once, on every one
    /// of those paths.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Session closed by shutdown"),
            Err(ConnectionError::ClientDisconnected) => {
                info!(client = %self.addr, "Client disconnected")
            }
            Err(ConnectionError::IoError(io_err))
                if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!(client = %self.addr, "Connection reset by client")
            }
            Err(e) if e.is_protocol_violation() => {
                self.stats.protocol_error();
                warn!(client = %self.addr, error = %e, "Protocol violation, closing connection");
                if self.reply_errors {
                    if let Some(reply) = e.error_reply() {
                        if let Err(write_err) = self.send_response(&reply).await {
                            debug!(
                                client = %self.addr,
                                error = %write_err,
                                "Failed to send error reply"
                            );
                        }
                    }
                }
            }
            Err(e) => warn!(client = %self.addr, error = %e, "Connection error"),
        }

        if let Err(e) = self.writer.shutdown().await {
            trace!(client = %self.addr, error = %e, "Stream shutdown failed");
        }
        self.stats.connection_closed();
        result
    }

    /// The main read-decode-dispatch loop. Returns `Ok` only on shutdown.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        while !self.shutdown.is_shutdown() {
            while let Some(command) = self.try_decode_command()? {
                self.dispatch(command).await?;
            }

            if !self.read_more_data().await? {
                return Ok(());
            }
        }
        Ok(())
    }

    /// Decodes one command from the front of the buffer, if a whole frame
    /// is there.
    ///
    /// The buffer always begins at a frame boundary, so its first byte must
    /// be `*` whether it came from a fresh read or was left over after the
    /// previous frame.
    fn try_decode_command(&mut self) -> Result<Option<Command>, ConnectionError> {
        let first = match self.buffer.first() {
            Some(&first) => first,
            None => return Ok(None),
        };

        // Reject non-protocol clients before decoding anything
        if first != prefix::ARRAY {
            return Err(ConnectionError::InvalidFrameStart(first as char));
        }

        match self.decoder.decode(&self.buffer) {
            DecodeOutcome::Complete { command, consumed } => {
                let _ = self.buffer.split_to(consumed);
                trace!(
                    client = %self.addr,
                    consumed = consumed,
                    remaining = self.buffer.len(),
                    "Decoded command"
                );
                Ok(Some(command))
            }
            DecodeOutcome::Incomplete => {
                trace!(
                    client = %self.addr,
                    buffered = self.buffer.len(),
                    "Incomplete frame, waiting for more data"
                );
                Ok(None)
            }
            DecodeOutcome::Malformed(e) => Err(ConnectionError::Protocol(e)),
        }
    }

    /// Hands a command to the handler and writes its reply.
    async fn dispatch(&mut self, command: Command) -> Result<(), ConnectionError> {
        debug!(client = %self.addr, args = command.len(), "Dispatching command");
        let response = self.command_handler.handle(command);
        self.stats.command_processed();
        if response.is_error() {
            debug!(client = %self.addr, "Handler replied with an error");
        }
        self.send_response(&response).await
    }

    /// Reads more data into the buffer. Returns `false` if shutdown was
    /// signalled instead.
    async fn read_more_data(&mut self) -> Result<bool, ConnectionError> {
        let n = tokio::select! {
            read = self.reader.read_chunk(&mut self.buffer) => read?,
            _ = self.shutdown.recv() => {
                debug!(client = %self.addr, "Shutdown signalled");
                return Ok(false);
            }
        };
        self.stats.bytes_read(n);
        Ok(true)
    }

    /// Sends a response to the client.
    async fn send_response(&mut self, response: &RespValue) -> Result<(), ConnectionError> {
        let bytes = response.serialize();
        self.writer.write_all(&bytes).await?;
        self.writer.flush().await?;
        self.stats.bytes_written(bytes.len());
        trace!(
            client = %self.addr,
            bytes = bytes.len(),
            "Sent response"
        );
        Ok(())
    }
}

/// Runs a session for `stream` with the default configuration.
///
/// Orderly disconnects are swallowed; other errors are logged at debug
/// level after the session has already reported them.
pub async fn handle_connection<S>(
    stream: S,
    addr: SocketAddr,
    command_handler: Arc<dyn CommandHandler>,
    stats: Arc<ConnectionStats>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let session = Session::new(stream, addr, command_handler, stats);
    if let Err(e) = session.run().await {
        match e {
            ConnectionError::ClientDisconnected => {}
            ConnectionError::IoError(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => {
                debug!(client = %addr, error = %e, "Connection ended with error");
            }
        }
    }
}

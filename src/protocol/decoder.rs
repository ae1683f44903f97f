//! Length-Aware Multibulk Decoder
//!
//! This module turns the bytes accumulated on a connection into discrete
//! commands. It is a pure function of the buffer: the caller appends
//! network data, calls [`decode`], and acts on the verdict.
//!
//! ## How the Decoder Works
//!
//! Decoding returns one of three outcomes:
//! - `Complete { command, consumed }` - a full frame was decoded from the first `consumed` bytes
//! - `Incomplete` - the frame is not fully delivered yet, read more and retry
//! - `Malformed(reason)` - the bytes can never form a valid frame
//!
//! The decoder walks the buffer with a cursor. Header and length lines are
//! read up to their CRLF, but argument data is read by its declared length,
//! so arguments may contain arbitrary bytes (including `\r\n`). The byte
//! pair after the data must be CRLF.
//!
//! ## Wait Before Reject
//!
//! A line is only judged once its terminator is visible. A partially
//! delivered line is always `Incomplete`, even if what has arrived so far
//! already looks wrong. Telling "short read" apart from "corrupt" is the
//! whole job here: a short read must never close the connection, and
//! corrupt input must never stall it.

use crate::protocol::types::{prefix, Command, CRLF};
use bytes::Bytes;
use thiserror::Error;

/// Why a buffer can never decode to a valid frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The header count is not a decimal integer
    #[error("invalid bulk length: {0:?}")]
    InvalidBulkLength(String),

    /// The header count is zero, negative or above the argument limit
    #[error("invalid multibulk length: {0}")]
    InvalidMultibulkLength(i64),

    /// A line starts with the wrong sigil
    #[error("expected '{}', got '{}'", .expected, .found.escape_default())]
    UnexpectedByte { expected: char, found: char },

    /// An argument length is not a decimal integer
    #[error("invalid argument length: {0:?}")]
    InvalidArgumentLength(String),

    #[error("negative argument length: {0}")]
    NegativeArgumentLength(i64),

    #[error("argument too large: {size} bytes (max: {max})")]
    ArgumentTooLarge { size: usize, max: usize },

    /// Argument data is not followed by CRLF
    #[error("argument data not terminated by CRLF")]
    MissingTerminator,
}

/// The verdict of one decode attempt. Exactly one shape per attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// A whole frame was decoded from the first `consumed` bytes.
    Complete { command: Command, consumed: usize },
    /// Not enough bytes yet; nothing was rejected.
    Incomplete,
    /// The buffer violates the protocol.
    Malformed(DecodeError),
}

impl DecodeOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, DecodeOutcome::Complete { .. })
    }

    pub fn is_incomplete(&self) -> bool {
        matches!(self, DecodeOutcome::Incomplete)
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, DecodeOutcome::Malformed(_))
    }
}

/// Maximum number of arguments in one frame (same as Redis)
pub const MAX_MULTIBULK_LEN: usize = 1024 * 1024;

/// Maximum size for a single argument (512 MB, same as Redis)
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Decoder for multibulk request frames.
///
/// The decoder holds only its limits; all progress lives in the buffer the
/// caller passes in, so decoding the same bytes twice gives the same outcome.
///
/// # Example
///
/// ```
/// use multibulk::protocol::{DecodeOutcome, MultibulkDecoder};
///
/// let decoder = MultibulkDecoder::new();
/// match decoder.decode(b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n") {
///     DecodeOutcome::Complete { command, consumed } => {
///         assert_eq!(command.name(), Some("GET"));
///         assert_eq!(consumed, 22);
///     }
///     other => panic!("unexpected outcome: {:?}", other),
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct MultibulkDecoder {
    max_args: usize,
    max_bulk_size: usize,
}

impl Default for MultibulkDecoder {
    fn default() -> Self {
        Self {
            max_args: MAX_MULTIBULK_LEN,
            max_bulk_size: MAX_BULK_SIZE,
        }
    }
}

impl MultibulkDecoder {
    /// Creates a decoder with the default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the largest accepted bulklen.
    pub fn with_max_args(mut self, max_args: usize) -> Self {
        self.max_args = max_args;
        self
    }

    /// Sets the largest accepted argument length in bytes.
    pub fn with_max_bulk_size(mut self, max_bulk_size: usize) -> Self {
        self.max_bulk_size = max_bulk_size;
        self
    }

    /// Attempts to decode one frame from the start of `buf`.
    pub fn decode(&self, buf: &[u8]) -> DecodeOutcome {
        match self.decode_frame(buf) {
            Ok(Some((command, consumed))) => DecodeOutcome::Complete { command, consumed },
            Ok(None) => DecodeOutcome::Incomplete,
            Err(e) => DecodeOutcome::Malformed(e),
        }
    }

    fn decode_frame(&self, buf: &[u8]) -> Result<Option<(Command, usize)>, DecodeError> {
        let (header, mut pos) = match read_line(buf, 0) {
            Some(line) => line,
            None => return Ok(None),
        };

        let count = self.parse_header(header)?;
        let mut args = Vec::with_capacity(count.min(1024));

        for _ in 0..count {
            let (length_line, data_start) = match read_line(buf, pos) {
                Some(line) => line,
                None => return Ok(None),
            };

            let length = self.parse_argument_length(length_line)?;
            let data_end = data_start + length;

            // Data plus its CRLF
            if buf.len() < data_end + CRLF.len() {
                return Ok(None);
            }
            if &buf[data_end..data_end + CRLF.len()] != CRLF {
                return Err(DecodeError::MissingTerminator);
            }

            args.push(Bytes::copy_from_slice(&buf[data_start..data_end]));
            pos = data_end + CRLF.len();
        }

        Ok(Some((Command::new(args), pos)))
    }

    /// Parses `*<bulklen>` and validates the count.
    fn parse_header(&self, line: &[u8]) -> Result<usize, DecodeError> {
        expect_sigil(line, prefix::ARRAY)?;

        let count: i64 = parse_decimal(&line[1..])
            .ok_or_else(|| DecodeError::InvalidBulkLength(lossy(&line[1..])))?;

        if count <= 0 || count as u64 > self.max_args as u64 {
            return Err(DecodeError::InvalidMultibulkLength(count));
        }
        Ok(count as usize)
    }

    /// Parses `$<cmdlen>` and validates the length.
    fn parse_argument_length(&self, line: &[u8]) -> Result<usize, DecodeError> {
        expect_sigil(line, prefix::BULK_STRING)?;

        let length: i64 = parse_decimal(&line[1..])
            .ok_or_else(|| DecodeError::InvalidArgumentLength(lossy(&line[1..])))?;

        if length < 0 {
            return Err(DecodeError::NegativeArgumentLength(length));
        }
        if length as u64 > self.max_bulk_size as u64 {
            return Err(DecodeError::ArgumentTooLarge {
                size: length as usize,
                max: self.max_bulk_size,
            });
        }
        Ok(length as usize)
    }
}

/// Returns the line starting at `pos` (without its CRLF) and the offset
/// just past the CRLF, or `None` if the terminator has not arrived.
fn read_line(buf: &[u8], pos: usize) -> Option<(&[u8], usize)> {
    let rest = buf.get(pos..)?;
    find_crlf(rest).map(|end| (&rest[..end], pos + end + CRLF.len()))
}

/// Finds the position of CRLF in the buffer.
///
/// Returns the position of `\r` if found, or None if CRLF is not present.
#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|window| window == CRLF)
}

fn expect_sigil(line: &[u8], expected: u8) -> Result<(), DecodeError> {
    match line.first() {
        Some(&b) if b == expected => Ok(()),
        // An empty line means the CR of its terminator sits where the sigil should be
        found => Err(DecodeError::UnexpectedByte {
            expected: expected as char,
            found: found.copied().unwrap_or(b'\r') as char,
        }),
    }
}

fn parse_decimal(digits: &[u8]) -> Option<i64> {
    std::str::from_utf8(digits).ok()?.parse().ok()
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Decodes one frame from `buf` using the default limits.
pub fn decode(buf: &[u8]) -> DecodeOutcome {
    MultibulkDecoder::new().decode(buf)
}

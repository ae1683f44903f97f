//! Frame Reader
//!
//! Pulls the next chunk of bytes from a connection's read half into the
//! session's buffer. This is the only place a session suspends waiting
//! on the network.

use crate::connection::session::ConnectionError;
use bytes::BytesMut;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

/// Minimum spare capacity kept in the buffer before a read
const MIN_READ_CAPACITY: usize = 1024;

/// How much to grow the buffer by when it runs low
const READ_RESERVE: usize = 4096;

/// Reads raw chunks from a byte stream.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    read_timeout: Option<Duration>,
    max_buffer_size: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Creates a reader over `inner`.
    ///
    /// A read that takes longer than `read_timeout` fails with
    /// [`ConnectionError::ReadTimeout`]. A buffer that already holds
    /// `max_buffer_size` bytes is not read into again.
    pub fn new(inner: R, read_timeout: Option<Duration>, max_buffer_size: usize) -> Self {
        Self {
            inner,
            read_timeout,
            max_buffer_size,
        }
    }

    /// Appends the next chunk from the stream to `buf`.
    ///
    /// Returns the number of bytes read, which is never zero: end of stream
    /// is reported as [`ConnectionError::ClientDisconnected`] when `buf` is
    /// empty and as [`ConnectionError::UnexpectedEof`] when a partial frame
    /// is still buffered.
    pub async fn read_chunk(&mut self, buf: &mut BytesMut) -> Result<usize, ConnectionError> {
        if buf.len() >= self.max_buffer_size {
            return Err(ConnectionError::BufferFull {
                size: buf.len(),
                max: self.max_buffer_size,
            });
        }

        if buf.capacity() - buf.len() < MIN_READ_CAPACITY {
            buf.reserve(READ_RESERVE);
        }

        let n = match self.read_timeout {
            Some(limit) => tokio::time::timeout(limit, self.inner.read_buf(buf))
                .await
                .map_err(|_| ConnectionError::ReadTimeout(limit))??,
            None => self.inner.read_buf(buf).await?,
        };

        if n == 0 {
            return if buf.is_empty() {
                Err(ConnectionError::ClientDisconnected)
            } else {
                Err(ConnectionError::UnexpectedEof)
            };
        }

        trace!(bytes = n, buffered = buf.len(), "Read data");
        Ok(n)
    }
}

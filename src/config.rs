//! Server Configuration
//!
//! Centralized configuration with defaults matching a plain, unbounded
//! server on `127.0.0.1:6380`.

use std::time::Duration;

/// Default address the server binds to
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:6380";

/// Default limit for unconsumed bytes buffered per connection (64 KB)
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 64 * 1024;

/// Configuration for a [`Server`](crate::server::Server) and its sessions.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP listen address (host:port)
    pub bind_addr: String,

    /// Max concurrent client connections, `None` (or `Some(0)`) for no limit
    pub max_connections: Option<usize>,

    /// How long a session waits on a single read, `None` to wait forever
    pub read_timeout: Option<Duration>,

    /// Max bytes a connection may buffer without completing a frame
    pub max_buffer_size: usize,

    /// Send `-ERR Protocol error: ...` before closing on bad input
    pub reply_errors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            max_connections: None,
            read_timeout: None,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            reply_errors: true,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = addr.into();
        self
    }

    pub fn with_max_connections(mut self, max: Option<usize>) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_max_buffer_size(mut self, size: usize) -> Self {
        self.max_buffer_size = size;
        self
    }

    pub fn with_reply_errors(mut self, enabled: bool) -> Self {
        self.reply_errors = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "127.0.0.1:6380");
        assert_eq!(config.max_connections, None);
        assert_eq!(config.read_timeout, None);
        assert_eq!(config.max_buffer_size, 64 * 1024);
        assert!(config.reply_errors);
    }

    #[test]
    fn test_setters() {
        let config = ServerConfig::new()
            .with_bind_addr("0.0.0.0:7000")
            .with_max_connections(Some(8))
            .with_read_timeout(Some(Duration::from_millis(250)))
            .with_max_buffer_size(1024)
            .with_reply_errors(false);

        assert_eq!(config.bind_addr, "0.0.0.0:7000");
        assert_eq!(config.max_connections, Some(8));
        assert_eq!(config.read_timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.max_buffer_size, 1024);
        assert!(!config.reply_errors);
    }
}

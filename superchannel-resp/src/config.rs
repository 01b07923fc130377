//! RESP client configuration and buffer sizing
//!
//! Replies to a batch are small (`+OK`, `+QUEUED`, one integer per value),
//! so the read side stays modest; the write side should fit a typical
//! encoded batch so one flush is one write.

use std::time::Duration;

/// Default read buffer size (8KB)
pub const DEFAULT_READ_BUF_SIZE: usize = 8192;

/// Default write buffer size (16KB)
///
/// Pre-sized request buffer. Larger batches grow it once and keep the
/// allocation for later flushes.
pub const DEFAULT_WRITE_BUF_SIZE: usize = 16384;

/// Largest bulk string accepted from the server (512MB, the Redis limit)
pub const DEFAULT_MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Longest simple-string, error or length line accepted from the server (64KB)
pub const DEFAULT_MAX_LINE_LEN: usize = 64 * 1024;

/// Deepest array nesting accepted from the server
pub const DEFAULT_MAX_DEPTH: usize = 8;

/// Idle time before TCP keepalive probes start
pub const DEFAULT_KEEPALIVE_IDLE: Duration = Duration::from_secs(60);

/// Connection settings for [`RespClient`](crate::RespClient).
#[derive(Debug, Clone)]
pub struct RespOptions {
    /// Read buffer size per `read` call
    pub read_buf_size: usize,
    /// Initial request buffer capacity
    pub write_buf_size: usize,
    /// Reply bulk strings larger than this are a protocol violation
    pub max_bulk_len: usize,
    /// Reply lines (status, error, lengths) longer than this are a protocol
    /// violation, even before their CRLF arrives
    pub max_line_len: usize,
    /// Set `TCP_NODELAY` on connect
    pub nodelay: bool,
    /// TCP keepalive idle time, `None` leaves the OS default
    pub keepalive: Option<Duration>,
    /// Issue `PING` on connect and require `+PONG`
    pub ping_on_connect: bool,
}

impl Default for RespOptions {
    fn default() -> Self {
        Self {
            read_buf_size: DEFAULT_READ_BUF_SIZE,
            write_buf_size: DEFAULT_WRITE_BUF_SIZE,
            max_bulk_len: DEFAULT_MAX_BULK_LEN,
            max_line_len: DEFAULT_MAX_LINE_LEN,
            nodelay: true,
            keepalive: Some(DEFAULT_KEEPALIVE_IDLE),
            ping_on_connect: true,
        }
    }
}

impl RespOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read buffer size, at least 64 bytes.
    #[must_use]
    pub fn with_read_buf_size(mut self, size: usize) -> Self {
        self.read_buf_size = size.max(64);
        self
    }

    #[must_use]
    pub const fn with_write_buf_size(mut self, size: usize) -> Self {
        self.write_buf_size = size;
        self
    }

    #[must_use]
    pub const fn with_max_bulk_len(mut self, max: usize) -> Self {
        self.max_bulk_len = max;
        self
    }

    #[must_use]
    pub const fn with_max_line_len(mut self, max: usize) -> Self {
        self.max_line_len = max;
        self
    }

    #[must_use]
    pub const fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }

    #[must_use]
    pub const fn with_keepalive(mut self, idle: Option<Duration>) -> Self {
        self.keepalive = idle;
        self
    }

    #[must_use]
    pub const fn with_ping_on_connect(mut self, ping: bool) -> Self {
        self.ping_on_connect = ping;
        self
    }
}

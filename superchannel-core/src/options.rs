//! Relay configuration options
//!
//! Everything the relay worker needs to know that is not the channel name or
//! the store connector: flush cadence, startup policy, store timeouts, and
//! the retry policy applied to failed flushes.

use std::time::Duration;

/// Default flush window (roughly one TCP round trip).
pub const DEFAULT_FLUSH_WINDOW: Duration = Duration::from_millis(40);

/// Default bound on connecting to the backing store.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default bound on a single store operation.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Relay worker options.
///
/// # Examples
///
/// ```
/// use superchannel_core::options::RelayOptions;
/// use std::time::Duration;
///
/// let opts = RelayOptions::default()
///     .with_flush_window(Duration::from_millis(10))
///     .with_retry_budget(3)
///     .with_purge_on_start(false);
/// assert_eq!(opts.flush_window, Duration::from_millis(10));
/// assert!(!opts.purge_on_start);
/// ```
#[derive(Debug, Clone)]
pub struct RelayOptions {
    /// Flush window
    ///
    /// Fixed cadence at which buffered messages are pushed. Also the upper
    /// bound on latency between a send and its transmission.
    /// - Default: 40ms
    pub flush_window: Duration,

    /// Delete the remote queue before the first flush
    ///
    /// Lets a restarted relay begin from an empty list.
    /// - Default: true
    pub purge_on_start: bool,

    /// Connection timeout
    ///
    /// Bound on the initial connect and on every reconnect.
    /// - `None`: wait indefinitely
    /// - Default: 5 seconds
    pub connect_timeout: Option<Duration>,

    /// Store operation timeout
    ///
    /// Bound on each `push_all` / `delete_key` call. A timed-out call counts
    /// as a retryable failure.
    /// - `None`: wait indefinitely
    /// - Default: 5 seconds
    pub io_timeout: Option<Duration>,

    /// Initial retry interval after a failed flush
    ///
    /// - Default: 50ms
    pub retry_ivl: Duration,

    /// Maximum retry interval for exponential backoff
    ///
    /// - Default: 2 seconds
    pub retry_ivl_max: Duration,

    /// Number of retries allowed per flush before the worker aborts
    ///
    /// - `0`: first failure is fatal
    /// - Default: 5
    pub retry_budget: u32,

    /// Randomize retry delays
    ///
    /// When enabled each delay is drawn from `[delay/2, delay]`.
    /// - Default: false
    pub retry_jitter: bool,

    /// Emit `RelayEvent`s on a monitor channel
    ///
    /// - Default: false
    pub monitor: bool,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            flush_window: DEFAULT_FLUSH_WINDOW,
            purge_on_start: true,
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            io_timeout: Some(DEFAULT_IO_TIMEOUT),
            retry_ivl: Duration::from_millis(50),
            retry_ivl_max: Duration::from_secs(2),
            retry_budget: 5,
            retry_jitter: false,
            monitor: false,
        }
    }
}

impl RelayOptions {
    /// Create options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flush window.
    ///
    /// A zero window is bumped to one millisecond so the timer cannot spin.
    #[must_use]
    pub fn with_flush_window(mut self, window: Duration) -> Self {
        self.flush_window = window.max(Duration::from_millis(1));
        self
    }

    #[must_use]
    pub const fn with_purge_on_start(mut self, purge: bool) -> Self {
        self.purge_on_start = purge;
        self
    }

    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.io_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_retry_ivl(mut self, ivl: Duration) -> Self {
        self.retry_ivl = ivl;
        self
    }

    #[must_use]
    pub const fn with_retry_ivl_max(mut self, ivl: Duration) -> Self {
        self.retry_ivl_max = ivl;
        self
    }

    #[must_use]
    pub const fn with_retry_budget(mut self, budget: u32) -> Self {
        self.retry_budget = budget;
        self
    }

    #[must_use]
    pub const fn with_retry_jitter(mut self, jitter: bool) -> Self {
        self.retry_jitter = jitter;
        self
    }

    #[must_use]
    pub const fn with_monitor(mut self, monitor: bool) -> Self {
        self.monitor = monitor;
        self
    }
}

/// SuperChannel Error Types
///
/// Two layers: `StoreError` for anything the backing store does wrong,
/// `RelayError` for what producers and the channel owner observe.

use crate::message::Message;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a backing-store client.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The connection to the backing store could not be established
    #[error("Connect error: {0}")]
    Connect(#[source] io::Error),

    /// I/O failed on an established connection
    #[error("Transport error: {0}")]
    Transport(#[source] io::Error),

    /// A store operation did not complete in time
    #[error("{op} timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },

    /// Malformed or unexpected reply (incompatible store)
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// The store answered with an error reply
    #[error("Rejected by store: {0}")]
    Rejected(String),
}

/// Result type alias for backing-store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Create a protocol violation with a message
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a rejection with the store's error text
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }

    /// Transport error for a client that has no usable connection.
    pub fn not_connected() -> Self {
        Self::Transport(io::Error::new(
            io::ErrorKind::NotConnected,
            "backing store not connected",
        ))
    }

    /// Check whether retrying (after a reconnect) may succeed.
    ///
    /// Network trouble is retryable; an incompatible or refusing store is not.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connect(_) | Self::Transport(_) | Self::Timeout { .. }
        )
    }

    /// Check if this is a connection-level failure
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::Transport(_))
    }
}

/// Errors surfaced by `RelayChannel` and its worker.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Send attempted after close, or after the worker stopped
    #[error("Channel closed")]
    ChannelClosed,

    /// Non-blocking send found the channel at capacity
    #[error("Channel full")]
    Full(Message),

    /// The worker terminated on a store failure.
    ///
    /// `undelivered` holds every accepted message that never reached the
    /// store, in send order.
    #[error("Relay aborted ({} undelivered): {source}", .undelivered.len())]
    Aborted {
        #[source]
        source: StoreError,
        undelivered: Vec<Message>,
    },

    /// Worker thread or runtime could not be started
    #[error("Runtime error: {0}")]
    Runtime(#[source] io::Error),

    /// Worker thread panicked
    #[error("Relay worker panicked")]
    WorkerPanicked,
}

/// Result type alias for relay operations
pub type RelayResult<T> = std::result::Result<T, RelayError>;

impl RelayError {
    /// Messages the caller can recover after an abort.
    #[must_use]
    pub fn undelivered(&self) -> &[Message] {
        match self {
            Self::Aborted { undelivered, .. } => undelivered,
            _ => &[],
        }
    }

    /// Take ownership of the undelivered messages, if any.
    #[must_use]
    pub fn into_undelivered(self) -> Vec<Message> {
        match self {
            Self::Aborted { undelivered, .. } => undelivered,
            Self::Full(msg) => vec![msg],
            _ => Vec::new(),
        }
    }

    /// The store failure behind an abort.
    #[must_use]
    pub const fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Aborted { source, .. } => Some(source),
            _ => None,
        }
    }
}

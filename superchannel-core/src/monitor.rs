//! Relay event monitoring.
//!
//! Provides an event stream for tracking a relay worker's lifecycle:
//! connection, flushes, retries, and termination.

use std::fmt;
use std::time::Duration;

/// Relay lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    /// Worker connected to the backing store.
    Connected,

    /// Remote queue deleted at startup.
    Purged,

    /// A batch reached the backing store.
    Flushed { messages: usize, bytes: usize },

    /// A flush failed and will be retried.
    Retrying {
        attempt: u32,
        delay: Duration,
        reason: String,
    },

    /// Close observed; final drain in progress.
    Closing,

    /// Worker stopped cleanly.
    Closed { delivered: u64 },

    /// Worker stopped on a store failure.
    Aborted { undelivered: usize, reason: String },
}

impl fmt::Display for RelayEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => write!(f, "Connected to backing store"),
            Self::Purged => write!(f, "Purged remote queue"),
            Self::Flushed { messages, bytes } => {
                write!(f, "Flushed {messages} messages ({bytes} bytes)")
            }
            Self::Retrying {
                attempt,
                delay,
                reason,
            } => write!(f, "Retry {attempt} in {delay:?}: {reason}"),
            Self::Closing => write!(f, "Closing"),
            Self::Closed { delivered } => write!(f, "Closed after {delivered} messages"),
            Self::Aborted {
                undelivered,
                reason,
            } => write!(f, "Aborted with {undelivered} undelivered: {reason}"),
        }
    }
}

/// Handle for receiving relay events.
pub type RelayMonitor = flume::Receiver<RelayEvent>;

/// Sender half used by the worker.
pub type RelayEventSender = flume::Sender<RelayEvent>;

/// Creates a new monitoring channel pair.
#[must_use]
pub fn create_monitor() -> (RelayEventSender, RelayMonitor) {
    flume::unbounded()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_event_display() {
        let event = RelayEvent::Flushed {
            messages: 3,
            bytes: 12,
        };
        assert_eq!(event.to_string(), "Flushed 3 messages (12 bytes)");
        assert_eq!(
            RelayEvent::Closed { delivered: 5 }.to_string(),
            "Closed after 5 messages"
        );
    }

    #[test]
    fn test_monitor_channel() {
        let (sender, receiver) = create_monitor();
        sender.send(RelayEvent::Connected).unwrap();

        let event = receiver.recv().unwrap();
        assert_eq!(event, RelayEvent::Connected);
    }
}

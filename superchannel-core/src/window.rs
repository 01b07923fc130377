//! Window buffer and flush timer.
//!
//! `WindowBuffer` accumulates messages between flushes in arrival order.
//! `FlushTimer` fires on a fixed cadence that arrivals never reset.

use crate::message::Message;
use std::time::{Duration, Instant};

/// Ordered batch of messages accepted since the last successful flush.
///
/// Growth is bounded only by the flush cadence. Clearing keeps the
/// allocation, so a steady stream does not reallocate every window.
#[derive(Debug, Default)]
pub struct WindowBuffer {
    pending: Vec<Message>,
    bytes: usize,
}

impl WindowBuffer {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pending: Vec::new(),
            bytes: 0,
        }
    }

    /// Create a buffer pre-sized for `capacity` messages.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pending: Vec::with_capacity(capacity),
            bytes: 0,
        }
    }

    #[inline]
    pub fn push(&mut self, msg: Message) {
        self.bytes += msg.len();
        self.pending.push(msg);
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Total payload bytes buffered.
    #[inline]
    #[must_use]
    pub const fn bytes(&self) -> usize {
        self.bytes
    }

    /// Buffered messages, oldest first.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[Message] {
        &self.pending
    }

    /// Empty the buffer after a successful flush.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.bytes = 0;
    }

    /// Move the buffered messages out, leaving the buffer empty.
    pub fn take(&mut self) -> Vec<Message> {
        self.bytes = 0;
        std::mem::take(&mut self.pending)
    }
}

/// Fixed-cadence timer driving flushes.
///
/// Deadlines advance by exactly one period per tick. If the worker falls
/// behind (a slow flush), missed ticks are skipped rather than fired in a
/// burst.
#[derive(Debug)]
pub struct FlushTimer {
    period: Duration,
    next: Instant,
}

impl FlushTimer {
    #[must_use]
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next: Instant::now() + period,
        }
    }

    #[inline]
    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }

    /// Deadline of the next tick.
    #[inline]
    #[must_use]
    pub const fn deadline(&self) -> Instant {
        self.next
    }

    /// Wait for the next tick.
    ///
    /// Cancel-safe: dropping the future before it completes leaves the
    /// deadline unchanged.
    pub async fn tick(&mut self) {
        crate::timeout::sleep_until(self.next).await;
        self.advance(Instant::now());
    }

    fn advance(&mut self, now: Instant) {
        self.next += self.period;
        if self.next <= now {
            self.next = now + self.period;
        }
    }
}

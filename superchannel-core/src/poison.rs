//! RAII guard against half-written requests.
//!
//! A batch goes out as one pipelined request (`MULTI`, one `RPUSH` per
//! message, `EXEC`) followed by reading one reply per command. If the
//! future driving that exchange is dropped (a timeout firing, say), the
//! stream may hold half a request or unread replies. Reusing it would pair
//! the next command with a stale reply.
//!
//! `PoisonGuard` marks the connection poisoned on creation; only `disarm()`
//! after the whole exchange clears the mark. A poisoned connection is
//! dropped and re-dialed, never reused.
//!
//! # Example
//!
//! ```rust
//! use superchannel_core::poison::PoisonGuard;
//!
//! struct Conn {
//!     poisoned: bool,
//! }
//!
//! impl Conn {
//!     async fn exchange(&mut self, _request: &[u8]) -> std::io::Result<()> {
//!         if self.poisoned {
//!             return Err(std::io::ErrorKind::NotConnected.into());
//!         }
//!
//!         let guard = PoisonGuard::new(&mut self.poisoned);
//!         // write request, read every reply ...
//!         guard.disarm();
//!         Ok(())
//!     }
//! }
//! ```
//!
//! Rules:
//!
//! 1. Disarm only once every reply of the exchange has been read.
//! 2. Never clear the flag by hand after an error.

/// Marks a connection poisoned unless disarmed.
///
/// Must live across the entire request/reply exchange.
pub struct PoisonGuard<'a> {
    flag: &'a mut bool,
}

impl<'a> PoisonGuard<'a> {
    /// Arm the guard, marking the connection poisoned.
    #[inline]
    pub fn new(flag: &'a mut bool) -> Self {
        *flag = true;
        Self { flag }
    }

    /// Mark the connection healthy again.
    #[inline]
    pub fn disarm(self) {
        *self.flag = false;
    }
}

//! Backing-store abstraction.
//!
//! The relay talks to its remote queue through two traits:
//!
//! - [`Connect`]: builds a client. Runs on the worker thread, so the client
//!   itself never has to cross threads.
//! - [`BackingStore`]: the client. A named ordered list with append-right
//!   batch push, pop-left blocking consume, and delete.
//!
//! Any substitute store must honor the same contract: values pushed by one
//! `push_all` become visible all at once and in order, and `pop_blocking`
//! returns them oldest first.
//!
//! The relay worker pushes through [`BackingStore::push_batch`], which also
//! records the batch's [`BatchTag`] in the same atomic step. When a push
//! fails without a clear outcome (the connection dropped after the commit
//! was sent), the worker reads the tag back with
//! [`BackingStore::last_batch`] and only pushes again if the batch is
//! missing.

use crate::error::StoreResult;
use crate::message::Message;
use async_trait::async_trait;
use std::fmt;

pub mod memory;

pub use memory::MemoryStore;

/// Identity of one flushed batch: a random per-worker run id plus a
/// sequence number starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchTag {
    run: u64,
    seq: u64,
}

impl BatchTag {
    #[must_use]
    pub const fn new(run: u64, seq: u64) -> Self {
        Self { run, seq }
    }

    #[inline]
    #[must_use]
    pub const fn run(&self) -> u64 {
        self.run
    }

    #[inline]
    #[must_use]
    pub const fn seq(&self) -> u64 {
        self.seq
    }

    /// Tag of the batch after this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self {
            run: self.run,
            seq: self.seq.wrapping_add(1),
        }
    }

    /// Key holding the last committed tag for the list under `key`.
    #[must_use]
    pub fn marker_key(key: &str) -> String {
        format!("{key}:relay-batch")
    }

    /// Parse the stored form, `{run:016x}:{seq}`.
    #[must_use]
    pub fn parse(raw: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(raw).ok()?;
        let (run, seq) = text.split_once(':')?;
        Some(Self {
            run: u64::from_str_radix(run, 16).ok()?,
            seq: seq.parse().ok()?,
        })
    }
}

impl fmt::Display for BatchTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}:{}", self.run, self.seq)
    }
}

/// Client for a remote ordered queue.
///
/// Futures are not required to be `Send`: a client lives on the single
/// thread that runs its relay worker.
#[async_trait(?Send)]
pub trait BackingStore {
    /// Append `values` to the list under `key`, all or nothing.
    ///
    /// No prefix of a failed batch may become visible to readers.
    async fn push_all(&mut self, key: &str, values: &[Message]) -> StoreResult<()>;

    /// Like [`push_all`](Self::push_all), and record `tag` as the last
    /// batch committed to `key` in the same atomic step.
    async fn push_batch(&mut self, key: &str, tag: BatchTag, values: &[Message]) -> StoreResult<()>;

    /// Tag of the last batch committed to `key` by
    /// [`push_batch`](Self::push_batch), if any.
    async fn last_batch(&mut self, key: &str) -> StoreResult<Option<BatchTag>>;

    /// Block until the list under `key` is non-empty, then remove and return
    /// its oldest value.
    async fn pop_blocking(&mut self, key: &str) -> StoreResult<Message>;

    /// Remove the whole list under `key`. Deleting a missing key succeeds.
    async fn delete_key(&mut self, key: &str) -> StoreResult<()>;

    /// Re-establish the connection after a transport failure.
    ///
    /// Stores without a connection have nothing to do.
    async fn reconnect(&mut self) -> StoreResult<()> {
        Ok(())
    }
}

/// Produces a connected [`BackingStore`].
///
/// The connector is moved to the worker thread and consumed there.
#[async_trait(?Send)]
pub trait Connect: Send + 'static {
    type Store: BackingStore;

    /// Connect to the backing store.
    ///
    /// # Errors
    ///
    /// `StoreError::Connect` if the store is unreachable; `Protocol` if it
    /// answers but is not a compatible store.
    async fn connect(self) -> StoreResult<Self::Store>;
}

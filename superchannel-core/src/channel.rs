//! Producer-facing relay channel.
//!
//! A `RelayChannel` owns a bounded FIFO and the thread running its relay
//! worker. Producers on any thread send through it (or through cloned
//! [`RelaySender`]s); the worker batches what they send into the backing
//! store.
//!
//! ## Close semantics
//!
//! Close is guarded by a read/write gate. Every send holds the gate shared
//! while it checks the closed flag and enqueues; `close` takes it
//! exclusively, flips the flag, then enqueues `Envelope::Close`. Therefore
//! no data can be enqueued behind the close marker, and every send that
//! returned `Ok` is either delivered or handed back in
//! `RelayError::Aborted::undelivered`.

use crate::error::{RelayError, RelayResult};
use crate::message::{Envelope, Message};
use crate::monitor::{create_monitor, RelayMonitor};
use crate::options::RelayOptions;
use crate::store::Connect;
use crate::worker::{run_relay, RelayReport};

use async_lock::RwLock;
use flume::{Sender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::debug;

/// Open/closed flag shared by senders and the worker.
#[derive(Debug)]
pub(crate) struct Gate {
    open: RwLock<bool>,
}

impl Gate {
    pub(crate) const fn new() -> Self {
        Self {
            open: RwLock::new(true),
        }
    }

    /// Close the gate if no send is in flight.
    ///
    /// Returns `false` when a sender holds the gate; the caller must make
    /// progress on the FIFO and try again.
    pub(crate) fn try_seal(&self) -> bool {
        match self.open.try_write() {
            Some(mut open) => {
                *open = false;
                true
            }
            None => false,
        }
    }

    /// Non-blocking check. A close in progress counts as closed.
    pub(crate) fn is_open(&self) -> bool {
        self.open.try_read().is_some_and(|open| *open)
    }
}

/// Cloneable producer handle.
///
/// All clones feed the same FIFO. When every sender (including the one
/// inside [`RelayChannel`]) is dropped, the worker treats it as a close.
#[derive(Debug, Clone)]
pub struct RelaySender {
    name: Arc<str>,
    tx: Sender<Envelope>,
    gate: Arc<Gate>,
}

impl RelaySender {
    /// Name of the remote queue this sender feeds.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueue a message, blocking while the FIFO is full.
    ///
    /// # Errors
    ///
    /// `ChannelClosed` after `close`, or once the worker has terminated.
    pub fn send(&self, msg: impl Into<Message>) -> RelayResult<()> {
        let open = self.gate.open.read_blocking();
        if !*open {
            return Err(RelayError::ChannelClosed);
        }
        self.tx
            .send(Envelope::data(msg))
            .map_err(|_| RelayError::ChannelClosed)
    }

    /// Enqueue a message, waiting asynchronously while the FIFO is full.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send).
    pub async fn send_async(&self, msg: impl Into<Message>) -> RelayResult<()> {
        let open = self.gate.open.read().await;
        if !*open {
            return Err(RelayError::ChannelClosed);
        }
        self.tx
            .send_async(Envelope::data(msg))
            .await
            .map_err(|_| RelayError::ChannelClosed)
    }

    /// Enqueue without waiting.
    ///
    /// # Errors
    ///
    /// `Full(msg)` hands the message back when the FIFO is at capacity;
    /// `ChannelClosed` as for [`send`](Self::send), including while a close
    /// is in progress.
    pub fn try_send(&self, msg: impl Into<Message>) -> RelayResult<()> {
        let Some(open) = self.gate.open.try_read() else {
            return Err(RelayError::ChannelClosed);
        };
        if !*open {
            return Err(RelayError::ChannelClosed);
        }
        match self.tx.try_send(Envelope::data(msg)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(envelope)) => match envelope.into_payload() {
                Some(msg) => Err(RelayError::Full(msg)),
                None => Err(RelayError::ChannelClosed),
            },
            Err(TrySendError::Disconnected(_)) => Err(RelayError::ChannelClosed),
        }
    }

    /// Ask the worker to drain, flush and stop.
    ///
    /// Waits only for the close marker to be enqueued, not for the final
    /// flush; use [`RelayChannel::join`] for that.
    ///
    /// # Errors
    ///
    /// `ChannelClosed` if the channel was already closed or the worker has
    /// terminated.
    pub fn close(&self) -> RelayResult<()> {
        let mut open = self.gate.open.write_blocking();
        if !*open {
            return Err(RelayError::ChannelClosed);
        }
        *open = false;
        self.tx
            .send(Envelope::Close)
            .map_err(|_| RelayError::ChannelClosed)
    }

    /// Async variant of [`close`](Self::close).
    ///
    /// # Errors
    ///
    /// Same as [`close`](Self::close).
    pub async fn close_async(&self) -> RelayResult<()> {
        let mut open = self.gate.open.write().await;
        if !*open {
            return Err(RelayError::ChannelClosed);
        }
        *open = false;
        self.tx
            .send_async(Envelope::Close)
            .await
            .map_err(|_| RelayError::ChannelClosed)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        !self.gate.is_open()
    }

    /// Messages waiting in the FIFO, not yet seen by the worker.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.tx.len()
    }

    #[must_use]
    pub fn capacity(&self) -> Option<usize> {
        self.tx.capacity()
    }
}

/// A named relay: bounded FIFO plus the worker draining it.
///
/// ## Example
///
/// ```rust
/// use superchannel_core::prelude::*;
///
/// let store = MemoryStore::new();
/// let channel = RelayChannel::spawn("jobs", 5, store.clone(), RelayOptions::default())?;
///
/// channel.send("a")?;
/// channel.send("b")?;
/// let report = channel.shutdown()?;
///
/// assert_eq!(report.delivered, 2);
/// assert_eq!(store.len("jobs"), 2);
/// # Ok::<(), superchannel_core::RelayError>(())
/// ```
#[derive(Debug)]
pub struct RelayChannel {
    sender: RelaySender,
    worker: JoinHandle<RelayResult<RelayReport>>,
    monitor: Option<RelayMonitor>,
}

impl RelayChannel {
    /// Create the FIFO and start a worker thread for it.
    ///
    /// `capacity` bounds the FIFO; a capacity of zero makes every send a
    /// rendezvous with the worker. The connector runs on the worker thread.
    ///
    /// # Errors
    ///
    /// `Runtime` if the worker thread cannot be spawned. Store failures are
    /// reported later, by sends and by [`join`](Self::join).
    pub fn spawn<C: Connect>(
        name: impl Into<String>,
        capacity: usize,
        connector: C,
        options: RelayOptions,
    ) -> RelayResult<Self> {
        let name: Arc<str> = Arc::from(name.into());
        let (tx, rx) = flume::bounded(capacity);
        let gate = Arc::new(Gate::new());

        let (events, monitor) = if options.monitor {
            let (events, monitor) = create_monitor();
            (Some(events), Some(monitor))
        } else {
            (None, None)
        };

        let key = Arc::clone(&name);
        let worker_gate = Arc::clone(&gate);
        let worker = thread::Builder::new()
            .name(format!("superchannel-{name}"))
            .spawn(move || {
                let runtime = compio::runtime::Runtime::new().map_err(RelayError::Runtime)?;
                runtime.block_on(run_relay(key, rx, worker_gate, connector, options, events))
            })
            .map_err(RelayError::Runtime)?;

        debug!(name = %name, capacity, "[CHANNEL] Relay worker started");

        Ok(Self {
            sender: RelaySender { name, tx, gate },
            worker,
            monitor,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.sender.name()
    }

    /// Another producer handle for this channel.
    #[must_use]
    pub fn sender(&self) -> RelaySender {
        self.sender.clone()
    }

    /// Lifecycle events, if enabled with `RelayOptions::with_monitor`.
    #[must_use]
    pub fn monitor(&self) -> Option<RelayMonitor> {
        self.monitor.clone()
    }

    /// See [`RelaySender::send`].
    ///
    /// # Errors
    ///
    /// `ChannelClosed` after close or worker termination.
    pub fn send(&self, msg: impl Into<Message>) -> RelayResult<()> {
        self.sender.send(msg)
    }

    /// See [`RelaySender::send_async`].
    ///
    /// # Errors
    ///
    /// `ChannelClosed` after close or worker termination.
    pub async fn send_async(&self, msg: impl Into<Message>) -> RelayResult<()> {
        self.sender.send_async(msg).await
    }

    /// See [`RelaySender::try_send`].
    ///
    /// # Errors
    ///
    /// `Full(msg)` at capacity, `ChannelClosed` after close.
    pub fn try_send(&self, msg: impl Into<Message>) -> RelayResult<()> {
        self.sender.try_send(msg)
    }

    /// See [`RelaySender::close`].
    ///
    /// # Errors
    ///
    /// `ChannelClosed` on a second close.
    pub fn close(&self) -> RelayResult<()> {
        self.sender.close()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Whether the worker thread has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Wait for the worker to reach Closed.
    ///
    /// Drops this handle's sender first, so the worker stops once `close`
    /// was called or every other [`RelaySender`] is gone.
    ///
    /// # Errors
    ///
    /// `Aborted` with the undelivered messages if the worker gave up on the
    /// store; `Runtime` if its runtime failed to start; `WorkerPanicked`.
    pub fn join(self) -> RelayResult<RelayReport> {
        let Self { sender, worker, .. } = self;
        let name = Arc::clone(&sender.name);
        drop(sender);

        let result = worker.join().unwrap_or(Err(RelayError::WorkerPanicked));
        debug!(name = %name, ok = result.is_ok(), "[CHANNEL] Relay worker joined");
        result
    }

    /// Close (if still open) and wait for the final flush.
    ///
    /// # Errors
    ///
    /// Same as [`join`](Self::join).
    pub fn shutdown(self) -> RelayResult<RelayReport> {
        // Already closed or worker gone: join reports the real outcome.
        let _ = self.close();
        self.join()
    }
}

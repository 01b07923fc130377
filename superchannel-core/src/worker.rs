//! Relay Worker
//!
//! One worker == one channel == one backing-store connection.
//!
//! State machine:
//!
//! ```text
//! Connecting ──► Running ──► Closing ──► Closed
//!      │            │           │
//!      └────────────┴───────────┴──► Closed (aborted, batch returned)
//! ```
//!
//! While Running the worker waits for whichever comes first: the next
//! envelope from the FIFO, or the flush timer. Data is appended to the
//! window; the timer pushes the window as one atomic batch. The timer runs
//! on a fixed cadence, arrivals do not reset it.
//!
//! Append and flush never overlap: the loop is single-threaded and the
//! window has exactly one owner.
//!
//! Every batch carries a [`BatchTag`]. After a retryable failure the worker
//! reconnects and asks the store for the last committed tag before pushing
//! again, so a commit whose reply was lost is not applied twice.

use crate::channel::Gate;
use crate::error::{RelayError, RelayResult, StoreError, StoreResult};
use crate::message::{Envelope, Message};
use crate::monitor::{RelayEvent, RelayEventSender};
use crate::options::RelayOptions;
use crate::retry::RetryState;
use crate::store::{BackingStore, BatchTag, Connect};
use crate::timeout::{sleep, with_timeout};
use crate::window::{FlushTimer, WindowBuffer};

use flume::Receiver;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, trace, warn};

/// Worker lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Connecting,
    Running,
    Closing,
    Closed,
}

/// Summary returned when a worker reaches Closed cleanly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayReport {
    /// Messages pushed to the backing store
    pub delivered: u64,
    /// Successful flushes
    pub batches: u64,
    /// Flush retries performed
    pub retries: u64,
}

/// What woke the control loop.
enum Wake {
    Envelope(Envelope),
    /// Every sender is gone; treated like a close.
    Disconnected,
    FlushDue,
}

/// Run a relay from Connecting to Closed.
///
/// The connection is released on every exit path when the store client is
/// dropped with the worker.
pub(crate) async fn run_relay<C: Connect>(
    key: Arc<str>,
    rx: Receiver<Envelope>,
    gate: Arc<Gate>,
    connector: C,
    options: RelayOptions,
    events: Option<RelayEventSender>,
) -> RelayResult<RelayReport> {
    debug!(key = %key, "[RELAY] Connecting to backing store");

    let store = match with_timeout(options.connect_timeout, "connect", connector.connect()).await {
        Ok(store) => store,
        Err(source) => {
            error!(key = %key, error = %source, "[RELAY] Could not connect to backing store");
            let undelivered = seal(&rx, &gate, Vec::new()).await;
            emit(
                events.as_ref(),
                RelayEvent::Aborted {
                    undelivered: undelivered.len(),
                    reason: source.to_string(),
                },
            );
            return Err(RelayError::Aborted {
                source,
                undelivered,
            });
        }
    };

    emit(events.as_ref(), RelayEvent::Connected);

    RelayWorker::new(key, rx, gate, store, options, events)
        .run()
        .await
}

/// Close the gate and collect every accepted message still queued.
///
/// Producers may be blocked mid-send while holding the gate, so the queue
/// keeps draining until the gate can be taken exclusively.
async fn seal(rx: &Receiver<Envelope>, gate: &Gate, mut undelivered: Vec<Message>) -> Vec<Message> {
    loop {
        undelivered.extend(rx.try_iter().filter_map(Envelope::into_payload));
        if gate.try_seal() {
            undelivered.extend(rx.try_iter().filter_map(Envelope::into_payload));
            return undelivered;
        }
        sleep(Duration::from_millis(1)).await;
    }
}

fn emit(events: Option<&RelayEventSender>, event: RelayEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}

/// Control loop state for a connected relay.
pub(crate) struct RelayWorker<S: BackingStore> {
    key: Arc<str>,
    rx: Receiver<Envelope>,
    gate: Arc<Gate>,
    store: S,
    window: WindowBuffer,
    timer: FlushTimer,
    options: RelayOptions,
    events: Option<RelayEventSender>,
    state: WorkerState,
    report: RelayReport,
    /// Tag the next flushed batch will carry
    batch: BatchTag,
}

impl<S: BackingStore> RelayWorker<S> {
    pub(crate) fn new(
        key: Arc<str>,
        rx: Receiver<Envelope>,
        gate: Arc<Gate>,
        store: S,
        options: RelayOptions,
        events: Option<RelayEventSender>,
    ) -> Self {
        let window = WindowBuffer::with_capacity(rx.capacity().unwrap_or(0));
        let timer = FlushTimer::new(options.flush_window);
        Self {
            key,
            rx,
            gate,
            store,
            window,
            timer,
            options,
            events,
            state: WorkerState::Connecting,
            report: RelayReport::default(),
            batch: BatchTag::new(rand::random(), 1),
        }
    }

    pub(crate) async fn run(mut self) -> RelayResult<RelayReport> {
        if self.options.purge_on_start {
            let purged = with_timeout(
                self.options.io_timeout,
                "delete_key",
                self.store.delete_key(&self.key),
            )
            .await;
            if let Err(e) = purged {
                return Err(self.abort(e).await);
            }
            debug!(key = %self.key, "[RELAY] Purged remote queue");
            self.emit(RelayEvent::Purged);
        }

        self.transition(WorkerState::Running);

        loop {
            match self.next_wake().await {
                Wake::Envelope(Envelope::Data(msg)) => {
                    trace!(key = %self.key, len = msg.len(), "[RELAY] Appending");
                    self.window.push(msg);
                }
                Wake::Envelope(Envelope::Close) | Wake::Disconnected => break,
                Wake::FlushDue => {
                    if let Err(e) = self.flush().await {
                        return Err(self.abort(e).await);
                    }
                }
            }
        }

        self.transition(WorkerState::Closing);
        self.emit(RelayEvent::Closing);

        if let Err(e) = self.flush().await {
            return Err(self.abort(e).await);
        }

        self.transition(WorkerState::Closed);
        self.emit(RelayEvent::Closed {
            delivered: self.report.delivered,
        });
        debug!(
            key = %self.key,
            delivered = self.report.delivered,
            batches = self.report.batches,
            "[RELAY] Closed, releasing backing store connection"
        );
        Ok(self.report)
    }

    async fn next_wake(&mut self) -> Wake {
        use futures::{select, FutureExt};

        select! {
            msg = self.rx.recv_async().fuse() => match msg {
                Ok(envelope) => Wake::Envelope(envelope),
                Err(_) => Wake::Disconnected,
            },
            () = self.timer.tick().fuse() => Wake::FlushDue,
        }
    }

    /// Push the whole window as one batch, retrying retryable failures.
    ///
    /// The window is cleared only after the store acknowledged the batch.
    async fn flush(&mut self) -> StoreResult<()> {
        if self.window.is_empty() {
            return Ok(());
        }

        let messages = self.window.len();
        let bytes = self.window.bytes();
        debug!(key = %self.key, messages, bytes, "[RELAY] Flushing");

        let tag = self.batch;
        let mut retry = RetryState::new(&self.options);
        // Set once an attempt failed: the batch may have landed anyway.
        let mut unsure = false;
        loop {
            let attempt = if unsure {
                self.committed(tag).await
            } else {
                self.push(tag).await.map(|()| true)
            };

            let err = match attempt {
                Ok(true) => break,
                Ok(false) => {
                    unsure = false;
                    continue;
                }
                Err(e) => e,
            };
            if !err.is_retryable() {
                return Err(err);
            }
            unsure = true;
            let Some(delay) = retry.next_delay() else {
                warn!(key = %self.key, budget = retry.budget(), "[RELAY] Retry budget exhausted");
                return Err(err);
            };

            self.report.retries += 1;
            warn!(
                key = %self.key,
                attempt = retry.attempt(),
                ?delay,
                error = %err,
                "[RELAY] Flush failed, retrying"
            );
            self.emit(RelayEvent::Retrying {
                attempt: retry.attempt(),
                delay,
                reason: err.to_string(),
            });

            sleep(delay).await;

            let reconnected = with_timeout(
                self.options.connect_timeout,
                "reconnect",
                self.store.reconnect(),
            )
            .await;
            if let Err(e) = reconnected {
                // The next attempt reports the dead connection and spends budget.
                warn!(key = %self.key, error = %e, "[RELAY] Reconnect failed");
                if !e.is_retryable() {
                    return Err(e);
                }
            }
        }

        self.batch = tag.next();
        self.window.clear();
        self.report.delivered += messages as u64;
        self.report.batches += 1;
        self.emit(RelayEvent::Flushed { messages, bytes });
        Ok(())
    }

    async fn push(&mut self, tag: BatchTag) -> StoreResult<()> {
        with_timeout(
            self.options.io_timeout,
            "push_batch",
            self.store.push_batch(&self.key, tag, self.window.as_slice()),
        )
        .await
    }

    /// Whether `tag` is the last batch the store committed for this key.
    async fn committed(&mut self, tag: BatchTag) -> StoreResult<bool> {
        let last = with_timeout(
            self.options.io_timeout,
            "last_batch",
            self.store.last_batch(&self.key),
        )
        .await?;
        let landed = last == Some(tag);
        if landed {
            debug!(key = %self.key, %tag, "[RELAY] Batch already committed, not pushing again");
        } else {
            trace!(key = %self.key, %tag, "[RELAY] Batch not committed, pushing again");
        }
        Ok(landed)
    }

    async fn abort(&mut self, source: StoreError) -> RelayError {
        let undelivered = seal(&self.rx, &self.gate, self.window.take()).await;
        error!(
            key = %self.key,
            state = ?self.state,
            undelivered = undelivered.len(),
            error = %source,
            "[RELAY] Aborting"
        );
        self.emit(RelayEvent::Aborted {
            undelivered: undelivered.len(),
            reason: source.to_string(),
        });
        self.state = WorkerState::Closed;
        RelayError::Aborted {
            source,
            undelivered,
        }
    }

    fn transition(&mut self, next: WorkerState) {
        trace!(key = %self.key, from = ?self.state, to = ?next, "[RELAY] State change");
        self.state = next;
    }

    fn emit(&self, event: RelayEvent) {
        emit(self.events.as_ref(), event);
    }
}

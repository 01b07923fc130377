//! In-process backing store.
//!
//! `MemoryStore` keeps named lists in memory behind one lock. A batch push
//! happens entirely under that lock, so readers never observe a prefix.
//! Clones share the same lists, which lets a test (or an embedding
//! application) hand one clone to the relay and inspect another.
//!
//! Fault injection:
//! - `fail_next_pushes(n)`: the next `n` pushes fail with a retryable
//!   transport error before touching any list.
//! - `lose_next_acks(n)`: the next `n` pushes are applied, then reported as
//!   a transport error, like a connection lost after the commit.

use super::{BackingStore, BatchTag, Connect};
use crate::error::{StoreError, StoreResult};
use crate::message::Message;
use async_trait::async_trait;
use flume::Sender;
use hashbrown::HashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

#[derive(Debug, Default)]
struct State {
    lists: HashMap<String, VecDeque<Message>>,
    /// Last committed batch per list
    batches: HashMap<String, BatchTag>,
    /// Wakers for blocked `pop_blocking` calls, fired on every push
    waiters: Vec<Sender<()>>,
    failures_pending: usize,
    lost_acks_pending: usize,
    push_calls: usize,
    failed_pushes: usize,
    reconnects: usize,
}

/// Shared in-memory list store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the list under `key`, oldest first.
    #[must_use]
    pub fn snapshot(&self, key: &str) -> Vec<Message> {
        self.state
            .lock()
            .lists
            .get(key)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self, key: &str) -> usize {
        self.state.lock().lists.get(key).map_or(0, VecDeque::len)
    }

    /// Check if the list under `key` is empty or missing.
    #[must_use]
    pub fn is_empty(&self, key: &str) -> bool {
        self.len(key) == 0
    }

    /// Seed a list directly, bypassing `push_all` accounting.
    pub fn seed<I>(&self, key: &str, values: I)
    where
        I: IntoIterator<Item = Message>,
    {
        let mut state = self.state.lock();
        state
            .lists
            .entry(key.to_string())
            .or_default()
            .extend(values);
        wake_all(&mut state.waiters);
    }

    /// Make the next `n` pushes fail with a transport error.
    pub fn fail_next_pushes(&self, n: usize) {
        self.state.lock().failures_pending = n;
    }

    /// Make the next `n` pushes commit but report a transport error.
    pub fn lose_next_acks(&self, n: usize) {
        self.state.lock().lost_acks_pending = n;
    }

    /// Last batch recorded for `key` by `push_batch`.
    #[must_use]
    pub fn batch_tag(&self, key: &str) -> Option<BatchTag> {
        self.state.lock().batches.get(key).copied()
    }

    /// Number of blocked `pop_blocking` calls still registered.
    #[must_use]
    pub fn waiting_pops(&self) -> usize {
        self.state.lock().waiters.len()
    }

    /// Number of push calls that carried at least one value.
    #[must_use]
    pub fn push_calls(&self) -> usize {
        self.state.lock().push_calls
    }

    /// Number of pushes rejected by fault injection.
    #[must_use]
    pub fn failed_pushes(&self) -> usize {
        self.state.lock().failed_pushes
    }

    /// Number of `reconnect` calls received.
    #[must_use]
    pub fn reconnects(&self) -> usize {
        self.state.lock().reconnects
    }
}

fn wake_all(waiters: &mut Vec<Sender<()>>) {
    for waiter in waiters.drain(..) {
        let _ = waiter.try_send(());
    }
}

impl MemoryStore {
    /// Append `values` under one lock, honoring injected faults.
    fn apply(&self, key: &str, tag: Option<BatchTag>, values: &[Message]) -> StoreResult<()> {
        if values.is_empty() {
            return Ok(());
        }

        let mut state = self.state.lock();
        state.push_calls += 1;

        if state.failures_pending > 0 {
            state.failures_pending -= 1;
            state.failed_pushes += 1;
            return Err(StoreError::Transport(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "injected push failure",
            )));
        }

        state
            .lists
            .entry(key.to_string())
            .or_default()
            .extend(values.iter().cloned());
        if let Some(tag) = tag {
            state.batches.insert(key.to_string(), tag);
        }
        wake_all(&mut state.waiters);

        if state.lost_acks_pending > 0 {
            state.lost_acks_pending -= 1;
            return Err(StoreError::Transport(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "injected lost acknowledgement",
            )));
        }
        Ok(())
    }
}

#[async_trait(?Send)]
impl BackingStore for MemoryStore {
    async fn push_all(&mut self, key: &str, values: &[Message]) -> StoreResult<()> {
        self.apply(key, None, values)
    }

    async fn push_batch(&mut self, key: &str, tag: BatchTag, values: &[Message]) -> StoreResult<()> {
        self.apply(key, Some(tag), values)
    }

    async fn last_batch(&mut self, key: &str) -> StoreResult<Option<BatchTag>> {
        Ok(self.batch_tag(key))
    }

    async fn pop_blocking(&mut self, key: &str) -> StoreResult<Message> {
        loop {
            let wake = {
                let mut state = self.state.lock();
                if let Some(value) = state.lists.get_mut(key).and_then(VecDeque::pop_front) {
                    return Ok(value);
                }
                // Pops cancelled by a timeout leave dead wakers behind.
                state.waiters.retain(|w| !w.is_disconnected());
                let (tx, rx) = flume::bounded(1);
                state.waiters.push(tx);
                rx
            };
            // A closed waker only means the store was dropped mid-wait; re-check.
            let _ = wake.recv_async().await;
        }
    }

    async fn delete_key(&mut self, key: &str) -> StoreResult<()> {
        self.state.lock().lists.remove(key);
        Ok(())
    }

    async fn reconnect(&mut self) -> StoreResult<()> {
        self.state.lock().reconnects += 1;
        Ok(())
    }
}

#[async_trait(?Send)]
impl Connect for MemoryStore {
    type Store = Self;

    async fn connect(self) -> StoreResult<Self> {
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::time::Duration;

    fn msgs(values: &[&'static str]) -> Vec<Message> {
        values.iter().map(|v| Bytes::from_static(v.as_bytes())).collect()
    }

    #[compio::test]
    async fn push_appends_in_order() {
        let mut store = MemoryStore::new();
        store.push_all("q", &msgs(&["a", "b"])).await.unwrap();
        store.push_all("q", &msgs(&["c"])).await.unwrap();

        assert_eq!(store.snapshot("q"), msgs(&["a", "b", "c"]));
        assert_eq!(store.push_calls(), 2);
    }

    #[compio::test]
    async fn empty_push_is_not_counted() {
        let mut store = MemoryStore::new();
        store.push_all("q", &[]).await.unwrap();
        assert_eq!(store.push_calls(), 0);
        assert!(store.is_empty("q"));
    }

    #[compio::test]
    async fn injected_failure_leaves_no_prefix() {
        let mut store = MemoryStore::new();
        store.fail_next_pushes(1);

        let err = store.push_all("q", &msgs(&["a", "b", "c"])).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(store.is_empty("q"));
        assert_eq!(store.failed_pushes(), 1);

        store.push_all("q", &msgs(&["a", "b", "c"])).await.unwrap();
        assert_eq!(store.snapshot("q"), msgs(&["a", "b", "c"]));
    }

    #[compio::test]
    async fn pop_returns_oldest_first() {
        let mut store = MemoryStore::new();
        store.seed("q", msgs(&["first", "second"]));

        assert_eq!(store.pop_blocking("q").await.unwrap(), Bytes::from("first"));
        assert_eq!(store.pop_blocking("q").await.unwrap(), Bytes::from("second"));
        assert!(store.is_empty("q"));
    }

    #[compio::test]
    async fn pop_blocks_until_push() {
        let store = MemoryStore::new();
        let mut reader = store.clone();
        let mut writer = store.clone();

        let pusher = compio::runtime::spawn(async move {
            crate::timeout::sleep(Duration::from_millis(20)).await;
            writer.push_all("q", &msgs(&["late"])).await.unwrap();
        });

        assert_eq!(reader.pop_blocking("q").await.unwrap(), Bytes::from("late"));
        let _ = pusher.await;
    }

    #[compio::test]
    async fn lost_ack_still_commits_batch_and_tag() {
        let mut store = MemoryStore::new();
        store.lose_next_acks(1);
        let tag = BatchTag::new(7, 1);

        let err = store.push_batch("q", tag, &msgs(&["a", "b"])).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(store.snapshot("q"), msgs(&["a", "b"]));
        assert_eq!(store.last_batch("q").await.unwrap(), Some(tag));
    }

    #[compio::test]
    async fn failed_push_records_no_tag() {
        let mut store = MemoryStore::new();
        store.fail_next_pushes(1);

        let _ = store.push_batch("q", BatchTag::new(7, 1), &msgs(&["a"])).await;
        assert_eq!(store.last_batch("q").await.unwrap(), None);
    }

    #[compio::test]
    async fn timed_out_pops_do_not_accumulate() {
        let store = MemoryStore::new();
        for _ in 0..50 {
            let mut reader = store.clone();
            let pop = crate::timeout::with_timeout(Some(Duration::from_millis(1)), "pop", async move {
                reader.pop_blocking("idle").await
            })
            .await;
            assert!(pop.is_err());
        }
        assert!(store.waiting_pops() <= 1, "{}", store.waiting_pops());
    }

    #[compio::test]
    async fn delete_is_idempotent() {
        let mut store = MemoryStore::new();
        store.seed("q", msgs(&["x"]));
        store.delete_key("q").await.unwrap();
        store.delete_key("q").await.unwrap();
        assert!(store.is_empty("q"));
    }
}

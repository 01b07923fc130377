//! Timers and deadlines for the relay worker
//!
//! Every wait in the worker (flush ticks, store deadlines, retry backoff)
//! goes through `futures-timer` rather than compio's timer wheel. compio
//! 0.10 fires its timers latest-deadline first and keeps cancelled entries
//! until they expire, so a pending 5s store deadline would hold back a 40ms
//! flush tick for the full 5s.

use crate::error::{StoreError, StoreResult};
use futures::future::{select, Either};
use futures_timer::Delay;
use std::future::Future;
use std::pin::pin;
use std::time::{Duration, Instant};

/// Wait for `duration`.
pub async fn sleep(duration: Duration) {
    Delay::new(duration).await;
}

/// Wait until `deadline`; returns at once if it already passed.
pub async fn sleep_until(deadline: Instant) {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if !remaining.is_zero() {
        Delay::new(remaining).await;
    }
}

/// Run a store operation with an optional deadline.
///
/// # Arguments
///
/// * `duration` - Maximum time to wait
///    - `None`: Block indefinitely (no timeout)
///    - `Some(duration)`: Wait up to duration
/// * `op` - Operation name reported in `StoreError::Timeout`
///
/// # Returns
///
/// * The operation's own result if it completed in time
/// * `Err(StoreError::Timeout)` if the deadline elapsed; the operation's
///   future is dropped, which poisons connection-based clients
pub async fn with_timeout<F, T>(duration: Option<Duration>, op: &'static str, fut: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    let Some(limit) = duration else {
        return fut.await;
    };

    match select(pin!(fut), Delay::new(limit)).await {
        Either::Left((result, _)) => result,
        Either::Right(((), _)) => Err(StoreError::Timeout { op, after: limit }),
    }
}

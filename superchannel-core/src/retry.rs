//! Retry budget with exponential backoff.
//!
//! Used by the relay worker when a flush fails with a retryable store error:
//! wait, reconnect, push the same batch again.

use crate::options::RelayOptions;
use rand::Rng;
use std::time::Duration;

/// Retry state for one flush.
///
/// Tracks attempts against the configured budget and computes the backoff
/// delay, doubling from `retry_ivl` up to `retry_ivl_max`.
///
/// # Example
///
/// ```rust
/// use superchannel_core::retry::RetryState;
/// use superchannel_core::options::RelayOptions;
/// use std::time::Duration;
///
/// let options = RelayOptions::default()
///     .with_retry_ivl(Duration::from_millis(100))
///     .with_retry_ivl_max(Duration::from_secs(10))
///     .with_retry_budget(3);
///
/// let mut retry = RetryState::new(&options);
///
/// assert_eq!(retry.next_delay(), Some(Duration::from_millis(100)));
/// assert_eq!(retry.next_delay(), Some(Duration::from_millis(200)));
/// assert_eq!(retry.next_delay(), Some(Duration::from_millis(400)));
///
/// // Budget spent
/// assert_eq!(retry.next_delay(), None);
/// ```
#[derive(Debug, Clone)]
pub struct RetryState {
    /// Base retry interval
    base_interval: Duration,
    /// Maximum retry interval
    max_interval: Duration,
    /// Retries allowed
    budget: u32,
    /// Retries handed out so far
    attempt: u32,
    /// Delay the next retry will use (before jitter)
    current_interval: Duration,
    jitter: bool,
}

impl RetryState {
    /// Create a fresh retry state from relay options.
    #[must_use]
    pub fn new(options: &RelayOptions) -> Self {
        Self {
            base_interval: options.retry_ivl,
            max_interval: options.retry_ivl_max.max(options.retry_ivl),
            budget: options.retry_budget,
            attempt: 0,
            current_interval: options.retry_ivl,
            jitter: options.retry_jitter,
        }
    }

    /// Delay before the next retry, or `None` once the budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.budget {
            return None;
        }

        let delay = self.current_interval;

        self.attempt += 1;
        self.current_interval = self
            .base_interval
            .checked_mul(1_u32 << self.attempt.min(10))
            .map_or(self.max_interval, |next| next.min(self.max_interval));

        if self.jitter {
            Some(jittered(delay))
        } else {
            Some(delay)
        }
    }

    /// Reset after a successful flush.
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.current_interval = self.base_interval;
    }

    #[inline]
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    #[inline]
    #[must_use]
    pub const fn budget(&self) -> u32 {
        self.budget
    }

    #[inline]
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.attempt >= self.budget
    }
}

/// Pick a delay uniformly from `[delay/2, delay]`.
fn jittered(delay: Duration) -> Duration {
    let half = delay / 2;
    let spread = (delay - half).as_micros() as u64;
    if spread == 0 {
        return delay;
    }
    half + Duration::from_micros(rand::thread_rng().gen_range(0..=spread))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(base_ms: u64, max_ms: u64, budget: u32) -> RelayOptions {
        RelayOptions::default()
            .with_retry_ivl(Duration::from_millis(base_ms))
            .with_retry_ivl_max(Duration::from_millis(max_ms))
            .with_retry_budget(budget)
    }

    #[test]
    fn test_exponential_backoff() {
        let mut state = RetryState::new(&options(100, 10_000, 10));

        assert_eq!(state.next_delay(), Some(Duration::from_millis(100)));
        assert_eq!(state.attempt(), 1);
        assert_eq!(state.next_delay(), Some(Duration::from_millis(200)));
        assert_eq!(state.next_delay(), Some(Duration::from_millis(400)));
        assert_eq!(state.next_delay(), Some(Duration::from_millis(800)));
        assert_eq!(state.attempt(), 4);
    }

    #[test]
    fn test_max_interval_cap() {
        let mut state = RetryState::new(&options(100, 500, 10));

        assert_eq!(state.next_delay(), Some(Duration::from_millis(100)));
        assert_eq!(state.next_delay(), Some(Duration::from_millis(200)));
        assert_eq!(state.next_delay(), Some(Duration::from_millis(400)));
        assert_eq!(state.next_delay(), Some(Duration::from_millis(500)));
        assert_eq!(state.next_delay(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_budget_exhaustion_and_reset() {
        let mut state = RetryState::new(&options(10, 1_000, 2));

        assert!(state.next_delay().is_some());
        assert!(state.next_delay().is_some());
        assert!(state.is_exhausted());
        assert_eq!(state.next_delay(), None);

        state.reset();
        assert_eq!(state.attempt(), 0);
        assert_eq!(state.next_delay(), Some(Duration::from_millis(10)));
    }

    #[test]
    fn test_zero_budget_never_retries() {
        let mut state = RetryState::new(&options(10, 1_000, 0));
        assert_eq!(state.next_delay(), None);
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let opts = options(100, 1_000, 50).with_retry_jitter(true);
        let mut state = RetryState::new(&opts);
        let mut unjittered = RetryState::new(&opts.clone().with_retry_jitter(false));

        for _ in 0..20 {
            let got = state.next_delay().unwrap();
            let full = unjittered.next_delay().unwrap();
            assert!(got >= full / 2 && got <= full, "{got:?} outside [{:?}, {full:?}]", full / 2);
        }
    }

    #[test]
    fn huge_interval_saturates_at_max() {
        let opts = RelayOptions::default()
            .with_retry_ivl(Duration::from_secs(u64::MAX))
            .with_retry_ivl_max(Duration::MAX)
            .with_retry_budget(4)
            .with_retry_jitter(false);
        let mut retry = RetryState::new(&opts);

        assert_eq!(retry.next_delay(), Some(Duration::from_secs(u64::MAX)));
        assert_eq!(retry.next_delay(), Some(Duration::MAX));
        assert_eq!(retry.next_delay(), Some(Duration::MAX));
    }
}

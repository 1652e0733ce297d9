//! Counter store contract consumed by the rate limiter core.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Shared counter store backing the rate limiter.
///
/// Implementations must make `increment` atomic with respect to
/// concurrent callers on the same key: no lost updates, and every caller
/// observes its own post-increment count. All the coordination the
/// limiter needs lives behind this guarantee; the core itself takes no
/// locks.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increment the counter at `key` and return the
    /// post-increment count.
    ///
    /// When the increment creates the key, its time-to-live is set to
    /// `window`. The expiry must not be refreshed on later increments, so
    /// the window stays anchored at the identifier's first request.
    async fn increment(&self, key: &str, window: Duration) -> Result<i64>;

    /// Whether a block marker currently exists at `key`.
    ///
    /// Absence, including absence due to natural expiry, means not
    /// blocked.
    async fn is_blocked(&self, key: &str) -> Result<bool>;

    /// Set a block marker at `key` that expires after `duration`, or
    /// clear any existing marker when `duration` is zero. Idempotent
    /// either way.
    async fn set_block(&self, key: &str, duration: Duration) -> Result<()>;
}

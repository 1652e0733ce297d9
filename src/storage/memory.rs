//! In-process counter store.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use crate::error::Result;
use crate::ratelimit::CounterStore;

/// A fixed-window counter and its expiry.
#[derive(Debug, Clone, Copy)]
struct CounterEntry {
    count: i64,
    expires_at: Instant,
}

/// Counter store held entirely in process memory.
///
/// Counters are not shared across processes, so this backend suits tests
/// and single-instance deployments only. Expiry runs on the tokio clock,
/// which lets tests pause and advance time.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    counters: DashMap<String, CounterEntry>,
    blocks: DashMap<String, Instant>,
}

impl MemoryCounterStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop counters and block markers whose expiry has passed.
    ///
    /// Entries expire lazily on access; long-running processes call this
    /// periodically so idle keys do not accumulate.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.counters.retain(|_, entry| entry.expires_at > now);
        self.blocks.retain(|_, until| *until > now);
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<i64> {
        let now = Instant::now();
        let mut entry = self
            .counters
            .entry(key.to_string())
            .or_insert(CounterEntry {
                count: 0,
                expires_at: now + window,
            });
        if entry.expires_at <= now {
            // Window elapsed: restart it, anchored at this request.
            entry.count = 0;
            entry.expires_at = now + window;
        }
        entry.count += 1;
        Ok(entry.count)
    }

    async fn is_blocked(&self, key: &str) -> Result<bool> {
        let now = Instant::now();
        if let Some(until) = self.blocks.get(key).map(|entry| *entry.value()) {
            if until > now {
                return Ok(true);
            }
            self.blocks.remove_if(key, |_, until| *until <= now);
        }
        Ok(false)
    }

    async fn set_block(&self, key: &str, duration: Duration) -> Result<()> {
        if duration.is_zero() {
            self.blocks.remove(key);
        } else {
            self.blocks.insert(key.to_string(), Instant::now() + duration);
        }
        Ok(())
    }
}

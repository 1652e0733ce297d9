//! Concrete counter store implementations.

mod memory;
mod redis;

pub use self::memory::MemoryCounterStore;
pub use self::redis::RedisCounterStore;

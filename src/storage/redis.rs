//! Redis-backed counter store.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use tracing::debug;

use crate::error::Result;
use crate::ratelimit::CounterStore;

/// Atomic increment-with-expiry.
///
/// The TTL is armed only when `INCR` creates the key, so the counting
/// window stays anchored at the identifier's first request instead of
/// sliding forward on every hit. Running it server-side keeps the
/// read-and-arm step atomic under concurrent callers.
const INCREMENT_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
return count
"#;

/// Counter store backed by a shared Redis server.
///
/// All instances of the service pointed at the same server enforce one
/// budget per identifier.
pub struct RedisCounterStore {
    connection: ConnectionManager,
    increment_script: Script,
}

impl RedisCounterStore {
    /// Connect to the Redis server at `url` and verify the connection.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = Client::open(url)?;
        let mut connection = client.get_connection_manager().await?;

        let _: String = redis::cmd("PING").query_async(&mut connection).await?;
        debug!(url = %url, "Connected to Redis");

        Ok(Self {
            connection,
            increment_script: Script::new(INCREMENT_SCRIPT),
        })
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<i64> {
        let mut connection = self.connection.clone();
        let count: i64 = self
            .increment_script
            .key(key)
            .arg(window.as_millis() as u64)
            .invoke_async(&mut connection)
            .await?;
        Ok(count)
    }

    async fn is_blocked(&self, key: &str) -> Result<bool> {
        let mut connection = self.connection.clone();
        let exists: bool = connection.exists(key).await?;
        Ok(exists)
    }

    async fn set_block(&self, key: &str, duration: Duration) -> Result<()> {
        let mut connection = self.connection.clone();
        if duration.is_zero() {
            let _: () = connection.del(key).await?;
        } else {
            let _: () = redis::cmd("SET")
                .arg(key)
                .arg(1)
                .arg("PX")
                .arg(duration.as_millis() as u64)
                .query_async(&mut connection)
                .await?;
        }
        Ok(())
    }
}

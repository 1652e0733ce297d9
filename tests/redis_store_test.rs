//! Integration tests against a live Redis server.
//!
//! These are ignored by default; run them with a server available:
//!
//! ```text
//! REDIS_URL=redis://127.0.0.1:6379 cargo test -- --ignored
//! ```

use std::time::Duration;

use turnstile::ratelimit::CounterStore;
use turnstile::storage::RedisCounterStore;

fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
}

fn unique_key(suffix: &str) -> String {
    format!("turnstile:test:{}:{}", std::process::id(), suffix)
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn test_increment_returns_post_increment_count() {
    let store = RedisCounterStore::connect(&redis_url()).await.unwrap();
    let key = unique_key("counter");

    assert_eq!(store.increment(&key, Duration::from_secs(60)).await.unwrap(), 1);
    assert_eq!(store.increment(&key, Duration::from_secs(60)).await.unwrap(), 2);
    assert_eq!(store.increment(&key, Duration::from_secs(60)).await.unwrap(), 3);
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn test_counter_expires_after_window() {
    let store = RedisCounterStore::connect(&redis_url()).await.unwrap();
    let key = unique_key("expiry");

    assert_eq!(store.increment(&key, Duration::from_secs(1)).await.unwrap(), 1);
    // A second increment must not extend the window.
    assert_eq!(store.increment(&key, Duration::from_secs(1)).await.unwrap(), 2);

    tokio::time::sleep(Duration::from_millis(1200)).await;

    assert_eq!(store.increment(&key, Duration::from_secs(1)).await.unwrap(), 1);
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn test_block_set_check_and_clear() {
    let store = RedisCounterStore::connect(&redis_url()).await.unwrap();
    let key = unique_key("block");

    assert!(!store.is_blocked(&key).await.unwrap());

    store.set_block(&key, Duration::from_secs(60)).await.unwrap();
    assert!(store.is_blocked(&key).await.unwrap());

    store.set_block(&key, Duration::ZERO).await.unwrap();
    assert!(!store.is_blocked(&key).await.unwrap());
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn test_block_expires_naturally() {
    let store = RedisCounterStore::connect(&redis_url()).await.unwrap();
    let key = unique_key("block-expiry");

    store.set_block(&key, Duration::from_millis(500)).await.unwrap();
    assert!(store.is_blocked(&key).await.unwrap());

    tokio::time::sleep(Duration::from_millis(700)).await;
    assert!(!store.is_blocked(&key).await.unwrap());
}

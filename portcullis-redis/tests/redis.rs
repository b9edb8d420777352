use std::sync::Arc;

use chrono::Duration;
use portcullis_core::{
    RevocationStore,
    clock::SystemClock,
    crypto::hash_token,
    revocation::{FallbackRevocationStore, MemoryRevocationStore},
};
use portcullis_redis::{RedisRevocationConfig, RedisRevocationStore};
use testcontainers_modules::testcontainers::{ContainerAsync, runners::AsyncRunner};

async fn start_redis() -> (ContainerAsync<testcontainers_modules::redis::Redis>, RedisRevocationStore) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let container = testcontainers_modules::redis::Redis::default()
        .start()
        .await
        .unwrap();
    let host_port = container.get_host_port_ipv4(6379).await.unwrap();
    let config = RedisRevocationConfig::new(format!("redis://127.0.0.1:{host_port}"));
    let store = RedisRevocationStore::connect(config).await.unwrap();
    (container, store)
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_redis_add_and_contains() {
    let (_container, store) = start_redis().await;
    let key = hash_token("header.payload.signature");

    assert!(!store.contains(&key).await.unwrap());
    assert!(store.add(&key, Duration::minutes(5)).await.unwrap());
    assert!(store.contains(&key).await.unwrap());

    // A second add of a live key is not a new revocation
    assert!(!store.add(&key, Duration::minutes(5)).await.unwrap());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_redis_entry_expires() {
    let (_container, store) = start_redis().await;
    let key = hash_token("short.lived.token");

    store.add(&key, Duration::seconds(1)).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(2100)).await;

    assert!(!store.contains(&key).await.unwrap());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_redis_concurrent_adds_have_one_winner() {
    let (_container, store) = start_redis().await;
    let key = hash_token("refresh.token.replayed");

    let tasks: Vec<_> = (0..10)
        .map(|_| {
            let store = store.clone();
            let key = key.clone();
            tokio::spawn(async move { store.add(&key, Duration::minutes(1)).await.unwrap() })
        })
        .collect();

    let mut winners = 0;
    for task in tasks {
        if task.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_revocations_are_shared_between_stores() {
    let (_container, first) = start_redis().await;
    let second = first.clone();
    let key = hash_token("shared.across.instances");

    first.add(&key, Duration::minutes(1)).await.unwrap();
    assert!(second.contains(&key).await.unwrap());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_fallback_over_redis_writes_through() {
    let (_container, redis) = start_redis().await;
    let local = MemoryRevocationStore::new(Arc::new(SystemClock));
    let store = FallbackRevocationStore::new(redis.clone(), local);
    let key = hash_token("fallback.primary.path");

    assert!(store.add(&key, Duration::minutes(1)).await.unwrap());
    assert!(redis.contains(&key).await.unwrap());
    assert!(store.contains(&key).await.unwrap());
}

//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 存储契约测试
//!
//! 使用mockall模拟存储后端，验证客户端对存储的调用次数与错误传播

#[path = "../common/mod.rs"]
mod common;

use async_trait::async_trait;
use cacheguard::config::LockPoolConfig;
use cacheguard::serialization::SerializerEnum;
use cacheguard::{
    CacheAsideClient, CacheError, CacheStorage, DefaultExpirationSettings, ExpirationLevel,
    ExpirationSpec, ResolvedExpiration, Result,
};
use common::setup_logging;
use mockall::mock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

mock! {
    pub Storage {}

    #[async_trait]
    impl CacheStorage for Storage {
        async fn try_get(&self, key: &str, cancel: &CancellationToken) -> Result<Option<Vec<u8>>>;
        async fn try_set(
            &self,
            key: &str,
            value: Vec<u8>,
            expiration: ResolvedExpiration,
            cancel: &CancellationToken,
        ) -> Result<()>;
        async fn remove(&self, key: &str, cancel: &CancellationToken) -> Result<()>;
        async fn clear_all(&self, cancel: &CancellationToken) -> Result<()>;
    }
}

fn client_over(storage: MockStorage) -> CacheAsideClient {
    CacheAsideClient::new(
        "contract",
        Arc::new(storage),
        Arc::new(DefaultExpirationSettings),
        SerializerEnum::default(),
        &LockPoolConfig::default(),
    )
}

#[tokio::test]
async fn test_hit_takes_no_lock_and_writes_nothing() {
    setup_logging();
    let mut storage = MockStorage::new();
    storage
        .expect_try_get()
        .times(1)
        .returning(|_, _| Ok(Some(serde_json::to_vec(&42u32).unwrap())));
    storage.expect_try_set().never();

    let client = client_over(storage);
    let loads = AtomicUsize::new(0);
    let loads = &loads;

    let value = client
        .get_or_set(
            "k",
            move || async move {
                loads.fetch_add(1, Ordering::SeqCst);
                Ok(Some(0u32))
            },
            ExpirationSpec::None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(value, Some(42));
    assert_eq!(loads.load(Ordering::SeqCst), 0);
    assert_eq!(client.metrics().lock_wait_count(), 0);
    assert_eq!(client.metrics().count("get_or_set", "hit"), 1);
}

#[tokio::test]
async fn test_loader_failure_writes_nothing() {
    setup_logging();
    let mut storage = MockStorage::new();
    // 加锁前读一次，加锁后再读一次
    storage.expect_try_get().times(2).returning(|_, _| Ok(None));
    storage.expect_try_set().never();

    let client = client_over(storage);
    let err = client
        .get_or_set(
            "k",
            || async { Err::<Option<u32>, _>(CacheError::loader("upstream timeout")) },
            ExpirationSpec::None,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CacheError::LoaderError(_)));
    assert_eq!(client.lock_pool().active_len(), 0);
}

#[tokio::test]
async fn test_storage_read_error_is_propagated() {
    setup_logging();
    let mut storage = MockStorage::new();
    storage
        .expect_try_get()
        .returning(|_, _| Err(CacheError::StorageError("connection reset".to_string())));
    storage.expect_try_set().never();

    let client = client_over(storage);
    let cancel = CancellationToken::new();

    match client.get::<u32>("k", &cancel).await {
        Err(CacheError::StorageError(msg)) => assert_eq!(msg, "connection reset"),
        other => panic!("unexpected result: {:?}", other),
    }

    let err = client
        .get_or_set(
            "k",
            || async { Ok(Some(0u32)) },
            ExpirationSpec::None,
            &cancel,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::StorageError(_)));
    assert_eq!(client.metrics().lock_wait_count(), 0);
    assert_eq!(client.metrics().count("load", "success"), 0);
}

#[tokio::test]
async fn test_storage_write_error_releases_lock() {
    setup_logging();
    let mut storage = MockStorage::new();
    storage.expect_try_get().returning(|_, _| Ok(None));
    storage
        .expect_try_set()
        .times(1)
        .returning(|_, _, _, _| Err(CacheError::StorageError("disk full".to_string())));

    let client = client_over(storage);
    let err = client
        .get_or_set(
            "k",
            || async { Ok(Some("v".to_string())) },
            ExpirationSpec::None,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CacheError::StorageError(msg) if msg == "disk full"));
    assert_eq!(client.lock_pool().active_len(), 0);
}

#[tokio::test]
async fn test_resolved_expiration_reaches_storage() {
    setup_logging();
    let mut storage = MockStorage::new();
    storage.expect_try_get().returning(|_, _| Ok(None));
    storage
        .expect_try_set()
        .withf(|key, _, expiration, _| {
            key == "k"
                && expiration.absolute.is_none()
                && expiration.sliding == Some(Duration::from_secs(60 * 60))
        })
        .times(1)
        .returning(|_, _, _, _| Ok(()));

    let client = client_over(storage);
    let value = client
        .get_or_set(
            "k",
            || async { Ok(Some(1u8)) },
            ExpirationSpec::SlidingLevel(ExpirationLevel::Short),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(value, Some(1));
}

#[tokio::test]
async fn test_cancelled_token_reaches_storage() {
    setup_logging();
    let mut storage = MockStorage::new();
    storage
        .expect_try_get()
        .withf(|_, cancel| cancel.is_cancelled())
        .returning(|_, _| Err(CacheError::Cancelled));

    let client = client_over(storage);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = client.get::<u32>("k", &cancel).await.unwrap_err();
    assert!(err.is_cancelled());
}

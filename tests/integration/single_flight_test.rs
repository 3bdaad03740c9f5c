//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 单飞模式集成测试

#[path = "../common/mod.rs"]
mod common;

use cacheguard::{CacheError, ExpirationLevel, ExpirationSpec};
use common::setup_logging;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, Barrier};
use tokio_util::sync::CancellationToken;

async fn run_stampede(concurrency: usize) {
    let client = Arc::new(common::memory_client("single_flight"));
    let key = common::unique_key("hot_key");
    let loads = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(concurrency));
    let mut handles = vec![];

    for _ in 0..concurrency {
        let client = client.clone();
        let key = key.clone();
        let loads = loads.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            client
                .get_or_set(
                    &key,
                    move || async move {
                        let n = loads.fetch_add(1, Ordering::SeqCst) + 1;
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok(Some(format!("value-{}", n)))
                    },
                    ExpirationSpec::SlidingLevel(ExpirationLevel::Short),
                    &CancellationToken::new(),
                )
                .await
        }));
    }

    let mut values = vec![];
    for handle in handles {
        values.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(loads.load(Ordering::SeqCst), 1, "loader should run exactly once");
    assert_eq!(values.len(), concurrency);
    assert!(values.iter().all(|v| v.as_deref() == Some("value-1")));
    assert_eq!(client.lock_pool().active_len(), 0);
    assert_eq!(client.metrics().count("load", "success"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_flight_two_callers() {
    setup_logging();
    run_stampede(2).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_flight_ten_callers() {
    setup_logging();
    run_stampede(10).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_flight_fifty_callers() {
    setup_logging();
    run_stampede(50).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_slow_key_does_not_delay_other_keys() {
    setup_logging();
    let client = Arc::new(common::memory_client("key_independence"));
    let (started_tx, started_rx) = oneshot::channel();

    let slow = {
        let client = client.clone();
        tokio::spawn(async move {
            client
                .get_or_set(
                    "slow",
                    move || async move {
                        let _ = started_tx.send(());
                        tokio::time::sleep(Duration::from_millis(1000)).await;
                        Ok(Some(1u32))
                    },
                    ExpirationSpec::None,
                    &CancellationToken::new(),
                )
                .await
        })
    };

    started_rx.await.unwrap();
    assert_eq!(client.lock_pool().waiters("slow"), 1);

    let begin = Instant::now();
    let fast = client
        .get_or_set(
            "fast",
            || async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(Some(2u32))
            },
            ExpirationSpec::None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    let elapsed = begin.elapsed();

    assert_eq!(fast, Some(2));
    assert!(
        elapsed < Duration::from_millis(500),
        "fast key took {:?} while slow key was loading",
        elapsed
    );

    assert_eq!(slow.await.unwrap().unwrap(), Some(1));
}

#[tokio::test]
async fn test_loader_failure_is_isolated() {
    setup_logging();
    let client = common::memory_client("loader_failure");
    let cancel = CancellationToken::new();

    let err = client
        .get_or_set(
            "k",
            || async { Err::<Option<u32>, _>(CacheError::loader("database unavailable")) },
            ExpirationSpec::None,
            &cancel,
        )
        .await
        .unwrap_err();
    match err {
        CacheError::LoaderError(inner) => assert_eq!(inner.to_string(), "database unavailable"),
        other => panic!("unexpected error: {:?}", other),
    }

    assert_eq!(client.get::<u32>("k", &cancel).await.unwrap(), None);
    assert_eq!(client.lock_pool().active_len(), 0);
    assert_eq!(client.metrics().count("load", "error"), 1);

    let value = client
        .get_or_set("k", || async { Ok(Some(7u32)) }, ExpirationSpec::None, &cancel)
        .await
        .unwrap();
    assert_eq!(value, Some(7));
    assert_eq!(client.get::<u32>("k", &cancel).await.unwrap(), Some(7));
}

#[tokio::test]
async fn test_none_is_returned_but_not_cached() {
    setup_logging();
    let client = common::memory_client("none_sentinel");
    let cancel = CancellationToken::new();
    let counter = AtomicUsize::new(0);
    let loads = &counter;

    for _ in 0..2 {
        let value = client
            .get_or_set(
                "missing",
                move || async move {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(None::<String>)
                },
                ExpirationSpec::None,
                &cancel,
            )
            .await
            .unwrap();
        assert_eq!(value, None);
    }

    assert_eq!(loads.load(Ordering::SeqCst), 2);
    assert_eq!(client.metrics().count("load", "none"), 2);
}

#[tokio::test]
async fn test_cancelled_waiter_leaves_loader_running() {
    setup_logging();
    let client = Arc::new(common::memory_client("cancel_waiter"));
    let (started_tx, started_rx) = oneshot::channel();

    let loader_task = {
        let client = client.clone();
        tokio::spawn(async move {
            client
                .get_or_set(
                    "k",
                    move || async move {
                        let _ = started_tx.send(());
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        Ok(Some("loaded".to_string()))
                    },
                    ExpirationSpec::None,
                    &CancellationToken::new(),
                )
                .await
        })
    };
    started_rx.await.unwrap();

    let cancel = CancellationToken::new();
    let waiter = {
        let client = client.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            client
                .get_or_set(
                    "k",
                    || async { Ok(Some("second".to_string())) },
                    ExpirationSpec::None,
                    &cancel,
                )
                .await
        })
    };

    while client.lock_pool().waiters("k") < 2 {
        tokio::task::yield_now().await;
    }
    cancel.cancel();

    let err = waiter.await.unwrap().unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(client.lock_pool().waiters("k"), 1);

    assert_eq!(
        loader_task.await.unwrap().unwrap().as_deref(),
        Some("loaded")
    );
    assert_eq!(client.lock_pool().active_len(), 0);
}

#[tokio::test]
async fn test_aborted_load_releases_lock() {
    setup_logging();
    let client = Arc::new(common::memory_client("aborted_load"));
    let (started_tx, started_rx) = oneshot::channel();

    let task = {
        let client = client.clone();
        tokio::spawn(async move {
            client
                .get_or_set(
                    "k",
                    move || async move {
                        let _ = started_tx.send(());
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        Ok(Some(0u8))
                    },
                    ExpirationSpec::None,
                    &CancellationToken::new(),
                )
                .await
        })
    };
    started_rx.await.unwrap();

    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());
    assert_eq!(client.lock_pool().active_len(), 0);

    let value = tokio::time::timeout(
        Duration::from_millis(500),
        client.get_or_set(
            "k",
            || async { Ok(Some(1u8)) },
            ExpirationSpec::None,
            &CancellationToken::new(),
        ),
    )
    .await
    .expect("lock should be available after abort")
    .unwrap();
    assert_eq!(value, Some(1));
}

#[tokio::test]
async fn test_cancel_during_load_releases_lock_and_writes_nothing() {
    setup_logging();
    let client = common::memory_client("cancel_during_load");
    let cancel = CancellationToken::new();

    let err = client
        .get_or_set(
            "k",
            {
                let cancel = cancel.clone();
                move || async move {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    cancel.cancel();
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(Some("discarded".to_string()))
                }
            },
            ExpirationSpec::None,
            &cancel,
        )
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(client.lock_pool().active_len(), 0);
    assert_eq!(client.metrics().count("load", "success"), 1);

    let fresh = CancellationToken::new();
    assert_eq!(client.get::<String>("k", &fresh).await.unwrap(), None);

    let value = client
        .get_or_set(
            "k",
            || async { Ok(Some("reloaded".to_string())) },
            ExpirationSpec::None,
            &fresh,
        )
        .await
        .unwrap();
    assert_eq!(value.as_deref(), Some("reloaded"));
    assert_eq!(
        client.get::<String>("k", &fresh).await.unwrap().as_deref(),
        Some("reloaded")
    );
    assert_eq!(client.metrics().count("load", "success"), 2);
}

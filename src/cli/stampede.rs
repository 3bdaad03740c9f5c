use crate::cli::StampedeArgs;
use crate::client::CacheAsideClient;
use crate::config::{CacheConfig, ExpirationLevel};
use crate::expiration::ExpirationSpec;
use anyhow::{ensure, Context, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Barrier;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub async fn execute(args: &StampedeArgs) -> Result<()> {
    ensure!(args.concurrency > 0, "concurrency must be greater than zero");
    ensure!(args.keys > 0, "keys must be greater than zero");

    let config = match &args.config {
        Some(path) => CacheConfig::from_file(path)
            .with_context(|| format!("Invalid configuration '{}'", path.display()))?,
        None => CacheConfig::default(),
    };
    let client = Arc::new(CacheAsideClient::from_config(&config)?);
    let loads = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(args.concurrency));
    let loader_latency = Duration::from_millis(args.loader_ms);

    info!(
        "Starting stampede: concurrency={}, keys={}, loader_ms={}",
        args.concurrency, args.keys, args.loader_ms
    );

    let started = Instant::now();
    let mut handles = Vec::with_capacity(args.concurrency);
    for i in 0..args.concurrency {
        let client = client.clone();
        let loads = loads.clone();
        let barrier = barrier.clone();
        let key = format!("stampede:{}", i % args.keys);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            let loader_key = key.clone();
            client
                .get_or_set(
                    &key,
                    move || async move {
                        loads.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(loader_latency).await;
                        Ok(Some(format!("value of {}", loader_key)))
                    },
                    ExpirationSpec::SlidingLevel(ExpirationLevel::Short),
                    &CancellationToken::new(),
                )
                .await
        }));
    }

    let mut served = 0usize;
    for handle in handles {
        if handle.await?.context("get_or_set failed")?.is_some() {
            served += 1;
        }
    }
    let elapsed = started.elapsed();

    println!("=== Stampede Result ===\n");
    println!("Callers served:     {}", served);
    println!("Loader invocations: {}", loads.load(Ordering::SeqCst));
    println!("Distinct keys:      {}", args.keys);
    println!("Elapsed:            {:?}", elapsed);
    println!(
        "Lock pool:          active={}, free={}",
        client.lock_pool().active_len(),
        client.lock_pool().free_len()
    );

    if args.metrics {
        println!("\n{}", client.metrics().render(client.service_name()));
    }

    Ok(())
}

//! cacheguard - 防击穿的旁路缓存
//!
//! 同一进程内多个调用方同时未命中同一个键时，只有一个调用方执行加载函数，
//! 其余调用方等待该键的锁并直接读取刚写入的值。按键锁来自一个可复用的锁池，
//! 活跃表的大小只与当前被争用的键数量相关。

#![doc(html_root_url = "https://docs.rs/cacheguard/0.1.0")]

pub use serde;
pub use serde::{Deserialize, Serialize};
pub use tokio;
pub use tokio_util::sync::CancellationToken;

pub mod backend;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod expiration;
pub mod metrics;
pub mod serialization;
pub mod sync;
pub mod telemetry;

pub use backend::{CacheStorage, MemoryStorage, NullStorage};
pub use client::{BlockingCache, CacheAsideClient};
pub use config::{CacheConfig, DefaultExpirationSettings, ExpirationLevel, ExpirationSettings};
pub use error::{CacheError, Result};
pub use expiration::{ExpirationSpec, ResolvedExpiration};
pub use sync::{KeyedLockPool, LockHandle};

/// cacheguard 版本号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

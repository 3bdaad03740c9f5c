//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存客户端的指标收集功能。

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// 指标收集器
///
/// 每个缓存客户端持有一份，不存在全局实例
#[derive(Debug, Default)]
pub struct CacheMetrics {
    /// 请求计数，key: "op:result"
    requests_total: Mutex<BTreeMap<String, u64>>,
    /// 锁等待耗时 (total_secs, count)
    lock_wait: Mutex<(f64, u64)>,
}

fn guard<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录请求指标
    ///
    /// # 参数
    ///
    /// * `op` - 操作类型（get/get_or_set/load/set/remove/clear）
    /// * `result` - 操作结果（hit/miss/late_hit/success/none/error）
    pub fn record_request(&self, op: &str, result: &str) {
        let mut map = guard(&self.requests_total);
        *map.entry(format!("{}:{}", op, result)).or_insert(0) += 1;
    }

    /// 记录一次锁等待耗时
    pub fn record_lock_wait(&self, elapsed: Duration) {
        let mut wait = guard(&self.lock_wait);
        wait.0 += elapsed.as_secs_f64();
        wait.1 += 1;
    }

    /// 获取某个计数
    pub fn count(&self, op: &str, result: &str) -> u64 {
        guard(&self.requests_total)
            .get(&format!("{}:{}", op, result))
            .copied()
            .unwrap_or(0)
    }

    /// 锁等待次数
    pub fn lock_wait_count(&self) -> u64 {
        guard(&self.lock_wait).1
    }

    /// 将指标格式化为文本，用于监控系统采集
    pub fn render(&self, service: &str) -> String {
        let reqs = guard(&self.requests_total);
        let (wait_total, wait_count) = *guard(&self.lock_wait);

        let mut output = String::new();
        for (k, v) in reqs.iter() {
            let (op, result) = k.split_once(':').unwrap_or((k.as_str(), ""));
            output.push_str(&format!(
                "cache_requests_total{{service=\"{}\", operation=\"{}\", result=\"{}\"}} {}\n",
                service, op, result, v
            ));
        }
        output.push_str(&format!(
            "cache_lock_wait_seconds_sum{{service=\"{}\"}} {}\n",
            service, wait_total
        ));
        output.push_str(&format!(
            "cache_lock_wait_seconds_count{{service=\"{}\"}} {}\n",
            service, wait_count
        ));
        output
    }
}

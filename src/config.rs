//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存系统的配置结构、解析逻辑以及过期等级解析。

use crate::error::{CacheError, Result};
use serde::Deserialize;
use std::path::Path;

/// 单个过期等级允许的最大分钟数（365天）
const MAX_LEVEL_MINUTES: u64 = 60 * 24 * 365;

/// 过期等级枚举
///
/// 同时用于绝对过期和滑动过期。各等级的数值历史上被注释为“秒”，
/// 但解析路径始终按“分钟”使用（`now + minutes_for(level)` 分钟）。
/// 这里保留原有数值映射，不做单位修正。
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ExpirationLevel {
    /// 10
    VeryShort,
    /// 60
    Short,
    /// 300
    Medium,
    /// 3600
    Long,
    /// 86400
    VeryLong,
}

impl ExpirationLevel {
    /// 全部等级，按从短到长排列
    pub const ALL: [ExpirationLevel; 5] = [
        ExpirationLevel::VeryShort,
        ExpirationLevel::Short,
        ExpirationLevel::Medium,
        ExpirationLevel::Long,
        ExpirationLevel::VeryLong,
    ];

    /// 等级对应的字面数值
    pub const fn literal(self) -> u64 {
        match self {
            ExpirationLevel::VeryShort => 10,
            ExpirationLevel::Short => 60,
            ExpirationLevel::Medium => 300,
            ExpirationLevel::Long => 3600,
            ExpirationLevel::VeryLong => 86400,
        }
    }

    /// 配置文件中使用的名称
    pub const fn name(self) -> &'static str {
        match self {
            ExpirationLevel::VeryShort => "very_short",
            ExpirationLevel::Short => "short",
            ExpirationLevel::Medium => "medium",
            ExpirationLevel::Long => "long",
            ExpirationLevel::VeryLong => "very_long",
        }
    }
}

/// 过期等级解析器
///
/// 将过期等级映射为分钟数，由缓存客户端在计算过期时间时调用
pub trait ExpirationSettings: Send + Sync {
    /// 获取等级对应的分钟数
    fn minutes_for(&self, level: ExpirationLevel) -> u64;
}

/// 默认过期等级解析器，直接返回等级的字面数值
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultExpirationSettings;

impl ExpirationSettings for DefaultExpirationSettings {
    fn minutes_for(&self, level: ExpirationLevel) -> u64 {
        level.literal()
    }
}

/// 过期等级配置
///
/// 可在配置文件 `[expiration]` 段中覆盖任意等级的分钟数
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ExpirationConfig {
    pub very_short: u64,
    pub short: u64,
    pub medium: u64,
    pub long: u64,
    pub very_long: u64,
}

impl Default for ExpirationConfig {
    fn default() -> Self {
        Self {
            very_short: ExpirationLevel::VeryShort.literal(),
            short: ExpirationLevel::Short.literal(),
            medium: ExpirationLevel::Medium.literal(),
            long: ExpirationLevel::Long.literal(),
            very_long: ExpirationLevel::VeryLong.literal(),
        }
    }
}

impl ExpirationSettings for ExpirationConfig {
    fn minutes_for(&self, level: ExpirationLevel) -> u64 {
        match level {
            ExpirationLevel::VeryShort => self.very_short,
            ExpirationLevel::Short => self.short,
            ExpirationLevel::Medium => self.medium,
            ExpirationLevel::Long => self.long,
            ExpirationLevel::VeryLong => self.very_long,
        }
    }
}

/// 锁池配置
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LockPoolConfig {
    /// 空闲列表中保留的可复用锁对象上限
    pub max_free_locks: usize,
}

impl Default for LockPoolConfig {
    fn default() -> Self {
        Self {
            max_free_locks: 1024,
        }
    }
}

/// 内存存储配置
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// 最大缓存条目数
    pub max_capacity: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10000,
        }
    }
}

/// 序列化类型枚举
#[derive(Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SerializationType {
    /// JSON序列化
    #[default]
    Json,
}

/// 序列化配置
#[derive(Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(default)]
pub struct SerializationConfig {
    /// 序列化格式
    pub format: SerializationType,
    /// 是否启用gzip压缩
    pub compress: bool,
}

/// 缓存客户端配置
///
/// 在启动时构建一次，并通过所有权传入客户端，不存在全局配置实例
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// 服务名称，用于日志和指标
    pub service_name: String,
    /// 过期等级
    pub expiration: ExpirationConfig,
    /// 锁池
    pub lock_pool: LockPoolConfig,
    /// 内存存储
    pub storage: StorageConfig,
    /// 序列化
    pub serialization: SerializationConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            service_name: "default".to_string(),
            expiration: ExpirationConfig::default(),
            lock_pool: LockPoolConfig::default(),
            storage: StorageConfig::default(),
            serialization: SerializationConfig::default(),
        }
    }
}

impl CacheConfig {
    /// 从TOML字符串解析并验证配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: CacheConfig =
            toml::from_str(content).map_err(|e| CacheError::ConfigError(e.to_string()))?;
        config.validate().map_err(CacheError::ConfigError)?;
        Ok(config)
    }

    /// 从TOML文件加载并验证配置
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// 验证配置
    ///
    /// 检查配置的有效性，确保所有值都在合理范围内
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.service_name.is_empty() {
            return Err("Service name cannot be empty".to_string());
        }

        if self.service_name.len() > 64 {
            return Err(format!(
                "Service name '{}' exceeds maximum length of 64 characters",
                self.service_name
            ));
        }

        for level in ExpirationLevel::ALL {
            let minutes = self.expiration.minutes_for(level);
            if minutes == 0 {
                return Err(format!("Expiration level '{}' cannot be zero", level.name()));
            }
            if minutes > MAX_LEVEL_MINUTES {
                return Err(format!(
                    "Expiration level '{}' cannot exceed 365 days ({} minutes)",
                    level.name(),
                    MAX_LEVEL_MINUTES
                ));
            }
        }

        if self.lock_pool.max_free_locks > 1_000_000 {
            return Err("lock_pool max_free_locks cannot exceed 1,000,000".to_string());
        }

        if self.storage.max_capacity == 0 {
            return Err("storage max_capacity cannot be zero".to_string());
        }

        if self.storage.max_capacity > 10_000_000 {
            return Err("storage max_capacity cannot exceed 10,000,000".to_string());
        }

        Ok(())
    }
}

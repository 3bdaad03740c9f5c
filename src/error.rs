//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存系统的错误类型和处理机制。

use thiserror::Error;

/// 缓存系统错误类型枚举
///
/// 所有错误都直接返回给调用方，任何组件都不会自动重试
#[derive(Error, Debug)]
pub enum CacheError {
    /// 取消信号在操作完成之前触发
    #[error("Operation cancelled")]
    Cancelled,

    /// 锁池已关闭
    #[error("Lock pool is closed")]
    Closed,

    /// 存储后端操作失败
    #[error("Storage error: {0}")]
    StorageError(String),

    /// 加载函数自身的失败
    #[error("Loader error: {0}")]
    LoaderError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// 配置错误
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// IO错误
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl CacheError {
    /// 将任意错误包装为加载函数错误
    pub fn loader<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        CacheError::LoaderError(err.into())
    }

    /// 是否为取消错误
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CacheError::Cancelled)
    }
}

/// 缓存操作结果类型别名
///
/// 简化错误处理，所有缓存操作都返回此类型
pub type Result<T> = std::result::Result<T, CacheError>;

//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存条目的过期描述，以及将其解析为存储层可用的过期参数的逻辑。

use crate::config::{ExpirationLevel, ExpirationSettings};
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

type AbsoluteFn<T> = Box<dyn Fn(&T) -> DateTime<Utc> + Send + Sync>;
type SlidingFn<T> = Box<dyn Fn(&T) -> Duration + Send + Sync>;
type LevelFn<T> = Box<dyn Fn(&T) -> ExpirationLevel + Send + Sync>;

/// 过期描述
///
/// 调用方每次写入时构造一个值，写入时只解析一次。
/// `*Level` 变体按分钟解析等级数值，见 [`ExpirationLevel`]。
pub enum ExpirationSpec<T> {
    /// 永不过期
    None,
    /// 固定的绝对过期时间
    Absolute(DateTime<Utc>),
    /// 滑动过期，每次命中后重新计时
    Sliding(Duration),
    /// 绝对过期：当前时间加上等级对应的分钟数
    AbsoluteLevel(ExpirationLevel),
    /// 滑动过期：等级对应的分钟数
    SlidingLevel(ExpirationLevel),
    /// 根据加载到的值计算绝对过期时间
    DynamicAbsolute(AbsoluteFn<T>),
    /// 根据加载到的值计算滑动过期时长
    DynamicSliding(SlidingFn<T>),
    /// 根据加载到的值选择绝对过期等级
    DynamicAbsoluteLevel(LevelFn<T>),
    /// 根据加载到的值选择滑动过期等级
    DynamicSlidingLevel(LevelFn<T>),
}

impl<T> ExpirationSpec<T> {
    pub fn dynamic_absolute<F>(f: F) -> Self
    where
        F: Fn(&T) -> DateTime<Utc> + Send + Sync + 'static,
    {
        ExpirationSpec::DynamicAbsolute(Box::new(f))
    }

    pub fn dynamic_sliding<F>(f: F) -> Self
    where
        F: Fn(&T) -> Duration + Send + Sync + 'static,
    {
        ExpirationSpec::DynamicSliding(Box::new(f))
    }

    pub fn dynamic_absolute_level<F>(f: F) -> Self
    where
        F: Fn(&T) -> ExpirationLevel + Send + Sync + 'static,
    {
        ExpirationSpec::DynamicAbsoluteLevel(Box::new(f))
    }

    pub fn dynamic_sliding_level<F>(f: F) -> Self
    where
        F: Fn(&T) -> ExpirationLevel + Send + Sync + 'static,
    {
        ExpirationSpec::DynamicSlidingLevel(Box::new(f))
    }

    /// 针对具体值解析过期参数
    ///
    /// # 参数
    ///
    /// * `value` - 即将写入的值
    /// * `settings` - 过期等级解析器
    /// * `now` - 计算绝对过期时间的基准时间
    ///
    /// # 返回值
    ///
    /// 返回解析后的过期参数，绝对过期与滑动过期至多设置其一
    pub fn resolve(
        &self,
        value: &T,
        settings: &dyn ExpirationSettings,
        now: DateTime<Utc>,
    ) -> ResolvedExpiration {
        match self {
            ExpirationSpec::None => ResolvedExpiration::never(),
            ExpirationSpec::Absolute(at) => ResolvedExpiration::absolute(*at),
            ExpirationSpec::Sliding(ttl) => ResolvedExpiration::sliding(*ttl),
            ExpirationSpec::AbsoluteLevel(level) => {
                ResolvedExpiration::absolute(level_deadline(*level, settings, now))
            }
            ExpirationSpec::SlidingLevel(level) => {
                ResolvedExpiration::sliding(level_duration(*level, settings))
            }
            ExpirationSpec::DynamicAbsolute(f) => ResolvedExpiration::absolute(f(value)),
            ExpirationSpec::DynamicSliding(f) => ResolvedExpiration::sliding(f(value)),
            ExpirationSpec::DynamicAbsoluteLevel(f) => {
                ResolvedExpiration::absolute(level_deadline(f(value), settings, now))
            }
            ExpirationSpec::DynamicSlidingLevel(f) => {
                ResolvedExpiration::sliding(level_duration(f(value), settings))
            }
        }
    }
}

impl<T> Default for ExpirationSpec<T> {
    fn default() -> Self {
        ExpirationSpec::None
    }
}

impl<T> fmt::Debug for ExpirationSpec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpirationSpec::None => f.write_str("None"),
            ExpirationSpec::Absolute(at) => f.debug_tuple("Absolute").field(at).finish(),
            ExpirationSpec::Sliding(ttl) => f.debug_tuple("Sliding").field(ttl).finish(),
            ExpirationSpec::AbsoluteLevel(level) => {
                f.debug_tuple("AbsoluteLevel").field(level).finish()
            }
            ExpirationSpec::SlidingLevel(level) => {
                f.debug_tuple("SlidingLevel").field(level).finish()
            }
            ExpirationSpec::DynamicAbsolute(_) => f.write_str("DynamicAbsolute(..)"),
            ExpirationSpec::DynamicSliding(_) => f.write_str("DynamicSliding(..)"),
            ExpirationSpec::DynamicAbsoluteLevel(_) => f.write_str("DynamicAbsoluteLevel(..)"),
            ExpirationSpec::DynamicSlidingLevel(_) => f.write_str("DynamicSlidingLevel(..)"),
        }
    }
}

fn level_duration(level: ExpirationLevel, settings: &dyn ExpirationSettings) -> Duration {
    Duration::from_secs(settings.minutes_for(level).saturating_mul(60))
}

fn level_deadline(
    level: ExpirationLevel,
    settings: &dyn ExpirationSettings,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let minutes = i64::try_from(settings.minutes_for(level)).unwrap_or(i64::MAX);
    chrono::Duration::try_minutes(minutes)
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// 解析后的过期参数，传递给存储后端
///
/// 两者都为空表示永不过期
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResolvedExpiration {
    /// 绝对过期时间
    pub absolute: Option<DateTime<Utc>>,
    /// 滑动过期时长
    pub sliding: Option<Duration>,
}

impl ResolvedExpiration {
    pub fn never() -> Self {
        Self::default()
    }

    pub fn absolute(at: DateTime<Utc>) -> Self {
        Self {
            absolute: Some(at),
            sliding: None,
        }
    }

    pub fn sliding(ttl: Duration) -> Self {
        Self {
            absolute: None,
            sliding: Some(ttl),
        }
    }

    pub fn is_never(&self) -> bool {
        self.absolute.is_none() && self.sliding.is_none()
    }
}

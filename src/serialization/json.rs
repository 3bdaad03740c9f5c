//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了JSON序列化器的实现。

use super::Serializer;
use crate::error::{CacheError, Result};
use serde::{de::DeserializeOwned, Serialize};

/// JSON序列化器
///
/// 基于serde_json，启用 `compression` 特性时可选gzip压缩
#[derive(Clone, Debug, Default)]
pub struct JsonSerializer {
    compress: bool,
}

impl JsonSerializer {
    pub fn new() -> Self {
        Self { compress: false }
    }

    /// 创建启用压缩的JSON序列化器，未启用 `compression` 特性时等同于 [`JsonSerializer::new`]
    pub fn with_compression() -> Self {
        Self { compress: true }
    }

    #[cfg(feature = "compression")]
    fn encode(&self, json: Vec<u8>) -> Result<Vec<u8>> {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        if !self.compress {
            return Ok(json);
        }
        let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
        encoder
            .write_all(&json)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;
        encoder
            .finish()
            .map_err(|e| CacheError::Serialization(e.to_string()))
    }

    #[cfg(not(feature = "compression"))]
    fn encode(&self, json: Vec<u8>) -> Result<Vec<u8>> {
        Ok(json)
    }

    #[cfg(feature = "compression")]
    fn decode<'a>(&self, data: &'a [u8]) -> Result<std::borrow::Cow<'a, [u8]>> {
        use flate2::read::GzDecoder;
        use std::io::Read;

        if !self.compress {
            return Ok(std::borrow::Cow::Borrowed(data));
        }
        let mut decoded = Vec::new();
        GzDecoder::new(data)
            .read_to_end(&mut decoded)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;
        Ok(std::borrow::Cow::Owned(decoded))
    }

    #[cfg(not(feature = "compression"))]
    fn decode<'a>(&self, data: &'a [u8]) -> Result<std::borrow::Cow<'a, [u8]>> {
        Ok(std::borrow::Cow::Borrowed(data))
    }
}

impl Serializer for JsonSerializer {
    fn serialize<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        let json = serde_json::to_vec(value).map_err(|e| CacheError::Serialization(e.to_string()))?;
        self.encode(json)
    }

    fn deserialize<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T> {
        let json = self.decode(data)?;
        serde_json::from_slice(&json).map_err(|e| CacheError::Serialization(e.to_string()))
    }
}

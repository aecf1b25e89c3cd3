// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use thiserror::Error;

/// 存储错误类型
#[derive(Error, Debug)]
pub enum StoreError {
    /// IO错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// 按哈希寻址的内容在任何层都不存在，调用方应视为缓存未命中并重新抓取
    #[error("Content not found")]
    NotFound,
    /// 后端错误
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// 二进制对象仓库特质
///
/// 热缓存层与冷存储层共用的键值存取契约，任何满足该契约的
/// 后端（内存、Redis类、S3类）均可互换。键下的内容一经写入
/// 即不可变，重复写入同一键是安全的空操作。
#[async_trait]
pub trait BlobRepository: Send + Sync {
    /// 使用指定键保存数据
    async fn put(&self, key: &str, data: &[u8]) -> Result<(), StoreError>;

    /// 根据键检索数据
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// 根据键删除数据
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// 检查指定键是否存在
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;
}

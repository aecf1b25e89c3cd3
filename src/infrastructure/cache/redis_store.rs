// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::domain::repositories::blob_repository::{BlobRepository, StoreError};
use crate::infrastructure::cache::redis_client::RedisClient;

/// 基于Redis的热缓存存储层
///
/// 字节以base64文本形态写入，每个键带固定TTL，到期由Redis
/// 自行清除。热缓存是纯加速层：读取方必须容忍键随时消失，
/// 回退到冷存储或内联层。
pub struct RedisBlobStore {
    client: RedisClient,
    /// 写入键的过期时间（秒）
    ttl_seconds: u64,
}

impl RedisBlobStore {
    pub fn new(client: RedisClient, ttl_seconds: u64) -> Self {
        Self {
            client,
            ttl_seconds,
        }
    }
}

#[async_trait]
impl BlobRepository for RedisBlobStore {
    async fn put(&self, key: &str, data: &[u8]) -> Result<(), StoreError> {
        let encoded = BASE64.encode(data);
        self.client
            .set(key, &encoded, self.ttl_seconds)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let value = self
            .client
            .get(key)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        match value {
            Some(encoded) => {
                let bytes = BASE64
                    .decode(encoded.as_bytes())
                    .map_err(|e| StoreError::Backend(format!("Corrupt cache entry: {}", e)))?;
                Ok(Some(bytes))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.client
            .del(key)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.client
            .exists(key)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

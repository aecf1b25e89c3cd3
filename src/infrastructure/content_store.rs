// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use metrics::counter;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::settings::CacheSettings;
use crate::domain::repositories::blob_repository::{BlobRepository, StoreError};
use crate::utils::compression;

/// 存储层级
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageTier {
    /// 内联层：哈希键控的数据库表，存放小响应体
    Inline,
    /// 冷存储层：对象存储，存放大响应体
    Cold,
}

/// 一次写入的存储结果
///
/// 响应记录据此填充存储位置元数据
#[derive(Debug, Clone)]
pub struct StoredBody {
    /// 承载响应体的层级
    pub tier: StorageTier,
    /// 冷存储对象键，仅当层级为Cold时非空
    pub s3_object_key: Option<String>,
    /// 热缓存键，仅当本次写入镜像到热缓存时非空
    pub redis_cache_key: Option<String>,
    /// 落盘形态是否压缩
    pub compressed: bool,
}

/// 内容存储
///
/// 按内容哈希寻址的分层响应体存储。同一哈希的字节在内联层与
/// 冷存储层中至多存在一份；热缓存层只作镜像加速，从不充当唯
/// 一副本。内容一经写入不可变，重复写入同一哈希是安全的空操
/// 作，因此并发写入无需加锁。
pub struct ContentStore {
    /// 内联层（数据库表）
    inline: Arc<dyn BlobRepository>,
    /// 冷存储层（对象存储），可缺省
    cold: Option<Arc<dyn BlobRepository>>,
    /// 热缓存层（Redis），可缺省
    hot: Option<Arc<dyn BlobRepository>>,
    /// 内联存储的最大字节数
    inline_max_bytes: usize,
    /// 启用压缩的最小字节数
    compress_min_bytes: usize,
}

impl ContentStore {
    pub fn new(
        inline: Arc<dyn BlobRepository>,
        cold: Option<Arc<dyn BlobRepository>>,
        hot: Option<Arc<dyn BlobRepository>>,
        settings: &CacheSettings,
    ) -> Self {
        Self {
            inline,
            cold,
            hot,
            inline_max_bytes: settings.inline_max_bytes,
            compress_min_bytes: settings.compress_min_bytes,
        }
    }

    /// 冷存储对象键
    pub fn object_key(hash: &str) -> String {
        format!("feed-bodies/{}", hash)
    }

    /// 热缓存键
    pub fn cache_key(hash: &str) -> String {
        format!("feed:body:{}", hash)
    }

    /// 是否按压缩形态落盘
    fn should_compress(&self, len: usize) -> bool {
        len >= self.compress_min_bytes
    }

    /// 存储响应体字节
    ///
    /// 幂等操作：哈希已存在于任一层时直接返回现有层级，不再写入。
    /// 否则按大小选层：低于内联阈值写内联层，超过则写冷存储。
    /// `hot`为true时额外镜像到热缓存。每次调用至多写两个物理存储。
    ///
    /// # 参数
    ///
    /// * `hash` - 响应体内容的SHA-256十六进制哈希
    /// * `bytes` - 响应体字节（解码后的文本字节）
    /// * `hot` - 是否镜像到热缓存
    pub async fn put(&self, hash: &str, bytes: &[u8], hot: bool) -> Result<StoredBody, StoreError> {
        let compressed = self.should_compress(bytes.len());
        let payload = if compressed {
            compression::deflate(bytes)?
        } else {
            bytes.to_vec()
        };

        let existing = self.existing_tier(hash).await?;
        let tier = match existing {
            Some(tier) => {
                counter!("body_store_dedup_total").increment(1);
                debug!(hash, ?tier, "Body already stored, skipping write");
                tier
            }
            None => self.write_new(hash, &payload, bytes.len()).await?,
        };

        let redis_cache_key = if hot {
            self.mirror_hot(hash, &payload).await
        } else {
            None
        };

        Ok(StoredBody {
            tier,
            s3_object_key: match tier {
                StorageTier::Cold => Some(Self::object_key(hash)),
                StorageTier::Inline => None,
            },
            redis_cache_key,
            compressed,
        })
    }

    /// 检索响应体字节
    ///
    /// 依次尝试热缓存、冷存储和内联层，返回落盘形态的字节
    /// （调用方按响应记录的压缩标记解压）。全部未命中返回None，
    /// 表示内容丢失，调用方应按缓存未命中处理并重新抓取。
    pub async fn get(&self, hash: &str) -> Result<Option<Vec<u8>>, StoreError> {
        if let Some(hot) = &self.hot {
            match hot.get(&Self::cache_key(hash)).await {
                Ok(Some(bytes)) => {
                    counter!("body_cache_hits_total", "tier" => "hot").increment(1);
                    return Ok(Some(bytes));
                }
                Ok(None) => {}
                // Hot cache is best-effort: fall through on backend errors
                Err(e) => warn!(hash, error = %e, "Hot cache read failed, falling back"),
            }
        }

        if let Some(cold) = &self.cold {
            if let Some(bytes) = cold.get(&Self::object_key(hash)).await? {
                counter!("body_cache_hits_total", "tier" => "cold").increment(1);
                return Ok(Some(bytes));
            }
        }

        if let Some(bytes) = self.inline.get(hash).await? {
            counter!("body_cache_hits_total", "tier" => "inline").increment(1);
            return Ok(Some(bytes));
        }

        counter!("body_cache_misses_total").increment(1);
        Ok(None)
    }

    /// 从热缓存中驱逐
    ///
    /// 只移除热缓存镜像；冷存储与内联副本保留
    pub async fn evict(&self, hash: &str) -> Result<(), StoreError> {
        if let Some(hot) = &self.hot {
            hot.delete(&Self::cache_key(hash)).await?;
        }
        Ok(())
    }

    async fn existing_tier(&self, hash: &str) -> Result<Option<StorageTier>, StoreError> {
        if self.inline.exists(hash).await? {
            return Ok(Some(StorageTier::Inline));
        }
        if let Some(cold) = &self.cold {
            if cold.exists(&Self::object_key(hash)).await? {
                return Ok(Some(StorageTier::Cold));
            }
        }
        Ok(None)
    }

    async fn write_new(
        &self,
        hash: &str,
        payload: &[u8],
        original_len: usize,
    ) -> Result<StorageTier, StoreError> {
        if original_len > self.inline_max_bytes {
            if let Some(cold) = &self.cold {
                cold.put(&Self::object_key(hash), payload).await?;
                return Ok(StorageTier::Cold);
            }
            warn!(
                hash,
                original_len, "No cold storage configured, storing oversized body inline"
            );
        }

        self.inline.put(hash, payload).await?;
        Ok(StorageTier::Inline)
    }

    async fn mirror_hot(&self, hash: &str, payload: &[u8]) -> Option<String> {
        let hot = self.hot.as_ref()?;
        let key = Self::cache_key(hash);
        match hot.put(&key, payload).await {
            Ok(()) => Some(key),
            // The mirror is an accelerator; losing the write is not an error
            Err(e) => {
                warn!(hash, error = %e, "Failed to mirror body into hot cache");
                None
            }
        }
    }
}

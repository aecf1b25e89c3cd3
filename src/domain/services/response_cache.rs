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

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use metrics::counter;
use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::settings::CacheSettings;
use crate::domain::models::response::{Response, ResponseHeaders};
use crate::domain::repositories::blob_repository::StoreError;
use crate::domain::repositories::request_repository::{RepositoryError, RequestRepository};
use crate::fetcher::FetchedHeaders;
use crate::infrastructure::content_store::ContentStore;
use crate::utils::{compression, text_encoding};

/// 内置的Cloudflare挑战页正文指纹
static DEFAULT_CLOUDFLARE_MARKERS: Lazy<Vec<String>> = Lazy::new(|| {
    vec![
        "Checking your browser before accessing".to_string(),
        "cf-browser-verification".to_string(),
        "Attention Required! | Cloudflare".to_string(),
        "Just a moment...".to_string(),
    ]
});

/// Cloudflare挑战页常见的状态码
const CLOUDFLARE_CHALLENGE_STATUS: [u16; 2] = [403, 503];

/// 缓存错误类型
#[derive(Error, Debug)]
pub enum CacheError {
    /// 存储层错误；NotFound表示内容丢失，调用方应重新抓取而非硬失败
    #[error(transparent)]
    Store(#[from] StoreError),
    /// 仓库错误
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    /// 落盘的压缩响应体无法解压
    #[error("Corrupt stored body: {0}")]
    Corrupt(#[from] std::io::Error),
}

/// 记录成功抓取的结果
#[derive(Debug, Clone)]
pub struct RecordedResponse {
    /// 构建好的响应记录，由调用方挂到请求上一并持久化
    pub response: Response,
    /// 响应体无法按声明的字符集解码、回退存储原始字节时为true
    pub parse_failed: bool,
}

/// 热度追踪器
///
/// 按内容哈希统计滚动窗口内的命中次数，命中达到阈值的响应体
/// 在下一次写入时被镜像到热缓存
struct HotTracker {
    hits: DashMap<String, Vec<DateTime<Utc>>>,
    threshold: u32,
    window: chrono::Duration,
}

impl HotTracker {
    fn new(threshold: u32, window_seconds: u64) -> Self {
        Self {
            hits: DashMap::new(),
            threshold,
            window: chrono::Duration::seconds(window_seconds as i64),
        }
    }

    /// 记录一次命中，返回该哈希是否已达到热度阈值
    fn observe(&self, hash: &str, now: DateTime<Utc>) -> bool {
        let mut entry = self.hits.entry(hash.to_string()).or_default();
        entry.retain(|t| now.signed_duration_since(*t) < self.window);
        entry.push(now);
        entry.len() as u32 >= self.threshold
    }
}

/// 响应缓存
///
/// 决定抓取是否必要并记录抓取结果。响应体经内容哈希去重后交由
/// 内容存储分层保存；条件请求头来自最近一次成功响应，供调用方
/// 构造 If-None-Match / If-Modified-Since 以短路未变化的源。
pub struct ResponseCache<R: RequestRepository> {
    repository: Arc<R>,
    content_store: Arc<ContentStore>,
    hot_tracker: HotTracker,
    cloudflare_markers: Vec<String>,
}

impl<R: RequestRepository> ResponseCache<R> {
    /// 创建新的响应缓存实例
    pub fn new(
        repository: Arc<R>,
        content_store: Arc<ContentStore>,
        settings: &CacheSettings,
    ) -> Self {
        Self {
            repository,
            content_store,
            hot_tracker: HotTracker::new(
                settings.hot_promotion_threshold,
                settings.hot_window_seconds,
            ),
            cloudflare_markers: settings
                .cloudflare_markers
                .clone()
                .unwrap_or_else(|| DEFAULT_CLOUDFLARE_MARKERS.clone()),
        }
    }

    /// 获取条件请求头
    ///
    /// 返回某查找键下最近一次成功响应携带的条件头；
    /// 没有成功历史时返回空
    pub async fn conditional_headers(
        &self,
        lookup_key: &str,
    ) -> Result<ResponseHeaders, CacheError> {
        let latest_ok = self.repository.latest_ok_request(lookup_key).await?;
        Ok(latest_ok
            .and_then(|request| request.response)
            .map(|response| response.headers)
            .unwrap_or_default())
    }

    /// 记录一次拿到响应体的抓取
    ///
    /// 解码响应体、计算内容哈希并交给内容存储去重落盘，
    /// 同时做Cloudflare挑战页指纹识别。2xx携带空响应体时
    /// 归一化为无响应体记录。返回的响应由调用方在同一事务中
    /// 随请求一并持久化。
    ///
    /// # 参数
    ///
    /// * `url` - 来源URL，仅用于日志
    /// * `status_code` - HTTP状态码
    /// * `raw_bytes` - 响应体原始字节
    /// * `headers` - 抓取到的响应头
    pub async fn record_success(
        &self,
        url: &str,
        status_code: u16,
        raw_bytes: &[u8],
        headers: &FetchedHeaders,
    ) -> Result<RecordedResponse, CacheError> {
        if raw_bytes.is_empty() {
            return Ok(RecordedResponse {
                response: self.record_empty(url, status_code, headers.conditional()),
                parse_failed: false,
            });
        }

        let (body, parse_failed) =
            match text_encoding::decode_body(raw_bytes, headers.content_type.as_deref()) {
                Ok(text) => (text.into_bytes(), false),
                Err(e) => {
                    warn!(url, error = %e, "Failed to decode response body, storing raw bytes");
                    (raw_bytes.to_vec(), true)
                }
            };

        let hash = hex::encode(Sha256::digest(&body));
        let hot = self.hot_tracker.observe(&hash, Utc::now());
        if hot {
            counter!("body_hot_promotions_total").increment(1);
        }

        let stored = self.content_store.put(&hash, &body, hot).await?;

        let mut response = Response::new(status_code, headers.conditional());
        response.text_hash = Some(hash);
        response.has_compressed_text = stored.compressed;
        response.s3_object_key = stored.s3_object_key;
        response.redis_cache_key = stored.redis_cache_key;
        response.is_cloudflare = self.is_cloudflare_challenge(
            status_code,
            headers.server.as_deref(),
            &String::from_utf8_lossy(&body),
        );

        if response.is_cloudflare {
            debug!(url, status_code, "Response matches Cloudflare challenge fingerprint");
        }

        Ok(RecordedResponse {
            response,
            parse_failed,
        })
    }

    /// 记录一次无响应体的抓取
    ///
    /// 用于304 Not Modified或空负载的场景；不触发任何存储写入，
    /// 内容哈希留空
    pub fn record_empty(
        &self,
        url: &str,
        status_code: u16,
        headers: ResponseHeaders,
    ) -> Response {
        debug!(url, status_code, "Recording response without a body");
        Response::new(status_code, headers)
    }

    /// 读取某响应的响应体字节
    ///
    /// 经内容存储解析存储层级，按需解压。内容在所有层级均缺失时
    /// 返回存储层NotFound错误，调用方应视为"缓存丢失、需重新抓取"
    pub async fn read(&self, response: &Response) -> Result<Vec<u8>, CacheError> {
        let hash = response
            .text_hash
            .as_deref()
            .ok_or(StoreError::NotFound)?;

        let stored = self
            .content_store
            .get(hash)
            .await?
            .ok_or(StoreError::NotFound)?;

        if response.has_compressed_text {
            Ok(compression::inflate(&stored)?)
        } else {
            Ok(stored)
        }
    }

    /// 从热缓存中驱逐某响应体
    pub async fn evict(&self, hash: &str) -> Result<(), CacheError> {
        Ok(self.content_store.evict(hash).await?)
    }

    fn is_cloudflare_challenge(&self, status_code: u16, server: Option<&str>, body: &str) -> bool {
        let from_cloudflare = server
            .map(|s| s.to_ascii_lowercase().contains("cloudflare"))
            .unwrap_or(false);

        if !from_cloudflare {
            return false;
        }

        CLOUDFLARE_CHALLENGE_STATUS.contains(&status_code)
            || self.cloudflare_markers.iter().any(|m| body.contains(m))
    }
}

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

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// 应用程序配置设置
///
/// 包含数据库、Redis、对象存储、抓取、缓存分层和重试退避等所有配置项
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// 数据库配置
    pub database: DatabaseSettings,
    /// Redis配置
    pub redis: RedisSettings,
    /// 对象存储配置
    pub storage: StorageSettings,
    /// 抓取配置
    pub fetch: FetchSettings,
    /// 响应体缓存配置
    pub cache: CacheSettings,
    /// 重试退避配置
    pub retry: RetrySettings,
}

/// 数据库配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// 数据库连接URL
    pub url: String,
    /// 最大连接数
    pub max_connections: Option<u32>,
    /// 最小连接数
    pub min_connections: Option<u32>,
    /// 连接超时时间（秒）
    pub connect_timeout: Option<u64>,
    /// 空闲连接超时时间（秒）
    pub idle_timeout: Option<u64>,
}

/// Redis配置设置
///
/// 热缓存层为可选配置，未提供URL时引擎只使用内联/冷存储两层
#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    /// Redis连接URL
    pub url: Option<String>,
}

/// 对象存储配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// 存储类型 (local, s3)
    pub storage_type: String,
    /// 本地存储路径 (当 type=local 时使用)
    pub local_path: Option<String>,
    /// S3 区域
    pub s3_region: Option<String>,
    /// S3 存储桶名称
    pub s3_bucket: Option<String>,
    /// S3 访问密钥
    pub s3_access_key: Option<String>,
    /// S3 密钥
    pub s3_secret_key: Option<String>,
    /// S3 端点 (可选，用于 MinIO 等兼容服务)
    pub s3_endpoint: Option<String>,
}

/// 抓取配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct FetchSettings {
    /// 默认User-Agent
    pub user_agent: String,
    /// 请求超时时间（毫秒）
    pub timeout_ms: u64,
    /// 默认Accept头
    pub accept: String,
    /// 代理URL (可选，被限流时切换代理重试一次)
    pub proxy_url: Option<String>,
}

/// 响应体缓存配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    /// 内联存储的最大字节数，超过则写入冷存储
    pub inline_max_bytes: usize,
    /// 启用压缩的最小字节数
    pub compress_min_bytes: usize,
    /// 热缓存TTL（秒）
    pub hot_ttl_seconds: u64,
    /// 滚动窗口内命中多少次后晋升为热内容
    pub hot_promotion_threshold: u32,
    /// 热度统计滚动窗口（秒）
    pub hot_window_seconds: u64,
    /// Cloudflare挑战页正文指纹 (可选，覆盖内置指纹)
    pub cloudflare_markers: Option<Vec<String>>,
}

/// 重试退避配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    /// 最大连续失败次数，达到后不再安排重试
    pub max_attempts: u32,
    /// 基础等待时间（秒）
    pub base_wait_seconds: u64,
    /// 被限流时的基础等待时间（秒）
    pub rate_limited_wait_seconds: u64,
    /// 退避时间上限（秒）
    pub max_backoff_seconds: u64,
    /// 抖动因子 (0.0-1.0)
    pub jitter_factor: f64,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 从环境变量加载配置，支持默认值
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let builder = Config::builder()
            // Default DB pool settings
            .set_default("database.max_connections", 100)?
            .set_default("database.min_connections", 10)?
            .set_default("database.connect_timeout", 10)?
            .set_default("database.idle_timeout", 300)?
            // Default Storage settings
            .set_default("storage.storage_type", "local")?
            .set_default("storage.local_path", "./storage")?
            // Default Fetch settings
            .set_default(
                "fetch.user_agent",
                "feedfetch/0.1 (+https://github.com/Kirky-X/feedfetch)",
            )?
            .set_default("fetch.timeout_ms", 15_000)?
            .set_default(
                "fetch.accept",
                "text/html,text/xml,application/xml,application/rss+xml",
            )?
            // Default Cache settings
            .set_default("cache.inline_max_bytes", 16 * 1024)?
            .set_default("cache.compress_min_bytes", 512)?
            .set_default("cache.hot_ttl_seconds", 900)?
            .set_default("cache.hot_promotion_threshold", 3)?
            .set_default("cache.hot_window_seconds", 600)?
            // Default Retry settings
            .set_default("retry.max_attempts", 3)?
            .set_default("retry.base_wait_seconds", 300)?
            .set_default("retry.rate_limited_wait_seconds", 1200)?
            .set_default("retry.max_backoff_seconds", 43_200)?
            .set_default("retry.jitter_factor", 0.1)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("FEEDFETCH").separator("__"));

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;

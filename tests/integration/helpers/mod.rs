// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

use feedfetch::config::settings::{CacheSettings, FetchSettings};
use feedfetch::domain::models::response::ResponseHeaders;
use feedfetch::domain::services::fetch_coordinator::FetchCoordinator;
use feedfetch::domain::services::response_cache::ResponseCache;
use feedfetch::domain::services::retry_scheduler::RetryScheduler;
use feedfetch::fetcher::{FetchOptions, FetchedResponse, Fetcher, TransportError};
use feedfetch::infrastructure::content_store::ContentStore;
use feedfetch::infrastructure::repositories::memory_request_repo::InMemoryRequestRepository;
use feedfetch::infrastructure::storage::InMemoryStorage;
use feedfetch::utils::retry_policy::RetryPolicy;

/// 脚本化的抓取器，按入队顺序吐出预设结果并记录收到的条件头
pub struct MockFetcher {
    script: Mutex<VecDeque<Result<FetchedResponse, TransportError>>>,
    seen_conditionals: Mutex<Vec<ResponseHeaders>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            seen_conditionals: Mutex::new(Vec::new()),
        }
    }

    pub async fn enqueue(&self, result: Result<FetchedResponse, TransportError>) {
        self.script.lock().await.push_back(result);
    }

    pub async fn seen_conditionals(&self) -> Vec<ResponseHeaders> {
        self.seen_conditionals.lock().await.clone()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(
        &self,
        _url: &str,
        conditional: &ResponseHeaders,
        _options: &FetchOptions,
    ) -> Result<FetchedResponse, TransportError> {
        self.seen_conditionals.lock().await.push(conditional.clone());
        self.script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Other("mock script exhausted".to_string())))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

pub fn cache_settings() -> CacheSettings {
    CacheSettings {
        inline_max_bytes: 16 * 1024,
        compress_min_bytes: 512,
        hot_ttl_seconds: 900,
        hot_promotion_threshold: 3,
        hot_window_seconds: 600,
        cloudflare_markers: None,
    }
}

pub fn fetch_settings() -> FetchSettings {
    FetchSettings {
        user_agent: "feedfetch-test".to_string(),
        timeout_ms: 1_000,
        accept: "text/html,text/xml,application/xml,application/rss+xml".to_string(),
        proxy_url: None,
    }
}

/// 组装好的引擎测试夹具：内存仓库 + 三层内存存储 + 脚本化抓取器
pub struct Engine {
    pub repository: Arc<InMemoryRequestRepository>,
    pub inline: Arc<InMemoryStorage>,
    pub cold: Arc<InMemoryStorage>,
    pub hot: Arc<InMemoryStorage>,
    pub fetcher: Arc<MockFetcher>,
    pub coordinator: FetchCoordinator<InMemoryRequestRepository>,
}

pub fn engine() -> Engine {
    engine_with_policy(RetryPolicy {
        max_attempts: 3,
        enable_jitter: false,
        ..RetryPolicy::default()
    })
}

pub fn engine_with_policy(policy: RetryPolicy) -> Engine {
    let repository = Arc::new(InMemoryRequestRepository::new());
    let inline = Arc::new(InMemoryStorage::new());
    let cold = Arc::new(InMemoryStorage::new());
    let hot = Arc::new(InMemoryStorage::new());

    let content_store = Arc::new(ContentStore::new(
        inline.clone(),
        Some(cold.clone()),
        Some(hot.clone()),
        &cache_settings(),
    ));
    let response_cache = Arc::new(ResponseCache::new(
        repository.clone(),
        content_store,
        &cache_settings(),
    ));
    let retry_scheduler = Arc::new(RetryScheduler::new(repository.clone(), policy));
    let fetcher = Arc::new(MockFetcher::new());

    let coordinator = FetchCoordinator::new(
        repository.clone(),
        response_cache,
        retry_scheduler,
        fetcher.clone(),
        fetch_settings(),
    );

    Engine {
        repository,
        inline,
        cold,
        hot,
        fetcher,
        coordinator,
    }
}

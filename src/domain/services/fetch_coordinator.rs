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

use anyhow::{Context, Result};
use chrono::Utc;
use metrics::{counter, histogram};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::settings::FetchSettings;
use crate::domain::models::request::{Request, RequestSource, RequestStatus};
use crate::domain::models::response::Response;
use crate::domain::services::response_cache::{RecordedResponse, ResponseCache};
use crate::domain::services::retry_scheduler::RetryScheduler;
use crate::domain::repositories::request_repository::RequestRepository;
use crate::fetcher::{FetchOptions, FetchedResponse, Fetcher, TransportError};
use crate::utils::retry_policy::RetryKind;

/// 一次抓取的输入
#[derive(Debug, Clone, Default)]
pub struct FetchInput {
    /// 目标订阅源URL
    pub url: String,
    /// 查找键，None时回退为URL
    pub lookup_key: Option<String>,
    /// 请求来源
    pub source: Option<RequestSource>,
    /// 调用方附加的请求头
    pub headers: HashMap<String, String>,
}

impl FetchInput {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

/// 状态码归类结果
enum StatusOutcome {
    Success,
    Failure(RequestStatus, RetryKind),
}

/// 抓取协调器
///
/// 编排一次"抓取或跳过"的完整流程：查询条件请求头、委托外部
/// 抓取器执行网络IO、把结果归档为请求/响应记录，失败时向重试
/// 调度器要下次重试时间。每次调用恰好产生一条请求记录、至多
/// 一条响应记录，两者在同一事务中落盘。同一URL的并发调用不做
/// 互斥；存储层按内容寻址幂等，重复抓取浪费网络但不会破坏状态。
pub struct FetchCoordinator<R: RequestRepository> {
    repository: Arc<R>,
    response_cache: Arc<ResponseCache<R>>,
    retry_scheduler: Arc<RetryScheduler<R>>,
    fetcher: Arc<dyn Fetcher>,
    settings: FetchSettings,
}

impl<R: RequestRepository> FetchCoordinator<R> {
    /// 创建新的抓取协调器实例
    pub fn new(
        repository: Arc<R>,
        response_cache: Arc<ResponseCache<R>>,
        retry_scheduler: Arc<RetryScheduler<R>>,
        fetcher: Arc<dyn Fetcher>,
        settings: FetchSettings,
    ) -> Self {
        Self {
            repository,
            response_cache,
            retry_scheduler,
            fetcher,
            settings,
        }
    }

    /// 抓取一个订阅源URL
    pub async fn fetch(&self, url: &str) -> Result<Request> {
        self.fetch_with_options(FetchInput::new(url)).await
    }

    /// 按给定输入抓取一个订阅源
    ///
    /// # 参数
    ///
    /// * `input` - 抓取输入
    ///
    /// # 返回值
    ///
    /// 已持久化的请求记录，携带本次尝试的状态、错误详情与响应
    pub async fn fetch_with_options(&self, input: FetchInput) -> Result<Request> {
        url::Url::parse(&input.url)
            .with_context(|| format!("invalid feed url: {}", input.url))?;

        let lookup_key = input
            .lookup_key
            .clone()
            .unwrap_or_else(|| input.url.clone());

        let conditional = self
            .response_cache
            .conditional_headers(&lookup_key)
            .await
            .context("failed to load conditional headers")?;

        let mut headers = HashMap::new();
        headers.insert("user-agent".to_string(), self.settings.user_agent.clone());
        headers.insert("accept".to_string(), self.settings.accept.clone());
        headers.extend(input.headers.clone());

        let options = FetchOptions {
            headers: headers.clone(),
            timeout: Duration::from_millis(self.settings.timeout_ms),
            proxy: None,
        };

        let mut request = Request::new(input.url.clone(), input.lookup_key, input.source);
        request.fetch_options = Some(json!({ "headers": redact_headers(&headers) }));

        debug!(url = %request.url, conditional = !conditional.is_empty(), "Fetching feed");

        counter!("feed_fetch_requests_total").increment(1);
        let started = Instant::now();
        let result = self
            .fetcher
            .fetch(&request.url, &conditional, &options)
            .await;
        histogram!("feed_fetch_duration_seconds").record(started.elapsed().as_secs_f64());

        match result {
            Err(transport) => self.record_transport_failure(request, transport).await,
            Ok(fetched) if fetched.status_code == 304 => {
                self.record_not_modified(request, fetched).await
            }
            Ok(fetched) => self.record_protocol_outcome(request, fetched).await,
        }
    }

    /// 条件抓取快路径：源站内容未变化，不产生新的响应体
    async fn record_not_modified(
        &self,
        request: Request,
        fetched: FetchedResponse,
    ) -> Result<Request> {
        counter!("feed_fetch_not_modified_total").increment(1);

        let response =
            self.response_cache
                .record_empty(&request.url, 304, fetched.headers.conditional());
        let request = request.complete(response)?;
        self.repository.insert(&request).await?;

        debug!(url = %request.url, "Feed not modified, skipped body transfer");
        Ok(request)
    }

    /// 传输层失败：未拿到HTTP响应，归类后安排重试
    async fn record_transport_failure(
        &self,
        request: Request,
        transport: TransportError,
    ) -> Result<Request> {
        let (status, kind) = match &transport {
            TransportError::Timeout(_) => (RequestStatus::TimedOut, RetryKind::Timeout),
            TransportError::InvalidCertificate(_) => {
                (RequestStatus::InvalidSsl, RetryKind::Network)
            }
            TransportError::Connect(_) | TransportError::Other(_) => {
                (RequestStatus::FetchFailed, RetryKind::Network)
            }
        };

        self.finalize_failure(request, status, Some(transport.to_string()), None, kind)
            .await
    }

    /// 传输成功：按状态码归类，非2xx也记录响应以便上层检视错误正文
    async fn record_protocol_outcome(
        &self,
        request: Request,
        fetched: FetchedResponse,
    ) -> Result<Request> {
        let status_code = fetched.status_code;

        let recorded = if fetched.body.is_empty() {
            RecordedResponse {
                response: self.response_cache.record_empty(
                    &request.url,
                    status_code,
                    fetched.headers.conditional(),
                ),
                parse_failed: false,
            }
        } else {
            self.response_cache
                .record_success(&request.url, status_code, &fetched.body, &fetched.headers)
                .await
                .context("failed to record response body")?
        };

        if recorded.parse_failed {
            return self
                .finalize_failure(
                    request,
                    RequestStatus::ParseFailed,
                    Some("Failed to decode response body".to_string()),
                    Some(recorded.response),
                    RetryKind::Network,
                )
                .await;
        }

        match classify_status_code(status_code) {
            StatusOutcome::Success => {
                let request = request.complete(recorded.response)?;
                self.repository.insert(&request).await?;
                info!(url = %request.url, status_code, "Feed fetched");
                Ok(request)
            }
            StatusOutcome::Failure(status, kind) => {
                self.finalize_failure(
                    request,
                    status,
                    Some(format!("Bad status code: {}", status_code)),
                    Some(recorded.response),
                    kind,
                )
                .await
            }
        }
    }

    /// 归档一次失败的尝试并安排重试
    ///
    /// 重试预算耗尽时`next_retry_date`留空，作为"订阅源已禁用"
    /// 的查询信号，不抛出错误
    async fn finalize_failure(
        &self,
        request: Request,
        status: RequestStatus,
        error_message: Option<String>,
        response: Option<Response>,
        kind: RetryKind,
    ) -> Result<Request> {
        let failures_before = self
            .retry_scheduler
            .consecutive_failures(&request.lookup_key)
            .await?;
        let next_retry = self
            .retry_scheduler
            .next_retry(failures_before + 1, kind, Utc::now());

        let request = request
            .fail(status, error_message, response)?
            .schedule_retry(next_retry);

        counter!("feed_fetch_failures_total").increment(1);
        match request.next_retry_date {
            Some(next_retry_date) => {
                counter!("feed_fetch_retries_scheduled_total").increment(1);
                debug!(
                    url = %request.url,
                    status = %request.status,
                    %next_retry_date,
                    "Fetch failed, retry scheduled"
                );
            }
            None => {
                counter!("feed_fetch_retries_exhausted_total").increment(1);
                warn!(
                    url = %request.url,
                    status = %request.status,
                    "Fetch failed and retry budget is exhausted"
                );
            }
        }

        self.repository.insert(&request).await?;
        Ok(request)
    }
}

/// 归类HTTP状态码
fn classify_status_code(status_code: u16) -> StatusOutcome {
    match status_code {
        200..=299 => StatusOutcome::Success,
        401 | 403 => StatusOutcome::Failure(RequestStatus::Forbidden, RetryKind::Network),
        429 => StatusOutcome::Failure(RequestStatus::FetchFailed, RetryKind::RateLimited),
        500..=599 => StatusOutcome::Failure(RequestStatus::FetchFailed, RetryKind::ServerError),
        _ => StatusOutcome::Failure(RequestStatus::FetchFailed, RetryKind::Network),
    }
}

/// 脱敏后用于持久化的请求头副本
fn redact_headers(headers: &HashMap<String, String>) -> HashMap<String, String> {
    headers
        .iter()
        .map(|(k, v)| {
            if k.eq_ignore_ascii_case("authorization") {
                (k.clone(), "SECRET".to_string())
            } else {
                (k.clone(), v.clone())
            }
        })
        .collect()
}

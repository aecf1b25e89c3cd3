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

use chrono::{DateTime, FixedOffset, Utc};
use futures::stream::{self, Stream, StreamExt};
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

use crate::domain::repositories::request_repository::{RepositoryError, RequestRepository};
use crate::utils::retry_policy::{RetryKind, RetryPolicy};

/// 到期查询的分页大小
const DUE_PAGE_SIZE: u64 = 100;

/// 是否跳过本次抓取的判定结果
#[derive(Debug, Clone)]
pub struct SkipDecision {
    /// 是否跳过
    pub skip: bool,
    /// 连续失败次数（自最近一次成功以来）
    pub failed_attempts: u32,
    /// 最近一次安排的重试时间
    pub next_retry_date: Option<DateTime<FixedOffset>>,
}

/// 重试调度器
///
/// 基于失败历史计算下次重试时间，并提供到期请求查询。
/// 调度器本身不决定抓取发生的时机，由外部调度方消费到期序列。
pub struct RetryScheduler<R: RequestRepository> {
    repository: Arc<R>,
    policy: RetryPolicy,
}

impl<R: RequestRepository> RetryScheduler<R> {
    /// 创建新的重试调度器实例
    pub fn new(repository: Arc<R>, policy: RetryPolicy) -> Self {
        Self { repository, policy }
    }

    /// 退避策略
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// 计算下次重试时间
    ///
    /// # 参数
    ///
    /// * `failure_count` - 连续失败次数，含本次失败
    /// * `kind` - 失败类别
    /// * `now` - 参考时间
    ///
    /// # 返回值
    ///
    /// * `Some(DateTime)` - 下次重试时间
    /// * `None` - 重试预算已耗尽，调用方应将订阅源标记为永久禁用
    pub fn next_retry(
        &self,
        failure_count: u32,
        kind: RetryKind,
        now: DateTime<Utc>,
    ) -> Option<DateTime<FixedOffset>> {
        self.policy
            .next_retry_date(failure_count, kind, now)
            .map(Into::into)
    }

    /// 统计自最近一次成功以来的连续失败次数
    pub async fn consecutive_failures(&self, lookup_key: &str) -> Result<u32, RepositoryError> {
        let last_ok = self.repository.latest_ok_request(lookup_key).await?;
        self.repository
            .count_failures_since(lookup_key, last_ok.map(|r| r.created_at))
            .await
    }

    /// 判断调度触发的抓取是否应该跳过
    ///
    /// 订阅源近期失败且重试时间未到时跳过；连续失败达到上限时
    /// 跳过并由调用方将其视为永久禁用。手动触发的抓取不经过
    /// 该判定，总是创建新的请求。
    pub async fn should_skip(
        &self,
        lookup_key: &str,
        now: DateTime<FixedOffset>,
    ) -> Result<SkipDecision, RepositoryError> {
        let failed_attempts = self.consecutive_failures(lookup_key).await?;

        if failed_attempts == 0 {
            return Ok(SkipDecision {
                skip: false,
                failed_attempts,
                next_retry_date: None,
            });
        }

        if !self.policy.should_retry(failed_attempts) {
            debug!(
                lookup_key,
                failed_attempts, "Retry budget exhausted, skipping fetch"
            );
            return Ok(SkipDecision {
                skip: true,
                failed_attempts,
                next_retry_date: None,
            });
        }

        let next_retry_date = self.repository.latest_next_retry_date(lookup_key).await?;

        let Some(next_retry_date) = next_retry_date else {
            // Every failed scheduled request should carry a retry date;
            // proceed with the fetch as fallback behavior
            error!(
                lookup_key,
                "Previous attempt failed but no retry date was recorded, continuing with fetch"
            );
            return Ok(SkipDecision {
                skip: false,
                failed_attempts,
                next_retry_date: None,
            });
        };

        if now < next_retry_date {
            return Ok(SkipDecision {
                skip: true,
                failed_attempts,
                next_retry_date: Some(next_retry_date),
            });
        }

        Ok(SkipDecision {
            skip: false,
            failed_attempts,
            next_retry_date: Some(next_retry_date),
        })
    }

    /// 到期待重试的请求ID序列
    ///
    /// 惰性分页查询，按`next_retry_date`升序产出，最久到期的
    /// 排在最前以限制最坏情况下的陈旧度。序列可随时丢弃并重建。
    pub fn due_requests(
        &self,
        now: DateTime<FixedOffset>,
    ) -> impl Stream<Item = Result<Uuid, RepositoryError>> + '_ {
        stream::unfold(Some(0u64), move |state| async move {
            let offset = state?;
            match self.repository.find_due(now, DUE_PAGE_SIZE, offset).await {
                Ok(ids) => {
                    if ids.is_empty() {
                        return None;
                    }
                    let next = if (ids.len() as u64) < DUE_PAGE_SIZE {
                        None
                    } else {
                        Some(offset + DUE_PAGE_SIZE)
                    };
                    Some((Ok(ids), next))
                }
                Err(e) => Some((Err(e), None)),
            }
        })
        .flat_map(|page| match page {
            Ok(ids) => stream::iter(ids.into_iter().map(Ok).collect::<Vec<_>>()),
            Err(e) => stream::iter(vec![Err(e)]),
        })
    }
}

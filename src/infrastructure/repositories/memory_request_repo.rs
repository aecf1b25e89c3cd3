// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::models::request::{Request, RequestStatus};
use crate::domain::repositories::request_repository::{RepositoryError, RequestRepository};

/// 测试用的内存请求仓库实现（用于单元测试）
///
/// 请求按插入顺序保存在内存中，查询语义与数据库实现保持一致
pub struct InMemoryRequestRepository {
    requests: Arc<RwLock<Vec<Request>>>,
}

impl InMemoryRequestRepository {
    pub fn new() -> Self {
        Self {
            requests: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// 当前保存的请求数量
    pub async fn len(&self) -> usize {
        self.requests.read().await.len()
    }

    /// 是否为空
    pub async fn is_empty(&self) -> bool {
        self.requests.read().await.is_empty()
    }

    /// 全部请求的快照，测试断言用
    pub async fn all(&self) -> Vec<Request> {
        self.requests.read().await.clone()
    }
}

impl Default for InMemoryRequestRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RequestRepository for InMemoryRequestRepository {
    async fn insert(&self, request: &Request) -> Result<(), RepositoryError> {
        let mut requests = self.requests.write().await;
        requests.push(request.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Request>, RepositoryError> {
        let requests = self.requests.read().await;
        Ok(requests.iter().find(|r| r.id == id).cloned())
    }

    async fn latest_request(&self, lookup_key: &str) -> Result<Option<Request>, RepositoryError> {
        let requests = self.requests.read().await;
        Ok(requests
            .iter()
            .filter(|r| r.lookup_key == lookup_key)
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn latest_ok_request(
        &self,
        lookup_key: &str,
    ) -> Result<Option<Request>, RepositoryError> {
        let requests = self.requests.read().await;
        Ok(requests
            .iter()
            .filter(|r| r.lookup_key == lookup_key && r.status == RequestStatus::Ok)
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn count_failures_since(
        &self,
        lookup_key: &str,
        since: Option<DateTime<FixedOffset>>,
    ) -> Result<u32, RepositoryError> {
        let requests = self.requests.read().await;
        let count = requests
            .iter()
            .filter(|r| r.lookup_key == lookup_key && r.status.is_retryable_failure())
            .filter(|r| since.map(|s| r.created_at > s).unwrap_or(true))
            .count();
        Ok(count as u32)
    }

    async fn latest_next_retry_date(
        &self,
        lookup_key: &str,
    ) -> Result<Option<DateTime<FixedOffset>>, RepositoryError> {
        let requests = self.requests.read().await;
        Ok(requests
            .iter()
            .filter(|r| r.lookup_key == lookup_key && r.next_retry_date.is_some())
            .max_by_key(|r| r.created_at)
            .and_then(|r| r.next_retry_date))
    }

    async fn find_due(
        &self,
        now: DateTime<FixedOffset>,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Uuid>, RepositoryError> {
        let requests = self.requests.read().await;
        let mut due: Vec<&Request> = requests
            .iter()
            .filter(|r| r.status.is_retryable_failure())
            .filter(|r| r.next_retry_date.map(|d| d <= now).unwrap_or(false))
            .collect();
        due.sort_by_key(|r| r.next_retry_date);

        Ok(due
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|r| r.id)
            .collect())
    }
}

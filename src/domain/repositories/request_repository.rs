// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::request::Request;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

/// 仓库错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    /// 记录未找到
    #[error("Record not found")]
    NotFound,
}

/// 请求仓库特质
///
/// 定义请求/响应记录的数据访问接口。请求记录是只追加的；
/// 插入操作必须在同一事务中同时落盘请求及其关联响应，
/// 保证读取方不会观察到悬空的响应引用。
#[async_trait]
pub trait RequestRepository: Send + Sync {
    /// 插入请求及其关联响应（同一事务）
    async fn insert(&self, request: &Request) -> Result<(), RepositoryError>;

    /// 根据ID查找请求
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Request>, RepositoryError>;

    /// 查找某查找键下最近一次请求
    async fn latest_request(&self, lookup_key: &str) -> Result<Option<Request>, RepositoryError>;

    /// 查找某查找键下最近一次成功请求
    async fn latest_ok_request(&self, lookup_key: &str)
        -> Result<Option<Request>, RepositoryError>;

    /// 统计某查找键下给定时刻之后的失败请求数
    ///
    /// `since`为None时统计全部历史，用于从未成功过的订阅源
    async fn count_failures_since(
        &self,
        lookup_key: &str,
        since: Option<DateTime<FixedOffset>>,
    ) -> Result<u32, RepositoryError>;

    /// 查找某查找键下最近一次安排的重试时间
    async fn latest_next_retry_date(
        &self,
        lookup_key: &str,
    ) -> Result<Option<DateTime<FixedOffset>>, RepositoryError>;

    /// 分页查询到期待重试的请求ID
    ///
    /// 仅返回可重试失败状态且`next_retry_date <= now`的请求，
    /// 按`next_retry_date`升序排列，最久到期的排在最前
    async fn find_due(
        &self,
        now: DateTime<FixedOffset>,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Uuid>, RepositoryError>;
}

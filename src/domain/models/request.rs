// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::models::response::Response;

/// 请求实体
///
/// 表示对某个订阅源URL的一次抓取尝试。请求记录是只追加的：
/// 每次重试都会产生一条新的请求记录，而不是修改旧记录，
/// 从而保留完整的尝试历史。状态、重试时间和错误信息在
/// 每次尝试中只被写入一次。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// 请求唯一标识符
    pub id: Uuid,
    /// 目标订阅源URL
    pub url: String,
    /// 查找键，默认为URL；多个URL可共享同一键以合并重试历史
    pub lookup_key: String,
    /// 请求状态
    pub status: RequestStatus,
    /// 请求来源，区分调度触发与手动触发
    pub source: Option<RequestSource>,
    /// 传递给抓取器的配置（自定义头、代理提示等），原样透传；
    /// 存储前授权头的值会被脱敏
    pub fetch_options: Option<serde_json::Value>,
    /// 创建时间，不可变
    pub created_at: DateTime<FixedOffset>,
    /// 下次重试时间；仅当状态为可重试失败且重试预算未耗尽时非空
    pub next_retry_date: Option<DateTime<FixedOffset>>,
    /// 失败详情
    pub error_message: Option<String>,
    /// 关联的响应；仅当传输层成功拿到HTTP响应时非空
    pub response: Option<Response>,
}

/// 请求来源枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestSource {
    /// 由调度器批量触发
    Schedule,
    /// 手动触发，忽略退避限制
    Manual,
}

impl fmt::Display for RequestSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RequestSource::Schedule => write!(f, "schedule"),
            RequestSource::Manual => write!(f, "manual"),
        }
    }
}

impl FromStr for RequestSource {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "schedule" => Ok(RequestSource::Schedule),
            "manual" => Ok(RequestSource::Manual),
            _ => Err(()),
        }
    }
}

/// 请求状态枚举
///
/// 封闭集合，每个取值在上层映射到固定的用户可见文案。
/// 状态转换流程：
/// Pending → Ok (终态) | Pending → 某种失败状态（若还有重试预算则安排重试）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// 待处理，请求已创建但尚未得到结果
    #[default]
    Pending,
    /// 成功，包括304 Not Modified的条件请求快路径
    Ok,
    /// 抓取失败，网络错误或非成功状态码
    FetchFailed,
    /// 解析失败，拿到了字节但无法按声明的编码解码
    ParseFailed,
    /// SSL证书无效
    InvalidSsl,
    /// 被拒绝访问 (401/403)
    Forbidden,
    /// 请求超时
    TimedOut,
}

impl RequestStatus {
    /// 判断状态是否为可重试的失败
    ///
    /// # 返回值
    ///
    /// 除Pending和Ok外的所有状态都是可重试失败
    pub fn is_retryable_failure(&self) -> bool {
        !matches!(self, RequestStatus::Pending | RequestStatus::Ok)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RequestStatus::Pending => write!(f, "pending"),
            RequestStatus::Ok => write!(f, "ok"),
            RequestStatus::FetchFailed => write!(f, "fetch_failed"),
            RequestStatus::ParseFailed => write!(f, "parse_failed"),
            RequestStatus::InvalidSsl => write!(f, "invalid_ssl"),
            RequestStatus::Forbidden => write!(f, "forbidden"),
            RequestStatus::TimedOut => write!(f, "timed_out"),
        }
    }
}

impl FromStr for RequestStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "ok" => Ok(RequestStatus::Ok),
            "fetch_failed" => Ok(RequestStatus::FetchFailed),
            "parse_failed" => Ok(RequestStatus::ParseFailed),
            "invalid_ssl" => Ok(RequestStatus::InvalidSsl),
            "forbidden" => Ok(RequestStatus::Forbidden),
            "timed_out" => Ok(RequestStatus::TimedOut),
            _ => Err(()),
        }
    }
}

/// 领域错误类型
#[derive(Error, Debug)]
pub enum DomainError {
    /// 无效的状态转换，请求每次尝试只允许一次状态写入
    #[error("Invalid state transition")]
    InvalidStateTransition,

    /// 验证错误，当输入数据不符合领域规则时发生
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl Request {
    /// 创建一个新的待处理请求
    ///
    /// # 参数
    ///
    /// * `url` - 目标订阅源URL
    /// * `lookup_key` - 查找键，None时回退为URL
    /// * `source` - 请求来源
    ///
    /// # 返回值
    ///
    /// 返回状态为Pending的新请求实例
    pub fn new(url: impl Into<String>, lookup_key: Option<String>, source: Option<RequestSource>) -> Self {
        let url = url.into();
        let lookup_key = lookup_key.unwrap_or_else(|| url.clone());
        Self {
            id: Uuid::new_v4(),
            url,
            lookup_key,
            status: RequestStatus::Pending,
            source,
            fetch_options: None,
            created_at: Utc::now().into(),
            next_retry_date: None,
            error_message: None,
            response: None,
        }
    }

    /// 完成请求
    ///
    /// 将请求状态从Pending变更为Ok并挂上响应，清除重试状态
    ///
    /// # 返回值
    ///
    /// * `Ok(Request)` - 成功完成的请求
    /// * `Err(DomainError)` - 状态转换失败
    pub fn complete(mut self, response: Response) -> Result<Self, DomainError> {
        match self.status {
            RequestStatus::Pending => {
                self.status = RequestStatus::Ok;
                self.response = Some(response);
                self.next_retry_date = None;
                Ok(self)
            }
            _ => Err(DomainError::InvalidStateTransition),
        }
    }

    /// 标记请求失败
    ///
    /// 将请求状态从Pending变更为给定的失败状态。协议层失败
    /// （如403返回了错误页正文）仍可挂上响应以便上层检视。
    ///
    /// # 参数
    ///
    /// * `status` - 失败状态，必须是可重试失败集合中的取值
    /// * `error_message` - 失败详情
    /// * `response` - 传输成功但协议失败时产生的响应
    ///
    /// # 返回值
    ///
    /// * `Ok(Request)` - 失败的请求
    /// * `Err(DomainError)` - 状态转换失败
    pub fn fail(
        mut self,
        status: RequestStatus,
        error_message: Option<String>,
        response: Option<Response>,
    ) -> Result<Self, DomainError> {
        if !status.is_retryable_failure() {
            return Err(DomainError::ValidationError(format!(
                "status {} is not a failure state",
                status
            )));
        }
        match self.status {
            RequestStatus::Pending => {
                self.status = status;
                self.error_message = error_message;
                self.response = response;
                Ok(self)
            }
            _ => Err(DomainError::InvalidStateTransition),
        }
    }

    /// 安排下次重试
    ///
    /// None表示重试预算已耗尽，请求保持无重试时间的终态，
    /// 由上层将其解读为"订阅源已禁用"
    pub fn schedule_retry(mut self, next_retry_date: Option<DateTime<FixedOffset>>) -> Self {
        self.next_retry_date = next_retry_date;
        self
    }
}

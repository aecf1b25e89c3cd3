// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::config::settings::RetrySettings;

/// 失败类别
///
/// 决定退避的基础等待时间；倍增、上限、抖动和最大尝试次数
/// 对所有类别保持一致
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryKind {
    /// 一般网络失败（连接拒绝、DNS、证书等）
    Network,
    /// 超时
    Timeout,
    /// 被源站限流 (429)，退避更保守
    RateLimited,
    /// 源站服务端错误 (5xx)
    ServerError,
}

/// 重试策略配置
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 最大连续失败次数，达到后不再安排重试
    pub max_attempts: u32,
    /// 基础等待时间
    pub base_wait: Duration,
    /// 被限流时的基础等待时间
    pub rate_limited_wait: Duration,
    /// 退避时间上限
    pub max_backoff: Duration,
    /// 抖动因子 (0.0-1.0)
    pub jitter_factor: f64,
    /// 是否启用抖动
    pub enable_jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_wait: Duration::from_secs(300),
            rate_limited_wait: Duration::from_secs(1200),
            max_backoff: Duration::from_secs(43_200),
            jitter_factor: 0.1,
            enable_jitter: true,
        }
    }
}

impl RetryPolicy {
    /// 从配置构造重试策略
    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            base_wait: Duration::from_secs(settings.base_wait_seconds),
            rate_limited_wait: Duration::from_secs(settings.rate_limited_wait_seconds),
            max_backoff: Duration::from_secs(settings.max_backoff_seconds),
            jitter_factor: settings.jitter_factor,
            enable_jitter: true,
        }
    }

    /// 获取某失败类别的基础等待时间
    fn base_for(&self, kind: RetryKind) -> Duration {
        match kind {
            RetryKind::RateLimited => self.rate_limited_wait,
            _ => self.base_wait,
        }
    }

    /// 计算下次重试的退避时间
    ///
    /// # 参数
    ///
    /// * `failure_count` - 连续失败次数，含本次失败
    /// * `kind` - 失败类别
    ///
    /// # 返回值
    ///
    /// * `Some(Duration)` - 退避时间，随失败次数指数增长直到上限
    /// * `None` - 重试预算已耗尽
    pub fn calculate_backoff(&self, failure_count: u32, kind: RetryKind) -> Option<Duration> {
        if failure_count == 0 || failure_count >= self.max_attempts {
            return None;
        }

        let base = self.base_for(kind).as_secs_f64();
        let backoff_secs = base * 2f64.powi(failure_count as i32 - 1);
        let capped = backoff_secs.min(self.max_backoff.as_secs_f64());

        let final_backoff = if self.enable_jitter {
            let jitter_range = capped * self.jitter_factor;
            let jitter = rand::random_range(-jitter_range..=jitter_range);
            (capped + jitter).max(0.0)
        } else {
            capped
        };

        Some(Duration::from_secs_f64(final_backoff))
    }

    /// 计算下次重试时间
    ///
    /// # 返回值
    ///
    /// * `Some(DateTime)` - 下次重试的时间点
    /// * `None` - 重试预算已耗尽，调用方应将订阅源标记为永久禁用
    pub fn next_retry_date(
        &self,
        failure_count: u32,
        kind: RetryKind,
        base_time: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let backoff = self.calculate_backoff(failure_count, kind)?;
        Some(base_time + chrono::Duration::milliseconds(backoff.as_millis() as i64))
    }

    /// 是否还有重试预算
    pub fn should_retry(&self, failure_count: u32) -> bool {
        failure_count < self.max_attempts
    }
}

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

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

use crate::domain::models::response::ResponseHeaders;

pub mod reqwest_fetcher;

/// 传输层错误类型
///
/// 只覆盖未拿到HTTP响应的失败；源站返回的错误状态码
/// 不属于传输错误，由协调器按协议层失败处理
#[derive(Error, Debug)]
pub enum TransportError {
    /// 请求超时
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// SSL证书无效
    #[error("Invalid TLS certificate: {0}")]
    InvalidCertificate(String),
    /// 连接失败（拒绝、DNS、网络不可达等）
    #[error("Connection failed: {0}")]
    Connect(String),
    /// 其他传输错误
    #[error("Transport error: {0}")]
    Other(String),
}

/// 抓取请求选项
///
/// 调用方提供的配置原样透传；引擎核心不做修改
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// 请求头
    pub headers: HashMap<String, String>,
    /// 超时时间
    pub timeout: Duration,
    /// 代理URL
    pub proxy: Option<String>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            headers: HashMap::new(),
            timeout: Duration::from_secs(15),
            proxy: None,
        }
    }
}

/// 抓取到的响应头子集
///
/// 只保留引擎关心的四个头
#[derive(Debug, Clone, Default)]
pub struct FetchedHeaders {
    /// ETag值
    pub etag: Option<String>,
    /// Last-Modified值
    pub last_modified: Option<String>,
    /// Server头，用于Cloudflare指纹识别
    pub server: Option<String>,
    /// Content-Type头，用于字符集解码
    pub content_type: Option<String>,
}

impl FetchedHeaders {
    /// 提取条件请求头子集
    pub fn conditional(&self) -> ResponseHeaders {
        ResponseHeaders {
            etag: self.etag.clone(),
            last_modified: self.last_modified.clone(),
        }
    }
}

/// 抓取到的响应
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    /// HTTP状态码
    pub status_code: u16,
    /// 响应头
    pub headers: FetchedHeaders,
    /// 响应体原始字节（传输层压缩已由客户端解开）
    pub body: Vec<u8>,
}

/// 抓取器特质
///
/// 由外部HTTP客户端层提供的能力接口；TLS、重定向、代理和
/// 传输压缩协商均由实现方负责。实现方持有自己的超时控制。
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// 执行一次抓取
    ///
    /// # 参数
    ///
    /// * `url` - 目标URL
    /// * `conditional` - 上次成功响应的条件头，用于构造
    ///   If-None-Match / If-Modified-Since
    /// * `options` - 请求选项
    async fn fetch(
        &self,
        url: &str,
        conditional: &ResponseHeaders,
        options: &FetchOptions,
    ) -> Result<FetchedResponse, TransportError>;

    /// 抓取器名称
    fn name(&self) -> &'static str;
}

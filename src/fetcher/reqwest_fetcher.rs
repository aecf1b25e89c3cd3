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
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use tracing::debug;

use crate::domain::models::response::ResponseHeaders;
use crate::fetcher::{FetchOptions, FetchedHeaders, FetchedResponse, Fetcher, TransportError};

/// 基于reqwest的抓取器参考实现
///
/// 每次请求构建独立的客户端以隔离Cookie状态。配置了代理URL时，
/// 直连请求被源站限流 (429) 会自动换用代理重试一次。
pub struct ReqwestFetcher {
    /// 被限流时切换的代理URL
    proxy_url: Option<String>,
}

impl ReqwestFetcher {
    pub fn new(proxy_url: Option<String>) -> Self {
        Self { proxy_url }
    }

    fn classify_error(err: reqwest::Error, options: &FetchOptions) -> TransportError {
        if err.is_timeout() {
            return TransportError::Timeout(options.timeout);
        }

        // reqwest does not expose certificate failures as a dedicated kind
        let message = format!("{:#}", err);
        let lowered = message.to_lowercase();
        if lowered.contains("certificate") || lowered.contains("unknownissuer") {
            return TransportError::InvalidCertificate(message);
        }

        if err.is_connect() {
            return TransportError::Connect(message);
        }

        TransportError::Other(message)
    }

    async fn fetch_once(
        &self,
        url: &str,
        conditional: &ResponseHeaders,
        options: &FetchOptions,
        proxy: Option<&str>,
    ) -> Result<FetchedResponse, TransportError> {
        let mut headers = HeaderMap::new();
        for (k, v) in &options.headers {
            if let (Ok(k), Ok(v)) = (
                HeaderName::from_bytes(k.as_bytes()),
                HeaderValue::from_str(v),
            ) {
                headers.insert(k, v);
            }
        }

        if let Some(etag) = &conditional.etag {
            if let Ok(v) = HeaderValue::from_str(etag) {
                headers.insert(reqwest::header::IF_NONE_MATCH, v);
            }
        }

        if let Some(last_modified) = &conditional.last_modified {
            if let Ok(v) = HeaderValue::from_str(last_modified) {
                headers.insert(reqwest::header::IF_MODIFIED_SINCE, v);
            }
        }

        // Each request gets a fresh client for cookie isolation
        let mut builder = reqwest::Client::builder()
            .timeout(options.timeout)
            .cookie_store(true);

        if let Some(proxy_url) = proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| TransportError::Other(format!("Invalid proxy: {}", e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;

        let response = client
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| Self::classify_error(e, options))?;

        let status_code = response.status().as_u16();

        let header_value = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string())
        };

        let fetched_headers = FetchedHeaders {
            etag: header_value("etag"),
            last_modified: header_value("last-modified"),
            server: header_value("server"),
            content_type: header_value("content-type"),
        };

        let body = response
            .bytes()
            .await
            .map_err(|e| Self::classify_error(e, options))?
            .to_vec();

        Ok(FetchedResponse {
            status_code,
            headers: fetched_headers,
            body,
        })
    }
}

#[async_trait]
impl Fetcher for ReqwestFetcher {
    /// 执行HTTP抓取
    ///
    /// # 参数
    ///
    /// * `url` - 目标URL
    /// * `conditional` - 条件请求头
    /// * `options` - 请求选项
    ///
    /// # 返回值
    ///
    /// * `Ok(FetchedResponse)` - 抓取到的响应
    /// * `Err(TransportError)` - 传输层失败
    async fn fetch(
        &self,
        url: &str,
        conditional: &ResponseHeaders,
        options: &FetchOptions,
    ) -> Result<FetchedResponse, TransportError> {
        let direct_proxy = options.proxy.as_deref();
        let response = self
            .fetch_once(url, conditional, options, direct_proxy)
            .await?;

        // Retry through the configured proxy when rate limited on a direct request
        if response.status_code == StatusCode::TOO_MANY_REQUESTS.as_u16()
            && direct_proxy.is_none()
        {
            if let Some(proxy_url) = &self.proxy_url {
                debug!(url, "Rate limited on direct fetch, retrying through proxy");
                return self
                    .fetch_once(url, conditional, options, Some(proxy_url))
                    .await;
            }
        }

        Ok(response)
    }

    fn name(&self) -> &'static str {
        "reqwest"
    }
}

#[cfg(test)]
#[path = "reqwest_fetcher_test.rs"]
mod tests;

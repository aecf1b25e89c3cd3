// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 响应实体
///
/// 表示一次传输成功的HTTP交换的结果。响应体按内容哈希寻址存储，
/// 多个响应（甚至来自不同URL）可以共享同一份存储的字节；响应记录
/// 本身只携带元数据（状态码、头、存储位置），创建后不可变。
/// 响应体字节不保存在该结构上，读取时由各存储层按需解析。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// 响应唯一标识符
    pub id: Uuid,
    /// 原始HTTP状态码
    pub status_code: u16,
    /// 响应体（解码后）的SHA-256十六进制哈希；
    /// 空响应体或未做哈希（如无意义正文的非2xx）时为空
    pub text_hash: Option<String>,
    /// 存储的响应体是否为压缩形态
    pub has_compressed_text: bool,
    /// 响应指纹是否匹配Cloudflare挑战页而非真实订阅源内容
    pub is_cloudflare: bool,
    /// 冷存储对象键；响应体写入冷存储时非空
    pub s3_object_key: Option<String>,
    /// 热缓存键；响应体同时镜像到快速缓存时非空
    pub redis_cache_key: Option<String>,
    /// 源站返回的条件请求元数据
    pub headers: ResponseHeaders,
    /// 创建时间，不可变
    pub created_at: DateTime<FixedOffset>,
}

/// 条件请求头
///
/// 用于在下次抓取时构造 If-None-Match / If-Modified-Since
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseHeaders {
    /// ETag值
    pub etag: Option<String>,
    /// Last-Modified值
    pub last_modified: Option<String>,
}

impl ResponseHeaders {
    /// 判断是否不含任何条件头
    pub fn is_empty(&self) -> bool {
        self.etag.is_none() && self.last_modified.is_none()
    }
}

impl Response {
    /// 创建一个无响应体的响应记录
    ///
    /// 用于304 Not Modified或无意义正文的场景，不触发任何存储写入
    pub fn new(status_code: u16, headers: ResponseHeaders) -> Self {
        Self {
            id: Uuid::new_v4(),
            status_code,
            text_hash: None,
            has_compressed_text: false,
            is_cloudflare: false,
            s3_object_key: None,
            redis_cache_key: None,
            headers,
            created_at: Utc::now().into(),
        }
    }

    /// 判断该响应是否引用了已存储的响应体
    pub fn has_body(&self) -> bool {
        self.text_hash.is_some()
    }
}

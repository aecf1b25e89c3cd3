// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};
use thiserror::Error;
use tracing::debug;

/// 文本编码处理错误类型
#[derive(Error, Debug, Clone)]
pub enum TextEncodingError {
    /// 源站声明了未知的字符集标签
    #[error("Unsupported charset label: {0}")]
    UnsupportedCharset(String),
}

/// 从Content-Type头中提取charset参数
///
/// # 参数
///
/// * `content_type` - Content-Type头的原始值
///
/// # 返回值
///
/// charset参数值（小写、去引号），不存在时返回None
pub fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .map(str::trim)
        .find_map(|param| param.strip_prefix("charset="))
        .map(|value| value.trim_matches('"').trim().to_ascii_lowercase())
        .filter(|value| !value.is_empty())
}

/// 将响应体字节解码为UTF-8文本
///
/// 解码顺序：Content-Type声明的字符集优先；未声明且非合法UTF-8时
/// 通过字节统计探测编码。声明了无法识别的字符集标签时报错，
/// 调用方应将该次尝试归类为解析失败并保留原始字节。
///
/// # 参数
///
/// * `bytes` - 响应体原始字节
/// * `content_type` - Content-Type头（可选）
///
/// # 返回值
///
/// * `Ok(String)` - 解码后的文本
/// * `Err(TextEncodingError)` - 字符集标签无法识别
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> Result<String, TextEncodingError> {
    let declared = content_type.and_then(charset_from_content_type);

    let encoding = match declared {
        Some(label) => Encoding::for_label(label.as_bytes())
            .ok_or(TextEncodingError::UnsupportedCharset(label))?,
        None => {
            if std::str::from_utf8(bytes).is_ok() {
                UTF_8
            } else {
                let mut detector = EncodingDetector::new();
                detector.feed(bytes, true);
                let detected = detector.guess(None, true);
                debug!(encoding = detected.name(), "Detected non-UTF-8 feed body encoding");
                detected
            }
        }
    };

    let (text, _, _) = encoding.decode(bytes);
    Ok(text.into_owned())
}

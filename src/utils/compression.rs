// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// 压缩响应体字节 (zlib deflate)
///
/// # 参数
///
/// * `data` - 原始字节
///
/// # 返回值
///
/// * `Ok(Vec<u8>)` - 压缩后的字节
/// * `Err(std::io::Error)` - 压缩过程中出现的IO错误
pub fn deflate(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// 解压响应体字节 (zlib inflate)
///
/// # 参数
///
/// * `data` - 压缩字节
///
/// # 返回值
///
/// * `Ok(Vec<u8>)` - 解压后的字节
/// * `Err(std::io::Error)` - 数据损坏或非zlib流
pub fn inflate(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::config::settings::StorageSettings;
use crate::domain::repositories::blob_repository::{BlobRepository, StoreError};

/// S3 冷存储实现
///
/// 响应体按内容哈希作为对象键写入，一经确认即视为持久；
/// 同一键的重复写入是安全的空操作
pub struct S3Storage {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Storage {
    /// 从环境默认凭证链创建S3存储
    ///
    /// 未显式配置访问密钥时使用，支持实例角色等标准凭证来源
    pub async fn from_env(region: String, bucket: String, endpoint: Option<String>) -> Self {
        let shared_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(region))
            .load()
            .await;

        let mut config_builder = aws_sdk_s3::config::Builder::from(&shared_config);
        if let Some(ep) = endpoint {
            config_builder = config_builder.endpoint_url(ep).force_path_style(true);
        }

        let client = aws_sdk_s3::Client::from_conf(config_builder.build());
        Self { client, bucket }
    }

    pub fn new(
        region: String,
        bucket: String,
        access_key: String,
        secret_key: String,
        endpoint: Option<String>,
    ) -> Self {
        let credentials =
            aws_sdk_s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let mut config_builder = aws_sdk_s3::config::Builder::new()
            .region(aws_sdk_s3::config::Region::new(region))
            .credentials_provider(credentials);

        if let Some(ep) = endpoint {
            config_builder = config_builder.endpoint_url(ep).force_path_style(true);
        }

        let config = config_builder.build();
        let client = aws_sdk_s3::Client::from_conf(config);

        Self { client, bucket }
    }
}

#[async_trait]
impl BlobRepository for S3Storage {
    async fn put(&self, key: &str, data: &[u8]) -> Result<(), StoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => {
                let data = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| StoreError::Backend(e.to_string()))?
                    .into_bytes();
                Ok(Some(data.to_vec()))
            }
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    Ok(None)
                } else {
                    Err(StoreError::Backend(service_error.to_string()))
                }
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(StoreError::Backend(service_error.to_string()))
                }
            }
        }
    }
}

/// 本地文件系统冷存储实现
///
/// 用于开发环境，以文件路径模拟对象键
pub struct LocalStorage {
    base_path: String,
}

impl LocalStorage {
    pub fn new(base_path: String) -> Self {
        Self { base_path }
    }

    fn get_full_path(&self, key: &str) -> String {
        Path::new(&self.base_path)
            .join(key)
            .to_string_lossy()
            .to_string()
    }
}

#[async_trait]
impl BlobRepository for LocalStorage {
    async fn put(&self, key: &str, data: &[u8]) -> Result<(), StoreError> {
        let full_path = self.get_full_path(key);

        if let Some(parent) = Path::new(&full_path).parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&full_path).await?;
        file.write_all(data).await?;
        file.flush().await?;

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let full_path = self.get_full_path(key);

        match fs::read(&full_path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let full_path = self.get_full_path(key);

        match fs::remove_file(&full_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let full_path = self.get_full_path(key);
        Ok(Path::new(&full_path).exists())
    }
}

/// 冷存储工厂函数
pub async fn create_cold_storage(
    settings: &StorageSettings,
) -> Result<Box<dyn BlobRepository>, StoreError> {
    match settings.storage_type.as_str() {
        "local" => {
            let base_path = settings
                .local_path
                .as_ref()
                .cloned()
                .unwrap_or_else(|| "./storage".to_string());
            Ok(Box::new(LocalStorage::new(base_path)))
        }

        "s3" => {
            let region = settings
                .s3_region
                .as_ref()
                .cloned()
                .ok_or_else(|| StoreError::Backend("s3_region is required".to_string()))?;
            let bucket = settings
                .s3_bucket
                .as_ref()
                .cloned()
                .ok_or_else(|| StoreError::Backend("s3_bucket is required".to_string()))?;

            match (&settings.s3_access_key, &settings.s3_secret_key) {
                (Some(access_key), Some(secret_key)) => Ok(Box::new(S3Storage::new(
                    region,
                    bucket,
                    access_key.clone(),
                    secret_key.clone(),
                    settings.s3_endpoint.clone(),
                ))),
                _ => Ok(Box::new(
                    S3Storage::from_env(region, bucket, settings.s3_endpoint.clone()).await,
                )),
            }
        }

        other => Err(StoreError::Backend(format!(
            "Unsupported storage type: {}",
            other
        ))),
    }
}

/// 测试用的内存存储实现（用于单元测试）
pub struct InMemoryStorage {
    data: std::sync::Arc<tokio::sync::RwLock<std::collections::HashMap<String, Vec<u8>>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            data: std::sync::Arc::new(tokio::sync::RwLock::new(std::collections::HashMap::new())),
        }
    }

    /// 当前存储的键数量，测试中用于验证去重
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    /// 是否为空
    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobRepository for InMemoryStorage {
    async fn put(&self, key: &str, data: &[u8]) -> Result<(), StoreError> {
        let mut map = self.data.write().await;
        map.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let map = self.data.read().await;
        Ok(map.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut map = self.data.write().await;
        map.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let map = self.data.read().await;
        Ok(map.contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_string_lossy().to_string());

        storage.put("feed-bodies/abc", b"<rss/>").await.unwrap();
        assert!(storage.exists("feed-bodies/abc").await.unwrap());
        assert_eq!(
            storage.get("feed-bodies/abc").await.unwrap(),
            Some(b"<rss/>".to_vec())
        );

        storage.delete("feed-bodies/abc").await.unwrap();
        assert!(!storage.exists("feed-bodies/abc").await.unwrap());
        assert_eq!(storage.get("feed-bodies/abc").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_local_storage_delete_missing_key_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_string_lossy().to_string());
        assert!(storage.delete("nope").await.is_ok());
    }

    #[tokio::test]
    async fn test_in_memory_storage_round_trip() {
        let storage = InMemoryStorage::new();

        assert!(storage.is_empty().await);
        storage.put("k", b"v").await.unwrap();
        assert_eq!(storage.len().await, 1);
        assert_eq!(storage.get("k").await.unwrap(), Some(b"v".to_vec()));

        // Re-writing the same key must not grow the store
        storage.put("k", b"v").await.unwrap();
        assert_eq!(storage.len().await, 1);
    }

    #[tokio::test]
    async fn test_factory_rejects_unknown_storage_type() {
        let settings = StorageSettings {
            storage_type: "ftp".to_string(),
            local_path: None,
            s3_region: None,
            s3_bucket: None,
            s3_access_key: None,
            s3_secret_key: None,
            s3_endpoint: None,
        };
        assert!(create_cold_storage(&settings).await.is_err());
    }
}

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::*;
use std::sync::Arc;

use crate::domain::repositories::blob_repository::{BlobRepository, StoreError};
use crate::infrastructure::database::entities::response_body;

/// 数据库内联存储层
///
/// 小响应体直接落在哈希键控的`response_bodies`表中。
/// 同一哈希重复写入通过冲突忽略实现幂等。
pub struct DbBodyStore {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl DbBodyStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn map_err(e: DbErr) -> StoreError {
        StoreError::Backend(e.to_string())
    }
}

#[async_trait]
impl BlobRepository for DbBodyStore {
    async fn put(&self, key: &str, data: &[u8]) -> Result<(), StoreError> {
        let active_model = response_body::ActiveModel {
            hash: Set(key.to_string()),
            content: Set(data.to_vec()),
            created_at: Set(Utc::now().into()),
        };

        response_body::Entity::insert(active_model)
            .on_conflict(
                sea_query::OnConflict::column(response_body::Column::Hash)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(Self::map_err)?;

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let model = response_body::Entity::find_by_id(key.to_string())
            .one(self.db.as_ref())
            .await
            .map_err(Self::map_err)?;

        Ok(model.map(|m| m.content))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        response_body::Entity::delete_by_id(key.to_string())
            .exec(self.db.as_ref())
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let count = response_body::Entity::find_by_id(key.to_string())
            .count(self.db.as_ref())
            .await
            .map_err(Self::map_err)?;
        Ok(count > 0)
    }
}

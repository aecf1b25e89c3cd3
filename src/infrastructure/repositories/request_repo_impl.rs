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
use chrono::{DateTime, FixedOffset};
use sea_orm::*;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::models::request::{Request, RequestSource, RequestStatus};
use crate::domain::models::response::{Response, ResponseHeaders};
use crate::domain::repositories::request_repository::{RepositoryError, RequestRepository};
use crate::infrastructure::database::entities::{request as request_entity, response as response_entity};

/// 请求仓库实现
pub struct RequestRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

/// 可重试失败状态的存储形态，到期查询用
const RETRYABLE_STATUSES: [&str; 5] = [
    "fetch_failed",
    "parse_failed",
    "invalid_ssl",
    "forbidden",
    "timed_out",
];

impl RequestRepositoryImpl {
    /// 创建新的请求仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn to_request_model(
        model: request_entity::Model,
        response: Option<response_entity::Model>,
    ) -> Result<Request, RepositoryError> {
        let status = RequestStatus::from_str(&model.status).map_err(|_| {
            RepositoryError::Database(DbErr::Custom(format!(
                "Unknown request status: {}",
                model.status
            )))
        })?;

        let source = match model.source {
            Some(s) => Some(RequestSource::from_str(&s).map_err(|_| {
                RepositoryError::Database(DbErr::Custom(format!("Unknown request source: {}", s)))
            })?),
            None => None,
        };

        Ok(Request {
            id: model.id,
            url: model.url,
            lookup_key: model.lookup_key,
            status,
            source,
            fetch_options: model.fetch_options,
            created_at: model.created_at,
            next_retry_date: model.next_retry_date,
            error_message: model.error_message,
            response: response.map(Self::to_response_model),
        })
    }

    fn to_response_model(model: response_entity::Model) -> Response {
        let headers = model
            .headers
            .and_then(|json| serde_json::from_value::<ResponseHeaders>(json).ok())
            .unwrap_or_default();

        Response {
            id: model.id,
            status_code: model.status_code as u16,
            text_hash: model.text_hash,
            has_compressed_text: model.has_compressed_text,
            is_cloudflare: model.is_cloudflare,
            s3_object_key: model.s3_object_key,
            redis_cache_key: model.redis_cache_key,
            headers,
            created_at: model.created_at,
        }
    }

    async fn load_response(
        &self,
        response_id: Option<Uuid>,
    ) -> Result<Option<response_entity::Model>, RepositoryError> {
        match response_id {
            Some(id) => Ok(response_entity::Entity::find_by_id(id)
                .one(self.db.as_ref())
                .await?),
            None => Ok(None),
        }
    }

    async fn hydrate(
        &self,
        model: Option<request_entity::Model>,
    ) -> Result<Option<Request>, RepositoryError> {
        match model {
            Some(model) => {
                let response = self.load_response(model.response_id).await?;
                Ok(Some(Self::to_request_model(model, response)?))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl RequestRepository for RequestRepositoryImpl {
    async fn insert(&self, request: &Request) -> Result<(), RepositoryError> {
        let txn = self.db.begin().await?;

        let response_id = match &request.response {
            Some(response) => {
                let headers = serde_json::to_value(&response.headers).ok();
                let active_model = response_entity::ActiveModel {
                    id: Set(response.id),
                    status_code: Set(response.status_code as i32),
                    text_hash: Set(response.text_hash.clone()),
                    has_compressed_text: Set(response.has_compressed_text),
                    is_cloudflare: Set(response.is_cloudflare),
                    s3_object_key: Set(response.s3_object_key.clone()),
                    redis_cache_key: Set(response.redis_cache_key.clone()),
                    headers: Set(headers),
                    created_at: Set(response.created_at),
                };

                response_entity::Entity::insert(active_model)
                    .exec(&txn)
                    .await?;

                Some(response.id)
            }
            None => None,
        };

        let active_model = request_entity::ActiveModel {
            id: Set(request.id),
            url: Set(request.url.clone()),
            lookup_key: Set(request.lookup_key.clone()),
            status: Set(request.status.to_string()),
            source: Set(request.source.map(|s| s.to_string())),
            fetch_options: Set(request.fetch_options.clone()),
            created_at: Set(request.created_at),
            next_retry_date: Set(request.next_retry_date),
            error_message: Set(request.error_message.clone()),
            response_id: Set(response_id),
        };

        request_entity::Entity::insert(active_model).exec(&txn).await?;

        txn.commit().await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Request>, RepositoryError> {
        let model = request_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;
        self.hydrate(model).await
    }

    async fn latest_request(&self, lookup_key: &str) -> Result<Option<Request>, RepositoryError> {
        let model = request_entity::Entity::find()
            .filter(request_entity::Column::LookupKey.eq(lookup_key))
            .order_by_desc(request_entity::Column::CreatedAt)
            .one(self.db.as_ref())
            .await?;
        self.hydrate(model).await
    }

    async fn latest_ok_request(
        &self,
        lookup_key: &str,
    ) -> Result<Option<Request>, RepositoryError> {
        let model = request_entity::Entity::find()
            .filter(request_entity::Column::LookupKey.eq(lookup_key))
            .filter(request_entity::Column::Status.eq(RequestStatus::Ok.to_string()))
            .order_by_desc(request_entity::Column::CreatedAt)
            .one(self.db.as_ref())
            .await?;
        self.hydrate(model).await
    }

    async fn count_failures_since(
        &self,
        lookup_key: &str,
        since: Option<DateTime<FixedOffset>>,
    ) -> Result<u32, RepositoryError> {
        let mut query = request_entity::Entity::find()
            .filter(request_entity::Column::LookupKey.eq(lookup_key))
            .filter(request_entity::Column::Status.is_in(RETRYABLE_STATUSES));

        if let Some(since) = since {
            query = query.filter(request_entity::Column::CreatedAt.gt(since));
        }

        let count = query.count(self.db.as_ref()).await?;
        Ok(count as u32)
    }

    async fn latest_next_retry_date(
        &self,
        lookup_key: &str,
    ) -> Result<Option<DateTime<FixedOffset>>, RepositoryError> {
        let model = request_entity::Entity::find()
            .filter(request_entity::Column::LookupKey.eq(lookup_key))
            .filter(request_entity::Column::NextRetryDate.is_not_null())
            .order_by_desc(request_entity::Column::CreatedAt)
            .one(self.db.as_ref())
            .await?;

        Ok(model.and_then(|m| m.next_retry_date))
    }

    async fn find_due(
        &self,
        now: DateTime<FixedOffset>,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Uuid>, RepositoryError> {
        let ids = request_entity::Entity::find()
            .filter(request_entity::Column::Status.is_in(RETRYABLE_STATUSES))
            .filter(request_entity::Column::NextRetryDate.lte(now))
            .order_by_asc(request_entity::Column::NextRetryDate)
            .offset(offset)
            .limit(limit)
            .select_only()
            .column(request_entity::Column::Id)
            .into_tuple::<Uuid>()
            .all(self.db.as_ref())
            .await?;

        Ok(ids)
    }
}

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{Duration, Utc};
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection, DbErr};
use std::sync::Arc;

use feedfetch::domain::models::request::{Request, RequestSource, RequestStatus};
use feedfetch::domain::models::response::{Response, ResponseHeaders};
use feedfetch::domain::repositories::blob_repository::BlobRepository;
use feedfetch::domain::repositories::request_repository::RequestRepository;
use feedfetch::infrastructure::database::body_store::DbBodyStore;
use feedfetch::infrastructure::repositories::request_repo_impl::RequestRepositoryImpl;

/// 创建测试数据库连接并运行迁移
async fn create_test_db() -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

fn ok_request(lookup_key: &str, etag: &str) -> Request {
    let mut response = Response::new(
        200,
        ResponseHeaders {
            etag: Some(etag.to_string()),
            last_modified: None,
        },
    );
    response.text_hash = Some("deadbeef".to_string());

    Request::new("https://ex.com/feed.xml", Some(lookup_key.to_string()), None)
        .complete(response)
        .unwrap()
}

fn failed_request(lookup_key: &str, retry_in_seconds: Option<i64>) -> Request {
    Request::new(
        "https://ex.com/feed.xml",
        Some(lookup_key.to_string()),
        Some(RequestSource::Schedule),
    )
    .fail(
        RequestStatus::FetchFailed,
        Some("connection refused".to_string()),
        None,
    )
    .unwrap()
    .schedule_retry(retry_in_seconds.map(|s| (Utc::now() + Duration::seconds(s)).into()))
}

#[tokio::test]
async fn test_insert_and_hydrate_request_with_response() {
    let db = Arc::new(create_test_db().await.unwrap());
    let repo = RequestRepositoryImpl::new(db);

    let request = ok_request("feed-1", "\"abc\"");
    repo.insert(&request).await.unwrap();

    let loaded = repo.find_by_id(request.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, RequestStatus::Ok);
    assert_eq!(loaded.lookup_key, "feed-1");

    let response = loaded.response.expect("response row must be linked");
    assert_eq!(response.status_code, 200);
    assert_eq!(response.text_hash.as_deref(), Some("deadbeef"));
    assert_eq!(response.headers.etag.as_deref(), Some("\"abc\""));
}

#[tokio::test]
async fn test_latest_ok_request_skips_failures() {
    let db = Arc::new(create_test_db().await.unwrap());
    let repo = RequestRepositoryImpl::new(db);

    let ok = ok_request("feed-1", "\"v1\"");
    repo.insert(&ok).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    repo.insert(&failed_request("feed-1", Some(600))).await.unwrap();

    let latest = repo.latest_request("feed-1").await.unwrap().unwrap();
    assert_eq!(latest.status, RequestStatus::FetchFailed);

    let latest_ok = repo.latest_ok_request("feed-1").await.unwrap().unwrap();
    assert_eq!(latest_ok.id, ok.id);
}

#[tokio::test]
async fn test_count_failures_since_last_ok() {
    let db = Arc::new(create_test_db().await.unwrap());
    let repo = RequestRepositoryImpl::new(db);

    repo.insert(&failed_request("feed-1", Some(600))).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let ok = ok_request("feed-1", "\"v1\"");
    repo.insert(&ok).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    repo.insert(&failed_request("feed-1", Some(600))).await.unwrap();
    repo.insert(&failed_request("feed-1", Some(600))).await.unwrap();

    assert_eq!(
        repo.count_failures_since("feed-1", None).await.unwrap(),
        3
    );
    assert_eq!(
        repo.count_failures_since("feed-1", Some(ok.created_at))
            .await
            .unwrap(),
        2
    );
}

#[tokio::test]
async fn test_find_due_orders_oldest_first() {
    let db = Arc::new(create_test_db().await.unwrap());
    let repo = RequestRepositoryImpl::new(db);

    let oldest = failed_request("feed-1", Some(-600));
    let newer = failed_request("feed-2", Some(-60));
    repo.insert(&newer).await.unwrap();
    repo.insert(&oldest).await.unwrap();
    repo.insert(&failed_request("feed-3", Some(600))).await.unwrap();
    repo.insert(&failed_request("feed-4", None)).await.unwrap();

    let due = repo.find_due(Utc::now().into(), 10, 0).await.unwrap();
    assert_eq!(due, vec![oldest.id, newer.id]);
}

#[tokio::test]
async fn test_latest_next_retry_date() {
    let db = Arc::new(create_test_db().await.unwrap());
    let repo = RequestRepositoryImpl::new(db);

    assert!(repo
        .latest_next_retry_date("feed-1")
        .await
        .unwrap()
        .is_none());

    let failed = failed_request("feed-1", Some(600));
    repo.insert(&failed).await.unwrap();

    let latest = repo
        .latest_next_retry_date("feed-1")
        .await
        .unwrap()
        .expect("retry date must survive the round trip");
    let drift = (latest - failed.next_retry_date.unwrap()).num_seconds().abs();
    assert!(drift <= 1);
}

#[tokio::test]
async fn test_body_store_is_idempotent_per_hash() {
    let db = Arc::new(create_test_db().await.unwrap());
    let store = DbBodyStore::new(db);

    store.put("hash-a", b"<rss/>").await.unwrap();
    store.put("hash-a", b"<rss/>").await.unwrap();

    assert!(store.exists("hash-a").await.unwrap());
    assert_eq!(store.get("hash-a").await.unwrap(), Some(b"<rss/>".to_vec()));

    store.delete("hash-a").await.unwrap();
    assert!(!store.exists("hash-a").await.unwrap());
}

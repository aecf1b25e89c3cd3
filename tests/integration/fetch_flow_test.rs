// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sha2::{Digest, Sha256};
use std::time::Duration;

use feedfetch::domain::models::request::{RequestSource, RequestStatus};
use feedfetch::fetcher::{FetchedHeaders, FetchedResponse, TransportError};

use crate::helpers::{engine, Engine};

fn ok_response(body: &[u8], etag: Option<&str>) -> FetchedResponse {
    FetchedResponse {
        status_code: 200,
        headers: FetchedHeaders {
            etag: etag.map(|s| s.to_string()),
            last_modified: None,
            server: Some("nginx".to_string()),
            content_type: Some("application/rss+xml; charset=utf-8".to_string()),
        },
        body: body.to_vec(),
    }
}

#[tokio::test]
async fn test_first_fetch_records_ok_request_with_inline_body() {
    let e: Engine = engine();
    let body = b"<rss><channel><title>ex</title></channel></rss>";
    e.fetcher.enqueue(Ok(ok_response(body, None))).await;

    let request = e.coordinator.fetch("https://ex.com/feed.xml").await.unwrap();

    assert_eq!(request.status, RequestStatus::Ok);
    assert!(request.next_retry_date.is_none());

    let response = request.response.expect("successful request has a response");
    assert_eq!(
        response.text_hash.as_deref(),
        Some(hex::encode(Sha256::digest(body)).as_str())
    );
    // Below the inline threshold: no cold storage key
    assert!(response.s3_object_key.is_none());
    assert!(e.cold.is_empty().await);
    assert_eq!(e.inline.len().await, 1);
    assert_eq!(e.repository.len().await, 1);
}

#[tokio::test]
async fn test_not_modified_reuses_conditional_headers_and_stores_no_body() {
    let e = engine();
    e.fetcher
        .enqueue(Ok(ok_response(b"<rss/>", Some("\"abc\""))))
        .await;
    e.fetcher
        .enqueue(Ok(FetchedResponse {
            status_code: 304,
            headers: FetchedHeaders::default(),
            body: Vec::new(),
        }))
        .await;

    e.coordinator.fetch("https://ex.com/feed.xml").await.unwrap();
    let bodies_after_first = e.inline.len().await;

    let second = e.coordinator.fetch("https://ex.com/feed.xml").await.unwrap();

    assert_eq!(second.status, RequestStatus::Ok);
    let response = second.response.expect("304 still records a response row");
    assert!(response.text_hash.is_none());
    assert_eq!(e.inline.len().await, bodies_after_first);

    // The prior etag was replayed as a conditional header
    let conditionals = e.fetcher.seen_conditionals().await;
    assert!(conditionals[0].is_empty());
    assert_eq!(conditionals[1].etag.as_deref(), Some("\"abc\""));
}

#[tokio::test]
async fn test_retry_budget_exhausts_after_max_attempts() {
    let e = engine();
    for _ in 0..3 {
        e.fetcher
            .enqueue(Err(TransportError::Timeout(Duration::from_secs(1))))
            .await;
    }

    let first = e.coordinator.fetch("https://ex.com/feed.xml").await.unwrap();
    assert_eq!(first.status, RequestStatus::TimedOut);
    assert!(first.next_retry_date.is_some());
    assert!(first.response.is_none());

    let second = e.coordinator.fetch("https://ex.com/feed.xml").await.unwrap();
    assert!(second.next_retry_date.is_some());
    assert!(second.next_retry_date > first.next_retry_date);

    // Third consecutive failure exhausts the budget: permanent-failure signal
    let third = e.coordinator.fetch("https://ex.com/feed.xml").await.unwrap();
    assert_eq!(third.status, RequestStatus::TimedOut);
    assert!(third.next_retry_date.is_none());

    assert_eq!(e.repository.len().await, 3);
}

#[tokio::test]
async fn test_success_resets_failure_streak() {
    let e = engine();
    e.fetcher
        .enqueue(Err(TransportError::Connect("connection refused".to_string())))
        .await;
    e.fetcher.enqueue(Ok(ok_response(b"<rss/>", None))).await;
    e.fetcher
        .enqueue(Err(TransportError::Connect("connection refused".to_string())))
        .await;

    e.coordinator.fetch("https://ex.com/feed.xml").await.unwrap();
    e.coordinator.fetch("https://ex.com/feed.xml").await.unwrap();
    let after_success = e.coordinator.fetch("https://ex.com/feed.xml").await.unwrap();

    // The streak restarted after the OK request, so a retry is scheduled again
    assert_eq!(after_success.status, RequestStatus::FetchFailed);
    assert!(after_success.next_retry_date.is_some());
}

#[tokio::test]
async fn test_identical_bodies_across_urls_store_one_blob() {
    let e = engine();
    let body = b"<rss><channel><title>mirrored</title></channel></rss>";
    e.fetcher.enqueue(Ok(ok_response(body, None))).await;
    e.fetcher.enqueue(Ok(ok_response(body, None))).await;

    let first = e.coordinator.fetch("https://a.com/feed.xml").await.unwrap();
    let second = e.coordinator.fetch("https://b.com/feed.xml").await.unwrap();

    let first_hash = first.response.unwrap().text_hash;
    let second_hash = second.response.unwrap().text_hash;
    assert_eq!(first_hash, second_hash);

    // Two request rows, two response rows, one stored blob
    assert_eq!(e.repository.len().await, 2);
    assert_eq!(e.inline.len().await, 1);
    // Two hits stay below the promotion threshold: no hot mirror yet
    assert!(e.hot.is_empty().await);
}

#[tokio::test]
async fn test_forbidden_status_keeps_error_body_inspectable() {
    let e = engine();
    e.fetcher
        .enqueue(Ok(FetchedResponse {
            status_code: 403,
            headers: FetchedHeaders {
                server: Some("nginx".to_string()),
                content_type: Some("text/html".to_string()),
                ..FetchedHeaders::default()
            },
            body: b"<html>denied</html>".to_vec(),
        }))
        .await;

    let request = e.coordinator.fetch("https://ex.com/feed.xml").await.unwrap();

    assert_eq!(request.status, RequestStatus::Forbidden);
    assert!(request.next_retry_date.is_some());
    // The error body was still recorded for inspection
    let response = request.response.expect("403 with a body records a response");
    assert_eq!(response.status_code, 403);
    assert!(response.text_hash.is_some());
}

#[tokio::test]
async fn test_rate_limited_backs_off_longer_than_network_failure() {
    let network = engine();
    network
        .fetcher
        .enqueue(Err(TransportError::Connect("refused".to_string())))
        .await;
    let network_request = network
        .coordinator
        .fetch("https://ex.com/feed.xml")
        .await
        .unwrap();

    let rate_limited = engine();
    rate_limited
        .fetcher
        .enqueue(Ok(FetchedResponse {
            status_code: 429,
            headers: FetchedHeaders::default(),
            body: b"slow down".to_vec(),
        }))
        .await;
    let rate_limited_request = rate_limited
        .coordinator
        .fetch("https://ex.com/feed.xml")
        .await
        .unwrap();

    let network_delay = network_request.next_retry_date.unwrap() - network_request.created_at;
    let rate_limited_delay =
        rate_limited_request.next_retry_date.unwrap() - rate_limited_request.created_at;
    assert!(rate_limited_delay > network_delay);
}

#[tokio::test]
async fn test_cloudflare_challenge_is_flagged() {
    let e = engine();
    e.fetcher
        .enqueue(Ok(FetchedResponse {
            status_code: 503,
            headers: FetchedHeaders {
                server: Some("cloudflare".to_string()),
                content_type: Some("text/html".to_string()),
                ..FetchedHeaders::default()
            },
            body: b"<html>Just a moment...</html>".to_vec(),
        }))
        .await;

    let request = e.coordinator.fetch("https://ex.com/feed.xml").await.unwrap();

    assert_eq!(request.status, RequestStatus::FetchFailed);
    assert!(request.response.unwrap().is_cloudflare);
}

#[tokio::test]
async fn test_manual_source_is_persisted() {
    let e = engine();
    e.fetcher.enqueue(Ok(ok_response(b"<rss/>", None))).await;

    let mut input = feedfetch::domain::services::fetch_coordinator::FetchInput::new(
        "https://ex.com/feed.xml",
    );
    input.source = Some(RequestSource::Manual);
    let request = e.coordinator.fetch_with_options(input).await.unwrap();

    assert_eq!(request.source, Some(RequestSource::Manual));
    // Stored fetch options carry the default headers
    let options = request.fetch_options.unwrap();
    assert_eq!(
        options["headers"]["user-agent"].as_str().unwrap(),
        "feedfetch-test"
    );
}

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::domain::models::response::ResponseHeaders;
use crate::fetcher::reqwest_fetcher::ReqwestFetcher;
use crate::fetcher::{FetchOptions, Fetcher, TransportError};

fn options() -> FetchOptions {
    FetchOptions {
        timeout: Duration::from_secs(5),
        ..FetchOptions::default()
    }
}

#[tokio::test]
async fn test_fetch_captures_status_headers_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<rss><channel><title>news</title></channel></rss>")
                .insert_header("etag", "\"abc\"")
                .insert_header("last-modified", "Wed, 01 Jan 2025 00:00:00 GMT")
                .insert_header("server", "nginx")
                .insert_header("content-type", "application/rss+xml"),
        )
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(None);
    let response = fetcher
        .fetch(
            &format!("{}/feed.xml", server.uri()),
            &ResponseHeaders::default(),
            &options(),
        )
        .await
        .unwrap();

    assert_eq!(response.status_code, 200);
    assert_eq!(response.headers.etag.as_deref(), Some("\"abc\""));
    assert_eq!(
        response.headers.last_modified.as_deref(),
        Some("Wed, 01 Jan 2025 00:00:00 GMT")
    );
    assert_eq!(response.headers.server.as_deref(), Some("nginx"));
    assert!(String::from_utf8(response.body).unwrap().contains("news"));
}

#[tokio::test]
async fn test_fetch_sends_conditional_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .and(header("if-none-match", "\"abc\""))
        .and(header("if-modified-since", "Wed, 01 Jan 2025 00:00:00 GMT"))
        .respond_with(ResponseTemplate::new(304))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(None);
    let conditional = ResponseHeaders {
        etag: Some("\"abc\"".to_string()),
        last_modified: Some("Wed, 01 Jan 2025 00:00:00 GMT".to_string()),
    };
    let response = fetcher
        .fetch(&format!("{}/feed.xml", server.uri()), &conditional, &options())
        .await
        .unwrap();

    assert_eq!(response.status_code, 304);
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn test_fetch_passes_custom_request_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .and(header("user-agent", "feedfetch-test"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<rss/>"))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(None);
    let mut options = options();
    options
        .headers
        .insert("user-agent".to_string(), "feedfetch-test".to_string());

    let response = fetcher
        .fetch(
            &format!("{}/feed.xml", server.uri()),
            &ResponseHeaders::default(),
            &options,
        )
        .await
        .unwrap();

    assert_eq!(response.status_code, 200);
}

#[tokio::test]
async fn test_fetch_bad_status_code_is_not_a_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(None);
    let response = fetcher
        .fetch(
            &format!("{}/feed.xml", server.uri()),
            &ResponseHeaders::default(),
            &options(),
        )
        .await
        .unwrap();

    assert_eq!(response.status_code, 500);
    assert_eq!(response.body, b"oops");
}

#[tokio::test]
async fn test_fetch_timeout_classification() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(None);
    let mut options = options();
    options.timeout = Duration::from_millis(100);

    let result = fetcher
        .fetch(
            &format!("{}/feed.xml", server.uri()),
            &ResponseHeaders::default(),
            &options,
        )
        .await;

    assert!(matches!(result, Err(TransportError::Timeout(_))));
}

#[tokio::test]
async fn test_fetch_connection_refused_classification() {
    // Nothing is listening on this port
    let fetcher = ReqwestFetcher::new(None);
    let result = fetcher
        .fetch(
            "http://127.0.0.1:1/feed.xml",
            &ResponseHeaders::default(),
            &options(),
        )
        .await;

    assert!(matches!(result, Err(TransportError::Connect(_))));
}

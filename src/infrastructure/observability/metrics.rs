// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// 初始化指标系统
///
/// 安装Prometheus导出器并注册引擎的各类监控指标
pub fn init_metrics() {
    let builder = PrometheusBuilder::new();
    builder
        .install()
        .expect("failed to install Prometheus recorder");

    describe_counter!(
        "feed_fetch_requests_total",
        "Total number of fetch attempts recorded"
    );
    describe_counter!(
        "feed_fetch_failures_total",
        "Total number of fetch attempts that ended in a failure status"
    );
    describe_counter!(
        "feed_fetch_not_modified_total",
        "Total number of conditional fetches short-circuited with 304"
    );
    describe_counter!(
        "feed_fetch_retries_scheduled_total",
        "Total number of retries scheduled after a failed fetch"
    );
    describe_counter!(
        "feed_fetch_retries_exhausted_total",
        "Total number of fetches whose retry budget ran out"
    );
    describe_counter!(
        "body_store_dedup_total",
        "Total number of body writes skipped because the hash already existed"
    );
    describe_counter!(
        "body_cache_hits_total",
        "Total number of body reads served, labelled by storage tier"
    );
    describe_counter!(
        "body_cache_misses_total",
        "Total number of body reads that missed every tier"
    );
    describe_counter!(
        "body_hot_promotions_total",
        "Total number of bodies promoted into the hot cache"
    );
    describe_histogram!(
        "feed_fetch_duration_seconds",
        "Duration of fetch attempts in seconds"
    );
}

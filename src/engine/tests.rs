//! Tests for engine module

use super::*;
use crate::error::FailureKind;
use crate::http::{HttpClient, HttpClientConfig, RateLimiter};
use crate::sink::{JsonlSink, MemorySink};
use crate::storage::ObjectLocation;
use crate::state::{KvStore, MemoryKvStore, StoreError};
use crate::types::parse_timestamp;
use chrono::TimeZone;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    server: MockServer,
    kv: Arc<MemoryKvStore>,
    sink: Arc<MemorySink>,
    clock: Arc<FixedClock>,
    engine: SyncEngine,
}

fn ts(value: &str) -> DateTime<Utc> {
    parse_timestamp(value).unwrap()
}

fn run_clock() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).unwrap() + chrono::Duration::milliseconds(250)
}

async fn harness_with(config: SyncConfig) -> Harness {
    let server = MockServer::start().await;
    let limiter = Arc::new(RateLimiter::with_period(100, Duration::from_secs(60)));
    let client = HttpClient::new(HttpClientConfig::default(), limiter).unwrap();
    let fetcher = PageFetcher::new(Arc::new(client), server.uri());

    let kv = Arc::new(MemoryKvStore::new());
    let watermarks = WatermarkStore::new(kv.clone());
    let sink = Arc::new(MemorySink::new());
    let clock = Arc::new(FixedClock::new(run_clock()));
    let registry = Arc::new(ResourceRegistry::builtin().unwrap());

    let engine = SyncEngine::new(fetcher, watermarks, sink.clone(), registry, config)
        .with_clock(clock.clone());

    Harness {
        server,
        kv,
        sink,
        clock,
        engine,
    }
}

async fn harness() -> Harness {
    harness_with(SyncConfig::from_start_date("2023-01-01").unwrap()).await
}

/// Serve `pages` of `endpoint` chained through `Link` headers
async fn mount_pages(server: &MockServer, endpoint: &str, pages: Vec<Vec<JsonValue>>) {
    let total = pages.len();
    let url_path = format!("/{endpoint}.json");

    for (idx, records) in pages.into_iter().enumerate() {
        let number = idx + 1;
        let mut body = serde_json::Map::new();
        body.insert(endpoint.to_string(), JsonValue::Array(records));
        let mut response = ResponseTemplate::new(200).set_body_json(JsonValue::Object(body));
        if number < total {
            let link = format!(
                "<{}{url_path}?page_info=p{}>; rel=\"next\"",
                server.uri(),
                number + 1
            );
            response = response.insert_header("Link", link.as_str());
        }

        let mock = Mock::given(method("GET")).and(path(url_path.as_str()));
        let mock = if number == 1 {
            mock.and(query_param_is_missing("page_info"))
        } else {
            mock.and(query_param("page_info", format!("p{number}").as_str()))
        };
        mock.respond_with(response).mount(server).await;
    }
}

fn order(id: i64, updated_at: &str) -> JsonValue {
    json!({"id": id, "updated_at": updated_at, "total_price": "10.00"})
}

async fn first_request_params(server: &MockServer) -> Vec<HashMap<String, String>> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.query_pairs().all(|(k, _)| k != "page_info"))
        .map(|r| r.url.query_pairs().into_owned().collect())
        .collect()
}

async fn stored(kv: &MemoryKvStore, key: &str) -> Option<Watermark> {
    kv.raw(key)
        .await
        .map(|raw| serde_json::from_slice(&raw).unwrap())
}

// ============================================================================
// Window Tests
// ============================================================================

#[test]
fn test_window_query_params() {
    let registry = ResourceRegistry::builtin().unwrap();
    let definition = registry.get("customers").unwrap();
    let window = SyncWindow::new(definition, ts("2023-01-01"), ts("2023-06-01 12:00:00")).unwrap();

    let params: HashMap<String, String> = window.query_params(Some(250)).into_iter().collect();
    assert_eq!(params["updated_at_min"], "2023-01-01T00:00:00+00:00");
    assert_eq!(params["updated_at_max"], "2023-06-01T12:00:00+00:00");
    assert!(params["fields"].starts_with("id,created_at,updated_at"));
    assert_eq!(params["limit"], "250");

    let without_limit = window.query_params(None);
    assert!(without_limit.iter().all(|(k, _)| k != "limit"));
}

#[test]
fn test_window_rejects_inverted_bounds() {
    let definition = ResourceDefinition::new("orders");
    let err = SyncWindow::new(&definition, ts("2023-06-02"), ts("2023-06-01")).unwrap_err();
    assert!(matches!(err, Error::InvalidWindow { .. }));
}

#[test]
fn test_window_allows_empty_range() {
    let definition = ResourceDefinition::new("orders");
    assert!(SyncWindow::new(&definition, ts("2023-06-01"), ts("2023-06-01")).is_ok());
}

#[test]
fn test_fixed_clock() {
    let clock = FixedClock::new(ts("2023-06-01 12:00:00"));
    assert_eq!(clock.now(), ts("2023-06-01 12:00:00"));
    clock.advance(chrono::Duration::hours(1));
    assert_eq!(clock.now(), ts("2023-06-01 13:00:00"));
    clock.set(ts("2024-01-01"));
    assert_eq!(clock.now(), ts("2024-01-01"));
}

#[test]
fn test_sync_phase_display() {
    assert_eq!(SyncPhase::WindowOpen.to_string(), "window-open");
    assert_eq!(SyncPhase::Committing.to_string(), "committing");
}

// ============================================================================
// Single Resource Runs
// ============================================================================

#[tokio::test]
async fn test_first_run_starts_at_start_date() {
    let h = harness().await;
    mount_pages(&h.server, "orders", vec![vec![order(1, "2023-05-01T10:00:00+00:00")]]).await;

    let report = h
        .engine
        .sync_resource("orders", &CancellationToken::new())
        .await
        .unwrap();

    let requests = first_request_params(&h.server).await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["updated_at_min"], "2023-01-01T00:00:00+00:00");
    assert_eq!(requests[0]["updated_at_max"], "2023-06-01T12:00:00+00:00");
    assert!(requests[0]["fields"].contains("line_items"));

    let saved = stored(&h.kv, "dlt_shopify_orders").await.unwrap();
    assert_eq!(saved.initial_value, ts("2023-01-01"));
    assert_eq!(saved.last_value, ts("2023-06-01 12:00:00"));
    assert_eq!(saved, report.watermark);
}

#[tokio::test]
async fn test_two_pages_four_records() {
    let h = harness().await;
    mount_pages(
        &h.server,
        "orders",
        vec![
            vec![
                order(1, "2023-05-01T10:00:00+00:00"),
                order(2, "2023-05-02T10:00:00+00:00"),
            ],
            vec![
                order(3, "2023-05-03T10:00:00+00:00"),
                order(4, "2023-05-03T10:00:00+00:00"),
            ],
        ],
    )
    .await;

    let report = h
        .engine
        .sync_resource("orders", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.pages, 2);
    assert_eq!(report.records, 4);
    assert_eq!(report.window.lower_bound, ts("2023-01-01"));
    assert_eq!(report.window.upper_bound, ts("2023-06-01 12:00:00"));

    let ids: Vec<i64> = h
        .sink
        .records("orders")
        .await
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);

    let batches = h.sink.batches().await;
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].page, 1);
    assert_eq!(batches[1].page, 2);
    assert_eq!(batches[0].primary_key, vec!["id", "updated_at"]);
    assert_eq!(batches[0].write_mode, crate::types::WriteMode::Upsert);
    assert_eq!(h.sink.finished().await, vec!["orders".to_string()]);

    let saved = stored(&h.kv, "dlt_shopify_orders").await.unwrap();
    assert_eq!(saved.last_value, ts("2023-06-01 12:00:00"));
    assert_eq!(
        saved.unique_hashes,
        BTreeSet::from([
            "3|2023-05-03T10:00:00+00:00".to_string(),
            "4|2023-05-03T10:00:00+00:00".to_string(),
        ])
    );
}

#[tokio::test]
async fn test_resumes_from_prior_watermark_three_then_one() {
    let h = harness().await;
    let prior = Watermark::first(
        ts("2023-01-01"),
        ts("2023-06-01 00:00:00"),
        ts("2023-06-01 00:00:00"),
    );
    h.engine.watermarks().save("orders", &prior).await.unwrap();
    mount_pages(
        &h.server,
        "orders",
        vec![
            vec![
                order(11, "2023-06-01T01:00:00+00:00"),
                order(12, "2023-06-01T02:00:00+00:00"),
                order(13, "2023-06-01T03:00:00+00:00"),
            ],
            vec![order(14, "2023-06-01T04:00:00+00:00")],
        ],
    )
    .await;

    let report = h
        .engine
        .sync_resource("orders", &CancellationToken::new())
        .await
        .unwrap();

    let requests = first_request_params(&h.server).await;
    assert_eq!(requests[0]["updated_at_min"], "2023-06-01T00:00:00+00:00");

    let ids: Vec<i64> = h
        .sink
        .records("orders")
        .await
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![11, 12, 13, 14]);
    let pages: Vec<usize> = h.sink.batches().await.iter().map(|b| b.len()).collect();
    assert_eq!(pages, vec![3, 1]);

    let captured_now = truncate_to_seconds(run_clock());
    let saved = stored(&h.kv, "dlt_shopify_orders").await.unwrap();
    assert_eq!(saved.last_value, captured_now);
    assert_eq!(saved.initial_value, ts("2023-01-01"));
    assert_eq!(saved, report.watermark);
}

#[tokio::test]
async fn test_next_run_starts_at_last_value() {
    let h = harness().await;
    mount_pages(&h.server, "orders", vec![vec![]]).await;
    let cancel = CancellationToken::new();

    h.engine.sync_resource("orders", &cancel).await.unwrap();
    h.clock.advance(chrono::Duration::hours(2));
    let second = h.engine.sync_resource("orders", &cancel).await.unwrap();

    let requests = first_request_params(&h.server).await;
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1]["updated_at_min"], "2023-06-01T12:00:00+00:00");
    assert_eq!(requests[1]["updated_at_max"], "2023-06-01T14:00:00+00:00");

    assert_eq!(second.watermark.initial_value, ts("2023-01-01"));
    assert_eq!(second.watermark.last_value, ts("2023-06-01 14:00:00"));
}

#[tokio::test]
async fn test_empty_result_still_commits() {
    let h = harness().await;
    mount_pages(&h.server, "customers", vec![vec![]]).await;

    let report = h
        .engine
        .sync_resource("customers", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.pages, 1);
    assert_eq!(report.records, 0);
    assert!(report.watermark.unique_hashes.is_empty());
    assert!(stored(&h.kv, "dlt_shopify_customers").await.is_some());
}

#[tokio::test]
async fn test_page_limit_is_sent() {
    let h = harness_with(
        SyncConfig::from_start_date("2023-01-01")
            .unwrap()
            .with_page_limit(5),
    )
    .await;
    mount_pages(&h.server, "orders", vec![vec![]]).await;

    h.engine
        .sync_resource("orders", &CancellationToken::new())
        .await
        .unwrap();

    let requests = first_request_params(&h.server).await;
    assert_eq!(requests[0]["limit"], "5");
}

// ============================================================================
// Failure Handling
// ============================================================================

#[tokio::test]
async fn test_rate_limited_page_two_leaves_watermark() {
    let h = harness().await;
    let prior = Watermark::first(ts("2023-01-01"), ts("2023-05-01"), ts("2023-05-01"));
    h.engine.watermarks().save("orders", &prior).await.unwrap();
    let sets_before = h.kv.set_calls();

    Mock::given(method("GET"))
        .and(path("/orders.json"))
        .and(query_param_is_missing("page_info"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(
                    "Link",
                    format!("<{}/orders.json?page_info=p2>; rel=\"next\"", h.server.uri()).as_str(),
                )
                .set_body_json(json!({"orders": [order(1, "2023-05-10T00:00:00+00:00")]})),
        )
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/orders.json"))
        .and(query_param("page_info", "p2"))
        .respond_with(ResponseTemplate::new(429).set_body_string("Exceeded 2 calls per second"))
        .mount(&h.server)
        .await;

    let err = h
        .engine
        .sync_resource("orders", &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(429));
    assert_eq!(err.kind(), FailureKind::UpstreamRejected);
    assert_eq!(h.kv.set_calls(), sets_before);
    assert_eq!(stored(&h.kv, "dlt_shopify_orders").await, Some(prior));
    // Page one was delivered, but the load was never confirmed.
    assert_eq!(h.sink.records("orders").await.len(), 1);
    assert!(h.sink.finished().await.is_empty());
    assert_eq!(h.sink.aborted().await, vec!["orders".to_string()]);
}

#[tokio::test]
async fn test_failed_run_is_replayed_with_same_lower_bound() {
    let h = harness().await;

    Mock::given(method("GET"))
        .and(path("/orders.json"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&h.server)
        .await;
    mount_pages(&h.server, "orders", vec![vec![order(1, "2023-05-01T10:00:00+00:00")]]).await;

    let cancel = CancellationToken::new();
    assert!(h.engine.sync_resource("orders", &cancel).await.is_err());
    assert!(stored(&h.kv, "dlt_shopify_orders").await.is_none());

    h.clock.advance(chrono::Duration::minutes(5));
    let report = h.engine.sync_resource("orders", &cancel).await.unwrap();

    let requests = first_request_params(&h.server).await;
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0]["updated_at_min"], requests[1]["updated_at_min"]);
    assert_eq!(report.watermark.last_value, ts("2023-06-01 12:05:00"));
}

#[tokio::test]
async fn test_replaying_committed_window_is_idempotent() {
    let h = harness().await;
    mount_pages(&h.server, "orders", vec![vec![order(1, "2023-05-01T10:00:00+00:00")]]).await;
    let cancel = CancellationToken::new();

    let first = h.engine.sync_resource("orders", &cancel).await.unwrap();
    let second = h.engine.sync_resource("orders", &cancel).await.unwrap();

    // Same clock: the second window is empty and the watermark does not move.
    assert_eq!(second.window.lower_bound, second.window.upper_bound);
    assert_eq!(first.watermark.last_value, second.watermark.last_value);
    assert_eq!(first.watermark.initial_value, second.watermark.initial_value);
}

#[tokio::test]
async fn test_watermark_never_regresses() {
    let h = harness().await;
    let future = Watermark::first(ts("2023-01-01"), ts("2023-07-01"), ts("2023-07-01"));
    h.engine.watermarks().save("orders", &future).await.unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"orders": []})))
        .expect(0)
        .mount(&h.server)
        .await;

    let err = h
        .engine
        .sync_resource("orders", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidWindow { ref resource, .. } if resource == "orders"));
    assert_eq!(stored(&h.kv, "dlt_shopify_orders").await, Some(future));
}

#[tokio::test]
async fn test_future_start_date_is_invalid_window() {
    let h = harness_with(SyncConfig::from_start_date("2030-01-01").unwrap()).await;

    let err = h
        .engine
        .sync_resource("orders", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidWindow { .. }));
    assert!(h.server.received_requests().await.unwrap().is_empty());
    assert_eq!(h.kv.set_calls(), 0);
}

#[tokio::test]
async fn test_sink_failure_prevents_commit() {
    let h = harness().await;
    mount_pages(
        &h.server,
        "orders",
        vec![
            vec![order(1, "2023-05-01T10:00:00+00:00")],
            vec![order(2, "2023-05-02T10:00:00+00:00")],
        ],
    )
    .await;
    h.sink.fail_writes_from_page(2).await;

    let err = h
        .engine
        .sync_resource("orders", &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), FailureKind::Sink);
    assert_eq!(h.kv.set_calls(), 0);
}

#[tokio::test]
async fn test_unconfirmed_load_prevents_commit() {
    let h = harness().await;
    mount_pages(&h.server, "orders", vec![vec![order(1, "2023-05-01T10:00:00+00:00")]]).await;
    h.sink.fail_finish().await;

    let err = h
        .engine
        .sync_resource("orders", &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), FailureKind::Sink);
    assert_eq!(h.kv.set_calls(), 0);
}

#[tokio::test]
async fn test_committed_run_does_not_abort() {
    let h = harness().await;
    mount_pages(&h.server, "orders", vec![vec![order(1, "2023-05-01T10:00:00+00:00")]]).await;

    h.engine
        .sync_resource("orders", &CancellationToken::new())
        .await
        .unwrap();

    assert!(h.sink.aborted().await.is_empty());
}

#[tokio::test]
async fn test_manifest_after_failed_attempt_lists_only_retried_pages() {
    let dir = tempfile::tempdir().unwrap();
    let location = ObjectLocation::parse(dir.path().to_str().unwrap()).unwrap();
    let started_at = Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).unwrap();
    let sink = Arc::new(JsonlSink::for_run(location, started_at));

    let h = harness().await;
    let engine = SyncEngine {
        sink: sink.clone(),
        ..h.engine.clone()
    };

    Mock::given(method("GET"))
        .and(path("/orders.json"))
        .and(query_param_is_missing("page_info"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(
                    "Link",
                    format!("<{}/orders.json?page_info=p2>; rel=\"next\"", h.server.uri()).as_str(),
                )
                .set_body_json(json!({"orders": [order(1, "2023-05-01T10:00:00+00:00")]})),
        )
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/orders.json"))
        .and(query_param("page_info", "p2"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/orders.json"))
        .and(query_param("page_info", "p2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"orders": [order(2, "2023-05-02T10:00:00+00:00")]})),
        )
        .mount(&h.server)
        .await;

    let cancel = CancellationToken::new();
    assert!(engine.sync_resource("orders", &cancel).await.is_err());
    engine.sync_resource("orders", &cancel).await.unwrap();

    let manifest_path = dir
        .path()
        .join("orders/dt=2023-06-01/20230601T120000Z-manifest.json");
    let manifest: JsonValue =
        serde_json::from_str(&std::fs::read_to_string(manifest_path).unwrap()).unwrap();
    assert_eq!(manifest["records"], 2);
    assert_eq!(
        manifest["files"],
        json!([
            "orders/dt=2023-06-01/20230601T120000Z-00001.jsonl",
            "orders/dt=2023-06-01/20230601T120000Z-00002.jsonl"
        ])
    );
}

#[tokio::test]
async fn test_store_failure_on_load_fetches_nothing() {
    let h = harness().await;
    let watermarks =
        WatermarkStore::new(h.kv.clone()).with_retry(crate::retry::RetryPolicy::no_retry());
    let engine = SyncEngine {
        watermarks,
        ..h.engine.clone()
    };
    h.kv
        .inject_failures(1, StoreError::Transient("connection refused".into()))
        .await;

    let err = engine
        .sync_resource("orders", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::FatalStore { attempts: 1, .. }));
    assert_eq!(err.kind(), FailureKind::StoreUnavailable);
    assert!(h.server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_resource() {
    let h = harness().await;

    let err = h
        .engine
        .sync_resource("products", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ResourceNotFound { .. }));
    assert_eq!(err.kind(), FailureKind::Configuration);
    assert_eq!(h.kv.get_calls(), 0);
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_cancelled_before_start() {
    let h = harness().await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = h.engine.sync_resource("orders", &cancel).await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::Cancelled);
    assert_eq!(h.kv.get_calls(), 0);
    assert!(h.server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cancelled_mid_drain_does_not_commit() {
    let h = harness().await;

    Mock::given(method("GET"))
        .and(path("/orders.json"))
        .and(query_param_is_missing("page_info"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(
                    "Link",
                    format!("<{}/orders.json?page_info=p2>; rel=\"next\"", h.server.uri()).as_str(),
                )
                .set_body_json(json!({"orders": [order(1, "2023-05-01T10:00:00+00:00")]})),
        )
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/orders.json"))
        .and(query_param("page_info", "p2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(10))
                .set_body_json(json!({"orders": []})),
        )
        .mount(&h.server)
        .await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let err = h.engine.sync_resource("orders", &cancel).await.unwrap_err();

    assert!(matches!(err, Error::Cancelled { ref resource } if resource == "orders"));
    assert_eq!(h.kv.set_calls(), 0);
    assert_eq!(h.sink.records("orders").await.len(), 1);
    assert!(h.sink.finished().await.is_empty());
    assert_eq!(h.sink.aborted().await, vec!["orders".to_string()]);
}

// ============================================================================
// sync_all
// ============================================================================

#[tokio::test]
async fn test_sibling_failure_is_isolated() {
    let h = harness().await;
    mount_pages(
        &h.server,
        "customers",
        vec![vec![json!({"id": 7, "updated_at": "2023-05-01T00:00:00+00:00"})]],
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/orders.json"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&h.server)
        .await;

    let outcomes = h
        .engine
        .sync_all(
            &["customers".to_string(), "orders".to_string()],
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].resource, "customers");
    assert!(outcomes[0].is_success());
    assert_eq!(outcomes[1].resource, "orders");
    assert_eq!(outcomes[1].failure_kind(), Some(FailureKind::UpstreamRejected));

    assert!(stored(&h.kv, "dlt_shopify_customers").await.is_some());
    assert!(stored(&h.kv, "dlt_shopify_orders").await.is_none());
}

#[tokio::test]
async fn test_sync_all_runs_each_resource_once() {
    let h = harness().await;
    mount_pages(&h.server, "orders", vec![vec![]]).await;

    let outcomes = h
        .engine
        .sync_all(
            &["orders".to_string(), "orders".to_string()],
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].is_success());
    assert_eq!(first_request_params(&h.server).await.len(), 1);
}

#[tokio::test]
async fn test_sync_all_reports_unknown_resources() {
    let h = harness().await;
    mount_pages(&h.server, "orders", vec![vec![]]).await;

    let outcomes = h
        .engine
        .sync_all(
            &["products".to_string(), "orders".to_string()],
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(outcomes[0].failure_kind(), Some(FailureKind::Configuration));
    assert!(outcomes[1].is_success());
    assert!(h.kv.get("dlt_shopify_orders").await.unwrap().is_some());
}

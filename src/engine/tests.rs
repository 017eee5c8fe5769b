//! Tests for engine module

use super::*;
use crate::error::FailureKind;
use crate::http::{HttpClient, HttpClientConfig, TransportResponse};
use crate::types::{BackoffConfig, BackoffType, JsonValue};
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use test_case::test_case;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const URL: &str = "http://hyperion.test/v3/wells";

// ============================================================================
// In-memory transport
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Scripted {
    Unauthorized,
    ErrorKey,
    /// Fail with a 503 this many times, then serve the page
    Transient(u32),
    AlwaysTransient,
    /// Report `start: 0` regardless of the cursor
    Stalled,
}

#[derive(Default)]
struct Inner {
    total: u64,
    page_size: u64,
    delay: Duration,
    scripted: Mutex<HashMap<u64, Scripted>>,
    cursors: Mutex<Vec<u64>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    pools: AtomicUsize,
    released: AtomicUsize,
}

/// Serves `{"id": n}` rows for `total` rows in pages of `page_size`
#[derive(Clone)]
struct PagedTransport {
    inner: Arc<Inner>,
}

impl PagedTransport {
    fn new(total: u64, page_size: u64) -> Self {
        Self {
            inner: Arc::new(Inner {
                total,
                page_size,
                ..Default::default()
            }),
        }
    }

    fn with_delay(total: u64, page_size: u64, delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                total,
                page_size,
                delay,
                ..Default::default()
            }),
        }
    }

    fn script(self, cursor: u64, behaviour: Scripted) -> Self {
        self.inner.scripted.lock().unwrap().insert(cursor, behaviour);
        self
    }

    fn cursors(&self) -> Vec<u64> {
        self.inner.cursors.lock().unwrap().clone()
    }

    fn sorted_cursors(&self) -> Vec<u64> {
        let mut cursors = self.cursors();
        cursors.sort_unstable();
        cursors
    }

    fn max_in_flight(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }

    fn pools(&self) -> usize {
        self.inner.pools.load(Ordering::SeqCst)
    }

    fn released(&self) -> usize {
        self.inner.released.load(Ordering::SeqCst)
    }

    fn page(&self, cursor: u64, start: u64) -> JsonValue {
        let end = (cursor + self.inner.page_size).min(self.inner.total);
        let rows: Vec<JsonValue> = (cursor..end).map(|id| json!({"id": id})).collect();
        json!({
            "data": rows,
            "pagination": {
                "total_count": self.inner.total,
                "start": start,
                "page_size": self.inner.page_size
            }
        })
    }
}

#[async_trait]
impl Transport for PagedTransport {
    async fn send(&self, request: TransportRequest) -> crate::Result<TransportResponse> {
        let body = request.body.unwrap_or_default();
        let cursor = body["pagination"]["start"].as_u64().unwrap();
        self.inner.cursors.lock().unwrap().push(cursor);

        let now = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.inner.delay.is_zero() {
            tokio::time::sleep(self.inner.delay).await;
        }
        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);

        let scripted = {
            let mut scripted = self.inner.scripted.lock().unwrap();
            let behaviour = scripted.get(&cursor).copied();
            if let Some(Scripted::Transient(n)) = behaviour {
                if n <= 1 {
                    scripted.remove(&cursor);
                } else {
                    scripted.insert(cursor, Scripted::Transient(n - 1));
                }
            }
            behaviour
        };

        let body = match scripted {
            None => self.page(cursor, cursor),
            Some(Scripted::Unauthorized) => {
                return Err(crate::Error::Unauthorized {
                    body: "bad key".to_string(),
                })
            }
            Some(Scripted::ErrorKey) => json!({"error": "something went wrong"}),
            Some(Scripted::Transient(_) | Scripted::AlwaysTransient) => {
                return Err(crate::Error::http_status(503, "busy"))
            }
            Some(Scripted::Stalled) => self.page(cursor, 0),
        };

        Ok(TransportResponse { status: 200, body })
    }

    fn dedicated_pool(&self, _max_connections: usize) -> crate::Result<Arc<dyn Transport>> {
        self.inner.pools.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(PoolHandle(self.clone())))
    }
}

/// Pool handed out by `dedicated_pool`; counts itself released on drop
struct PoolHandle(PagedTransport);

#[async_trait]
impl Transport for PoolHandle {
    async fn send(&self, request: TransportRequest) -> crate::Result<TransportResponse> {
        self.0.send(request).await
    }

    fn dedicated_pool(&self, max_connections: usize) -> crate::Result<Arc<dyn Transport>> {
        self.0.dedicated_pool(max_connections)
    }
}

impl Drop for PoolHandle {
    fn drop(&mut self) {
        self.0.inner.released.fetch_add(1, Ordering::SeqCst);
    }
}

fn fast_bounded(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::Bounded {
        max_attempts,
        backoff: BackoffConfig::new(BackoffType::Constant, 1, 1),
    }
}

fn config(mode: FetchMode) -> FetchConfig {
    FetchConfig::new()
        .with_mode(mode)
        .with_page_retry(fast_bounded(2))
        .with_concurrent_retry(RetryPolicy::cyclic_with(vec![0, 1, 2], None))
}

fn fetcher(transport: &PagedTransport, mode: FetchMode) -> PageFetcher {
    PageFetcher::new(Arc::new(transport.clone()), config(mode)).with_progress(Arc::new(NoProgress))
}

fn ids(result: &ResultSet) -> Vec<u64> {
    result
        .rows()
        .iter()
        .map(|row| row["id"].as_u64().unwrap())
        .collect()
}

// ============================================================================
// FetchConfig / ResultSet Tests
// ============================================================================

#[test]
fn test_fetch_config_default() {
    let config = FetchConfig::default();
    assert_eq!(config.mode, FetchMode::Concurrent);
    assert_eq!(config.concurrency, 25);
    assert_eq!(config.page_retry, RetryPolicy::bounded(3));
    assert_eq!(config.concurrent_retry, RetryPolicy::cyclic());
}

#[test]
fn test_fetcher_exposes_config() {
    let transport = PagedTransport::new(10, 10);
    let fetcher = PageFetcher::new(
        Arc::new(transport),
        config(FetchMode::Sequential).with_concurrency(7),
    );
    assert_eq!(fetcher.config().mode, FetchMode::Sequential);
    assert_eq!(fetcher.config().concurrency, 7);
}

#[test]
fn test_fetch_config_concurrency_floor() {
    assert_eq!(FetchConfig::new().with_concurrency(0).concurrency, 1);
}

#[test]
fn test_result_set_outcome() {
    let mut result = ResultSet::empty();
    assert_eq!(result.outcome(), FetchOutcome::Complete);

    result.push_failure(PageFailure::new(
        PageRequest::new(1, 100),
        &crate::Error::api("bad"),
        1,
    ));
    assert_eq!(result.outcome(), FetchOutcome::Partial);

    result.unauthorized = true;
    assert_eq!(result.outcome(), FetchOutcome::Unauthorized);
}

#[test]
fn test_result_set_to_record_batch() {
    let mut result = ResultSet::empty();
    result.push_page(vec![json!({"id": 1, "name": "a"}), json!({"id": 2, "name": "b"})]);

    let batch = result.to_record_batch().unwrap();
    assert_eq!(batch.num_rows(), 2);
    assert_eq!(batch.num_columns(), 2);
}

// ============================================================================
// Sequential Tests
// ============================================================================

#[tokio::test]
async fn test_sequential_walks_every_page_in_order() {
    let transport = PagedTransport::new(250, 100);
    let result = fetcher(&transport, FetchMode::Sequential)
        .fetch_all(URL, &FilterSpec::default())
        .await
        .unwrap();

    assert_eq!(transport.cursors(), vec![0, 100, 200]);
    assert_eq!(ids(&result), (0..250).collect::<Vec<_>>());
    assert_eq!(result.total_count(), 250);
    assert_eq!(result.outcome(), FetchOutcome::Complete);
    assert_eq!(result.stats().pages_fetched, 3);
    assert_eq!(transport.pools(), 0);
}

#[tokio::test]
async fn test_sequential_retries_then_skips_failed_page() {
    let transport = PagedTransport::new(250, 100).script(100, Scripted::AlwaysTransient);
    let result = fetcher(&transport, FetchMode::Sequential)
        .fetch_all(URL, &FilterSpec::default())
        .await
        .unwrap();

    assert_eq!(transport.cursors(), vec![0, 100, 100, 200]);
    assert_eq!(result.len(), 150);
    assert_eq!(result.outcome(), FetchOutcome::Partial);

    let failure = &result.failures()[0];
    assert_eq!(failure.page_index, 1);
    assert_eq!(failure.cursor, 100);
    assert_eq!(failure.kind, FailureKind::Retriable);
    assert_eq!(failure.attempts, 2);
    assert_eq!(result.stats().retries, 1);
}

#[tokio::test]
async fn test_sequential_recovers_from_transient_failure() {
    let transport = PagedTransport::new(250, 100).script(200, Scripted::Transient(1));
    let result = fetcher(&transport, FetchMode::Sequential)
        .fetch_all(URL, &FilterSpec::default())
        .await
        .unwrap();

    assert_eq!(ids(&result), (0..250).collect::<Vec<_>>());
    assert!(result.is_complete());
    assert_eq!(result.stats().retries, 1);
}

#[tokio::test]
async fn test_sequential_unauthorized_mid_loop_keeps_collected_rows() {
    let transport = PagedTransport::new(300, 100).script(100, Scripted::Unauthorized);
    let result = fetcher(&transport, FetchMode::Sequential)
        .fetch_all(URL, &FilterSpec::default())
        .await
        .unwrap();

    assert_eq!(transport.cursors(), vec![0, 100]);
    assert_eq!(result.len(), 100);
    assert_eq!(result.outcome(), FetchOutcome::Unauthorized);
}

#[tokio::test]
async fn test_sequential_stalled_pagination_stops() {
    let transport = PagedTransport::new(300, 100).script(100, Scripted::Stalled);
    let result = fetcher(&transport, FetchMode::Sequential)
        .fetch_all(URL, &FilterSpec::default())
        .await
        .unwrap();

    assert_eq!(transport.cursors(), vec![0, 100]);
    assert_eq!(result.len(), 100);
    assert_eq!(result.failures()[0].kind, FailureKind::Malformed);
}

// ============================================================================
// Concurrent Tests
// ============================================================================

#[tokio::test]
async fn test_concurrent_fetches_every_page_once() {
    let transport = PagedTransport::new(250, 100);
    let result = fetcher(&transport, FetchMode::Concurrent)
        .fetch_all(URL, &FilterSpec::default())
        .await
        .unwrap();

    assert_eq!(transport.sorted_cursors(), vec![0, 100, 200]);
    let unique: HashSet<u64> = ids(&result).into_iter().collect();
    assert_eq!(result.len(), 250);
    assert_eq!(unique.len(), 250);
    assert!(result.is_complete());
    assert_eq!(transport.pools(), 1);
    assert_eq!(transport.released(), 1);
}

#[test_case(Scripted::ErrorKey ; "malformed page")]
#[test_case(Scripted::AlwaysTransient ; "retry ceiling")]
#[test_case(Scripted::Unauthorized ; "unauthorized")]
#[tokio::test]
async fn test_concurrent_pool_released_after_failed_page(behaviour: Scripted) {
    let transport = PagedTransport::new(400, 100).script(200, behaviour);
    let fetcher = PageFetcher::new(
        Arc::new(transport.clone()),
        config(FetchMode::Concurrent)
            .with_concurrent_retry(RetryPolicy::cyclic_with(vec![0], Some(2))),
    )
    .with_progress(Arc::new(NoProgress));

    let result = fetcher
        .fetch_all(URL, &FilterSpec::default())
        .await
        .unwrap();

    assert!(!result.is_complete());
    assert_eq!(transport.pools(), 1);
    assert_eq!(transport.released(), 1);
}

#[tokio::test]
async fn test_concurrent_respects_concurrency_cap() {
    let transport = PagedTransport::with_delay(1000, 10, Duration::from_millis(10));
    let fetcher = PageFetcher::new(
        Arc::new(transport.clone()),
        config(FetchMode::Concurrent).with_concurrency(5),
    )
    .with_progress(Arc::new(NoProgress));

    let result = fetcher
        .fetch_all(URL, &FilterSpec::default())
        .await
        .unwrap();

    assert_eq!(result.len(), 1000);
    assert_eq!(transport.cursors().len(), 100);
    assert!(transport.max_in_flight() <= 5);
    assert!(transport.max_in_flight() > 1);
}

#[tokio::test]
async fn test_concurrent_cyclic_retry_recovers() {
    let transport = PagedTransport::new(300, 100).script(200, Scripted::Transient(4));
    let result = fetcher(&transport, FetchMode::Concurrent)
        .fetch_all(URL, &FilterSpec::default())
        .await
        .unwrap();

    assert_eq!(result.len(), 300);
    assert!(result.is_complete());
    assert_eq!(result.stats().retries, 4);
    assert_eq!(
        transport.cursors().iter().filter(|c| **c == 200).count(),
        5
    );
}

#[tokio::test]
async fn test_concurrent_cyclic_retry_ceiling() {
    let transport = PagedTransport::new(300, 100).script(200, Scripted::AlwaysTransient);
    let fetcher = PageFetcher::new(
        Arc::new(transport.clone()),
        config(FetchMode::Concurrent)
            .with_concurrent_retry(RetryPolicy::cyclic_with(vec![0], Some(3))),
    )
    .with_progress(Arc::new(NoProgress));

    let result = fetcher
        .fetch_all(URL, &FilterSpec::default())
        .await
        .unwrap();

    assert_eq!(result.len(), 200);
    assert_eq!(result.failures()[0].attempts, 3);
    assert_eq!(result.outcome(), FetchOutcome::Partial);
}

#[tokio::test]
async fn test_concurrent_unauthorized_stops_scheduling() {
    let transport = PagedTransport::new(500, 100).script(100, Scripted::Unauthorized);
    let fetcher = PageFetcher::new(
        Arc::new(transport.clone()),
        config(FetchMode::Concurrent).with_concurrency(1),
    )
    .with_progress(Arc::new(NoProgress));

    let result = fetcher
        .fetch_all(URL, &FilterSpec::default())
        .await
        .unwrap();

    assert_eq!(result.outcome(), FetchOutcome::Unauthorized);
    assert!(transport.cursors().len() < 5);
    assert!(result.len() < 500);
}

#[tokio::test]
async fn test_scheduler_reports_completion_order() {
    let transport = PagedTransport::new(300, 100);
    let scheduler = ConcurrentScheduler::new(Arc::new(transport.clone()), 2, RetryPolicy::cyclic());
    let pages = vec![PageRequest::new(1, 100), PageRequest::new(2, 200)];

    let report = scheduler
        .fetch_remaining(URL, &pages, &FilterSpec::default(), &NoProgress)
        .await;

    assert_eq!(scheduler.concurrency(), 2);
    assert!(!report.aborted);
    assert!(report.failures.is_empty());
    let mut indices: Vec<u64> = report.batches.iter().map(|b| b.page_index).collect();
    indices.sort_unstable();
    assert_eq!(indices, vec![1, 2]);
}

// ============================================================================
// Shared behaviour
// ============================================================================

#[test_case(FetchMode::Sequential ; "sequential")]
#[test_case(FetchMode::Concurrent ; "concurrent")]
#[tokio::test]
async fn test_single_page_makes_one_request(mode: FetchMode) {
    let transport = PagedTransport::new(80, 100);
    let result = fetcher(&transport, mode)
        .fetch_all(URL, &FilterSpec::default())
        .await
        .unwrap();

    assert_eq!(transport.cursors(), vec![0]);
    assert_eq!(result.len(), 80);
    assert_eq!(transport.pools(), 0);
}

#[test_case(FetchMode::Sequential ; "sequential")]
#[test_case(FetchMode::Concurrent ; "concurrent")]
#[tokio::test]
async fn test_unauthorized_first_page_returns_empty(mode: FetchMode) {
    let transport = PagedTransport::new(250, 100).script(0, Scripted::Unauthorized);
    let result = fetcher(&transport, mode)
        .fetch_all(URL, &FilterSpec::default())
        .await
        .unwrap();

    assert!(result.is_empty());
    assert_eq!(result.outcome(), FetchOutcome::Unauthorized);
    assert_eq!(transport.cursors(), vec![0]);
}

#[test_case(FetchMode::Sequential ; "sequential")]
#[test_case(FetchMode::Concurrent ; "concurrent")]
#[tokio::test]
async fn test_error_key_page_is_dropped_and_recorded(mode: FetchMode) {
    let transport = PagedTransport::new(250, 100).script(100, Scripted::ErrorKey);
    let result = fetcher(&transport, mode)
        .fetch_all(URL, &FilterSpec::default())
        .await
        .unwrap();

    let mut got = ids(&result);
    got.sort_unstable();
    let expected: Vec<u64> = (0..100).chain(200..250).collect();
    assert_eq!(got, expected);

    assert_eq!(result.failures().len(), 1);
    assert_eq!(result.failures()[0].kind, FailureKind::Malformed);
    assert_eq!(result.failures()[0].attempts, 1);
    assert_eq!(result.outcome(), FetchOutcome::Partial);
}

#[test_case(FetchMode::Sequential ; "sequential")]
#[test_case(FetchMode::Concurrent ; "concurrent")]
#[tokio::test]
async fn test_filter_cursor_unchanged_after_fetch(mode: FetchMode) {
    let filter = FilterSpec::builder().state_code("TX").build().unwrap();
    let before = filter.clone();

    let ok = PagedTransport::new(250, 100);
    fetcher(&ok, mode).fetch_all(URL, &filter).await.unwrap();
    assert_eq!(filter, before);

    let denied = PagedTransport::new(250, 100).script(0, Scripted::Unauthorized);
    fetcher(&denied, mode).fetch_all(URL, &filter).await.unwrap();
    assert_eq!(filter, before);
    assert_eq!(filter.pagination_start, 0);
}

#[tokio::test]
async fn test_first_page_failure_is_recorded() {
    let transport = PagedTransport::new(250, 100).script(0, Scripted::ErrorKey);
    let result = fetcher(&transport, FetchMode::Concurrent)
        .fetch_all(URL, &FilterSpec::default())
        .await
        .unwrap();

    assert!(result.is_empty());
    assert_eq!(result.total_count(), 0);
    assert_eq!(result.failures()[0].page_index, 0);
    assert_eq!(result.outcome(), FetchOutcome::Partial);
}

#[tokio::test]
async fn test_initial_cursor_is_honoured() {
    let transport = PagedTransport::new(250, 100);
    let filter = FilterSpec::builder().pagination_start(100).build().unwrap();

    let result = fetcher(&transport, FetchMode::Concurrent)
        .fetch_all(URL, &filter)
        .await
        .unwrap();

    assert_eq!(transport.sorted_cursors(), vec![100, 200]);
    assert_eq!(result.len(), 150);
}

#[tokio::test]
async fn test_invalid_url_is_a_caller_error() {
    let transport = PagedTransport::new(10, 10);
    let err = fetcher(&transport, FetchMode::Sequential)
        .fetch_all("not a url", &FilterSpec::default())
        .await
        .unwrap_err();

    assert!(matches!(err, crate::Error::InvalidUrl(_)));
    assert!(transport.cursors().is_empty());
}

// ============================================================================
// Progress Tests
// ============================================================================

#[derive(Default)]
struct RecordingProgress {
    events: Mutex<Vec<String>>,
}

impl ProgressReporter for RecordingProgress {
    fn started(&self, total_pages: u64, total_count: u64) {
        self.events
            .lock()
            .unwrap()
            .push(format!("started {total_pages} {total_count}"));
    }

    fn page_completed(&self, page_index: u64, rows: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("page {page_index} {rows}"));
    }

    fn page_failed(&self, failure: &PageFailure) {
        self.events
            .lock()
            .unwrap()
            .push(format!("failed {}", failure.page_index));
    }

    fn finished(&self, result: &ResultSet) {
        self.events
            .lock()
            .unwrap()
            .push(format!("finished {}", result.len()));
    }
}

#[tokio::test]
async fn test_progress_events_sequential() {
    let transport = PagedTransport::new(250, 100).script(100, Scripted::ErrorKey);
    let progress = Arc::new(RecordingProgress::default());
    let fetcher = PageFetcher::new(Arc::new(transport), config(FetchMode::Sequential))
        .with_progress(progress.clone());

    fetcher
        .fetch_all(URL, &FilterSpec::default())
        .await
        .unwrap();

    assert_eq!(
        *progress.events.lock().unwrap(),
        vec![
            "started 3 250".to_string(),
            "page 0 100".to_string(),
            "failed 1".to_string(),
            "page 2 50".to_string(),
            "finished 150".to_string(),
        ]
    );
}

// ============================================================================
// End to end over HTTP
// ============================================================================

#[tokio::test]
async fn test_fetch_all_over_http_sends_cursor_and_filter() {
    let server = MockServer::start().await;

    for (start, rows) in [(0u64, 100u64), (100, 100), (200, 50)] {
        let data: Vec<JsonValue> = (start..start + rows).map(|id| json!({"id": id})).collect();
        Mock::given(method("POST"))
            .and(path("/v3/wells"))
            .and(wiremock::matchers::body_partial_json(
                json!({"pagination": {"start": start}}),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": data,
                "pagination": {"total_count": 250, "start": start, "page_size": 100}
            })))
            .expect(1)
            .mount(&server)
            .await;
    }

    let config = HttpClientConfig::builder()
        .base_url(server.uri())
        .access_key("k")
        .no_rate_limit()
        .build();
    let client = HttpClient::with_config(config).unwrap();
    let fetcher = PageFetcher::new(Arc::new(client), FetchConfig::sequential())
        .with_progress(Arc::new(NoProgress));

    let filter = FilterSpec::builder().state_code("TX").build().unwrap();
    let result = fetcher
        .fetch_all(&format!("{}/v3/wells", server.uri()), &filter)
        .await
        .unwrap();

    assert_eq!(result.len(), 250);
    assert!(result.is_complete());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
    for request in &requests {
        let body: JsonValue = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(body["state_code"], json!(["TX"]));
        assert_eq!(request.headers.get("access_key").unwrap(), "k");
    }
}

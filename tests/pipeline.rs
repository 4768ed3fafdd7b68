//! End-to-end runs against a local axum mock of the Sina quote endpoint and
//! the Eastmoney listing endpoint.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use parking_lot::Mutex;
use serde_json::{json, Value};

use cigar_screener::config::Settings;
use cigar_screener::engine::types::ScreeningCriteria;
use cigar_screener::persist::export::CsvExport;
use cigar_screener::persist::{ResultSink, UTF8_BOM};
use cigar_screener::pipeline::{run_guarded, Pipeline, RunStatus};

// ============================================================================
// Mock vendor
// ============================================================================

#[derive(Clone)]
enum Page {
    Json(Value),
    Status(StatusCode),
    Html,
}

/// Directory rows served page by page, with the `total` to report.
struct MockListing {
    total: usize,
    rows: Vec<Value>,
}

struct MockVendor {
    pages: Vec<Page>,
    listing: Option<MockListing>,
    requested: Mutex<Vec<u32>>,
    listing_calls: Mutex<u32>,
}

async fn quotes(State(vendor): State<Arc<MockVendor>>, Query(params): Query<HashMap<String, String>>) -> Response {
    let page: u32 = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(0);
    assert_eq!(params.get("num").map(String::as_str), Some("80"));
    assert_eq!(params.get("node").map(String::as_str), Some("hs_a"));
    vendor.requested.lock().push(page);

    match vendor.pages.get(page as usize - 1).cloned() {
        Some(Page::Json(body)) => axum::Json(body).into_response(),
        Some(Page::Status(code)) => (code, "upstream error").into_response(),
        Some(Page::Html) => "<html>rate limited</html>".into_response(),
        None => axum::Json(json!([])).into_response(),
    }
}

async fn clist(State(vendor): State<Arc<MockVendor>>, Query(params): Query<HashMap<String, String>>) -> Response {
    *vendor.listing_calls.lock() += 1;
    let Some(listing) = &vendor.listing else {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };

    let pn: usize = params.get("pn").and_then(|p| p.parse().ok()).unwrap_or(1);
    let pz: usize = params.get("pz").and_then(|p| p.parse().ok()).unwrap_or(100);
    let start = ((pn - 1) * pz).min(listing.rows.len());
    let end = (start + pz).min(listing.rows.len());

    // past the end Eastmoney answers with `data: null`
    let body = if start == end {
        json!({"rc": 0, "data": null})
    } else {
        json!({"rc": 0, "data": {"total": listing.total, "diff": listing.rows[start..end].to_vec()}})
    };
    axum::Json(body).into_response()
}

async fn serve(vendor: Arc<MockVendor>) -> SocketAddr {
    let app = Router::new()
        .route("/quotes", get(quotes))
        .route("/clist", get(clist))
        .with_state(vendor);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn vendor(pages: Vec<Page>, listing: Option<MockListing>) -> Arc<MockVendor> {
    Arc::new(MockVendor {
        pages,
        listing,
        requested: Mutex::new(Vec::new()),
        listing_calls: Mutex::new(0),
    })
}

fn settings(addr: SocketAddr, dir: &tempfile::TempDir) -> Settings {
    let mut settings = Settings::default();
    settings.quote_source.base_url = format!("http://{addr}/quotes");
    settings.quote_source.throttle_ms = 0;
    settings.quote_source.timeout_secs = 5;
    settings.directory.base_url = format!("http://{addr}/clist");
    settings.directory.cache_path = dir.path().join("a_stock_list.csv").to_string_lossy().into_owned();
    settings
}

// ============================================================================
// Fixtures
// ============================================================================

/// Sina mixes numbers and numeric strings; keep a bit of both.
fn page_one() -> Value {
    json!([
        {"symbol": "sz000001", "name": "平安银行", "trade": "10.000", "pb": 0.8, "per": 8, "mktcap": 2000000},
        {"symbol": "sz000002", "name": "万科Ａ", "trade": 5.0, "pb": "1.5", "per": 15, "mktcap": 5000000},
        {"symbol": "sz000003", "name": "停牌股", "trade": 0, "pb": 0.5, "per": 5, "mktcap": 3000000}
    ])
}

fn page_two() -> Value {
    json!([
        {"symbol": "sh600000", "name": "浦发", "trade": 20.0, "pb": 1.0, "per": "12", "mktcap": 3000000},
        {"symbol": "sz300750", "name": "宁德时代", "trade": 200.0, "pb": 0.9, "per": 10, "mktcap": 90000000},
        {"symbol": "sh600001", "name": "*ST海航", "trade": 2.0, "pb": 0.3, "per": 6, "mktcap": 3000000}
    ])
}

fn listing() -> MockListing {
    let rows = vec![
        json!({"f12": "000001", "f14": "平安银行"}),
        json!({"f12": "000002", "f14": "万科A"}),
        json!({"f12": "600000", "f14": "浦发银行"}),
        json!({"f12": "600001", "f14": "*ST海航"}),
        json!({"f12": "300750", "f14": "宁德时代"}),
    ];
    MockListing { total: rows.len(), rows }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn directory_variant_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let vendor = vendor(vec![Page::Json(page_one()), Page::Json(page_two()), Page::Json(json!([]))], Some(listing()));
    let addr = serve(vendor.clone()).await;
    let mut settings = settings(addr, &dir);
    settings.directory.page_size = 2;

    let pipeline = Arc::new(Pipeline::from_settings(&settings, true).unwrap());
    let report = run_guarded(pipeline.clone(), ScreeningCriteria::from_user_units(1.2, 20.0, 100.0)).await;

    assert_eq!(report.status, RunStatus::Completed);
    let rows: Vec<(&str, &str)> = report.candidates.iter().map(|c| (c.code(), c.display_name())).collect();
    // ChiNext and ST codes are not in the filtered directory; names come from the directory
    assert_eq!(rows, vec![("000001", "平安银行"), ("600000", "浦发银行")]);
    assert_eq!(report.candidates[0].market_cap_yi, Some(200.0));
    assert_eq!(report.universe.len(), 3);

    // page 3 was empty, so page 4 is never requested
    assert_eq!(*vendor.requested.lock(), vec![1, 2, 3]);
    assert!(dir.path().join("a_stock_list.csv").exists());
    // five rows at two per page
    assert_eq!(*vendor.listing_calls.lock(), 3);

    // a second run is served from the directory cache
    let again = pipeline.run_analysis(ScreeningCriteria::default()).await;
    assert_eq!(again.candidates.len(), 2);
    assert_eq!(*vendor.listing_calls.lock(), 3);
}

#[tokio::test]
async fn name_filter_variant_uses_quote_names() {
    let dir = tempfile::tempdir().unwrap();
    let vendor = vendor(vec![Page::Json(page_one()), Page::Json(page_two())], None);
    let addr = serve(vendor.clone()).await;

    let pipeline = Arc::new(Pipeline::from_settings(&settings(addr, &dir), false).unwrap());
    let report = run_guarded(pipeline, ScreeningCriteria::default()).await;

    assert_eq!(report.status, RunStatus::Completed);
    let rows: Vec<(&str, &str)> = report.candidates.iter().map(|c| (c.code(), c.display_name())).collect();
    assert_eq!(rows, vec![("000001", "平安银行"), ("300750", "宁德时代"), ("600000", "浦发")]);
    assert_eq!(*vendor.listing_calls.lock(), 0);
}

#[tokio::test]
async fn failed_page_keeps_earlier_pages() {
    let dir = tempfile::tempdir().unwrap();
    let vendor = vendor(
        vec![Page::Json(page_one()), Page::Status(StatusCode::BAD_GATEWAY), Page::Json(page_two())],
        None,
    );
    let addr = serve(vendor.clone()).await;

    let pipeline = Arc::new(Pipeline::from_settings(&settings(addr, &dir), false).unwrap());
    let report = run_guarded(pipeline, ScreeningCriteria::default()).await;

    assert_eq!(*vendor.requested.lock(), vec![1, 2]);
    assert_eq!(report.universe.len(), 2);
    assert_eq!(report.candidates.len(), 1);
    assert_eq!(report.candidates[0].code(), "000001");
}

#[tokio::test]
async fn non_json_first_page_is_no_data() {
    let dir = tempfile::tempdir().unwrap();
    let vendor = vendor(vec![Page::Html], None);
    let addr = serve(vendor.clone()).await;

    let pipeline = Arc::new(Pipeline::from_settings(&settings(addr, &dir), false).unwrap());
    let report = run_guarded(pipeline, ScreeningCriteria::default()).await;

    assert_eq!(report.status, RunStatus::NoData);
    assert!(report.candidates.is_empty());
    assert!(report.diagnostic.is_empty());
}

#[tokio::test]
async fn strict_criteria_fall_back_to_lowest_pb() {
    let dir = tempfile::tempdir().unwrap();
    let vendor = vendor(vec![Page::Json(page_one()), Page::Json(page_two())], None);
    let addr = serve(vendor).await;

    let pipeline = Arc::new(Pipeline::from_settings(&settings(addr, &dir), false).unwrap());
    let report = run_guarded(pipeline, ScreeningCriteria::from_user_units(0.1, 20.0, 100.0)).await;

    assert_eq!(report.status, RunStatus::NoCandidates);
    let codes: Vec<&str> = report.diagnostic.iter().map(|c| c.code()).collect();
    assert_eq!(codes, vec!["000001", "300750", "600000", "000002"]);
}

#[tokio::test]
async fn unreachable_directory_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let vendor = vendor(vec![Page::Json(page_one())], None);
    let addr = serve(vendor).await;

    let pipeline = Arc::new(Pipeline::from_settings(&settings(addr, &dir), true).unwrap());
    let report = run_guarded(pipeline, ScreeningCriteria::default()).await;

    assert!(matches!(report.status, RunStatus::Failed(ref msg) if msg.contains("symbol directory")));
}

#[tokio::test]
async fn short_directory_listing_is_not_cached() {
    let dir = tempfile::tempdir().unwrap();
    let mut short = listing();
    short.total = 5000;
    let vendor = vendor(vec![Page::Json(page_one())], Some(short));
    let addr = serve(vendor.clone()).await;

    let pipeline = Arc::new(Pipeline::from_settings(&settings(addr, &dir), true).unwrap());
    let report = run_guarded(pipeline, ScreeningCriteria::default()).await;

    assert!(matches!(report.status, RunStatus::Failed(ref msg) if msg.contains("5 of 5000")));
    assert!(!dir.path().join("a_stock_list.csv").exists());
    // page 1 holds all five rows, page 2 comes back empty
    assert_eq!(*vendor.listing_calls.lock(), 2);
}

#[tokio::test]
async fn candidates_export_with_bom() {
    let dir = tempfile::tempdir().unwrap();
    let vendor = vendor(vec![Page::Json(page_one()), Page::Json(page_two())], Some(listing()));
    let addr = serve(vendor).await;

    let pipeline = Arc::new(Pipeline::from_settings(&settings(addr, &dir), true).unwrap());
    let report = run_guarded(pipeline, ScreeningCriteria::default()).await;

    let sink = CsvExport::new(dir.path().join("cigar_butt_realtime.csv"));
    sink.write(&report.candidates).unwrap();

    let bytes = std::fs::read(sink.path()).unwrap();
    assert!(bytes.starts_with(UTF8_BOM));
    let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1], "平安银行,000001,10,0.8,8,200");
    assert_eq!(lines[2], "浦发银行,600000,20,1,12,300");
}

#![cfg(feature = "web")]

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use gridchart::app::{AppState, router};
use gridchart::error::ImportError;
use gridchart::export::ExportClient;
use gridchart::importer::{ImportOptions, Importer, QueryBackend};
use gridchart::relay::{PollPolicy, QueryRelay};
use serde_json::{Value, json};
use tower::ServiceExt;

const UNREACHABLE: &str = "http://127.0.0.1:9";

fn state_with(export_url: &str) -> Arc<AppState> {
    Arc::new(AppState::new(
        Importer::new(QueryBackend::Relay(UNREACHABLE.to_string())),
        QueryRelay::new(UNREACHABLE, "key"),
        ExportClient::new(export_url),
    ))
}

fn state() -> Arc<AppState> {
    state_with(UNREACHABLE)
}

fn fast(max_attempts: u32) -> PollPolicy {
    PollPolicy {
        interval: Duration::ZERO,
        max_attempts,
    }
}

/// Serves the router on an ephemeral port and returns its query relay URL.
async fn serve(state: Arc<AppState>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    format!("http://{}/api/query-csv", addr)
}

async fn send(state: &Arc<AppState>, request: Request<Body>) -> Response {
    router(state.clone()).oneshot(request).await.unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn import_replaces_grid() {
    let state = state();
    let response = send(
        &state,
        post_json(
            "/api/import",
            json!({ "input": "date,a\n01/02/2024,1\n2024-01-02,2", "groupByDate": true }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");

    let grid = body_json(send(&state, get("/api/grid")).await).await;
    assert_eq!(grid, json!([["date", "a"], ["2024-01-02", "3"]]));
}

#[tokio::test]
async fn failed_import_keeps_grid() {
    let state = state();
    send(&state, post_json("/api/import", json!({ "input": "date,a\n2024-01-01,1" }))).await;

    let response = send(&state, post_json("/api/import", json!({ "input": "   " }))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "nothing to import");

    let grid = body_json(send(&state, get("/api/grid")).await).await;
    assert_eq!(grid, json!([["date", "a"], ["2024-01-01", "1"]]));
}

#[tokio::test]
async fn edits_apply_in_order() {
    let state = state();
    send(
        &state,
        post_json("/api/import", json!({ "input": "date,a,b\n2024-01-01,1,2\n2024-01-02,3,4" })),
    )
    .await;

    send(&state, post_json("/api/grid/edit", json!({ "op": "deleteColumn", "index": 1 }))).await;
    let response = send(
        &state,
        post_json("/api/grid/edit", json!({ "op": "editCell", "row": 2, "col": 1, "value": "9" })),
    )
    .await;
    let grid = body_json(response).await;
    assert_eq!(grid, json!([["date", "b"], ["2024-01-01", "2"], ["2024-01-02", "9"]]));

    // The last data row is never deleted.
    send(&state, post_json("/api/grid/edit", json!({ "op": "deleteRow", "index": 1 }))).await;
    let response = send(&state, post_json("/api/grid/edit", json!({ "op": "deleteLastRow" }))).await;
    let grid = body_json(response).await;
    assert_eq!(grid, json!([["date", "b"], ["2024-01-02", "9"]]));
}

#[tokio::test]
async fn upload_reads_file_field() {
    let state = state();
    let boundary = "gridchartboundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"data.csv\"\r\n\
         Content-Type: text/csv\r\n\r\ndate,x\r\n2024-01-01,5\r\n\r\n--{b}--\r\n",
        b = boundary
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap();

    let response = send(&state, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let grid = body_json(send(&state, get("/api/grid")).await).await;
    assert_eq!(grid, json!([["date", "x"], ["2024-01-01", "5"]]));
}

#[tokio::test]
async fn series_and_percent_mode() {
    let state = state();
    send(
        &state,
        post_json("/api/import", json!({ "input": "date,a,b\n2024-01-01,1,3\n2024-01-02,0,0" })),
    )
    .await;

    let series = body_json(send(&state, get("/api/series")).await).await;
    assert_eq!(series["a"]["value"], json!([1.0, 0.0]));
    assert_eq!(series["a"]["timestamp"], json!(["2024-01-01", "2024-01-02"]));

    let percent = body_json(send(&state, get("/api/series?percent=true")).await).await;
    assert_eq!(percent["b"]["value"], json!([75.0, 0.0]));
}

#[tokio::test]
async fn customization_drives_figure() {
    let state = state();
    send(
        &state,
        post_json("/api/import", json!({ "input": "date,a,b\n2024-01-01,1,3" })),
    )
    .await;

    let request = Request::builder()
        .method("PUT")
        .uri("/api/customization")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "chartType": "bar-line", "title": "Fees" }).to_string()))
        .unwrap();
    let custom = body_json(send(&state, request).await).await;
    assert_eq!(custom["chartType"], "bar-line");
    assert_eq!(custom["showGrid"], true);

    let figure = body_json(send(&state, get("/api/figure")).await).await;
    assert_eq!(figure["data"][0]["type"], "bar");
    assert_eq!(figure["data"][1]["yaxis"], "y2");
    assert_eq!(figure["layout"]["title"]["text"], "<b>Fees</b>");
}

#[tokio::test]
async fn csv_download() {
    let state = state();
    send(
        &state,
        post_json("/api/import", json!({ "input": "date,a\n2024-01-01,1" })),
    )
    .await;

    let response = send(&state, get("/api/download/csv")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
    assert_eq!(body_text(response).await, "date,a\n2024-01-01,1\n");
}

#[tokio::test]
async fn query_csv_requires_id() {
    let response = send(&state(), post_json("/api/query-csv", json!({}))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await, json!({ "error": "Missing queryId" }));
}

#[tokio::test]
async fn export_relay_passes_errors_through() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/export")
        .with_status(422)
        .with_body(r#"{"message":"layout is invalid"}"#)
        .create_async()
        .await;

    let state = state_with(&format!("{}/export", server.url()));
    let request = post_json(
        "/api/export-image",
        json!({
            "plotData": [],
            "layout": {},
            "format": "png",
            "width": 2000,
            "height": 1600,
            "scale": 3,
        }),
    );
    let response = send(&state, request).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_text(response).await, "layout is invalid");
}

#[tokio::test]
async fn export_relay_returns_image_bytes() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/export")
        .match_body(mockito::Matcher::PartialJson(json!({ "format": "jpeg" })))
        .with_status(200)
        .with_header("content-type", "image/jpeg")
        .with_body([0xFF, 0xD8, 0xFF])
        .create_async()
        .await;

    let state = state_with(&format!("{}/export", server.url()));
    let request = post_json(
        "/api/export-image",
        json!({
            "plotData": [],
            "layout": {},
            "format": "jpeg",
            "width": 10,
            "height": 10,
            "scale": 1,
        }),
    );
    let response = send(&state, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], &[0xFF, 0xD8, 0xFF]);
}

#[tokio::test]
async fn query_relay_timeout_reaches_importer() {
    let mut analytics = mockito::Server::new_async().await;
    analytics
        .mock("POST", "/query/42/execute")
        .with_status(200)
        .create_async()
        .await;
    let pending = analytics
        .mock("GET", "/query/42/results/csv")
        .with_status(202)
        .expect(3)
        .create_async()
        .await;

    let state = Arc::new(AppState::new(
        Importer::new(QueryBackend::Relay(UNREACHABLE.to_string())),
        QueryRelay::new(analytics.url(), "key").with_policy(fast(3)),
        ExportClient::new(UNREACHABLE),
    ));
    let relay_url = serve(state).await;

    let importer = Importer::new(QueryBackend::Relay(relay_url)).with_policy(fast(5));
    let result = importer.import("42", ImportOptions::default()).await;

    pending.assert_async().await;
    assert!(matches!(result, Err(ImportError::Timeout { attempts: 3 })));
}

#[tokio::test]
async fn query_relay_serves_csv_to_importer() {
    let mut analytics = mockito::Server::new_async().await;
    analytics
        .mock("POST", "/query/7/execute")
        .with_status(200)
        .create_async()
        .await;
    analytics
        .mock("GET", "/query/7/results/csv")
        .with_status(200)
        .with_body("date,a\n2024-01-01,1\n")
        .create_async()
        .await;

    let state = Arc::new(AppState::new(
        Importer::new(QueryBackend::Relay(UNREACHABLE.to_string())),
        QueryRelay::new(analytics.url(), "key").with_policy(fast(3)),
        ExportClient::new(UNREACHABLE),
    ));
    let relay_url = serve(state).await;

    let importer = Importer::new(QueryBackend::Relay(relay_url)).with_policy(fast(5));
    let grid = importer.import("7", ImportOptions::default()).await.unwrap();
    assert_eq!(grid.rows()[1], vec!["2024-01-01", "1"]);
}

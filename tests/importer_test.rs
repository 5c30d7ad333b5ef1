use std::time::Duration;

use gridchart::error::ImportError;
use gridchart::importer::{ImportOptions, ImportSource, Importer, QueryBackend, classify};
use gridchart::relay::{PollPolicy, QueryRelay};
use mockito::Matcher;
use serde_json::json;

const CSV: &str = "date,a\n2024-01-02,2\n2024-01-01,1\n01/01/2024,4\n";

fn fast(max_attempts: u32) -> PollPolicy {
    PollPolicy {
        interval: Duration::ZERO,
        max_attempts,
    }
}

#[test]
fn classification_order() {
    assert_eq!(
        classify("date,a\n1,2").unwrap(),
        ImportSource::Raw("date,a\n1,2".into())
    );
    assert_eq!(
        classify("http://example.com/data.csv").unwrap(),
        ImportSource::Url("http://example.com/data.csv".into())
    );
    assert_eq!(classify("3493826").unwrap(), ImportSource::Query("3493826".into()));
    assert!(matches!(classify("  \n "), Err(ImportError::EmptyInput)));
}

#[tokio::test]
async fn empty_input_makes_no_request() {
    let mut server = mockito::Server::new_async().await;
    let relay = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let importer = Importer::new(QueryBackend::Relay(server.url()));
    let result = importer.import("   ", ImportOptions::default()).await;
    assert!(matches!(result, Err(ImportError::EmptyInput)));
    relay.assert_async().await;
}

#[tokio::test]
async fn url_import_groups_by_date() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/data.csv")
        .with_status(200)
        .with_header("content-type", "text/csv")
        .with_body(CSV)
        .create_async()
        .await;

    let importer = Importer::new(QueryBackend::Relay(server.url()));
    let grid = importer
        .import(
            &format!("{}/data.csv", server.url()),
            ImportOptions {
                group_by_date: true,
            },
        )
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(grid.row_count(), 3);
    assert_eq!(grid.rows()[1], vec!["2024-01-01", "5"]);
    assert_eq!(grid.rows()[2], vec!["2024-01-02", "2"]);
}

#[tokio::test]
async fn url_failure_reports_status() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/missing.csv")
        .with_status(404)
        .create_async()
        .await;

    let importer = Importer::new(QueryBackend::Relay(server.url()));
    let result = importer
        .import(&format!("{}/missing.csv", server.url()), ImportOptions::default())
        .await;
    assert!(matches!(result, Err(ImportError::Fetch { status: 404 })));
}

#[tokio::test]
async fn relay_backend_polls_while_processing() {
    let mut server = mockito::Server::new_async().await;
    let processing = server
        .mock("POST", "/api/query-csv")
        .match_body(Matcher::Json(json!({ "queryId": "42" })))
        .with_status(202)
        .expect(2)
        .create_async()
        .await;
    let ready = server
        .mock("POST", "/api/query-csv")
        .match_body(Matcher::Json(json!({ "queryId": "42" })))
        .with_status(200)
        .with_body(CSV)
        .expect(1)
        .create_async()
        .await;

    let importer = Importer::new(QueryBackend::Relay(format!("{}/api/query-csv", server.url())))
        .with_policy(fast(15));
    let grid = importer.import("42", ImportOptions::default()).await.unwrap();

    processing.assert_async().await;
    ready.assert_async().await;
    assert_eq!(grid.row_count(), 4);
}

#[tokio::test]
async fn relay_backend_times_out() {
    let mut server = mockito::Server::new_async().await;
    let processing = server
        .mock("POST", "/api/query-csv")
        .with_status(202)
        .expect(3)
        .create_async()
        .await;

    let importer = Importer::new(QueryBackend::Relay(format!("{}/api/query-csv", server.url())))
        .with_policy(fast(3));
    let result = importer.import("42", ImportOptions::default()).await;

    processing.assert_async().await;
    assert!(matches!(result, Err(ImportError::Timeout { attempts: 3 })));
}

#[tokio::test]
async fn relay_error_is_terminal() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/query-csv")
        .with_status(500)
        .with_body(r#"{"error":"Dune 401"}"#)
        .expect(1)
        .create_async()
        .await;

    let importer = Importer::new(QueryBackend::Relay(format!("{}/api/query-csv", server.url())))
        .with_policy(fast(15));
    match importer.import("42", ImportOptions::default()).await {
        Err(ImportError::Relay { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "Dune 401");
        }
        other => panic!("expected relay error, got {:?}", other),
    }
}

#[tokio::test]
async fn direct_relay_executes_then_polls() {
    let mut server = mockito::Server::new_async().await;
    let execute = server
        .mock("POST", "/query/77/execute")
        .match_header("x-dune-api-key", "secret")
        .with_status(200)
        .with_body(r#"{"execution_id":"01H"}"#)
        .create_async()
        .await;
    let pending = server
        .mock("GET", "/query/77/results/csv")
        .match_header("x-dune-api-key", "secret")
        .with_status(202)
        .expect(1)
        .create_async()
        .await;
    let results = server
        .mock("GET", "/query/77/results/csv")
        .match_header("x-dune-api-key", "secret")
        .with_status(200)
        .with_body(CSV)
        .create_async()
        .await;

    let relay = QueryRelay::new(server.url(), "secret").with_policy(fast(5));
    let csv = relay.fetch_csv("77").await.unwrap();

    execute.assert_async().await;
    pending.assert_async().await;
    results.assert_async().await;
    assert_eq!(csv, CSV);
}

#[tokio::test]
async fn failed_execute_is_not_fatal() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/query/5/execute")
        .with_status(500)
        .create_async()
        .await;
    server
        .mock("GET", "/query/5/results/csv")
        .with_status(200)
        .with_body(CSV)
        .create_async()
        .await;

    let relay = QueryRelay::new(server.url(), "secret").with_policy(fast(2));
    let importer = Importer::new(QueryBackend::Direct(relay));
    let grid = importer.import("5", ImportOptions::default()).await.unwrap();
    assert_eq!(grid.cell(0, 1), Some("a"));
}

#[tokio::test]
async fn direct_relay_surfaces_upstream_errors() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/query/9/execute")
        .with_status(200)
        .create_async()
        .await;
    server
        .mock("GET", "/query/9/results/csv")
        .with_status(401)
        .with_body("invalid API key")
        .create_async()
        .await;

    let relay = QueryRelay::new(server.url(), "wrong").with_policy(fast(5));
    match relay.fetch_csv("9").await {
        Err(ImportError::Relay { status, message }) => {
            assert_eq!(status, 401);
            assert_eq!(message, "invalid API key");
        }
        other => panic!("expected relay error, got {:?}", other),
    }
}

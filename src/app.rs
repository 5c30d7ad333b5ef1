#![cfg(feature = "web")]
use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::{Arc, RwLock};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::config::Config;
use crate::customization::Customization;
use crate::downloader::{to_csv, to_xlsx};
use crate::error::{ExportError, ImportError};
use crate::export::{ExportClient, ExportRequest};
use crate::graph::{GraphOptions, render_chart};
use crate::grid::Grid;
use crate::grouping::sort_and_group_by_date;
use crate::importer::{ImportOptions, Importer, QueryBackend};
use crate::loader::parse_bytes;
use crate::projector::{project, to_percent};
use crate::relay::QueryRelay;
use crate::session::{GridEdit, Session};

const UPLOAD_LIMIT: usize = 16 * 1024 * 1024;

/// Shared server state. The session is replaced as a whole on every change.
pub struct AppState {
    session: RwLock<Session>,
    importer: Importer,
    relay: QueryRelay,
    exporter: ExportClient,
}

impl AppState {
    pub fn new(importer: Importer, relay: QueryRelay, exporter: ExportClient) -> Self {
        Self {
            session: RwLock::new(Session::default()),
            importer,
            relay,
            exporter,
        }
    }

    /// Wires the clients from configuration. Query ids are resolved against
    /// the analytics service directly.
    pub fn from_config(config: &Config) -> Self {
        let relay = QueryRelay::new(&config.analytics.base_url, &config.analytics.api_key)
            .with_key_header(&config.analytics.api_key_header)
            .with_policy(config.poll_policy());
        let importer = Importer::new(QueryBackend::Direct(relay.clone()))
            .with_policy(config.poll_policy());
        let exporter = ExportClient::new(&config.export.url).with_size(
            config.export.width,
            config.export.height,
            config.export.scale,
        );
        Self::new(importer, relay, exporter)
    }

    pub fn snapshot(&self) -> Session {
        match self.session.read() {
            Ok(session) => session.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replaces the session with `update(current)` and returns the new one.
    pub fn update(&self, update: impl FnOnce(&Session) -> Session) -> Session {
        let mut guard = match self.session.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let next = update(&guard);
        *guard = next.clone();
        next
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportRequest {
    input: String,
    #[serde(default)]
    group_by_date: bool,
}

#[derive(Deserialize)]
struct SeriesQuery {
    percent: Option<bool>,
}

#[derive(Serialize)]
struct StatusResponse {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    grid: Option<Grid>,
}

impl StatusResponse {
    fn ok(grid: Grid) -> Self {
        Self {
            status: "ok".to_string(),
            message: None,
            grid: Some(grid),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: Some(message.into()),
            grid: None,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/grid", get(get_grid))
        .route("/api/grid/edit", post(edit_grid))
        .route("/api/import", post(import_data))
        .route("/api/upload", post(upload_file))
        .route("/api/series", get(get_series))
        .route(
            "/api/customization",
            get(get_customization).put(put_customization),
        )
        .route("/api/figure", get(get_figure))
        .route("/api/chart.png", get(get_chart))
        .route("/api/download/csv", get(download_csv))
        .route("/api/download/xlsx", get(download_xlsx))
        .route("/api/query-csv", post(query_csv))
        .route("/api/export-image", post(export_image))
        .nest_service("/static", ServeDir::new("static"))
        .layer(DefaultBodyLimit::max(UPLOAD_LIMIT))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let app_state = Arc::new(AppState::from_config(&config));
    let app = router(app_state);

    let address = config.bind_address();
    let listener = TcpListener::bind(&address).await?;
    info!("Listening on http://{}", address);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn get_grid(State(state): State<Arc<AppState>>) -> Json<Grid> {
    Json(state.snapshot().grid)
}

async fn edit_grid(
    State(state): State<Arc<AppState>>,
    Json(edit): Json<GridEdit>,
) -> Json<Grid> {
    Json(state.update(|session| session.apply(&edit)).grid)
}

fn import_status(err: &ImportError) -> StatusCode {
    match err {
        ImportError::EmptyInput | ImportError::Parse(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::BAD_GATEWAY,
    }
}

/// Swaps in an imported grid, or reports why the import failed without
/// touching the current one.
fn finish_import(state: &AppState, result: Result<Grid, ImportError>) -> Response {
    let mut failure = None;
    let next = state.update(|current| match current.replace_grid(result) {
        Ok(next) => next,
        Err(e) => {
            failure = Some(e);
            current.clone()
        }
    });
    match failure {
        None => Json(StatusResponse::ok(next.grid)).into_response(),
        Some(e) => (import_status(&e), Json(StatusResponse::error(e.to_string()))).into_response(),
    }
}

async fn import_data(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ImportRequest>,
) -> Response {
    let options = ImportOptions {
        group_by_date: payload.group_by_date,
    };
    let result = state.importer.import(&payload.input, options).await;
    finish_import(&state, result)
}

async fn upload_file(
    State(state): State<Arc<AppState>>,
    Query(options): Query<ImportOptions>,
    mut multipart: Multipart,
) -> Response {
    let mut file_data = Vec::new();

    while let Some(field) = multipart.next_field().await.unwrap_or(None) {
        if field.name() == Some("file") {
            file_data = field.bytes().await.unwrap_or_default().to_vec();
        }
    }

    if file_data.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(StatusResponse::error("No file data received")),
        )
            .into_response();
    }

    let result = parse_bytes(&file_data)
        .map(|grid| {
            if options.group_by_date {
                sort_and_group_by_date(&grid)
            } else {
                grid
            }
        })
        .map_err(ImportError::from);
    finish_import(&state, result)
}

async fn get_series(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SeriesQuery>,
) -> impl IntoResponse {
    let session = state.snapshot();
    let map = if query.percent.unwrap_or(false) {
        to_percent(&project(&session.grid))
    } else {
        session.series()
    };
    Json(map)
}

async fn get_customization(State(state): State<Arc<AppState>>) -> Json<Customization> {
    Json(state.snapshot().customization)
}

async fn put_customization(
    State(state): State<Arc<AppState>>,
    Json(customization): Json<Customization>,
) -> Json<Customization> {
    Json(
        state
            .update(|session| session.with_customization(customization))
            .customization,
    )
}

async fn get_figure(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.snapshot().figure())
}

fn attachment(content_type: &str, filename: &str, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        Body::from(Bytes::from(body)),
    )
        .into_response()
}

fn internal_error(message: String) -> Response {
    error!("{}", message);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(StatusResponse::error(message)),
    )
        .into_response()
}

async fn get_chart(State(state): State<Arc<AppState>>) -> Response {
    let session = state.snapshot();
    match render_chart(
        &session.series(),
        &session.customization,
        &GraphOptions::default(),
    ) {
        Ok(png) => ([(header::CONTENT_TYPE, "image/png")], png).into_response(),
        Err(e) => internal_error(format!("Failed to render chart: {}", e)),
    }
}

async fn download_csv(State(state): State<Arc<AppState>>) -> Response {
    match to_csv(&state.snapshot().grid) {
        Ok(csv) => attachment("text/csv", "grid.csv", csv.into_bytes()),
        Err(e) => internal_error(format!("Failed to generate CSV: {}", e)),
    }
}

async fn download_xlsx(State(state): State<Arc<AppState>>) -> Response {
    match to_xlsx(&state.snapshot().grid) {
        Ok(xlsx) => attachment(
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            "grid.xlsx",
            xlsx,
        ),
        Err(e) => internal_error(format!("Failed to generate XLSX: {}", e)),
    }
}

/// Runs a saved query on the analytics service and answers with its CSV.
async fn query_csv(State(state): State<Arc<AppState>>, Json(body): Json<Value>) -> Response {
    let query_id = match body.get("queryId") {
        Some(Value::String(id)) if !id.trim().is_empty() => id.trim().to_string(),
        Some(Value::Number(id)) => id.to_string(),
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Missing queryId" })),
            )
                .into_response();
        }
    };

    match state.relay.fetch_csv(&query_id).await {
        Ok(csv) => ([(header::CONTENT_TYPE, "text/csv")], csv).into_response(),
        Err(e @ ImportError::Timeout { attempts }) => {
            warn!("query {} still running: {}", query_id, e);
            (
                StatusCode::GATEWAY_TIMEOUT,
                Json(json!({ "error": e.to_string(), "attempts": attempts })),
            )
                .into_response()
        }
        Err(e) => {
            error!("query {} failed: {}", query_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

/// Forwards an export request to the image service and streams the image back.
async fn export_image(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ExportRequest>,
) -> Response {
    match state.exporter.forward(&request).await {
        Ok(image) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, image.content_type)
            .body(Body::from(image.bytes))
            .unwrap_or_else(|e| internal_error(e.to_string())),
        Err(ExportError::Export { status, message }) => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            (status, message).into_response()
        }
        Err(e) => {
            warn!("export relay failed: {}", e);
            (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
        }
    }
}

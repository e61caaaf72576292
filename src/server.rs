//! HTTP trigger layer.
//!
//! A thin JSON API over the pipeline, for schedulers that prefer an HTTP
//! call over running the CLI.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/ingest/{source}?date=YYYYMMDD` | Run one source, returns the run summary |
//! | `GET`  | `/alerts/pending?limit=N` | Oldest pending alerts, for the summarization stage |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "unknown source 'dogc'. Available: ..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `configuration_error` (400),
//! `not_found` (404), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::alerts::{DEFAULT_PENDING_LIMIT, MAX_PENDING_LIMIT};
use crate::config::Config;
use crate::db;
use crate::error::IngestError;
use crate::fetch::HttpFetcher;
use crate::ingest::{parse_target_date, Pipeline};
use crate::migrate;
use crate::models::{AlertRecord, RunSummary, SourceTag};
use crate::store::{AlertStore, SqliteAlertStore};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn AlertStore>,
    pub fetcher: Arc<HttpFetcher>,
}

/// Build the router. Exposed separately from [`run_server`] for embedding.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/ingest/{source}", post(handle_ingest))
        .route("/alerts/pending", get(handle_pending))
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind`. Runs until the process is
/// terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();

    let pool = db::connect(config).await?;
    migrate::apply_schema(&pool).await?;

    let state = AppState {
        config: Arc::new(config.clone()),
        store: Arc::new(SqliteAlertStore::new(pool)),
        fetcher: Arc::new(HttpFetcher::from_config(&config.fetch)?),
    };

    let app = router(state);

    println!("gazette server listening on http://{}", bind_addr);
    info!(%bind_addr, "server started");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Configuration(message) => AppError {
                status: StatusCode::BAD_REQUEST,
                code: "configuration_error".to_string(),
                message,
            },
            other => internal(other.to_string()),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /ingest/{source} ============

#[derive(Deserialize)]
struct IngestQuery {
    date: Option<String>,
}

/// Runs one source synchronously and returns its [`RunSummary`].
async fn handle_ingest(
    State(state): State<AppState>,
    Path(source): Path<String>,
    Query(query): Query<IngestQuery>,
) -> Result<Json<RunSummary>, AppError> {
    let tag: SourceTag = source.parse().map_err(not_found)?;
    let date = parse_target_date(query.date.as_deref()).map_err(|e| bad_request(e.to_string()))?;

    if state.config.source(tag).is_some_and(|s| !s.enabled) {
        return Err(bad_request(format!("source '{}' is disabled", tag)));
    }

    let pipeline = Pipeline::from_config(&state.config, tag, state.fetcher.clone(), state.store.clone())?;
    let summary = pipeline.run(date).await?;

    Ok(Json(summary))
}

// ============ GET /alerts/pending ============

#[derive(Deserialize)]
struct PendingQuery {
    limit: Option<i64>,
}

#[derive(Serialize)]
struct PendingResponse {
    alerts: Vec<AlertRecord>,
}

async fn handle_pending(
    State(state): State<AppState>,
    Query(query): Query<PendingQuery>,
) -> Result<Json<PendingResponse>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_PENDING_LIMIT);
    if !(1..=MAX_PENDING_LIMIT).contains(&limit) {
        return Err(bad_request(format!(
            "limit must be between 1 and {}",
            MAX_PENDING_LIMIT
        )));
    }

    let alerts = state
        .store
        .pending(limit)
        .await
        .map_err(|e| internal(format!("{:#}", e)))?;

    Ok(Json(PendingResponse { alerts }))
}

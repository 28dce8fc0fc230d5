//! Read-only analytics HTTP API.
//!
//! Thin axum layer over [`crate::queries`]. Handlers are stateless beyond
//! the shared [`Config`]; each request opens and closes its own database
//! pool, matching the one-query-per-operation model of the query layer.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/reports/top-products?limit=` | Word-frequency report |
//! | `GET` | `/api/channels/{channel_name}/activity` | Per-day message counts |
//! | `GET` | `/api/search/messages?query=&limit=` | Substring search, newest first |
//! | `GET` | `/api/messages/{message_id}/detections` | Detections for one message |
//! | `GET` | `/health` | Health check (returns version) |
//!
//! # Error contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "limit must be between 1 and 100" } }
//! ```
//!
//! Codes: `bad_request` (400), `internal` (500).

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::Config;
use crate::models::{ChannelActivity, ImageDetectionResult, MessageSearchResult, ProductReport};
use crate::queries;

/// Shared application state passed to handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
}

/// Starts the analytics API server on `config.api_bind` and serves until
/// the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.api_bind.clone();
    let state = AppState {
        config: Arc::new(config.clone()),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/reports/top-products", get(handle_top_products))
        .route(
            "/api/channels/{channel_name}/activity",
            get(handle_channel_activity),
        )
        .route("/api/search/messages", get(handle_search_messages))
        .route(
            "/api/messages/{message_id}/detections",
            get(handle_image_detections),
        )
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    info!("analytics API listening on http://{bind_addr}");

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

fn internal(err: anyhow::Error) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: err.to_string(),
    }
}

fn validate_limit(limit: i64) -> Result<i64, AppError> {
    if (1..=100).contains(&limit) {
        Ok(limit)
    } else {
        Err(bad_request("limit must be between 1 and 100"))
    }
}

// Character count, not byte length, so multibyte queries up to 100
// characters are accepted.
fn validate_query(query: &str) -> Result<&str, AppError> {
    if query.is_empty() || query.chars().count() > 100 {
        Err(bad_request("query must be between 1 and 100 characters"))
    } else {
        Ok(query)
    }
}

// ============ Handlers ============

#[derive(Deserialize)]
struct TopProductsParams {
    limit: Option<i64>,
}

async fn handle_top_products(
    State(state): State<AppState>,
    Query(params): Query<TopProductsParams>,
) -> Result<Json<Vec<ProductReport>>, AppError> {
    let limit = validate_limit(params.limit.unwrap_or(10))?;
    let rows = queries::top_products(&state.config, limit)
        .await
        .map_err(internal)?;
    Ok(Json(rows))
}

async fn handle_channel_activity(
    State(state): State<AppState>,
    Path(channel_name): Path<String>,
) -> Result<Json<Vec<ChannelActivity>>, AppError> {
    let rows = queries::channel_activity(&state.config, &channel_name)
        .await
        .map_err(internal)?;
    Ok(Json(rows))
}

#[derive(Deserialize)]
struct SearchParams {
    query: Option<String>,
    limit: Option<i64>,
}

async fn handle_search_messages(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<MessageSearchResult>>, AppError> {
    let query = params.query.unwrap_or_default();
    validate_query(&query)?;
    let limit = validate_limit(params.limit.unwrap_or(20))?;

    let rows = queries::search_messages(&state.config, &query, limit)
        .await
        .map_err(internal)?;
    Ok(Json(rows))
}

async fn handle_image_detections(
    State(state): State<AppState>,
    Path(message_id): Path<i64>,
) -> Result<Json<Vec<ImageDetectionResult>>, AppError> {
    let rows = queries::image_detections(&state.config, message_id)
        .await
        .map_err(internal)?;
    Ok(Json(rows))
}

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

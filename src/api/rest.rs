// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// Read-only views for the presentation layer.  All endpoints live under
// `/api/v1/`.  Nothing here mutates market-data state.
//
// CORS is configured permissively; the dashboard is served from a different
// origin during development.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::app_state::AppState;
use crate::error::ResampleError;
use crate::market_data::IngestStats;
use crate::types::LatestTick;

// =============================================================================
// Router construction
// =============================================================================

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/latest", get(latest_all))
        .route("/api/v1/latest/:symbol", get(latest_one))
        .route("/api/v1/candles/:symbol/:timeframe", get(candles))
        .route("/api/v1/pairs", get(pairs))
        .layer(cors)
        .with_state(state)
}

fn bad_timeframe(err: ResampleError) -> Response {
    warn!(error = %err, "rejected request");
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": err.to_string() })),
    )
        .into_response()
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    server_time: i64,
    started_at: DateTime<Utc>,
    ingest: IngestStats,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        server_time: Utc::now().timestamp_millis(),
        started_at: state.started_at,
        ingest: state.ingestor.stats(),
    })
}

// =============================================================================
// Latest ticks
// =============================================================================

#[derive(Serialize)]
struct LatestRow {
    symbol: String,
    #[serde(flatten)]
    tick: LatestTick,
}

async fn latest_all(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let rows: Vec<LatestRow> = state
        .latest_cache
        .all()
        .into_iter()
        .map(|(symbol, tick)| LatestRow { symbol, tick })
        .collect();
    Json(rows)
}

async fn latest_one(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Response {
    let symbol = symbol.to_uppercase();
    match state.latest(&symbol) {
        Some(tick) => Json(LatestRow { symbol, tick }).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "symbol": symbol, "message": "Waiting for live data..." })),
        )
            .into_response(),
    }
}

// =============================================================================
// Candles
// =============================================================================

async fn candles(
    State(state): State<Arc<AppState>>,
    Path((symbol, timeframe)): Path<(String, String)>,
) -> Response {
    match state.resample(&symbol.to_uppercase(), &timeframe) {
        Ok(candles) => Json(candles).into_response(),
        Err(e) => bad_timeframe(e),
    }
}

// =============================================================================
// Pair statistics
// =============================================================================

#[derive(Deserialize)]
struct PairsQuery {
    a: String,
    b: String,
    #[serde(default = "default_timeframe")]
    timeframe: String,
    #[serde(default)]
    window: Option<usize>,
}

fn default_timeframe() -> String {
    "1s".to_string()
}

async fn pairs(State(state): State<Arc<AppState>>, Query(q): Query<PairsQuery>) -> Response {
    if matches!(q.window, Some(w) if w < 2) {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "window must be at least 2" })),
        )
            .into_response();
    }
    match state.pair_statistics_at(
        &q.a.to_uppercase(),
        &q.b.to_uppercase(),
        &q.timeframe,
        q.window,
        Utc::now(),
    ) {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => bad_timeframe(e),
    }
}

// =============================================================================
// Tests
// =============================================================================

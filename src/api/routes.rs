use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::health::{RefreshStatus, StatusSnapshot};
use crate::api::latency::{CycleTimings, Percentiles};
use crate::config::{DataPaths, EXCLUDED_ETFS};
use crate::error::AppError;
use crate::publish::{modified_ns, read_table, PublishedRow};
use crate::types::Direction;

#[derive(Clone)]
pub struct ApiState {
    pub paths: DataPaths,
    pub status: Arc<RefreshStatus>,
    pub timings: Arc<CycleTimings>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/recommendations/buy", get(get_buy_recommendations))
        .route("/recommendations/sell", get(get_sell_recommendations))
        .route("/status", get(get_status))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct TableQuery {
    /// Only the N rows with the largest score.
    pub top: Option<usize>,
    /// Defaults to true: hide broad index ETFs.
    pub exclude_etfs: Option<bool>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct TableResponse {
    pub side: Direction,
    /// Modification time of the published table; `None` before the first publish.
    pub last_refreshed_ns: Option<u64>,
    pub rows: Vec<PublishedRow>,
}

#[derive(Serialize)]
pub struct PhaseLatency {
    pub p50_ms: Option<u64>,
    pub p95_ms: Option<u64>,
    pub p99_ms: Option<u64>,
}

impl From<Percentiles> for PhaseLatency {
    fn from((p50_ms, p95_ms, p99_ms): Percentiles) -> Self {
        Self {
            p50_ms,
            p95_ms,
            p99_ms,
        }
    }
}

#[derive(Serialize)]
pub struct LatencyResponse {
    pub cycles: u64,
    pub collect: PhaseLatency,
    pub aggregate: PhaseLatency,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_buy_recommendations(
    State(state): State<ApiState>,
    Query(params): Query<TableQuery>,
) -> Result<Json<TableResponse>, AppError> {
    table_response(Direction::Buy, state.paths.buy_table(), params).await
}

async fn get_sell_recommendations(
    State(state): State<ApiState>,
    Query(params): Query<TableQuery>,
) -> Result<Json<TableResponse>, AppError> {
    table_response(Direction::Sell, state.paths.sell_table(), params).await
}

async fn table_response(
    side: Direction,
    path: PathBuf,
    params: TableQuery,
) -> Result<Json<TableResponse>, AppError> {
    let (rows, last_refreshed_ns) = tokio::task::spawn_blocking(move || {
        read_table(&path).map(|rows| (rows, modified_ns(&path)))
    })
    .await??;

    let rows = filter_rows(rows, params.exclude_etfs.unwrap_or(true), params.top);

    Ok(Json(TableResponse {
        side,
        last_refreshed_ns,
        rows,
    }))
}

async fn get_status(State(state): State<ApiState>) -> Json<StatusSnapshot> {
    Json(state.status.snapshot())
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencyResponse> {
    Json(LatencyResponse {
        cycles: state.timings.len(),
        collect: state.timings.collect_percentiles().into(),
        aggregate: state.timings.aggregate_percentiles().into(),
    })
}

/// Published order is kept unless `top` asks for the highest-scoring rows.
fn filter_rows(mut rows: Vec<PublishedRow>, exclude_etfs: bool, top: Option<usize>) -> Vec<PublishedRow> {
    if exclude_etfs {
        rows.retain(|r| !EXCLUDED_ETFS.contains(&r.ticker.as_str()));
    }
    if let Some(n) = top {
        rows.sort_by(|a, b| b.score.total_cmp(&a.score));
        rows.truncate(n);
    }
    rows
}

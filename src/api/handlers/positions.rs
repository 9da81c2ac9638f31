use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ApiResponse;
use crate::errors::AppError;
use crate::models::{Direction, Position, PositionStatus};
use crate::services::session;
use crate::AppState;

#[derive(Deserialize)]
pub struct OpenRequest {
    pub user_id: Uuid,
    pub symbol: String,
    pub direction: Direction,
    pub stake: Decimal,
    pub duration_secs: i64,
}

pub async fn open(
    State(state): State<AppState>,
    Json(req): Json<OpenRequest>,
) -> Result<Json<ApiResponse<Position>>, AppError> {
    let position = state
        .engine
        .open_position(
            req.user_id,
            &req.symbol,
            req.direction,
            req.stake,
            req.duration_secs,
        )
        .await?;

    Ok(Json(ApiResponse::ok(position)))
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub owner_id: Uuid,
}

/// Position plus a display phase. An expired-but-unsettled position shows
/// as awaiting its result rather than erroring; the result appears on the
/// next read once any scheduler settles it.
#[derive(Serialize)]
pub struct PositionView {
    #[serde(flatten)]
    pub position: Position,
    pub phase: &'static str,
}

impl From<Position> for PositionView {
    fn from(position: Position) -> Self {
        let phase = match position.status {
            PositionStatus::Settled => "settled",
            _ if position.is_expired(Utc::now()) => "awaiting_result",
            _ => "running",
        };
        Self { position, phase }
    }
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<PositionView>>>, AppError> {
    let positions = state
        .engine
        .positions()
        .list_for_owner(query.owner_id)
        .await?;

    let views = positions.into_iter().map(PositionView::from).collect();
    Ok(Json(ApiResponse::ok(views)))
}

#[derive(Deserialize)]
pub struct ReconcileRequest {
    pub user_id: Uuid,
}

#[derive(Serialize)]
pub struct ReconcileResponse {
    pub settled: usize,
}

/// Visibility reconciliation trigger: a client that regains foreground
/// posts here to settle anything that expired while it was backgrounded.
pub async fn reconcile(
    State(state): State<AppState>,
    Json(req): Json<ReconcileRequest>,
) -> Result<Json<ApiResponse<ReconcileResponse>>, AppError> {
    let settled =
        session::reconcile_owner(&state.engine, req.user_id, state.config.expiry_grace_secs)
            .await?;

    Ok(Json(ApiResponse::ok(ReconcileResponse { settled })))
}

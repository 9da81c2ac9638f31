use axum::extract::{Path, State};
use axum::Json;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::ApiResponse;
use crate::errors::AppError;
use crate::AppState;

#[derive(Serialize)]
pub struct BalanceResponse {
    pub user_id: Uuid,
    pub balance: Decimal,
}

pub async fn get(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiResponse<BalanceResponse>>, AppError> {
    let balance = state.engine.ledger().get(user_id).await?;

    Ok(Json(ApiResponse::ok(BalanceResponse { user_id, balance })))
}

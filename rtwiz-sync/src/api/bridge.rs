//! Bridge diagnostics endpoints

use axum::{extract::State, Json};
use serde::Serialize;

use super::error::ApiError;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct BridgeStatusResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct BridgeTablesResponse {
    pub tables: Vec<String>,
}

/// GET /api/bridge/status
pub async fn bridge_status(
    State(state): State<AppState>,
) -> Result<Json<BridgeStatusResponse>, ApiError> {
    let message = state.store.test().await?;
    Ok(Json(BridgeStatusResponse {
        status: "success".to_string(),
        message,
    }))
}

/// GET /api/bridge/tables
pub async fn bridge_tables(
    State(state): State<AppState>,
) -> Result<Json<BridgeTablesResponse>, ApiError> {
    let tables = state.store.tables().await?;
    Ok(Json(BridgeTablesResponse { tables }))
}

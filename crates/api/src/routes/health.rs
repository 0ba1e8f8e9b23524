use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::state::AppState;

/// Liveness probe with a database round trip.
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    sqlx::query("SELECT 1").execute(&state.pool).await?;
    Ok(Json(json!({ "status": "ok" })))
}

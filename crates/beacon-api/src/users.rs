use anyhow::anyhow;
use axum::{Extension, Json, extract::State, response::IntoResponse};
use serde_json::json;

use beacon_types::api::{Claims, DeviceTokenRequest};

use crate::AppState;
use crate::error::{ApiError, Result};

/// Register the caller's push device token; later fan-outs snapshot it onto
/// their notification rows.
pub async fn register_device(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<DeviceTokenRequest>,
) -> Result<impl IntoResponse> {
    if req.device_token.trim().is_empty() {
        return Err(ApiError::validation("device_token must not be empty"));
    }

    let db = state.clone();
    let uid = claims.sub.to_string();
    let updated =
        tokio::task::spawn_blocking(move || db.db.set_device_token(&uid, &req.device_token))
            .await
            .map_err(|e| anyhow!("spawn_blocking join error: {}", e))??;

    if !updated {
        return Err(ApiError::not_found("User"));
    }

    Ok(Json(json!({ "registered": true })))
}

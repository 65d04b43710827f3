use anyhow::anyhow;
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use beacon_db::models::NotificationRow;
use beacon_db::queries::{DeleteOutcome, SendOutcome, UpdateOutcome};
use beacon_types::api::{
    BroadcastDetail, BroadcastPage, Claims, CreateBroadcastRequest, SendBroadcastRequest,
    SendBroadcastResponse, UpdateBroadcastRequest,
};
use beacon_types::models::{BroadcastStatus, NotificationStatus};

use crate::AppState;
use crate::error::{ApiError, Result};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    pub status: Option<String>,
}

pub(crate) fn default_page() -> u32 {
    1
}

pub(crate) fn default_per_page() -> u32 {
    10
}

/// Enforced pagination bounds; returns the SQL limit/offset pair.
pub(crate) fn validate_pagination(page: u32, per_page: u32) -> Result<(u32, u64)> {
    if page < 1 {
        return Err(ApiError::validation("page must be at least 1"));
    }
    if per_page < 1 || per_page > 100 {
        return Err(ApiError::validation("per_page must be between 1 and 100"));
    }
    Ok((per_page, (page as u64 - 1) * per_page as u64))
}

pub(crate) fn page_count(total: u64, per_page: u32) -> u64 {
    total.div_ceil(per_page as u64)
}

pub async fn create_broadcast(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateBroadcastRequest>,
) -> Result<impl IntoResponse> {
    if req.title.trim().is_empty() || req.message.trim().is_empty() {
        return Err(ApiError::validation(
            "missing required fields: title, message",
        ));
    }

    let db = state.clone();
    let id = Uuid::new_v4().to_string();
    let creator = claims.sub.to_string();
    let scheduled_at = req.scheduled_at.map(|ts| ts.to_rfc3339());
    let row = tokio::task::spawn_blocking(move || {
        db.db.create_broadcast(
            &id,
            &creator,
            &req.title,
            &req.message,
            scheduled_at.as_deref(),
        )
    })
    .await
    .map_err(|e| anyhow!("spawn_blocking join error: {}", e))??;

    Ok((StatusCode::CREATED, Json(row.into_model())))
}

pub async fn list_broadcasts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse> {
    let (limit, offset) = validate_pagination(query.page, query.per_page)?;

    let status = match &query.status {
        Some(raw) => Some(
            raw.parse::<BroadcastStatus>()
                .map_err(|_| ApiError::validation(format!("invalid status filter: {}", raw)))?,
        ),
        None => None,
    };

    let db = state.clone();
    let creator = claims.sub.to_string();
    let (rows, total) = tokio::task::spawn_blocking(move || {
        db.db.list_broadcasts(
            &creator,
            status.map(|s| s.as_str()),
            limit,
            offset,
        )
    })
    .await
    .map_err(|e| anyhow!("spawn_blocking join error: {}", e))??;

    Ok(Json(BroadcastPage {
        broadcasts: rows.into_iter().map(|row| row.into_model()).collect(),
        total,
        pages: page_count(total, query.per_page),
        current_page: query.page,
    }))
}

pub async fn get_broadcast(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let db = state.clone();
    let bid = id.to_string();
    let requester = claims.sub.to_string();
    let (row, notifications) = tokio::task::spawn_blocking(move || {
        let Some(row) = db.db.get_broadcast(&bid, &requester)? else {
            return Ok((None, Vec::new()));
        };
        let notifications = db.db.notifications_for_broadcast(&bid)?;
        Ok::<_, anyhow::Error>((Some(row), notifications))
    })
    .await
    .map_err(|e| anyhow!("spawn_blocking join error: {}", e))??;

    let row = row.ok_or_else(|| ApiError::not_found("Broadcast"))?;

    Ok(Json(BroadcastDetail {
        broadcast: row.into_model(),
        notifications: notifications
            .into_iter()
            .map(|row| row.into_model())
            .collect(),
    }))
}

pub async fn update_broadcast(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateBroadcastRequest>,
) -> Result<impl IntoResponse> {
    if matches!(&req.title, Some(title) if title.trim().is_empty()) {
        return Err(ApiError::validation("title must not be empty"));
    }
    if matches!(&req.message, Some(message) if message.trim().is_empty()) {
        return Err(ApiError::validation("message must not be empty"));
    }

    let db = state.clone();
    let bid = id.to_string();
    let requester = claims.sub.to_string();
    let scheduled_at = req.scheduled_at.map(|ts| ts.to_rfc3339());
    let outcome = tokio::task::spawn_blocking(move || {
        db.db.update_broadcast(
            &bid,
            &requester,
            req.title.as_deref(),
            req.message.as_deref(),
            scheduled_at.as_deref(),
        )
    })
    .await
    .map_err(|e| anyhow!("spawn_blocking join error: {}", e))??;

    match outcome {
        UpdateOutcome::Updated(row) => Ok(Json(row.into_model())),
        UpdateOutcome::NotDraft => Err(ApiError::conflict("can only update draft broadcasts")),
        UpdateOutcome::NotFound => Err(ApiError::not_found("Broadcast")),
    }
}

pub async fn delete_broadcast(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let db = state.clone();
    let bid = id.to_string();
    let requester = claims.sub.to_string();
    let outcome = tokio::task::spawn_blocking(move || db.db.delete_broadcast(&bid, &requester))
        .await
        .map_err(|e| anyhow!("spawn_blocking join error: {}", e))??;

    match outcome {
        DeleteOutcome::Deleted => Ok(Json(json!({ "deleted": true }))),
        DeleteOutcome::NotDraft => Err(ApiError::conflict("can only delete draft broadcasts")),
        DeleteOutcome::NotFound => Err(ApiError::not_found("Broadcast")),
    }
}

/// Fan the broadcast out and dispatch the pushes.
///
/// The fan-out transaction commits before any provider call; dispatcher
/// verdicts are then recorded per notification row and never fail the
/// request or undo the draft->sent transition.
pub async fn send_broadcast(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    body: Option<Json<SendBroadcastRequest>>,
) -> Result<impl IntoResponse> {
    let targets: Vec<String> = body
        .map(|Json(req)| req.target_users)
        .unwrap_or_default()
        .into_iter()
        .map(|uid| uid.to_string())
        .collect();

    let db = state.clone();
    let bid = id.to_string();
    let requester = claims.sub.to_string();
    let outcome =
        tokio::task::spawn_blocking(move || db.db.send_broadcast(&bid, &requester, &targets))
            .await
            .map_err(|e| anyhow!("spawn_blocking join error: {}", e))??;

    let (broadcast, notifications) = match outcome {
        SendOutcome::Sent {
            broadcast,
            notifications,
        } => (broadcast, notifications),
        SendOutcome::AlreadySent => return Err(ApiError::conflict("broadcast already sent")),
        SendOutcome::NoTargets => return Err(ApiError::validation("no target users resolved")),
        SendOutcome::NotFound => return Err(ApiError::not_found("Broadcast")),
    };

    let (sent_count, failed_count, notifications) =
        dispatch_notifications(&state, &broadcast.title, &broadcast.message, notifications).await?;

    Ok(Json(SendBroadcastResponse {
        broadcast: broadcast.into_model(),
        notifications: notifications
            .into_iter()
            .map(|row| row.into_model())
            .collect(),
        sent_count,
        failed_count,
    }))
}

/// Push each fan-out row through the dispatcher and persist the verdicts.
/// Returns the refreshed rows.
async fn dispatch_notifications(
    state: &AppState,
    title: &str,
    message: &str,
    notifications: Vec<NotificationRow>,
) -> Result<(usize, usize, Vec<NotificationRow>)> {
    let broadcast_id = match notifications.first() {
        Some(first) => first.broadcast_id.clone(),
        None => return Ok((0, 0, notifications)),
    };

    let data = json!({ "broadcast_id": broadcast_id.clone() });

    // (row id, verdict)
    let mut verdicts: Vec<(String, beacon_dispatch::DispatchOutcome)> = Vec::new();
    for row in &notifications {
        let verdict = match &row.device_token {
            Some(token) => {
                state
                    .dispatcher
                    .send_one(token, title, message, Some(data.clone()))
                    .await
            }
            None => beacon_dispatch::DispatchOutcome::err("no device token registered"),
        };
        verdicts.push((row.id.clone(), verdict));
    }

    let sent_count = verdicts.iter().filter(|(_, v)| v.success).count();
    let failed_count = verdicts.len() - sent_count;

    let db = state.clone();
    let refreshed = tokio::task::spawn_blocking(move || {
        let now = Utc::now().to_rfc3339();
        for (id, verdict) in &verdicts {
            let (status, sent_at) = if verdict.success {
                (NotificationStatus::Sent, Some(now.as_str()))
            } else {
                (NotificationStatus::Failed, None)
            };
            db.db
                .finalize_notification(id, status.as_str(), verdict.error.as_deref(), sent_at)?;
        }
        db.db.notifications_for_broadcast(&broadcast_id)
    })
    .await
    .map_err(|e| anyhow!("spawn_blocking join error: {}", e))??;

    Ok((sent_count, failed_count, refreshed))
}

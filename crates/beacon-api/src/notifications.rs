use anyhow::anyhow;
use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;

use beacon_types::api::{Claims, NotificationPage, NotificationWithBroadcast};

use crate::AppState;
use crate::broadcasts::{default_page, default_per_page, page_count, validate_pagination};
use crate::error::Result;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

/// Page of the caller's received notifications, newest first, each annotated
/// with its parent broadcast.
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse> {
    let (limit, offset) = validate_pagination(query.page, query.per_page)?;

    let db = state.clone();
    let uid = claims.sub.to_string();
    let (rows, total) =
        tokio::task::spawn_blocking(move || db.db.list_notifications(&uid, limit, offset))
            .await
            .map_err(|e| anyhow!("spawn_blocking join error: {}", e))??;

    Ok(Json(NotificationPage {
        notifications: rows
            .into_iter()
            .map(|(notification, broadcast)| NotificationWithBroadcast {
                notification: notification.into_model(),
                broadcast: broadcast.map(|row| row.into_model()),
            })
            .collect(),
        total,
        pages: page_count(total, query.per_page),
        current_page: query.page,
    }))
}

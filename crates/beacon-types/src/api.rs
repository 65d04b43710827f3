use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Broadcast, Notification};

// -- JWT Claims --

/// JWT claims shared between the auth handlers (token issuance) and the
/// request middleware (token validation). Canonical definition lives here in
/// beacon-types to eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceTokenRequest {
    pub device_token: String,
}

// -- Broadcasts --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateBroadcastRequest {
    pub title: String,
    pub message: String,
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateBroadcastRequest {
    pub title: Option<String>,
    pub message: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendBroadcastRequest {
    #[serde(default)]
    pub target_users: Vec<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BroadcastPage {
    pub broadcasts: Vec<Broadcast>,
    pub total: u64,
    pub pages: u64,
    pub current_page: u32,
}

/// A broadcast together with its fan-out rows, returned by the single-item
/// GET and by send.
#[derive(Debug, Serialize, Deserialize)]
pub struct BroadcastDetail {
    #[serde(flatten)]
    pub broadcast: Broadcast,
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendBroadcastResponse {
    pub broadcast: Broadcast,
    pub notifications: Vec<Notification>,
    pub sent_count: usize,
    pub failed_count: usize,
}

// -- Notifications --

#[derive(Debug, Serialize, Deserialize)]
pub struct NotificationWithBroadcast {
    #[serde(flatten)]
    pub notification: Notification,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broadcast: Option<Broadcast>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NotificationPage {
    pub notifications: Vec<NotificationWithBroadcast>,
    pub total: u64,
    pub pages: u64,
    pub current_page: u32,
}

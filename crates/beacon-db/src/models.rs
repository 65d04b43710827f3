//! Database row types, mapping directly to SQLite rows.
//! Distinct from the beacon-types API models to keep the DB layer independent.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use beacon_types::models::{
    Broadcast, BroadcastStatus, Notification, NotificationStatus, User,
};

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub device_token: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct BroadcastRow {
    pub id: String,
    pub title: String,
    pub message: String,
    pub creator_id: String,
    pub status: String,
    pub scheduled_at: Option<String>,
    pub sent_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct NotificationRow {
    pub id: String,
    pub broadcast_id: String,
    pub user_id: String,
    pub status: String,
    pub device_token: Option<String>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub sent_at: Option<String>,
}

impl UserRow {
    pub fn into_model(self) -> User {
        User {
            id: parse_uuid(&self.id, "user id"),
            username: self.username,
            email: self.email,
            created_at: parse_timestamp(&self.created_at, &self.id),
        }
    }
}

impl BroadcastRow {
    pub fn into_model(self) -> Broadcast {
        let status = self.status.parse::<BroadcastStatus>().unwrap_or_else(|e| {
            warn!("Corrupt status on broadcast '{}': {}", self.id, e);
            BroadcastStatus::Draft
        });

        Broadcast {
            id: parse_uuid(&self.id, "broadcast id"),
            title: self.title,
            message: self.message,
            creator_id: parse_uuid(&self.creator_id, "creator_id"),
            status,
            scheduled_at: self
                .scheduled_at
                .as_deref()
                .map(|ts| parse_timestamp(ts, &self.id)),
            sent_at: self
                .sent_at
                .as_deref()
                .map(|ts| parse_timestamp(ts, &self.id)),
            created_at: parse_timestamp(&self.created_at, &self.id),
            updated_at: parse_timestamp(&self.updated_at, &self.id),
        }
    }
}

impl NotificationRow {
    pub fn into_model(self) -> Notification {
        let status = self
            .status
            .parse::<NotificationStatus>()
            .unwrap_or_else(|e| {
                warn!("Corrupt status on notification '{}': {}", self.id, e);
                NotificationStatus::Pending
            });

        Notification {
            id: parse_uuid(&self.id, "notification id"),
            broadcast_id: parse_uuid(&self.broadcast_id, "broadcast_id"),
            user_id: parse_uuid(&self.user_id, "user_id"),
            status,
            error_message: self.error_message,
            created_at: parse_timestamp(&self.created_at, &self.id),
            sent_at: self
                .sent_at
                .as_deref()
                .map(|ts| parse_timestamp(ts, &self.id)),
        }
    }
}

fn parse_uuid(raw: &str, what: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, raw, e);
        Uuid::default()
    })
}

/// Timestamps are written by this crate as RFC 3339; the fallback covers rows
/// produced by SQLite's own datetime('now') format.
pub fn parse_timestamp(raw: &str, row_id: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}' on row '{}': {}", raw, row_id, e);
            DateTime::default()
        })
}

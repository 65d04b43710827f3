use std::collections::HashSet;

use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::Database;
use crate::models::{BroadcastRow, NotificationRow, UserRow};

/// Outcome of a status-gated broadcast update.
pub enum UpdateOutcome {
    Updated(BroadcastRow),
    NotDraft,
    NotFound,
}

/// Outcome of a status-gated broadcast delete.
pub enum DeleteOutcome {
    Deleted,
    NotDraft,
    NotFound,
}

/// Outcome of the send fan-out transaction.
pub enum SendOutcome {
    Sent {
        broadcast: BroadcastRow,
        notifications: Vec<NotificationRow>,
    },
    AlreadySent,
    NoTargets,
    NotFound,
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, username: &str, email: &str, password_hash: &str) -> Result<()> {
        let now = now_rfc3339();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, password, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                rusqlite::params![id, username, email, password_hash, now],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let row = conn
                .prepare("SELECT id, username, email, password, device_token, created_at, updated_at FROM users WHERE username = ?1")?
                .query_row([username], user_from_row)
                .optional()?;
            Ok(row)
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let row = conn
                .prepare("SELECT id, username, email, password, device_token, created_at, updated_at FROM users WHERE email = ?1")?
                .query_row([email], user_from_row)
                .optional()?;
            Ok(row)
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let row = conn
                .prepare("SELECT id, username, email, password, device_token, created_at, updated_at FROM users WHERE id = ?1")?
                .query_row([id], user_from_row)
                .optional()?;
            Ok(row)
        })
    }

    /// Store the caller's push registration. Returns false if the user row is
    /// missing (deleted account with a live token).
    pub fn set_device_token(&self, user_id: &str, device_token: &str) -> Result<bool> {
        let now = now_rfc3339();
        self.with_conn(|conn| {
            let affected = conn.execute(
                "UPDATE users SET device_token = ?2, updated_at = ?3 WHERE id = ?1",
                rusqlite::params![user_id, device_token, now],
            )?;
            Ok(affected == 1)
        })
    }

    // -- Broadcasts --

    pub fn create_broadcast(
        &self,
        id: &str,
        creator_id: &str,
        title: &str,
        message: &str,
        scheduled_at: Option<&str>,
    ) -> Result<BroadcastRow> {
        let now = now_rfc3339();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO broadcasts (id, title, message, creator_id, status, scheduled_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 'draft', ?5, ?6, ?6)",
                rusqlite::params![id, title, message, creator_id, scheduled_at, now],
            )?;
            query_broadcast(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("broadcast '{}' vanished after insert", id))
        })
    }

    /// Fetch a broadcast owned by `creator_id`. A broadcast belonging to
    /// another user is indistinguishable from a missing one.
    pub fn get_broadcast(&self, id: &str, creator_id: &str) -> Result<Option<BroadcastRow>> {
        self.with_conn(|conn| query_owned_broadcast(conn, id, creator_id))
    }

    /// Page of the creator's broadcasts, newest first. Returns the rows and
    /// the total count under the same filter.
    pub fn list_broadcasts(
        &self,
        creator_id: &str,
        status: Option<&str>,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<BroadcastRow>, u64)> {
        self.with_conn(|conn| {
            let (total, rows) = match status {
                Some(status) => {
                    let total: i64 = conn.query_row(
                        "SELECT COUNT(*) FROM broadcasts WHERE creator_id = ?1 AND status = ?2",
                        rusqlite::params![creator_id, status],
                        |row| row.get(0),
                    )?;
                    let rows = conn
                        .prepare(
                            "SELECT id, title, message, creator_id, status, scheduled_at, sent_at, created_at, updated_at
                             FROM broadcasts
                             WHERE creator_id = ?1 AND status = ?2
                             ORDER BY created_at DESC, rowid DESC
                             LIMIT ?3 OFFSET ?4",
                        )?
                        .query_map(
                            rusqlite::params![creator_id, status, limit, offset as i64],
                            broadcast_from_row,
                        )?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    (total, rows)
                }
                None => {
                    let total: i64 = conn.query_row(
                        "SELECT COUNT(*) FROM broadcasts WHERE creator_id = ?1",
                        [creator_id],
                        |row| row.get(0),
                    )?;
                    let rows = conn
                        .prepare(
                            "SELECT id, title, message, creator_id, status, scheduled_at, sent_at, created_at, updated_at
                             FROM broadcasts
                             WHERE creator_id = ?1
                             ORDER BY created_at DESC, rowid DESC
                             LIMIT ?2 OFFSET ?3",
                        )?
                        .query_map(
                            rusqlite::params![creator_id, limit, offset as i64],
                            broadcast_from_row,
                        )?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    (total, rows)
                }
            };

            Ok((rows, total as u64))
        })
    }

    /// Mutate a draft broadcast. Fields left as None keep their current value.
    pub fn update_broadcast(
        &self,
        id: &str,
        creator_id: &str,
        title: Option<&str>,
        message: Option<&str>,
        scheduled_at: Option<&str>,
    ) -> Result<UpdateOutcome> {
        let now = now_rfc3339();
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let Some(row) = query_owned_broadcast(&tx, id, creator_id)? else {
                return Ok(UpdateOutcome::NotFound);
            };
            if row.status != "draft" {
                return Ok(UpdateOutcome::NotDraft);
            }

            let title = title.unwrap_or(&row.title);
            let message = message.unwrap_or(&row.message);
            let scheduled_at = scheduled_at.or(row.scheduled_at.as_deref());

            // Status re-checked in the WHERE clause so a concurrent send
            // cannot slip in between the read and the write.
            let affected = tx.execute(
                "UPDATE broadcasts SET title = ?2, message = ?3, scheduled_at = ?4, updated_at = ?5
                 WHERE id = ?1 AND status = 'draft'",
                rusqlite::params![id, title, message, scheduled_at, now],
            )?;
            if affected == 0 {
                return Ok(UpdateOutcome::NotDraft);
            }

            let updated = query_broadcast(&tx, id)?
                .ok_or_else(|| anyhow::anyhow!("broadcast '{}' vanished during update", id))?;
            tx.commit()?;
            Ok(UpdateOutcome::Updated(updated))
        })
    }

    /// Delete a draft broadcast and its notifications in one transaction
    /// (application-level cascade).
    pub fn delete_broadcast(&self, id: &str, creator_id: &str) -> Result<DeleteOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let Some(row) = query_owned_broadcast(&tx, id, creator_id)? else {
                return Ok(DeleteOutcome::NotFound);
            };
            if row.status != "draft" {
                return Ok(DeleteOutcome::NotDraft);
            }

            tx.execute("DELETE FROM notifications WHERE broadcast_id = ?1", [id])?;
            let affected = tx.execute(
                "DELETE FROM broadcasts WHERE id = ?1 AND status = 'draft'",
                [id],
            )?;
            if affected == 0 {
                return Ok(DeleteOutcome::NotDraft);
            }

            tx.commit()?;
            Ok(DeleteOutcome::Deleted)
        })
    }

    /// Fan a broadcast out into pending notification rows and flip it to
    /// sent, all in one transaction.
    ///
    /// Target resolution: explicit ids are deduplicated and unknown ids are
    /// skipped; an empty explicit list means every user except the creator.
    /// The draft->sent flip is a conditional UPDATE, so two concurrent sends
    /// cannot both fan out.
    pub fn send_broadcast(
        &self,
        id: &str,
        creator_id: &str,
        explicit_targets: &[String],
    ) -> Result<SendOutcome> {
        let now = now_rfc3339();
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let Some(row) = query_owned_broadcast(&tx, id, creator_id)? else {
                return Ok(SendOutcome::NotFound);
            };
            if row.status == "sent" {
                return Ok(SendOutcome::AlreadySent);
            }

            // (target user id, device token snapshot)
            let targets: Vec<(String, Option<String>)> = if explicit_targets.is_empty() {
                tx.prepare("SELECT id, device_token FROM users WHERE id <> ?1 ORDER BY rowid")?
                    .query_map([creator_id], |r| Ok((r.get(0)?, r.get(1)?)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            } else {
                let mut seen = HashSet::new();
                let mut resolved = Vec::new();
                let mut stmt =
                    tx.prepare("SELECT id, device_token FROM users WHERE id = ?1")?;
                for target in explicit_targets {
                    if !seen.insert(target.as_str()) {
                        continue;
                    }
                    let found = stmt
                        .query_row([target], |r| {
                            Ok((r.get::<_, String>(0)?, r.get::<_, Option<String>>(1)?))
                        })
                        .optional()?;
                    match found {
                        Some(pair) => resolved.push(pair),
                        // Unknown ids are skipped rather than failing the send.
                        None => tracing::warn!("send target '{}' does not exist, skipping", target),
                    }
                }
                resolved
            };

            if targets.is_empty() {
                return Ok(SendOutcome::NoTargets);
            }

            let affected = tx.execute(
                "UPDATE broadcasts SET status = 'sent', sent_at = ?2, updated_at = ?2
                 WHERE id = ?1 AND status <> 'sent'",
                rusqlite::params![id, now],
            )?;
            if affected == 0 {
                return Ok(SendOutcome::AlreadySent);
            }

            {
                let mut insert = tx.prepare(
                    "INSERT INTO notifications (id, broadcast_id, user_id, status, device_token, created_at)
                     VALUES (?1, ?2, ?3, 'pending', ?4, ?5)",
                )?;
                for (user_id, device_token) in &targets {
                    insert.execute(rusqlite::params![
                        Uuid::new_v4().to_string(),
                        id,
                        user_id,
                        device_token,
                        now,
                    ])?;
                }
            }

            let broadcast = query_broadcast(&tx, id)?
                .ok_or_else(|| anyhow::anyhow!("broadcast '{}' vanished during send", id))?;
            let notifications = query_notifications_for_broadcast(&tx, id)?;

            tx.commit()?;
            Ok(SendOutcome::Sent {
                broadcast,
                notifications,
            })
        })
    }

    pub fn notifications_for_broadcast(&self, broadcast_id: &str) -> Result<Vec<NotificationRow>> {
        self.with_conn(|conn| query_notifications_for_broadcast(conn, broadcast_id))
    }

    // -- Notifications --

    /// Record the dispatcher's verdict for one notification row.
    pub fn finalize_notification(
        &self,
        id: &str,
        status: &str,
        error_message: Option<&str>,
        sent_at: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE notifications SET status = ?2, error_message = ?3, sent_at = ?4 WHERE id = ?1",
                rusqlite::params![id, status, error_message, sent_at],
            )?;
            Ok(())
        })
    }

    /// Page of a user's received notifications, newest first, each joined
    /// with its parent broadcast (single query, no N+1).
    pub fn list_notifications(
        &self,
        user_id: &str,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<(NotificationRow, Option<BroadcastRow>)>, u64)> {
        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM notifications WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )?;

            let rows = conn
                .prepare(
                    "SELECT n.id, n.broadcast_id, n.user_id, n.status, n.device_token, n.error_message, n.created_at, n.sent_at,
                            b.id, b.title, b.message, b.creator_id, b.status, b.scheduled_at, b.sent_at, b.created_at, b.updated_at
                     FROM notifications n
                     LEFT JOIN broadcasts b ON n.broadcast_id = b.id
                     WHERE n.user_id = ?1
                     ORDER BY n.created_at DESC, n.rowid DESC
                     LIMIT ?2 OFFSET ?3",
                )?
                .query_map(
                    rusqlite::params![user_id, limit, offset as i64],
                    |row| {
                        let notification = notification_from_row(row)?;
                        let broadcast = match row.get::<_, Option<String>>(8)? {
                            Some(id) => Some(BroadcastRow {
                                id,
                                title: row.get(9)?,
                                message: row.get(10)?,
                                creator_id: row.get(11)?,
                                status: row.get(12)?,
                                scheduled_at: row.get(13)?,
                                sent_at: row.get(14)?,
                                created_at: row.get(15)?,
                                updated_at: row.get(16)?,
                            }),
                            None => None,
                        };
                        Ok((notification, broadcast))
                    },
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok((rows, total as u64))
        })
    }
}

fn user_from_row(row: &Row) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        device_token: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn broadcast_from_row(row: &Row) -> rusqlite::Result<BroadcastRow> {
    Ok(BroadcastRow {
        id: row.get(0)?,
        title: row.get(1)?,
        message: row.get(2)?,
        creator_id: row.get(3)?,
        status: row.get(4)?,
        scheduled_at: row.get(5)?,
        sent_at: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn notification_from_row(row: &Row) -> rusqlite::Result<NotificationRow> {
    Ok(NotificationRow {
        id: row.get(0)?,
        broadcast_id: row.get(1)?,
        user_id: row.get(2)?,
        status: row.get(3)?,
        device_token: row.get(4)?,
        error_message: row.get(5)?,
        created_at: row.get(6)?,
        sent_at: row.get(7)?,
    })
}

fn query_broadcast(conn: &Connection, id: &str) -> Result<Option<BroadcastRow>> {
    let row = conn
        .prepare(
            "SELECT id, title, message, creator_id, status, scheduled_at, sent_at, created_at, updated_at
             FROM broadcasts WHERE id = ?1",
        )?
        .query_row([id], broadcast_from_row)
        .optional()?;
    Ok(row)
}

fn query_owned_broadcast(
    conn: &Connection,
    id: &str,
    creator_id: &str,
) -> Result<Option<BroadcastRow>> {
    let row = conn
        .prepare(
            "SELECT id, title, message, creator_id, status, scheduled_at, sent_at, created_at, updated_at
             FROM broadcasts WHERE id = ?1 AND creator_id = ?2",
        )?
        .query_row([id, creator_id], broadcast_from_row)
        .optional()?;
    Ok(row)
}

fn query_notifications_for_broadcast(
    conn: &Connection,
    broadcast_id: &str,
) -> Result<Vec<NotificationRow>> {
    let rows = conn
        .prepare(
            "SELECT id, broadcast_id, user_id, status, device_token, error_message, created_at, sent_at
             FROM notifications WHERE broadcast_id = ?1
             ORDER BY rowid",
        )?
        .query_map([broadcast_id], notification_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn add_user(db: &Database, username: &str) -> String {
        let id = Uuid::new_v4().to_string();
        db.create_user(
            &id,
            username,
            &format!("{}@example.com", username),
            "argon2-hash",
        )
        .unwrap();
        id
    }

    fn add_broadcast(db: &Database, creator: &str, title: &str) -> BroadcastRow {
        db.create_broadcast(
            &Uuid::new_v4().to_string(),
            creator,
            title,
            "hello",
            None,
        )
        .unwrap()
    }

    #[test]
    fn create_starts_in_draft() {
        let db = test_db();
        let creator = add_user(&db, "alice");
        let row = add_broadcast(&db, &creator, "Sale");

        assert_eq!(row.status, "draft");
        assert_eq!(row.title, "Sale");
        assert!(row.sent_at.is_none());
    }

    #[test]
    fn get_is_scoped_to_owner() {
        let db = test_db();
        let alice = add_user(&db, "alice");
        let bob = add_user(&db, "bob");
        let row = add_broadcast(&db, &alice, "Sale");

        assert!(db.get_broadcast(&row.id, &alice).unwrap().is_some());
        assert!(db.get_broadcast(&row.id, &bob).unwrap().is_none());
        assert!(db.get_broadcast("no-such-id", &alice).unwrap().is_none());
    }

    #[test]
    fn list_pages_newest_first() {
        let db = test_db();
        let alice = add_user(&db, "alice");
        for i in 0..3 {
            add_broadcast(&db, &alice, &format!("b{}", i));
        }

        let (page1, total) = db.list_broadcasts(&alice, None, 2, 0).unwrap();
        assert_eq!(total, 3);
        assert_eq!(page1.len(), 2);
        assert_eq!(page1[0].title, "b2");
        assert_eq!(page1[1].title, "b1");

        let (page2, _) = db.list_broadcasts(&alice, None, 2, 2).unwrap();
        assert_eq!(page2.len(), 1);
        assert_eq!(page2[0].title, "b0");
    }

    #[test]
    fn list_filters_by_status() {
        let db = test_db();
        let alice = add_user(&db, "alice");
        add_user(&db, "bob");
        let row = add_broadcast(&db, &alice, "to-send");
        add_broadcast(&db, &alice, "stays-draft");
        db.send_broadcast(&row.id, &alice, &[]).unwrap();

        let (sent, total) = db.list_broadcasts(&alice, Some("sent"), 10, 0).unwrap();
        assert_eq!(total, 1);
        assert_eq!(sent[0].title, "to-send");

        let (published, total) = db.list_broadcasts(&alice, Some("published"), 10, 0).unwrap();
        assert_eq!(total, 0);
        assert!(published.is_empty());
    }

    #[test]
    fn update_edits_only_drafts() {
        let db = test_db();
        let alice = add_user(&db, "alice");
        add_user(&db, "bob");
        let row = add_broadcast(&db, &alice, "Sale");

        match db
            .update_broadcast(&row.id, &alice, Some("Flash Sale"), None, None)
            .unwrap()
        {
            UpdateOutcome::Updated(updated) => {
                assert_eq!(updated.title, "Flash Sale");
                assert_eq!(updated.message, "hello");
            }
            _ => panic!("expected update to succeed on a draft"),
        }

        db.send_broadcast(&row.id, &alice, &[]).unwrap();
        assert!(matches!(
            db.update_broadcast(&row.id, &alice, Some("x"), None, None)
                .unwrap(),
            UpdateOutcome::NotDraft
        ));

        // Unchanged after the rejected update.
        let after = db.get_broadcast(&row.id, &alice).unwrap().unwrap();
        assert_eq!(after.title, "Flash Sale");

        assert!(matches!(
            db.update_broadcast("no-such-id", &alice, Some("x"), None, None)
                .unwrap(),
            UpdateOutcome::NotFound
        ));
    }

    #[test]
    fn delete_cascades_notifications() {
        let db = test_db();
        let alice = add_user(&db, "alice");
        let bob = add_user(&db, "bob");
        let row = add_broadcast(&db, &alice, "Sale");

        // A stray row left under a draft must go with the broadcast.
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notifications (id, broadcast_id, user_id, status, created_at)
                 VALUES ('n1', ?1, ?2, 'pending', '2026-01-01T00:00:00+00:00')",
                rusqlite::params![row.id, bob],
            )?;
            Ok(())
        })
        .unwrap();

        assert!(matches!(
            db.delete_broadcast(&row.id, &alice).unwrap(),
            DeleteOutcome::Deleted
        ));
        assert!(db.get_broadcast(&row.id, &alice).unwrap().is_none());
        assert!(db.notifications_for_broadcast(&row.id).unwrap().is_empty());
    }

    #[test]
    fn delete_rejects_sent_broadcasts() {
        let db = test_db();
        let alice = add_user(&db, "alice");
        add_user(&db, "bob");
        let row = add_broadcast(&db, &alice, "Sale");
        db.send_broadcast(&row.id, &alice, &[]).unwrap();

        assert!(matches!(
            db.delete_broadcast(&row.id, &alice).unwrap(),
            DeleteOutcome::NotDraft
        ));
        assert!(db.get_broadcast(&row.id, &alice).unwrap().is_some());
    }

    #[test]
    fn send_fans_out_to_explicit_targets() {
        let db = test_db();
        let alice = add_user(&db, "alice");
        let bob = add_user(&db, "bob");
        let carol = add_user(&db, "carol");
        db.set_device_token(&bob, "bob-token").unwrap();
        let row = add_broadcast(&db, &alice, "Sale");

        // Duplicate and unknown ids are tolerated.
        let targets = vec![
            bob.clone(),
            carol.clone(),
            bob.clone(),
            "no-such-user".to_string(),
        ];
        let outcome = db.send_broadcast(&row.id, &alice, &targets).unwrap();

        match outcome {
            SendOutcome::Sent {
                broadcast,
                notifications,
            } => {
                assert_eq!(broadcast.status, "sent");
                assert!(broadcast.sent_at.is_some());
                assert_eq!(notifications.len(), 2);
                assert!(notifications.iter().all(|n| n.status == "pending"));
                let bob_row = notifications.iter().find(|n| n.user_id == bob).unwrap();
                assert_eq!(bob_row.device_token.as_deref(), Some("bob-token"));
                let carol_row = notifications.iter().find(|n| n.user_id == carol).unwrap();
                assert!(carol_row.device_token.is_none());
            }
            _ => panic!("expected fan-out to succeed"),
        }
    }

    #[test]
    fn send_defaults_to_everyone_but_creator() {
        let db = test_db();
        let alice = add_user(&db, "alice");
        let bob = add_user(&db, "bob");
        let carol = add_user(&db, "carol");
        let row = add_broadcast(&db, &alice, "Sale");

        match db.send_broadcast(&row.id, &alice, &[]).unwrap() {
            SendOutcome::Sent { notifications, .. } => {
                let mut users: Vec<_> = notifications.iter().map(|n| n.user_id.clone()).collect();
                users.sort();
                let mut expected = vec![bob, carol];
                expected.sort();
                assert_eq!(users, expected);
            }
            _ => panic!("expected fan-out to succeed"),
        }
    }

    #[test]
    fn send_is_at_most_once() {
        let db = test_db();
        let alice = add_user(&db, "alice");
        add_user(&db, "bob");
        let row = add_broadcast(&db, &alice, "Sale");

        assert!(matches!(
            db.send_broadcast(&row.id, &alice, &[]).unwrap(),
            SendOutcome::Sent { .. }
        ));
        assert!(matches!(
            db.send_broadcast(&row.id, &alice, &[]).unwrap(),
            SendOutcome::AlreadySent
        ));
        // Still exactly one fan-out.
        assert_eq!(db.notifications_for_broadcast(&row.id).unwrap().len(), 1);
    }

    #[test]
    fn send_with_no_targets_leaves_draft_untouched() {
        let db = test_db();
        let alice = add_user(&db, "alice");
        let row = add_broadcast(&db, &alice, "Sale");

        // alice is the only user, so the default target set is empty.
        assert!(matches!(
            db.send_broadcast(&row.id, &alice, &[]).unwrap(),
            SendOutcome::NoTargets
        ));

        let after = db.get_broadcast(&row.id, &alice).unwrap().unwrap();
        assert_eq!(after.status, "draft");
        assert!(db.notifications_for_broadcast(&row.id).unwrap().is_empty());
    }

    #[test]
    fn finalize_records_dispatch_verdicts() {
        let db = test_db();
        let alice = add_user(&db, "alice");
        add_user(&db, "bob");
        let row = add_broadcast(&db, &alice, "Sale");

        let notifications = match db.send_broadcast(&row.id, &alice, &[]).unwrap() {
            SendOutcome::Sent { notifications, .. } => notifications,
            _ => panic!("expected fan-out to succeed"),
        };

        db.finalize_notification(
            &notifications[0].id,
            "failed",
            Some("no device token registered"),
            None,
        )
        .unwrap();

        let after = db.notifications_for_broadcast(&row.id).unwrap();
        assert_eq!(after[0].status, "failed");
        assert_eq!(
            after[0].error_message.as_deref(),
            Some("no device token registered")
        );
        assert!(after[0].sent_at.is_none());
    }

    #[test]
    fn list_notifications_joins_broadcast() {
        let db = test_db();
        let alice = add_user(&db, "alice");
        let bob = add_user(&db, "bob");
        let row = add_broadcast(&db, &alice, "Sale");
        db.send_broadcast(&row.id, &alice, &[]).unwrap();

        let (rows, total) = db.list_notifications(&bob, 10, 0).unwrap();
        assert_eq!(total, 1);
        let (notification, broadcast) = &rows[0];
        assert_eq!(notification.user_id, bob);
        assert_eq!(broadcast.as_ref().unwrap().title, "Sale");

        // The creator received nothing.
        let (rows, total) = db.list_notifications(&alice, 10, 0).unwrap();
        assert_eq!(total, 0);
        assert!(rows.is_empty());
    }
}

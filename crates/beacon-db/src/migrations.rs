use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id              TEXT PRIMARY KEY,
            username        TEXT NOT NULL UNIQUE,
            email           TEXT NOT NULL UNIQUE,
            password        TEXT NOT NULL,
            device_token    TEXT,
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS broadcasts (
            id              TEXT PRIMARY KEY,
            title           TEXT NOT NULL,
            message         TEXT NOT NULL,
            creator_id      TEXT NOT NULL REFERENCES users(id),
            status          TEXT NOT NULL DEFAULT 'draft',
            scheduled_at    TEXT,
            sent_at         TEXT,
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_broadcasts_creator
            ON broadcasts(creator_id, created_at);

        CREATE TABLE IF NOT EXISTS notifications (
            id              TEXT PRIMARY KEY,
            broadcast_id    TEXT NOT NULL REFERENCES broadcasts(id),
            user_id         TEXT NOT NULL REFERENCES users(id),
            status          TEXT NOT NULL DEFAULT 'pending',
            device_token    TEXT,
            error_message   TEXT,
            created_at      TEXT NOT NULL,
            sent_at         TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_notifications_broadcast
            ON notifications(broadcast_id);

        CREATE INDEX IF NOT EXISTS idx_notifications_user
            ON notifications(user_id, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}

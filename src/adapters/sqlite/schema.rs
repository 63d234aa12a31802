use rusqlite::Connection;

use crate::types::error::Result;

pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- One row per verified identity. The secret is the provider app
        -- password, stored verbatim and only ever forwarded to IMAP/SMTP.
        CREATE TABLE IF NOT EXISTS users (
            id              TEXT PRIMARY KEY,   -- UUID
            email           TEXT NOT NULL UNIQUE,
            display_name    TEXT NOT NULL,
            secret          TEXT NOT NULL,
            created_at      INTEGER NOT NULL,   -- unix epoch ms
            updated_at      INTEGER NOT NULL
        );

        -- A sent message registered for open tracking.
        CREATE TABLE IF NOT EXISTS tracked_emails (
            id              TEXT PRIMARY KEY,   -- UUID
            user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            recipient_email TEXT NOT NULL,
            subject         TEXT NOT NULL DEFAULT '',
            content         TEXT NOT NULL DEFAULT '',  -- body snapshot at issue time
            tracking_id     TEXT NOT NULL UNIQUE,
            created_at      INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_tracked_user ON tracked_emails(user_id, created_at DESC);

        -- One row per pixel fetch. Rows are never hard-deleted; a reset
        -- flips is_deleted and stamps deleted_at.
        CREATE TABLE IF NOT EXISTS email_opens (
            id                TEXT PRIMARY KEY, -- UUID
            tracked_email_id  TEXT NOT NULL REFERENCES tracked_emails(id) ON DELETE CASCADE,
            opened_at         INTEGER NOT NULL,
            source_ip         TEXT NOT NULL,
            user_agent        TEXT NOT NULL,
            is_deleted        INTEGER NOT NULL DEFAULT 0,
            deleted_at        INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_opens_tracked ON email_opens(tracked_email_id, is_deleted);

        -- Best-effort record of provider sends.
        CREATE TABLE IF NOT EXISTS sent_emails (
            id              TEXT PRIMARY KEY,   -- UUID
            user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            recipient_email TEXT NOT NULL,
            subject         TEXT NOT NULL,
            content         TEXT NOT NULL,      -- final body as handed to the provider
            message_id      TEXT NOT NULL,
            tracking_id     TEXT,
            sent_at         INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_sent_user ON sent_emails(user_id, sent_at DESC);
    ",
    )?;

    Ok(())
}

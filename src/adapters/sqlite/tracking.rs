use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use super::DbPool;
use crate::types::error::{MailtraceError, Result};
use crate::types::{EmailOpen, TrackedEmail, TrackedEmailSummary, TrackingStats};

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Insert a tracked email. `Ok(None)` means the tracking id lost the
/// UNIQUE race; the caller draws a fresh id and retries.
pub fn insert_tracked(
    pool: &DbPool,
    user_id: &str,
    recipient_email: &str,
    subject: &str,
    content: &str,
    tracking_id: &str,
) -> Result<Option<TrackedEmail>> {
    let tracked = TrackedEmail {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        recipient_email: recipient_email.to_string(),
        subject: subject.to_string(),
        content: content.to_string(),
        tracking_id: tracking_id.to_string(),
        created_at: chrono::Utc::now().timestamp_millis(),
    };

    let conn = pool.get()?;
    let inserted = conn.execute(
        "INSERT INTO tracked_emails (id, user_id, recipient_email, subject, content, tracking_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            tracked.id,
            tracked.user_id,
            tracked.recipient_email,
            tracked.subject,
            tracked.content,
            tracked.tracking_id,
            tracked.created_at,
        ],
    );

    match inserted {
        Ok(_) => Ok(Some(tracked)),
        Err(e) if is_unique_violation(&e) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn find_by_tracking_id(pool: &DbPool, tracking_id: &str) -> Result<Option<TrackedEmail>> {
    let conn = pool.get()?;
    let tracked = conn
        .query_row(
            "SELECT id, user_id, recipient_email, subject, content, tracking_id, created_at
             FROM tracked_emails WHERE tracking_id = ?1",
            params![tracking_id],
            row_to_tracked,
        )
        .optional()?;
    Ok(tracked)
}

pub fn tracking_id_exists(pool: &DbPool, tracking_id: &str) -> Result<bool> {
    Ok(find_by_tracking_id(pool, tracking_id)?.is_some())
}

/// Every call inserts a new row; near-simultaneous opens from prefetching
/// clients are recorded individually.
pub fn insert_open(
    pool: &DbPool,
    tracked_email_id: &str,
    source_ip: &str,
    user_agent: &str,
) -> Result<EmailOpen> {
    let open = EmailOpen {
        id: Uuid::new_v4().to_string(),
        tracked_email_id: tracked_email_id.to_string(),
        opened_at: chrono::Utc::now().timestamp_millis(),
        source_ip: source_ip.to_string(),
        user_agent: user_agent.to_string(),
        is_deleted: false,
        deleted_at: None,
    };

    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO email_opens (id, tracked_email_id, opened_at, source_ip, user_agent, is_deleted)
         VALUES (?1, ?2, ?3, ?4, ?5, 0)",
        params![
            open.id,
            open.tracked_email_id,
            open.opened_at,
            open.source_ip,
            open.user_agent,
        ],
    )?;

    Ok(open)
}

/// Soft-delete all active opens for a tracked email the caller owns.
/// A missing row and a row owned by someone else both come back as
/// `NotFound`. Returns how many rows were flipped.
pub fn reset_opens(pool: &DbPool, tracked_email_id: &str, user_id: &str) -> Result<usize> {
    let conn = pool.get()?;

    let owned: Option<String> = conn
        .query_row(
            "SELECT id FROM tracked_emails WHERE id = ?1 AND user_id = ?2",
            params![tracked_email_id, user_id],
            |row| row.get(0),
        )
        .optional()?;

    if owned.is_none() {
        return Err(MailtraceError::NotFound);
    }

    let now = chrono::Utc::now().timestamp_millis();
    let count = conn.execute(
        "UPDATE email_opens SET is_deleted = 1, deleted_at = ?1
         WHERE tracked_email_id = ?2 AND is_deleted = 0",
        params![now, tracked_email_id],
    )?;

    Ok(count)
}

pub fn active_open_count(pool: &DbPool, tracked_email_id: &str) -> Result<i64> {
    let conn = pool.get()?;
    let n = conn.query_row(
        "SELECT COUNT(*) FROM email_opens WHERE tracked_email_id = ?1 AND is_deleted = 0",
        params![tracked_email_id],
        |row| row.get(0),
    )?;
    Ok(n)
}

/// Tracked emails for one user, newest first, with active-open aggregates.
pub fn list_summaries(pool: &DbPool, user_id: &str) -> Result<Vec<TrackedEmailSummary>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT t.id, t.recipient_email, t.subject, t.content, t.tracking_id, t.created_at,
                COUNT(o.id), MIN(o.opened_at), MAX(o.opened_at)
         FROM tracked_emails t
         LEFT JOIN email_opens o ON o.tracked_email_id = t.id AND o.is_deleted = 0
         WHERE t.user_id = ?1
         GROUP BY t.id
         ORDER BY t.created_at DESC",
    )?;

    let rows = stmt.query_map(params![user_id], |row| {
        Ok(TrackedEmailSummary {
            id: row.get(0)?,
            recipient_email: row.get(1)?,
            subject: row.get(2)?,
            content: row.get(3)?,
            tracking_id: row.get(4)?,
            created_at: millis_to_rfc3339(row.get(5)?),
            open_count: row.get(6)?,
            first_opened_at: row.get::<_, Option<i64>>(7)?.map(millis_to_rfc3339),
            last_opened_at: row.get::<_, Option<i64>>(8)?.map(millis_to_rfc3339),
        })
    })?;

    let mut summaries = Vec::new();
    for row in rows {
        summaries.push(row?);
    }
    Ok(summaries)
}

/// Aggregate statistics over one user's tracked emails, counting only
/// active (non-reset) opens.
pub fn statistics(pool: &DbPool, user_id: &str) -> Result<TrackingStats> {
    let conn = pool.get()?;

    let total_emails: i64 = conn.query_row(
        "SELECT COUNT(*) FROM tracked_emails WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;

    let total_opens: i64 = conn.query_row(
        "SELECT COUNT(*)
         FROM email_opens o
         JOIN tracked_emails t ON t.id = o.tracked_email_id
         WHERE t.user_id = ?1 AND o.is_deleted = 0",
        params![user_id],
        |row| row.get(0),
    )?;

    let unique_opens: i64 = conn.query_row(
        "SELECT COUNT(DISTINCT o.tracked_email_id)
         FROM email_opens o
         JOIN tracked_emails t ON t.id = o.tracked_email_id
         WHERE t.user_id = ?1 AND o.is_deleted = 0",
        params![user_id],
        |row| row.get(0),
    )?;

    let open_rate = if total_emails > 0 {
        format!("{:.2}", unique_opens as f64 / total_emails as f64 * 100.0)
    } else {
        "0.00".to_string()
    };

    Ok(TrackingStats {
        total_emails,
        total_opens,
        unique_opens,
        open_rate,
    })
}

fn millis_to_rfc3339(millis: i64) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp_millis(millis)
        .map(|d| d.to_rfc3339())
        .unwrap_or_default()
}

fn row_to_tracked(row: &rusqlite::Row) -> rusqlite::Result<TrackedEmail> {
    Ok(TrackedEmail {
        id: row.get(0)?,
        user_id: row.get(1)?,
        recipient_email: row.get(2)?,
        subject: row.get(3)?,
        content: row.get(4)?,
        tracking_id: row.get(5)?,
        created_at: row.get(6)?,
    })
}

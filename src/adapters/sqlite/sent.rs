use rusqlite::params;
use uuid::Uuid;

use super::DbPool;
use crate::types::error::Result;
use crate::types::SentEmail;

/// Record a provider send. Callers treat failure as non-fatal: the
/// message already left, so this row is best-effort bookkeeping.
pub fn insert_sent(
    pool: &DbPool,
    user_id: &str,
    recipient_email: &str,
    subject: &str,
    content: &str,
    message_id: &str,
    tracking_id: Option<&str>,
) -> Result<SentEmail> {
    let sent = SentEmail {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        recipient_email: recipient_email.to_string(),
        subject: subject.to_string(),
        content: content.to_string(),
        message_id: message_id.to_string(),
        tracking_id: tracking_id.map(|t| t.to_string()),
        sent_at: chrono::Utc::now().timestamp_millis(),
    };

    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO sent_emails (id, user_id, recipient_email, subject, content, message_id, tracking_id, sent_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            sent.id,
            sent.user_id,
            sent.recipient_email,
            sent.subject,
            sent.content,
            sent.message_id,
            sent.tracking_id,
            sent.sent_at,
        ],
    )?;

    Ok(sent)
}

pub fn count_for_user(pool: &DbPool, user_id: &str) -> Result<i64> {
    let conn = pool.get()?;
    let n = conn.query_row(
        "SELECT COUNT(*) FROM sent_emails WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(n)
}

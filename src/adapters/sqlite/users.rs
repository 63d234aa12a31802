use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use super::DbPool;
use crate::types::error::Result;
use crate::types::User;

pub fn find_by_email(pool: &DbPool, email: &str) -> Result<Option<User>> {
    let conn = pool.get()?;
    let user = conn
        .query_row(
            "SELECT id, email, display_name, secret, created_at, updated_at
             FROM users WHERE email = ?1",
            params![email],
            row_to_user,
        )
        .optional()?;
    Ok(user)
}

pub fn find_by_id(pool: &DbPool, id: &str) -> Result<Option<User>> {
    let conn = pool.get()?;
    let user = conn
        .query_row(
            "SELECT id, email, display_name, secret, created_at, updated_at
             FROM users WHERE id = ?1",
            params![id],
            row_to_user,
        )
        .optional()?;
    Ok(user)
}

/// Insert the identity on first verification, or replace the stored
/// secret on every later one. Only called after the credentials were
/// verified against the provider.
pub fn upsert(pool: &DbPool, email: &str, secret: &str) -> Result<User> {
    let now = chrono::Utc::now().timestamp_millis();

    if let Some(existing) = find_by_email(pool, email)? {
        let conn = pool.get()?;
        conn.execute(
            "UPDATE users SET secret = ?1, updated_at = ?2 WHERE id = ?3",
            params![secret, now, existing.id],
        )?;
        return Ok(User {
            secret: secret.to_string(),
            updated_at: now,
            ..existing
        });
    }

    // Display name defaults to the address local part
    let display_name = email.split('@').next().unwrap_or(email).to_string();
    let user = User {
        id: Uuid::new_v4().to_string(),
        email: email.to_string(),
        display_name,
        secret: secret.to_string(),
        created_at: now,
        updated_at: now,
    };

    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO users (id, email, display_name, secret, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user.id,
            user.email,
            user.display_name,
            user.secret,
            user.created_at,
            user.updated_at,
        ],
    )?;

    Ok(user)
}

pub fn count(pool: &DbPool) -> Result<i64> {
    let conn = pool.get()?;
    let n = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    Ok(n)
}

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        display_name: row.get(2)?,
        secret: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

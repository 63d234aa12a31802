//! Tracking ledger operations
//!
//! Issues opaque tracking ids, records pixel fetches and answers the
//! dashboard queries. Unknown ids are a no-op, not an error.

use rand::Rng;
use tracing::{debug, warn};

use crate::adapters::sqlite::{tracking as store, DbPool};
use crate::types::error::{MailtraceError, Result};
use crate::types::{TrackedEmail, TrackedEmailSummary, TrackingStats};

const TRACKING_ID_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";
const TRACKING_ID_LEN: usize = 12;
const ISSUE_ATTEMPTS: usize = 4;

/// A short URL-safe random token. 12 symbols over a 64-symbol
/// alphabet; a collision surfaces as a UNIQUE violation and a redraw.
pub fn issue_tracking_id() -> String {
    let mut rng = rand::thread_rng();
    (0..TRACKING_ID_LEN)
        .map(|_| {
            let i = rng.gen_range(0..TRACKING_ID_ALPHABET.len());
            TRACKING_ID_ALPHABET[i] as char
        })
        .collect()
}

/// Register a tracked email under a freshly issued tracking id. The
/// UNIQUE index is the arbiter; an id that loses the race is thrown
/// away and redrawn.
pub fn create_tracked_email(
    pool: &DbPool,
    user_id: &str,
    recipient_email: &str,
    subject: &str,
    content: &str,
) -> Result<TrackedEmail> {
    for _ in 0..ISSUE_ATTEMPTS {
        let tracking_id = issue_tracking_id();
        if let Some(tracked) =
            store::insert_tracked(pool, user_id, recipient_email, subject, content, &tracking_id)?
        {
            return Ok(tracked);
        }
    }

    Err(MailtraceError::Database(
        "could not allocate a unique tracking id".to_string(),
    ))
}

/// Record one open against a tracking id. Returns the new open row id,
/// or `None` when the id is unknown or the insert failed — in both
/// cases the pixel has already been served, so nothing escalates.
pub fn record_open(
    pool: &DbPool,
    tracking_id: &str,
    source_ip: &str,
    user_agent: &str,
) -> Result<Option<String>> {
    let Some(tracked) = store::find_by_tracking_id(pool, tracking_id)? else {
        debug!(tracking_id = %tracking_id, "Open for unknown tracking id ignored");
        return Ok(None);
    };

    match store::insert_open(pool, &tracked.id, source_ip, user_agent) {
        Ok(open) => {
            debug!(tracking_id = %tracking_id, open_id = %open.id, "Recorded email open");
            Ok(Some(open.id))
        }
        Err(e) => {
            warn!("Failed to record open for {}: {}", tracking_id, e);
            Ok(None)
        }
    }
}

pub fn reset_opens(pool: &DbPool, tracked_email_id: &str, user_id: &str) -> Result<usize> {
    store::reset_opens(pool, tracked_email_id, user_id)
}

pub fn list_tracked(pool: &DbPool, user_id: &str) -> Result<Vec<TrackedEmailSummary>> {
    store::list_summaries(pool, user_id)
}

pub fn statistics(pool: &DbPool, user_id: &str) -> Result<TrackingStats> {
    store::statistics(pool, user_id)
}

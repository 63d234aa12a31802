//! Paged mailbox retrieval
//!
//! Each call owns a fresh session for exactly one logical operation.
//! The session is released on every exit path, including deadline
//! expiry, which is why the timeout wraps the work and not the logout.

use std::time::Duration;

use futures::future::join_all;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::adapters::imap::{self, message, messages, MailSession};
use crate::config::MailConfig;
use crate::types::error::{MailtraceError, Result};
use crate::types::RemoteMessage;

pub struct MailboxPage {
    pub messages: Vec<RemoteMessage>,
    pub total: u32,
}

/// Fetch one reverse-chronological page. `limit` is assumed bounded by
/// the caller; `page` is 1-indexed.
pub async fn list_page(
    config: &MailConfig,
    email: &str,
    secret: &str,
    folder: &str,
    limit: usize,
    page: usize,
) -> Result<MailboxPage> {
    let page = page.max(1);
    let offset = (page - 1) * limit;
    let deadline = Duration::from_secs(config.list_deadline_secs);

    let mut session = timeout(
        deadline,
        imap::connect(&config.imap_host, config.imap_port, email, secret),
    )
    .await
    .map_err(|_| MailtraceError::Timeout(config.list_deadline_secs))??;

    let result = timeout(deadline, fetch_and_assemble(&mut session, folder, limit, offset)).await;
    session.logout().await;

    match result {
        Ok(page_result) => page_result,
        Err(_) => Err(MailtraceError::Timeout(config.list_deadline_secs)),
    }
}

async fn fetch_and_assemble(
    session: &mut MailSession,
    folder: &str,
    limit: usize,
    offset: usize,
) -> Result<MailboxPage> {
    let window = messages::fetch_window(session, folder, limit, offset).await?;
    let total = window.total;
    let messages = assemble_page(window.items).await;
    Ok(MailboxPage { messages, total })
}

/// Parse every raw message concurrently and join. Each message is
/// attempted exactly once; a failure drops that message only, and the
/// page resolves when the last attempt lands.
pub async fn assemble_page(items: Vec<messages::RawMessage>) -> Vec<RemoteMessage> {
    let tasks: Vec<_> = items
        .into_iter()
        .map(|item| {
            tokio::task::spawn_blocking(move || {
                message::parse_remote_message(item.sequence_id, item.is_read, &item.body)
            })
        })
        .collect();

    let mut parsed = Vec::new();
    for outcome in join_all(tasks).await {
        match outcome {
            Ok(Ok(msg)) => parsed.push(msg),
            Ok(Err(e)) => debug!("Dropping unparseable message: {}", e),
            Err(e) => warn!("Parse task failed: {}", e),
        }
    }

    // Parse completion order is non-deterministic; the page contract is
    // date order, newest first.
    parsed.sort_by(|a, b| b.date_millis.cmp(&a.date_millis));
    parsed
}

/// Toggle \Seen on one message. Same session discipline as `list_page`:
/// connect, one operation, logout.
pub async fn set_read_state(
    config: &MailConfig,
    email: &str,
    secret: &str,
    folder: &str,
    sequence_id: u32,
    read: bool,
) -> Result<()> {
    let deadline = Duration::from_secs(config.list_deadline_secs);

    let mut session = timeout(
        deadline,
        imap::connect(&config.imap_host, config.imap_port, email, secret),
    )
    .await
    .map_err(|_| MailtraceError::Timeout(config.list_deadline_secs))??;

    let result = timeout(
        deadline,
        messages::set_read_state(&mut session, folder, sequence_id, read),
    )
    .await;
    session.logout().await;

    match result {
        Ok(op_result) => op_result,
        Err(_) => Err(MailtraceError::Timeout(config.list_deadline_secs)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::imap::messages::RawMessage;

    fn raw_message(seq: u32, date: &str, subject: &str) -> RawMessage {
        let body = format!(
            "From: a@example.com\r\nSubject: {}\r\nDate: {}\r\n\
             Content-Type: text/plain\r\n\r\nbody\r\n",
            subject, date
        );
        RawMessage {
            sequence_id: seq,
            is_read: false,
            body: body.into_bytes(),
        }
    }

    #[tokio::test]
    async fn pages_sort_by_date_descending_not_sequence() {
        let items = vec![
            raw_message(1, "Mon, 2 Jun 2025 08:00:00 +0000", "oldest"),
            raw_message(3, "Mon, 2 Jun 2025 12:00:00 +0000", "newest"),
            raw_message(2, "Mon, 2 Jun 2025 10:00:00 +0000", "middle"),
        ];

        let page = assemble_page(items).await;
        let subjects: Vec<_> = page.iter().map(|m| m.subject.as_str()).collect();
        assert_eq!(subjects, ["newest", "middle", "oldest"]);
    }

    #[tokio::test]
    async fn unparseable_messages_are_dropped_without_failing_the_page() {
        let items = vec![
            raw_message(1, "Mon, 2 Jun 2025 08:00:00 +0000", "good"),
            RawMessage {
                sequence_id: 2,
                is_read: false,
                body: b"No colon on this line\r\n\r\nbody".to_vec(),
            },
        ];

        let page = assemble_page(items).await;
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].subject, "good");
    }

    #[tokio::test]
    async fn assembly_is_deterministic_for_an_unchanged_window() {
        let make = || {
            vec![
                raw_message(1, "Mon, 2 Jun 2025 08:00:00 +0000", "a"),
                raw_message(2, "Mon, 2 Jun 2025 09:00:00 +0000", "b"),
                raw_message(3, "Mon, 2 Jun 2025 07:00:00 +0000", "c"),
            ]
        };

        let first: Vec<_> = assemble_page(make())
            .await
            .into_iter()
            .map(|m| m.subject)
            .collect();
        let second: Vec<_> = assemble_page(make())
            .await
            .into_iter()
            .map(|m| m.subject)
            .collect();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn empty_window_assembles_to_an_empty_page() {
        assert!(assemble_page(Vec::new()).await.is_empty());
    }
}

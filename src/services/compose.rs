//! Outgoing message orchestration
//!
//! Builds the final body (optionally carrying a tracking beacon), hands
//! it to the send capability, and keeps best-effort records.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::adapters::sqlite::{sent, DbPool};
use crate::services::tracking;
use crate::types::error::{MailtraceError, Result};
use crate::types::{SendRequest, User};

/// The outbound transport capability: accepts a finished message and
/// returns the provider message id.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, message: &OutgoingMessage) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub is_html: bool,
}

#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub message_id: String,
    pub tracking_id: Option<String>,
}

pub fn tracking_url(base_url: &str, tracking_id: &str) -> String {
    format!("{}/api/track/{}", base_url.trim_end_matches('/'), tracking_id)
}

/// Append the beacon to an HTML body, or lift a plain-text body into a
/// minimal HTML envelope first. The beacon is an image, so a tracked
/// message is always sent as HTML.
pub fn build_tracked_body(content: &str, is_html: bool, tracking_url: &str) -> (String, bool) {
    let beacon = format!("<img src=\"{}\" width=\"1\" height=\"1\" />", tracking_url);

    if is_html {
        (format!("{}{}", content, beacon), true)
    } else {
        (
            format!("<html><body><p>{}</p>{}</body></html>", content, beacon),
            true,
        )
    }
}

pub async fn send_message(
    pool: &DbPool,
    base_url: &str,
    sender: &dyn MessageSender,
    user: &User,
    request: &SendRequest,
) -> Result<SendOutcome> {
    if request.to.trim().is_empty()
        || request.subject.trim().is_empty()
        || request.content.trim().is_empty()
    {
        return Err(MailtraceError::InvalidInput(
            "to, subject and content are required".to_string(),
        ));
    }

    let mut body = request.content.clone();
    let mut is_html = request.is_html;
    let mut tracking_id = None;

    if request.include_tracking {
        // The tracked row is written before the send so the beacon URL
        // resolves from the moment the message leaves. The snapshot is
        // the caller's original content, not the beacon-carrying body.
        let tracked = tracking::create_tracked_email(
            pool,
            &user.id,
            &request.to,
            &request.subject,
            &request.content,
        )?;

        let url = tracking_url(base_url, &tracked.tracking_id);
        let (tracked_body, tracked_html) = build_tracked_body(&request.content, request.is_html, &url);
        body = tracked_body;
        is_html = tracked_html;
        tracking_id = Some(tracked.tracking_id);
    }

    let outgoing = OutgoingMessage {
        from: user.email.clone(),
        to: request.to.clone(),
        subject: request.subject.clone(),
        body: body.clone(),
        is_html,
    };

    let message_id = sender.send(&outgoing).await?;
    info!(to = %request.to, tracked = tracking_id.is_some(), "Email sent");

    // The message already left; a bookkeeping failure here must not turn
    // a successful send into a caller-visible error.
    if let Err(e) = sent::insert_sent(
        pool,
        &user.id,
        &request.to,
        &request.subject,
        &body,
        &message_id,
        tracking_id.as_deref(),
    ) {
        warn!("Failed to record sent email: {}", e);
    }

    Ok(SendOutcome {
        message_id,
        tracking_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{pool::create_memory_pool, schema::initialize_schema, users};
    use std::sync::Mutex;

    struct RecordingSender {
        last: Mutex<Option<OutgoingMessage>>,
    }

    impl RecordingSender {
        fn new() -> Self {
            RecordingSender {
                last: Mutex::new(None),
            }
        }

        fn last(&self) -> OutgoingMessage {
            self.last.lock().unwrap().clone().unwrap()
        }
    }

    #[async_trait]
    impl MessageSender for RecordingSender {
        async fn send(&self, message: &OutgoingMessage) -> Result<String> {
            *self.last.lock().unwrap() = Some(message.clone());
            Ok("<provider-id@test>".to_string())
        }
    }

    struct FailingSender;

    #[async_trait]
    impl MessageSender for FailingSender {
        async fn send(&self, _message: &OutgoingMessage) -> Result<String> {
            Err(MailtraceError::Send {
                kind: crate::types::error::SendFailureKind::Connectivity,
                message: "connection refused".to_string(),
            })
        }
    }

    fn test_setup() -> (DbPool, User) {
        let pool = create_memory_pool().unwrap();
        initialize_schema(&pool.get().unwrap()).unwrap();
        let user = users::upsert(&pool, "sender@example.com", "secret").unwrap();
        (pool, user)
    }

    fn request(include_tracking: bool, is_html: bool) -> SendRequest {
        SendRequest {
            to: "rcpt@example.com".to_string(),
            subject: "Hello".to_string(),
            content: "A plain greeting".to_string(),
            is_html,
            include_tracking,
        }
    }

    #[tokio::test]
    async fn tracked_plain_text_is_sent_as_html_with_one_beacon() {
        let (pool, user) = test_setup();
        let sender = RecordingSender::new();

        let outcome = send_message(
            &pool,
            "http://localhost:3000",
            &sender,
            &user,
            &request(true, false),
        )
        .await
        .unwrap();

        let tracking_id = outcome.tracking_id.expect("tracking id issued");
        let sent_body = sender.last();

        assert!(sent_body.is_html);
        assert!(sent_body.body.starts_with("<html><body><p>A plain greeting</p>"));
        assert_eq!(sent_body.body.matches("<img").count(), 1);
        assert!(sent_body
            .body
            .contains(&format!("http://localhost:3000/api/track/{}", tracking_id)));

        // The persisted sent row carries the final HTML body
        let conn = pool.get().unwrap();
        let (stored_body, stored_tracking): (String, Option<String>) = conn
            .query_row(
                "SELECT content, tracking_id FROM sent_emails WHERE user_id = ?1",
                rusqlite::params![user.id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert!(stored_body.contains("<img"));
        assert_eq!(stored_tracking.as_deref(), Some(tracking_id.as_str()));

        // The tracked snapshot is the original content, beacon-free
        let snapshot: String = conn
            .query_row(
                "SELECT content FROM tracked_emails WHERE tracking_id = ?1",
                rusqlite::params![tracking_id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(snapshot, "A plain greeting");
    }

    #[tokio::test]
    async fn tracked_html_keeps_the_body_and_appends_the_beacon() {
        let (pool, user) = test_setup();
        let sender = RecordingSender::new();

        let mut req = request(true, true);
        req.content = "<p>styled</p>".to_string();
        send_message(&pool, "http://localhost:3000", &sender, &user, &req)
            .await
            .unwrap();

        let sent_body = sender.last();
        assert!(sent_body.body.starts_with("<p>styled</p><img"));
        assert!(!sent_body.body.contains("<html><body>"));
    }

    #[tokio::test]
    async fn untracked_plain_text_stays_plain() {
        let (pool, user) = test_setup();
        let sender = RecordingSender::new();

        let outcome = send_message(
            &pool,
            "http://localhost:3000",
            &sender,
            &user,
            &request(false, false),
        )
        .await
        .unwrap();

        assert!(outcome.tracking_id.is_none());
        let sent_body = sender.last();
        assert!(!sent_body.is_html);
        assert_eq!(sent_body.body, "A plain greeting");
    }

    #[tokio::test]
    async fn provider_failure_surfaces_and_nothing_is_recorded_as_sent() {
        let (pool, user) = test_setup();

        let outcome = send_message(
            &pool,
            "http://localhost:3000",
            &FailingSender,
            &user,
            &request(true, false),
        )
        .await;

        assert!(matches!(outcome, Err(MailtraceError::Send { .. })));
        assert_eq!(sent::count_for_user(&pool, &user.id).unwrap(), 0);
    }

    #[tokio::test]
    async fn sent_record_failure_is_swallowed() {
        let (pool, user) = test_setup();
        let sender = RecordingSender::new();

        pool.get()
            .unwrap()
            .execute_batch("DROP TABLE sent_emails")
            .unwrap();

        let outcome = send_message(
            &pool,
            "http://localhost:3000",
            &sender,
            &user,
            &request(false, false),
        )
        .await;

        assert!(outcome.is_ok());
    }

    #[tokio::test]
    async fn empty_fields_are_rejected_before_any_side_effect() {
        let (pool, user) = test_setup();
        let sender = RecordingSender::new();

        let mut req = request(true, false);
        req.content = "   ".to_string();
        let outcome = send_message(&pool, "http://localhost:3000", &sender, &user, &req).await;

        assert!(matches!(outcome, Err(MailtraceError::InvalidInput(_))));
        let tracked: i64 = pool
            .get()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM tracked_emails", [], |row| row.get(0))
            .unwrap();
        assert_eq!(tracked, 0);
    }
}

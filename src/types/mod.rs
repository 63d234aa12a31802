pub mod error;

use serde::{Deserialize, Serialize};

/// A message as seen through one mailbox session. Sequence ids are
/// relative to the selected folder and valid only for that session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMessage {
    /// Folder-relative sequence number, rendered as a string for the API
    pub id: String,
    pub from: String,
    pub to: String,
    pub subject: String,
    /// RFC 3339, UTC
    pub date: String,
    pub body: String,
    pub is_read: bool,
    pub attachments: Vec<AttachmentInfo>,
    #[serde(skip)]
    pub date_millis: i64,
}

/// Attachment metadata only — content is never downloaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentInfo {
    pub filename: String,
    pub content_type: String,
    pub size: usize,
}

/// A persisted user identity. `secret` is opaque: stored verbatim and
/// forwarded to the mail capabilities, never parsed.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub secret: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A sent message registered for open tracking.
#[derive(Debug, Clone)]
pub struct TrackedEmail {
    pub id: String,
    pub user_id: String,
    pub recipient_email: String,
    pub subject: String,
    pub content: String,
    pub tracking_id: String,
    pub created_at: i64,
}

/// One pixel fetch. Every fetch inserts a new row — there is no
/// deduplication of client prefetches.
#[derive(Debug, Clone)]
pub struct EmailOpen {
    pub id: String,
    pub tracked_email_id: String,
    pub opened_at: i64,
    pub source_ip: String,
    pub user_agent: String,
    pub is_deleted: bool,
    pub deleted_at: Option<i64>,
}

/// Record of a successful provider send.
#[derive(Debug, Clone)]
pub struct SentEmail {
    pub id: String,
    pub user_id: String,
    pub recipient_email: String,
    pub subject: String,
    pub content: String,
    pub message_id: String,
    pub tracking_id: Option<String>,
    pub sent_at: i64,
}

/// Dashboard row: a tracked email with its active-open aggregates.
#[derive(Debug, Clone, Serialize)]
pub struct TrackedEmailSummary {
    pub id: String,
    pub recipient_email: String,
    pub subject: String,
    pub content: String,
    pub tracking_id: String,
    pub created_at: String,
    pub open_count: i64,
    pub first_opened_at: Option<String>,
    pub last_opened_at: Option<String>,
}

/// Aggregate tracking statistics for one user.
///
/// `open_rate` is pre-rendered to two decimal places ("33.33"); it is
/// "0.00" when no emails are tracked.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingStats {
    pub total_emails: i64,
    pub total_opens: i64,
    pub unique_opens: i64,
    pub open_rate: String,
}

// ---------------------------------------------------------------------------
// HTTP request/response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub to: String,
    pub subject: String,
    pub content: String,
    #[serde(default)]
    pub is_html: bool,
    #[serde(default)]
    pub include_tracking: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    pub success: bool,
    pub message_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTrackingRequest {
    pub recipient_email: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailboxActionRequest {
    pub action: String,
    pub email_id: String,
    #[serde(default)]
    pub folder: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedActionRequest {
    pub action: String,
    pub email_id: String,
}

//! Raw message bytes → structured `RemoteMessage`
//!
//! Parsing is independent per message; a failure here drops that one
//! message from the page rather than failing the fetch.

use mailparse::{dateparse, parse_mail, DispositionType, MailHeaderMap, ParsedMail};

use crate::sanitize;
use crate::types::error::{MailtraceError, Result};
use crate::types::{AttachmentInfo, RemoteMessage};

pub fn parse_remote_message(sequence_id: u32, is_read: bool, raw: &[u8]) -> Result<RemoteMessage> {
    let mail = parse_mail(raw)
        .map_err(|e| MailtraceError::Parse(format!("message {}: {}", sequence_id, e)))?;

    let from = mail
        .headers
        .get_first_value("From")
        .unwrap_or_else(|| "Unknown".to_string());
    let to = mail.headers.get_first_value("To").unwrap_or_default();
    let subject = mail
        .headers
        .get_first_value("Subject")
        .unwrap_or_else(|| "No Subject".to_string());

    // An unparseable or missing Date falls back to "now" rather than
    // dropping the message; the page sort just places it first.
    let date_millis = mail
        .headers
        .get_first_value("Date")
        .and_then(|d| dateparse(&d).ok())
        .map(|secs| secs * 1000)
        .unwrap_or_else(|| chrono::Utc::now().timestamp_millis());

    let date = chrono::DateTime::<chrono::Utc>::from_timestamp_millis(date_millis)
        .map(|d| d.to_rfc3339())
        .unwrap_or_default();

    let body = select_body(&mail);

    let mut attachments = Vec::new();
    collect_attachments(&mail, &mut attachments);

    Ok(RemoteMessage {
        id: sequence_id.to_string(),
        from,
        to,
        subject,
        date,
        body,
        is_read,
        attachments,
        date_millis,
    })
}

/// Display-content selection: the HTML part if there is one, else the
/// plain-text part, else an HTML rendering of whatever text the
/// top-level body holds, else a placeholder.
fn select_body(mail: &ParsedMail) -> String {
    if let Some(html) = find_part_body(mail, "text/html") {
        return html;
    }

    if let Some(text) = find_part_body(mail, "text/plain") {
        return text;
    }

    if mail.ctype.mimetype.starts_with("text/") {
        if let Ok(text) = mail.get_body() {
            if !text.trim().is_empty() {
                return sanitize::plain_text_to_html(&text);
            }
        }
    }

    "No content available".to_string()
}

fn find_part_body(mail: &ParsedMail, mimetype: &str) -> Option<String> {
    if mail.ctype.mimetype.eq_ignore_ascii_case(mimetype)
        && mail.get_content_disposition().disposition != DispositionType::Attachment
    {
        if let Ok(body) = mail.get_body() {
            if !body.is_empty() {
                return Some(body);
            }
        }
    }

    mail.subparts
        .iter()
        .find_map(|part| find_part_body(part, mimetype))
}

fn collect_attachments(mail: &ParsedMail, out: &mut Vec<AttachmentInfo>) {
    for part in &mail.subparts {
        let disposition = part.get_content_disposition();
        if disposition.disposition == DispositionType::Attachment {
            out.push(AttachmentInfo {
                filename: disposition
                    .params
                    .get("filename")
                    .cloned()
                    .unwrap_or_else(|| "untitled".to_string()),
                content_type: part.ctype.mimetype.clone(),
                size: part.get_body_raw().map(|b| b.len()).unwrap_or(0),
            });
        }
        collect_attachments(part, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(headers_and_body: &str) -> Vec<u8> {
        headers_and_body.replace('\n', "\r\n").into_bytes()
    }

    #[test]
    fn parses_a_simple_text_message() {
        let msg = raw("From: Alice <alice@example.com>\n\
                       To: bob@example.com\n\
                       Subject: Lunch\n\
                       Date: Mon, 2 Jun 2025 10:00:00 +0000\n\
                       Content-Type: text/plain; charset=utf-8\n\
                       \n\
                       See you at noon.\n");

        let parsed = parse_remote_message(7, true, &msg).unwrap();
        assert_eq!(parsed.id, "7");
        assert_eq!(parsed.subject, "Lunch");
        assert!(parsed.is_read);
        assert!(parsed.body.contains("See you at noon."));
        assert!(parsed.date.starts_with("2025-06-02T10:00:00"));
        assert!(parsed.attachments.is_empty());
    }

    #[test]
    fn prefers_html_over_plain_text_in_alternatives() {
        let msg = raw("From: a@example.com\n\
                       Subject: Alt\n\
                       Date: Mon, 2 Jun 2025 10:00:00 +0000\n\
                       Content-Type: multipart/alternative; boundary=\"b1\"\n\
                       \n\
                       --b1\n\
                       Content-Type: text/plain\n\
                       \n\
                       plain body\n\
                       --b1\n\
                       Content-Type: text/html\n\
                       \n\
                       <p>html body</p>\n\
                       --b1--\n");

        let parsed = parse_remote_message(1, false, &msg).unwrap();
        assert!(parsed.body.contains("<p>html body</p>"));
        assert!(!parsed.body.contains("plain body"));
    }

    #[test]
    fn missing_headers_get_placeholders() {
        let msg = raw("Content-Type: text/plain\n\n(no headers to speak of)\n");
        let parsed = parse_remote_message(3, false, &msg).unwrap();
        assert_eq!(parsed.from, "Unknown");
        assert_eq!(parsed.subject, "No Subject");
        // Date falls back to now, which still renders
        assert!(!parsed.date.is_empty());
    }

    #[test]
    fn empty_body_yields_the_placeholder() {
        let msg = raw("From: a@example.com\nSubject: empty\n\
                       Content-Type: application/octet-stream\n\n");
        let parsed = parse_remote_message(4, false, &msg).unwrap();
        assert_eq!(parsed.body, "No content available");
    }

    #[test]
    fn collects_attachment_metadata_only() {
        let msg = raw("From: a@example.com\n\
                       Subject: With file\n\
                       Content-Type: multipart/mixed; boundary=\"b2\"\n\
                       \n\
                       --b2\n\
                       Content-Type: text/plain\n\
                       \n\
                       body text\n\
                       --b2\n\
                       Content-Type: application/pdf\n\
                       Content-Disposition: attachment; filename=\"report.pdf\"\n\
                       Content-Transfer-Encoding: base64\n\
                       \n\
                       aGVsbG8gd29ybGQ=\n\
                       --b2--\n");

        let parsed = parse_remote_message(5, false, &msg).unwrap();
        assert!(parsed.body.contains("body text"));
        assert_eq!(parsed.attachments.len(), 1);
        assert_eq!(parsed.attachments[0].filename, "report.pdf");
        assert_eq!(parsed.attachments[0].content_type, "application/pdf");
        assert_eq!(parsed.attachments[0].size, 11);
    }
}

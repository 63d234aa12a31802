//! SMTP submission adapter
//!
//! Implements the send capability and the credential probe over the
//! provider's STARTTLS submission port. One transport per operation;
//! nothing is pooled across requests.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::Error as SmtpError;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::services::auth::CredentialVerifier;
use crate::services::compose::{MessageSender, OutgoingMessage};
use crate::types::error::{MailtraceError, Result, SendFailureKind};

pub struct SmtpSender {
    host: String,
    port: u16,
    username: String,
    secret: String,
}

impl SmtpSender {
    pub fn new(host: &str, port: u16, username: &str, secret: &str) -> Self {
        SmtpSender {
            host: host.to_string(),
            port,
            username: username.to_string(),
            secret: secret.to_string(),
        }
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)
            .map_err(|e| {
                MailtraceError::Connection(format!("SMTP transport setup failed: {}", e))
            })?
            .port(self.port)
            .credentials(Credentials::new(
                self.username.clone(),
                self.secret.clone(),
            ))
            .build();

        Ok(transport)
    }
}

/// Gmail rejects bad app passwords with a permanent 5xx on the
/// submission path, so permanent maps to the credential bucket.
fn classify(err: &SmtpError) -> SendFailureKind {
    if err.is_permanent() {
        SendFailureKind::Credential
    } else if err.is_transient() || err.is_timeout() {
        SendFailureKind::Connectivity
    } else {
        SendFailureKind::Unknown
    }
}

#[async_trait]
impl MessageSender for SmtpSender {
    async fn send(&self, outgoing: &OutgoingMessage) -> Result<String> {
        let from: Mailbox = outgoing.from.parse().map_err(|e| {
            MailtraceError::InvalidInput(format!("invalid sender address: {}", e))
        })?;
        let to: Mailbox = outgoing.to.parse().map_err(|e| {
            MailtraceError::InvalidInput(format!("invalid recipient address: {}", e))
        })?;

        // The provider does not echo a queue id, so the Message-ID
        // stamped here doubles as the stored provider message id.
        let domain = outgoing.from.split('@').nth(1).unwrap_or("localhost");
        let message_id = format!("<{}@{}>", uuid::Uuid::new_v4(), domain);

        let content_type = if outgoing.is_html {
            ContentType::TEXT_HTML
        } else {
            ContentType::TEXT_PLAIN
        };

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(outgoing.subject.as_str())
            .message_id(Some(message_id.clone()))
            .header(content_type)
            .body(outgoing.body.clone())
            .map_err(|e| MailtraceError::Send {
                kind: SendFailureKind::Unknown,
                message: format!("failed to build message: {}", e),
            })?;

        let transport = self.transport()?;
        transport.send(message).await.map_err(|e| MailtraceError::Send {
            kind: classify(&e),
            message: e.to_string(),
        })?;

        info!(message_id = %message_id, "Message accepted by provider");
        Ok(message_id)
    }
}

/// Verifies credentials the way the send path would use them: connect,
/// STARTTLS, AUTH, NOOP. No message is submitted.
pub struct SmtpVerifier {
    host: String,
    port: u16,
}

impl SmtpVerifier {
    pub fn new(host: &str, port: u16) -> Self {
        SmtpVerifier {
            host: host.to_string(),
            port,
        }
    }
}

#[async_trait]
impl CredentialVerifier for SmtpVerifier {
    async fn verify(&self, email: &str, secret: &str) -> Result<()> {
        let transport: AsyncSmtpTransport<Tokio1Executor> = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)
            .map_err(|e| {
                MailtraceError::Connection(format!("SMTP transport setup failed: {}", e))
            })?
            .port(self.port)
            .credentials(Credentials::new(email.to_string(), secret.to_string()))
            .build();

        let accepted = transport.test_connection().await.map_err(|e| {
            MailtraceError::Authentication(format!("Provider rejected the credentials: {}", e))
        })?;

        if !accepted {
            return Err(MailtraceError::Authentication(
                "Provider closed the connection during verification".to_string(),
            ));
        }

        Ok(())
    }
}

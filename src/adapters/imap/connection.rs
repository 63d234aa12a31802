use async_imap::types::Mailbox;
use async_imap::Session;
use async_native_tls::TlsStream;
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::types::error::{MailtraceError, Result};

// This type alias saves us from writing this monster type everywhere.
// An IMAP session is generic over the stream type — in our case,
// TLS-encrypted TCP.
pub type ImapSession = Session<TlsStream<TcpStream>>;

/// One live connection to the remote store. Folder state and sequence
/// numbering live server-side per connection, so a session must never be
/// shared between interleaved operations.
pub struct MailSession {
    pub session: ImapSession,
}

impl MailSession {
    pub async fn select_folder(&mut self, folder: &str) -> Result<Mailbox> {
        let mailbox = self
            .session
            .select(folder)
            .await
            .map_err(|e| MailtraceError::Protocol(format!("SELECT failed: {}", e)))?;

        Ok(mailbox)
    }

    /// Release the session. Consumes self so a session cannot be used
    /// after logout; callers invoke this exactly once on every exit path.
    pub async fn logout(mut self) {
        if let Err(e) = self.session.logout().await {
            debug!("LOGOUT failed: {}", e);
        }
    }
}

pub async fn connect(
    host: &str,
    port: u16,
    username: &str,
    password: &str,
) -> Result<MailSession> {
    info!(host = %host, port = port, "Connecting to IMAP server");

    let tcp = TcpStream::connect((host, port))
        .await
        .map_err(|e| MailtraceError::Connection(format!("TCP connection failed: {}", e)))?;

    let tls = async_native_tls::TlsConnector::new();
    let tls_stream = tls
        .connect(host, tcp)
        .await
        .map_err(|e| MailtraceError::Connection(format!("TLS handshake failed: {}", e)))?;

    let client = async_imap::Client::new(tls_stream);

    let session = client
        .login(username, password)
        .await
        .map_err(|(e, _)| MailtraceError::Authentication(format!("Login failed: {}", e)))?;

    Ok(MailSession { session })
}

//! Credential verification and identity upsert
//!
//! The identity row only ever changes after the provider has accepted
//! the credentials: a failed verification leaves the users table
//! untouched.

use async_trait::async_trait;
use tracing::info;

use crate::adapters::sqlite::{users, DbPool};
use crate::types::error::{MailtraceError, Result};
use crate::types::User;

/// Checks an address + opaque secret against the mail provider.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, email: &str, secret: &str) -> Result<()>;
}

pub async fn login(
    pool: &DbPool,
    verifier: &dyn CredentialVerifier,
    email: &str,
    secret: &str,
) -> Result<User> {
    if email.trim().is_empty() || secret.is_empty() {
        return Err(MailtraceError::InvalidInput(
            "email and password are required".to_string(),
        ));
    }

    verifier.verify(email, secret).await.map_err(|e| match e {
        MailtraceError::Authentication(_) => e,
        other => MailtraceError::Authentication(other.to_string()),
    })?;

    let user = users::upsert(pool, email, secret)?;
    info!(email = %email, "Credentials verified");
    Ok(user)
}

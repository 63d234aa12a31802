//! Unified error types for the application
//!
//! One taxonomy covers the whole crate so handlers and services share a
//! single `Result` alias. Variants that cross the HTTP boundary carry
//! messages safe to show a caller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How a send failure should be explained to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendFailureKind {
    /// The provider rejected the credentials (e.g. a revoked app password).
    Credential,
    /// The provider could not be reached.
    Connectivity,
    /// Anything else.
    Unknown,
}

/// Application error type for handlers, services and adapters
#[derive(Debug, Error)]
pub enum MailtraceError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("Parse error: {0}")]
    Parse(String),

    /// Ownership failures and genuinely missing rows are reported
    /// identically so callers cannot probe for other users' data.
    #[error("Not found")]
    NotFound,

    #[error("Send failed: {message}")]
    Send {
        kind: SendFailureKind,
        message: String,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for MailtraceError {
    fn from(err: std::io::Error) -> Self {
        MailtraceError::Io(err.to_string())
    }
}

impl From<rusqlite::Error> for MailtraceError {
    fn from(err: rusqlite::Error) -> Self {
        MailtraceError::Database(err.to_string())
    }
}

impl From<r2d2::Error> for MailtraceError {
    fn from(err: r2d2::Error) -> Self {
        MailtraceError::Database(err.to_string())
    }
}

impl From<toml::de::Error> for MailtraceError {
    fn from(err: toml::de::Error) -> Self {
        MailtraceError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for MailtraceError {
    fn from(err: serde_json::Error) -> Self {
        MailtraceError::Parse(err.to_string())
    }
}

impl From<hyper::Error> for MailtraceError {
    fn from(err: hyper::Error) -> Self {
        MailtraceError::Io(err.to_string())
    }
}

/// Result type alias using MailtraceError
pub type Result<T> = std::result::Result<T, MailtraceError>;

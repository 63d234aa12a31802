//! Application configuration
//!
//! Loaded from a TOML file (`MAILTRACE_CONFIG` env var, else
//! `mailtrace.toml` in the working directory). Every field has a default
//! so a missing file yields a runnable Gmail-oriented configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::types::error::{MailtraceError, Result};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub mail: MailConfig,

    #[serde(default)]
    pub database: DatabaseConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP server binds to
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Public base URL used when issuing tracking links
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

/// Remote mail provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// IMAP server hostname
    #[serde(default = "default_imap_host")]
    pub imap_host: String,

    /// IMAP server port (implicit TLS)
    #[serde(default = "default_imap_port")]
    pub imap_port: u16,

    /// SMTP server hostname
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,

    /// SMTP submission port (STARTTLS)
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    /// Largest page size a caller may request
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,

    /// Deadline for one whole list operation, seconds
    #[serde(default = "default_list_deadline_secs")]
    pub list_deadline_secs: u64,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file. Defaults to
    /// `<local data dir>/mailtrace/mailtrace.db`.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_imap_host() -> String {
    "imap.gmail.com".to_string()
}

fn default_imap_port() -> u16 {
    993
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_max_page_size() -> usize {
    100
}

fn default_list_deadline_secs() -> u64 {
    30
}

fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailtrace")
        .join("mailtrace.db")
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: default_bind(),
            base_url: default_base_url(),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        MailConfig {
            imap_host: default_imap_host(),
            imap_port: default_imap_port(),
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            max_page_size: default_max_page_size(),
            list_deadline_secs: default_list_deadline_secs(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: default_db_path(),
        }
    }
}

/// Load configuration from the default location.
pub fn load() -> Result<AppConfig> {
    let path = std::env::var("MAILTRACE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("mailtrace.toml"));
    load_from(&path)
}

/// Load configuration from an explicit path; a missing file is not an
/// error and yields the defaults.
pub fn load_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        info!(path = %path.display(), "No config file found, using defaults");
        return Ok(AppConfig::default());
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| MailtraceError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    let config: AppConfig = toml::from_str(&raw)?;

    info!(path = %path.display(), "Loaded configuration");
    Ok(config)
}

//! Mailtrace — single-user webmail service with email open tracking
//!
//! ## Module Organization
//!
//! - `http/`: HTTP handlers (thin wrappers over services)
//! - `services/`: business logic (transport-agnostic)
//! - `adapters/`: IMAP, SMTP and SQLite integrations
//! - `sanitize/`: message body neutralization for display
//! - `state/`: shared application state and sessions
//! - `types/`: data structures and the unified error type
//! - `config/`: configuration loading

pub mod adapters;
pub mod config;
pub mod http;
pub mod sanitize;
pub mod services;
pub mod state;
pub mod types;

use std::sync::Arc;

use tracing::info;

use crate::adapters::sqlite::{pool, schema};
use crate::state::{AppState, SessionStore};
use crate::types::error::Result;

pub async fn run() -> Result<()> {
    let config = config::load()?;

    let db_pool = pool::create_pool(&config.database.path)?;
    schema::initialize_schema(&*db_pool.get()?)?;
    info!(path = %config.database.path.display(), "Database ready");

    let state = Arc::new(AppState {
        pool: db_pool,
        config,
        sessions: SessionStore::default(),
    });

    http::serve(state).await
}

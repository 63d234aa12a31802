//! Shared application state
//!
//! One `AppState` is built at startup and handed to every request. The
//! session registry is in-memory only: restarting the server signs
//! everyone out.

use std::collections::HashMap;
use std::sync::RwLock;

use rand::Rng;

use crate::adapters::sqlite::DbPool;
use crate::config::AppConfig;

/// Credentials held for one authenticated session. The secret rides
/// along because every mailbox and send operation forwards it to the
/// provider.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user_id: String,
    pub email: String,
    pub display_name: String,
    pub secret: String,
}

const TOKEN_LEN: usize = 32;
const TOKEN_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, AuthSession>>,
}

impl SessionStore {
    pub fn issue(&self, session: AuthSession) -> String {
        let mut rng = rand::thread_rng();
        let token: String = (0..TOKEN_LEN)
            .map(|_| {
                let i = rng.gen_range(0..TOKEN_ALPHABET.len());
                TOKEN_ALPHABET[i] as char
            })
            .collect();

        self.sessions
            .write()
            .expect("session lock poisoned")
            .insert(token.clone(), session);
        token
    }

    pub fn get(&self, token: &str) -> Option<AuthSession> {
        self.sessions
            .read()
            .expect("session lock poisoned")
            .get(token)
            .cloned()
    }
}

pub struct AppState {
    pub pool: DbPool,
    pub config: AppConfig,
    pub sessions: SessionStore,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> AuthSession {
        AuthSession {
            user_id: "u1".to_string(),
            email: "a@example.com".to_string(),
            display_name: "a".to_string(),
            secret: "s".to_string(),
        }
    }

    #[test]
    fn issued_tokens_resolve_and_unknown_tokens_do_not() {
        let store = SessionStore::default();
        let token = store.issue(session());

        assert_eq!(token.len(), TOKEN_LEN);
        assert!(store.get(&token).is_some());
        assert!(store.get("not-a-token").is_none());
    }

    #[test]
    fn tokens_are_unique_per_issue() {
        let store = SessionStore::default();
        let a = store.issue(session());
        let b = store.issue(session());
        assert_ne!(a, b);
    }
}

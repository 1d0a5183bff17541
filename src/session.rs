//! In-memory login sessions keyed by bearer token hash.
//!
//! The plaintext token is handed to the client once and never stored.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use uuid::Uuid;

/// Cleanup runs on insert once the store grows past this many sessions.
const CLEANUP_THRESHOLD: usize = 1000;

/// Hash a bearer token string using SHA-256.
pub fn hash_token(token: &str) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().into()
}

/// Generate a random bearer token (URL-safe base64, 32 bytes of entropy).
pub fn generate_token() -> String {
    use base64::Engine;
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

#[derive(Debug, Clone)]
struct Session {
    account_id: Uuid,
    expires_at: Instant,
}

pub struct SessionStore {
    sessions: HashMap<[u8; 32], Session>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            ttl,
        }
    }

    /// Start a session for `account_id`; returns the bearer token.
    pub fn create(&mut self, account_id: Uuid) -> String {
        if self.sessions.len() > CLEANUP_THRESHOLD {
            self.cleanup();
        }
        let token = generate_token();
        self.sessions.insert(
            hash_token(&token),
            Session {
                account_id,
                expires_at: Instant::now() + self.ttl,
            },
        );
        token
    }

    /// Account behind a live token. Expired sessions are dropped on sight.
    pub fn resolve(&mut self, token: &str) -> Option<Uuid> {
        let key = hash_token(token);
        let session = self.sessions.get(&key)?;
        if Instant::now() >= session.expires_at {
            self.sessions.remove(&key);
            return None;
        }
        Some(session.account_id)
    }

    /// End one session. Returns whether it existed.
    pub fn revoke(&mut self, token: &str) -> bool {
        self.sessions.remove(&hash_token(token)).is_some()
    }

    /// End every session of an account; returns how many were removed.
    pub fn revoke_account(&mut self, account_id: &Uuid) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| &s.account_id != account_id);
        before - self.sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn cleanup(&mut self) {
        let now = Instant::now();
        self.sessions.retain(|_, s| now < s.expires_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_token_is_unique() {
        let t1 = generate_token();
        let t2 = generate_token();
        assert_ne!(t1, t2);
        assert_eq!(t1.len(), 43);
    }

    #[test]
    fn hash_token_is_deterministic() {
        assert_eq!(hash_token("test"), hash_token("test"));
        assert_ne!(hash_token("token-a"), hash_token("token-b"));
    }

    #[test]
    fn created_session_resolves() {
        let mut store = SessionStore::new(Duration::from_secs(60));
        let account = Uuid::new_v4();
        let token = store.create(account);
        assert_eq!(store.resolve(&token), Some(account));
        assert_eq!(store.resolve("not-a-token"), None);
    }

    #[test]
    fn expired_session_is_removed() {
        let mut store = SessionStore::new(Duration::ZERO);
        let token = store.create(Uuid::new_v4());
        assert_eq!(store.resolve(&token), None);
        assert!(store.is_empty());
    }

    #[test]
    fn revoke_ends_session() {
        let mut store = SessionStore::new(Duration::from_secs(60));
        let token = store.create(Uuid::new_v4());
        assert!(store.revoke(&token));
        assert!(!store.revoke(&token));
        assert_eq!(store.resolve(&token), None);
    }

    #[test]
    fn revoke_account_ends_all_its_sessions() {
        let mut store = SessionStore::new(Duration::from_secs(60));
        let account = Uuid::new_v4();
        let other = Uuid::new_v4();
        store.create(account);
        store.create(account);
        let kept = store.create(other);
        assert_eq!(store.revoke_account(&account), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.resolve(&kept), Some(other));
    }
}

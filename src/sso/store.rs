//! Session storage behind a trait so a shared cache can replace the
//! in-process map without touching the login protocol.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

/// Sessions older than this are invalid even if still present.
pub const SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// A server-held single-sign-on session.
#[derive(Debug, Clone)]
pub struct SsoSession {
    pub user_id: i64,
    pub email: String,
    pub username: Option<String>,
    pub created_at_unix: u64,
}

impl SsoSession {
    /// Lookup-time staleness check; the sweep is hygiene, not the sole
    /// enforcement point.
    #[must_use]
    pub fn is_expired(&self, now_unix: u64) -> bool {
        now_unix.saturating_sub(self.created_at_unix) > SESSION_TTL.as_secs()
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn put(&self, id: String, session: SsoSession);
    async fn get(&self, id: &str) -> Option<SsoSession>;
    async fn delete(&self, id: &str);
    /// Remove every session older than the TTL; returns how many went.
    async fn sweep(&self, now_unix: u64) -> usize;
}

/// Process-lifetime session map.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, SsoSession>>,
}

impl InMemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn put(&self, id: String, session: SsoSession) {
        self.sessions.write().await.insert(id, session);
    }

    async fn get(&self, id: &str) -> Option<SsoSession> {
        self.sessions.read().await.get(id).cloned()
    }

    async fn delete(&self, id: &str) {
        self.sessions.write().await.remove(id);
    }

    async fn sweep(&self, now_unix: u64) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now_unix));
        before - sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(created_at_unix: u64) -> SsoSession {
        SsoSession {
            user_id: 1,
            email: "alice@example.com".to_string(),
            username: Some("alice".to_string()),
            created_at_unix,
        }
    }

    #[test]
    fn expiry_is_ttl_based() {
        let fresh = session(1_000_000);
        assert!(!fresh.is_expired(1_000_000 + SESSION_TTL.as_secs()));
        assert!(fresh.is_expired(1_000_000 + SESSION_TTL.as_secs() + 1));
    }

    #[test]
    fn clock_skew_does_not_underflow() {
        let future = session(2_000_000);
        assert!(!future.is_expired(1_000_000));
    }

    #[tokio::test]
    async fn put_get_delete_round_trip() {
        let store = InMemorySessionStore::new();
        store.put("sid".to_string(), session(100)).await;

        let found = store.get("sid").await.unwrap();
        assert_eq!(found.user_id, 1);
        assert_eq!(found.email, "alice@example.com");

        store.delete("sid").await;
        assert!(store.get("sid").await.is_none());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = InMemorySessionStore::new();
        store.delete("missing").await;
        assert!(store.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn sweep_removes_only_stale_sessions() {
        let store = InMemorySessionStore::new();
        let now = 2 * SESSION_TTL.as_secs();
        store.put("old".to_string(), session(100)).await;
        store
            .put("live".to_string(), session(now - 60))
            .await;

        let removed = store.sweep(now).await;
        assert_eq!(removed, 1);
        assert!(store.get("old").await.is_none());
        assert!(store.get("live").await.is_some());
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::time::Duration;

use crate::{
    config::Config,
    crypto::handle::{generate_session_handle, redact},
    error::Result,
    models::{role::Role, session::Session},
};

/// Absolute lifetime and sliding idle timeout applied to every session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    pub lifetime: chrono::Duration,
    pub idle_timeout: chrono::Duration,
}

impl SessionPolicy {
    pub fn new(lifetime: Duration, idle_timeout: Duration) -> Self {
        Self {
            lifetime: to_chrono(lifetime),
            idle_timeout: to_chrono(idle_timeout),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.session_lifetime, config.session_idle_timeout)
    }

    /// A fresh session for `subject_id` starting at `now`.
    pub fn start(&self, subject_id: i32, role: Role, now: DateTime<Utc>) -> Session {
        Session {
            subject_id,
            role,
            created_at: now,
            expires_at: now + self.lifetime,
            last_seen: now,
        }
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    let secs = duration.as_secs().min(i64::MAX as u64 / 1000) as i64;
    chrono::Duration::seconds(secs)
}

/// Server-side session storage keyed by an opaque handle.
///
/// "Not logged in" is never an error: a missing, expired, or destroyed
/// handle simply yields `None`. Errors are reserved for backend failures.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Records a new session and returns its handle.
    async fn create(&self, subject_id: i32, role: Role) -> Result<String>;

    /// Looks up a live session and pushes its idle deadline forward.
    async fn get(&self, handle: &str) -> Result<Option<Session>>;

    /// Invalidates a session immediately. Unknown handles are ignored.
    async fn destroy(&self, handle: &str) -> Result<()>;

    /// Drops expired records and returns how many were removed.
    async fn sweep(&self) -> Result<usize>;
}

/// Process-local session store.
pub struct MemorySessionStore {
    sessions: DashMap<String, Session>,
    policy: SessionPolicy,
}

impl MemorySessionStore {
    pub fn new(policy: SessionPolicy) -> Self {
        Self {
            sessions: DashMap::new(),
            policy,
        }
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    pub fn create_at(&self, subject_id: i32, role: Role, now: DateTime<Utc>) -> String {
        let handle = generate_session_handle();
        self.sessions
            .insert(handle.clone(), self.policy.start(subject_id, role, now));
        tracing::debug!("🆕 Session {}… created for user {}", redact(&handle), subject_id);
        handle
    }

    pub fn get_at(&self, handle: &str, now: DateTime<Utc>) -> Option<Session> {
        let idle = self.policy.idle_timeout;

        if let Some(mut entry) = self.sessions.get_mut(handle) {
            if !entry.is_expired(now, idle) {
                if now > entry.last_seen {
                    entry.last_seen = now;
                }
                return Some(entry.clone());
            }
        }

        if self
            .sessions
            .remove_if(handle, |_, session| session.is_expired(now, idle))
            .is_some()
        {
            tracing::debug!("⌛ Session {}… expired", redact(handle));
        }
        None
    }

    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let idle = self.policy.idle_timeout;
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !session.is_expired(now, idle));
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, subject_id: i32, role: Role) -> Result<String> {
        Ok(self.create_at(subject_id, role, Utc::now()))
    }

    async fn get(&self, handle: &str) -> Result<Option<Session>> {
        Ok(self.get_at(handle, Utc::now()))
    }

    async fn destroy(&self, handle: &str) -> Result<()> {
        if self.sessions.remove(handle).is_some() {
            tracing::debug!("🗑️ Session {}… destroyed", redact(handle));
        }
        Ok(())
    }

    async fn sweep(&self) -> Result<usize> {
        Ok(self.sweep_at(Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as Span;

    fn store() -> MemorySessionStore {
        MemorySessionStore::new(SessionPolicy::new(
            Duration::from_secs(3 * 3600),
            Duration::from_secs(20 * 60),
        ))
    }

    #[test]
    fn get_returns_what_create_stored() {
        let store = store();
        let now = Utc::now();
        let handle = store.create_at(9, Role::Privileged, now);

        let session = store.get_at(&handle, now).unwrap();
        assert_eq!(session.subject_id, 9);
        assert_eq!(session.role, Role::Privileged);
        assert_eq!(session.expires_at, now + Span::hours(3));
        assert!(store.get_at("no-such-handle", now).is_none());
    }

    #[test]
    fn idle_timeout_slides_on_every_read() {
        let store = store();
        let start = Utc::now();
        let handle = store.create_at(1, Role::Admin, start);

        assert!(store.get_at(&handle, start + Span::minutes(15)).is_some());
        assert!(store.get_at(&handle, start + Span::minutes(30)).is_some());
        assert!(store.get_at(&handle, start + Span::minutes(51)).is_none());
        // Expired records are gone, not just hidden.
        assert!(store.is_empty());
    }

    #[test]
    fn absolute_lifetime_wins_over_activity() {
        let store = store();
        let start = Utc::now();
        let handle = store.create_at(1, Role::NonPrivileged, start);

        let mut at = start;
        while at < start + Span::hours(3) - Span::minutes(10) {
            at += Span::minutes(10);
            assert!(store.get_at(&handle, at).is_some());
        }
        assert!(store.get_at(&handle, start + Span::hours(3)).is_none());
    }

    #[tokio::test]
    async fn destroy_invalidates_immediately() {
        let store = store();
        let handle = store.create(4, Role::NonPrivileged).await.unwrap();
        assert!(store.get(&handle).await.unwrap().is_some());

        store.destroy(&handle).await.unwrap();
        assert!(store.get(&handle).await.unwrap().is_none());
        store.destroy(&handle).await.unwrap();
    }

    #[test]
    fn sweep_only_drops_expired() {
        let store = store();
        let start = Utc::now();
        let stale = store.create_at(1, Role::NonPrivileged, start);
        let fresh = store.create_at(2, Role::NonPrivileged, start + Span::minutes(15));

        assert_eq!(store.sweep_at(start + Span::minutes(25)), 1);
        assert!(store.get_at(&stale, start + Span::minutes(25)).is_none());
        assert!(store.get_at(&fresh, start + Span::minutes(25)).is_some());
    }

    #[test]
    fn handles_are_unique_per_login() {
        let store = store();
        let now = Utc::now();
        let a = store.create_at(1, Role::Admin, now);
        let b = store.create_at(1, Role::Admin, now);
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }
}

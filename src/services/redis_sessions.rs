use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{AsyncCommands, aio::ConnectionManager};

use crate::{
    crypto::handle::{generate_session_handle, redact},
    error::{AppError, Result},
    models::{role::Role, session::Session},
    services::session_store::{SessionPolicy, SessionStore},
};

fn session_key(handle: &str) -> String {
    format!("session:{}", handle)
}

/// Seconds until the earlier of the idle and absolute deadlines, or `None`
/// when the session is already dead at `now`.
pub fn remaining_ttl(session: &Session, policy: &SessionPolicy, now: DateTime<Utc>) -> Option<u64> {
    let idle_deadline = session.last_seen + policy.idle_timeout;
    let deadline = idle_deadline.min(session.expires_at);
    let secs = (deadline - now).num_seconds();
    (secs > 0).then_some(secs as u64)
}

/// Sessions kept in Redis as JSON, one key per handle.
///
/// The key's TTL tracks the nearer deadline, so Redis drops dead sessions by
/// itself and `sweep` has nothing to do.
#[derive(Clone)]
pub struct RedisSessionStore {
    redis: ConnectionManager,
    policy: SessionPolicy,
}

impl RedisSessionStore {
    pub async fn connect(url: &str, policy: SessionPolicy) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let redis = ConnectionManager::new(client).await?;
        tracing::info!("✅ Redis session store connected");
        Ok(Self { redis, policy })
    }

    async fn write(&self, handle: &str, session: &Session, ttl: u64) -> Result<()> {
        let _: () = self
            .redis
            .clone()
            .set_ex(session_key(handle), encode(session)?, ttl)
            .await?;
        Ok(())
    }

    /// Rewrites a session only if its key still exists.
    ///
    /// # Returns
    ///
    /// `false` when the key is gone, i.e. the session was destroyed after it
    /// was read.
    async fn refresh(&self, handle: &str, session: &Session, ttl: u64) -> Result<bool> {
        let reply: redis::Value = refresh_command(&session_key(handle), &encode(session)?, ttl)
            .query_async(&mut self.redis.clone())
            .await?;
        Ok(!matches!(reply, redis::Value::Nil))
    }
}

fn encode(session: &Session) -> Result<String> {
    sonic_rs::to_string(session).map_err(|e| AppError::Internal(format!("session encode: {}", e)))
}

/// `SET key value XX EX ttl`: never recreates a deleted key.
fn refresh_command(key: &str, json: &str, ttl: u64) -> redis::Cmd {
    let mut cmd = redis::cmd("SET");
    cmd.arg(key).arg(json).arg("XX").arg("EX").arg(ttl);
    cmd
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn create(&self, subject_id: i32, role: Role) -> Result<String> {
        let now = Utc::now();
        let handle = generate_session_handle();
        let session = self.policy.start(subject_id, role, now);
        let ttl = remaining_ttl(&session, &self.policy, now)
            .ok_or_else(|| AppError::Internal("session policy yields no lifetime".to_string()))?;

        self.write(&handle, &session, ttl).await?;
        tracing::debug!("🆕 Session {}… created for user {}", redact(&handle), subject_id);
        Ok(handle)
    }

    async fn get(&self, handle: &str) -> Result<Option<Session>> {
        let key = session_key(handle);
        let json: Option<String> = self.redis.clone().get(&key).await?;
        let Some(json) = json else {
            return Ok(None);
        };

        let mut session: Session = match sonic_rs::from_str(&json) {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("❌ Invalid session JSON for {}…: {}", redact(handle), e);
                let _: () = self.redis.clone().del(&key).await?;
                return Ok(None);
            }
        };

        let now = Utc::now();
        if now > session.last_seen {
            session.last_seen = now;
        }
        match remaining_ttl(&session, &self.policy, now) {
            Some(ttl) => {
                if self.refresh(handle, &session, ttl).await? {
                    Ok(Some(session))
                } else {
                    tracing::debug!("❌ Session {}… destroyed during refresh", redact(handle));
                    Ok(None)
                }
            }
            None => {
                let _: () = self.redis.clone().del(&key).await?;
                Ok(None)
            }
        }
    }

    async fn destroy(&self, handle: &str) -> Result<()> {
        let _: () = self.redis.clone().del(session_key(handle)).await?;
        tracing::debug!("🗑️ Session {}… destroyed", redact(handle));
        Ok(())
    }

    async fn sweep(&self) -> Result<usize> {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as Span;
    use std::time::Duration;

    fn policy() -> SessionPolicy {
        SessionPolicy::new(Duration::from_secs(3 * 3600), Duration::from_secs(20 * 60))
    }

    #[test]
    fn ttl_is_idle_timeout_for_fresh_sessions() {
        let now = Utc::now();
        let session = policy().start(1, Role::Admin, now);
        assert_eq!(remaining_ttl(&session, &policy(), now), Some(20 * 60));
    }

    #[test]
    fn ttl_is_capped_by_absolute_deadline() {
        let start = Utc::now();
        let mut session = policy().start(1, Role::Admin, start);
        let now = start + Span::hours(3) - Span::minutes(5);
        session.last_seen = now;
        assert_eq!(remaining_ttl(&session, &policy(), now), Some(5 * 60));
        assert_eq!(remaining_ttl(&session, &policy(), start + Span::hours(3)), None);
    }

    #[test]
    fn refresh_only_touches_existing_keys() {
        let packed = refresh_command("session:abc", "{}", 600).get_packed_command();
        let text = String::from_utf8(packed).unwrap();
        let args: Vec<&str> = text
            .split("\r\n")
            .filter(|part| !part.is_empty() && !part.starts_with(['*', '$']))
            .collect();
        assert_eq!(args, vec!["SET", "session:abc", "{}", "XX", "EX", "600"]);
    }

    #[test]
    fn keys_are_namespaced() {
        assert_eq!(session_key("abc"), "session:abc");
    }
}

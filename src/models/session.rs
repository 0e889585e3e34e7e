use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::role::Role;

/// A server-side session record.
///
/// Only the handle travels to the browser; everything here stays on the
/// server. `role` is captured at login and is not re-read from the user
/// table afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// The ID of the user this session belongs to.
    pub subject_id: i32,
    /// The user's role at login time.
    pub role: Role,
    /// The timestamp when the session was created.
    pub created_at: DateTime<Utc>,
    /// Absolute deadline; the session never outlives it.
    pub expires_at: DateTime<Utc>,
    /// Last time the session was read; drives the idle timeout.
    pub last_seen: DateTime<Utc>,
}

impl Session {
    /// Whether either the absolute or the idle deadline has passed at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>, idle_timeout: chrono::Duration) -> bool {
        now >= self.expires_at || now >= self.last_seen + idle_timeout
    }

    pub fn principal(&self) -> Principal {
        Principal {
            subject_id: self.subject_id,
            role: self.role,
        }
    }
}

/// The authenticated identity attached to a request by the auth middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub subject_id: i32,
    pub role: Role,
}

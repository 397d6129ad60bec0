use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use guildgate_core::UserId;

/// An issued authentication session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    pub token: String,
    pub platform: String,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Fresh while strictly less than `expiry` has elapsed since creation.
    pub fn is_fresh_at(&self, now: DateTime<Utc>, expiry: Duration) -> bool {
        now - self.created_at < expiry
    }

    pub fn status_at(&self, now: DateTime<Utc>, expiry: Duration) -> SessionStatus {
        if self.is_fresh_at(now, expiry) {
            SessionStatus::Active(self.user_id)
        } else {
            SessionStatus::Expired(self.user_id)
        }
    }
}

/// Result of checking a bearer token against stored sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No session carries this token.
    Unknown,
    Expired(UserId),
    Active(UserId),
}

impl SessionStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, SessionStatus::Active(_))
    }

    /// Owner of the session; zero for `Unknown`.
    pub fn user_id(&self) -> UserId {
        match self {
            SessionStatus::Unknown => UserId::new(0),
            SessionStatus::Expired(id) | SessionStatus::Active(id) => *id,
        }
    }
}

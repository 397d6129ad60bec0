//! Session issuance and validation.
//!
//! Issuing is two independent steps, sign then persist, with no rollback. A
//! token that was signed but not stored is logged and discarded; it never
//! validates because validation goes through storage.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{info, instrument, warn};

use guildgate_auth::{Session, SessionStatus, TokenError, TokenIssuer};
use guildgate_core::{DomainError, UserId};

use crate::storage::{Storage, StorageError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("invalid session request: {0}")]
    Validation(String),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("session storage failed: {0}")]
    Storage(#[from] StorageError),
}

impl From<SessionError> for DomainError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Validation(msg) => DomainError::Validation(msg),
            SessionError::Token(e) => DomainError::internal(e.to_string()),
            SessionError::Storage(e) => e.into(),
        }
    }
}

pub struct SessionManager {
    issuer: TokenIssuer,
    storage: Arc<dyn Storage>,
    expiry: Duration,
}

impl core::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionManager")
            .field("issuer", &self.issuer)
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Sessions expire after the issuer's token lifetime.
    pub fn new(issuer: TokenIssuer, storage: Arc<dyn Storage>) -> Self {
        let expiry = issuer.expiry();
        Self { issuer, storage, expiry }
    }

    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    pub async fn issue(&self, user_id: UserId, platform: &str) -> Result<Session, SessionError> {
        self.issue_at(user_id, platform, Utc::now()).await
    }

    #[instrument(skip(self, user_id, now), fields(user_id = %user_id))]
    pub async fn issue_at(
        &self,
        user_id: UserId,
        platform: &str,
        now: DateTime<Utc>,
    ) -> Result<Session, SessionError> {
        if user_id.is_unset() {
            return Err(SessionError::Validation("user id is zero".to_string()));
        }

        let (token, claims) = self.issuer.issue(user_id, now)?;
        let session = Session {
            user_id,
            token,
            platform: platform.to_string(),
            created_at: claims.iat,
        };

        if let Err(err) = self.storage.save_session(&session).await {
            warn!(jti = %claims.jti, error = %err, "signed token was not persisted; discarding");
            return Err(err.into());
        }

        info!(jti = %claims.jti, "session issued");
        Ok(session)
    }

    pub async fn validate(&self, token: &str) -> Result<SessionStatus, SessionError> {
        self.validate_at(token, Utc::now()).await
    }

    /// Freshness is measured from the stored `created_at`, not the token's
    /// embedded `exp`.
    #[instrument(skip(self, token))]
    pub async fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<SessionStatus, SessionError> {
        if token.is_empty() {
            return Ok(SessionStatus::Unknown);
        }
        let status = match self.storage.get_session_by_token(token).await? {
            Some(session) => session.status_at(now, self.expiry),
            None => SessionStatus::Unknown,
        };
        Ok(status)
    }
}

//! Persistence boundary for users, groups, permissions and sessions.
//!
//! Every operation is a single round trip. Only rows with `deleted_at IS NULL`
//! are visible.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use thiserror::Error;

use guildgate_auth::{Group, PermissionGrant, Session, User};
use guildgate_core::{DomainError, GroupId, UserId};

pub use in_memory::{InMemoryStorage, StorageOp};
pub use postgres::PostgresStorage;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("row not found")]
    NotFound,

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("query failed: {0}")]
    Query(String),
}

impl From<StorageError> for DomainError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => DomainError::NotFound,
            StorageError::Unavailable(msg) => DomainError::Unavailable(msg),
            StorageError::Conflict(msg) => DomainError::Internal(format!("conflict: {msg}")),
            StorageError::Query(msg) => DomainError::Unavailable(msg),
        }
    }
}

/// Storage collaborator consumed by the catalog, directory and session manager.
#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    /// Load an active user by username, or by email when `username` contains `@`.
    async fn load_user_by_username(&self, username: &str) -> Result<User, StorageError>;

    async fn load_user_by_id(&self, id: UserId) -> Result<User, StorageError>;

    /// All active groups, without permissions.
    async fn load_groups(&self) -> Result<Vec<Group>, StorageError>;

    async fn load_group_permissions(&self, group_id: GroupId) -> Result<Vec<PermissionGrant>, StorageError>;

    /// Group ids of the user's active memberships, in storage order.
    async fn get_user_group_ids(&self, user_id: UserId) -> Result<Vec<GroupId>, StorageError>;

    async fn get_session_by_token(&self, token: &str) -> Result<Option<Session>, StorageError>;

    /// Persist a new session. A duplicate token is a `Conflict`.
    async fn save_session(&self, session: &Session) -> Result<(), StorageError>;
}

#[async_trait::async_trait]
impl<S> Storage for Arc<S>
where
    S: Storage + ?Sized,
{
    async fn load_user_by_username(&self, username: &str) -> Result<User, StorageError> {
        (**self).load_user_by_username(username).await
    }

    async fn load_user_by_id(&self, id: UserId) -> Result<User, StorageError> {
        (**self).load_user_by_id(id).await
    }

    async fn load_groups(&self) -> Result<Vec<Group>, StorageError> {
        (**self).load_groups().await
    }

    async fn load_group_permissions(&self, group_id: GroupId) -> Result<Vec<PermissionGrant>, StorageError> {
        (**self).load_group_permissions(group_id).await
    }

    async fn get_user_group_ids(&self, user_id: UserId) -> Result<Vec<GroupId>, StorageError> {
        (**self).get_user_group_ids(user_id).await
    }

    async fn get_session_by_token(&self, token: &str) -> Result<Option<Session>, StorageError> {
        (**self).get_session_by_token(token).await
    }

    async fn save_session(&self, session: &Session) -> Result<(), StorageError> {
        (**self).save_session(session).await
    }
}

/// `true` when a login name should be matched against the email column.
pub fn is_email_login(username: &str) -> bool {
    username.contains('@')
}

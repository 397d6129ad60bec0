//! Postgres-backed storage.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StorageError |
//! |------------|----------------------|--------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (other) | Any other | `Query` |
//! | RowNotFound | N/A | `NotFound` |
//! | PoolClosed / PoolTimedOut / Io / Tls | N/A | `Unavailable` |
//! | Other | N/A | `Query` |

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{FromRow, Row};
use tracing::instrument;

use guildgate_auth::{Group, PermissionGrant, Session, User};
use guildgate_core::{GroupId, UserId};

use super::{Storage, StorageError, is_email_login};
use crate::config::StorageConfig;

#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pool: Arc<PgPool>,
}

impl PostgresStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Open a pool and check it with a round trip.
    #[instrument(skip(config), fields(max_connections = config.max_connections), err)]
    pub async fn connect(config: &StorageConfig) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(|e| map_sqlx_error("ping", e))?;

        Ok(Self::new(pool))
    }
}

#[async_trait::async_trait]
impl Storage for PostgresStorage {
    #[instrument(skip(self, username), fields(by_email = is_email_login(username)), err)]
    async fn load_user_by_username(&self, username: &str) -> Result<User, StorageError> {
        let query = if is_email_login(username) {
            r#"
            SELECT id, username, password, email, created_at, updated_at, deleted_at
            FROM users
            WHERE email = $1 AND deleted_at IS NULL
            "#
        } else {
            r#"
            SELECT id, username, password, email, created_at, updated_at, deleted_at
            FROM users
            WHERE username = $1 AND deleted_at IS NULL
            "#
        };

        let row = sqlx::query(query)
            .bind(username)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_user_by_username", e))?
            .ok_or(StorageError::NotFound)?;

        let user = UserRow::from_row(&row).map_err(|e| map_sqlx_error("decode_user", e))?;
        Ok(user.into())
    }

    #[instrument(skip(self, id), fields(user_id = %id), err)]
    async fn load_user_by_id(&self, id: UserId) -> Result<User, StorageError> {
        let row = sqlx::query(
            r#"
            SELECT id, username, password, email, created_at, updated_at, deleted_at
            FROM users
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_user_by_id", e))?
        .ok_or(StorageError::NotFound)?;

        let user = UserRow::from_row(&row).map_err(|e| map_sqlx_error("decode_user", e))?;
        Ok(user.into())
    }

    #[instrument(skip(self), err)]
    async fn load_groups(&self) -> Result<Vec<Group>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT id, parent_id, name, description
            FROM groups
            WHERE deleted_at IS NULL
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_groups", e))?;

        let mut groups = Vec::with_capacity(rows.len());
        for row in rows {
            let group = GroupRow::from_row(&row).map_err(|e| map_sqlx_error("decode_group", e))?;
            groups.push(group.into());
        }
        Ok(groups)
    }

    #[instrument(skip(self, group_id), fields(group_id = %group_id), err)]
    async fn load_group_permissions(&self, group_id: GroupId) -> Result<Vec<PermissionGrant>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT permission, domain, read, write, delete
            FROM group_permissions
            WHERE group_id = $1 AND deleted_at IS NULL
            ORDER BY id ASC
            "#,
        )
        .bind(group_id.get())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_group_permissions", e))?;

        let mut grants = Vec::with_capacity(rows.len());
        for row in rows {
            let grant = GrantRow::from_row(&row).map_err(|e| map_sqlx_error("decode_grant", e))?;
            grants.push(grant.into());
        }
        Ok(grants)
    }

    #[instrument(skip(self, user_id), fields(user_id = %user_id), err)]
    async fn get_user_group_ids(&self, user_id: UserId) -> Result<Vec<GroupId>, StorageError> {
        let ids: Vec<i32> = sqlx::query_scalar(
            r#"
            SELECT group_id
            FROM group_members
            WHERE user_id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(user_id.get())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_user_group_ids", e))?;

        Ok(ids.into_iter().map(GroupId::new).collect())
    }

    // Token is a bearer secret; keep it out of spans.
    #[instrument(skip(self, token), err)]
    async fn get_session_by_token(&self, token: &str) -> Result<Option<Session>, StorageError> {
        let row = sqlx::query(
            r#"
            SELECT user_id, token, platform_name, created_at
            FROM user_sessions
            WHERE token = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(token)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_session_by_token", e))?;

        match row {
            Some(row) => {
                let session = SessionRow::from_row(&row).map_err(|e| map_sqlx_error("decode_session", e))?;
                Ok(Some(session.into()))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, session), fields(user_id = %session.user_id, platform = %session.platform), err)]
    async fn save_session(&self, session: &Session) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO user_sessions (user_id, token, platform_name, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            "#,
        )
        .bind(session.user_id.get())
        .bind(&session.token)
        .bind(&session.platform)
        .bind(session.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("save_session", e))?;

        Ok(())
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StorageError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StorageError::Conflict(msg),
                _ => StorageError::Query(msg),
            }
        }
        sqlx::Error::RowNotFound => StorageError::NotFound,
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
            StorageError::Unavailable(format!("connection pool unavailable in {}", operation))
        }
        sqlx::Error::Io(e) => StorageError::Unavailable(format!("io error in {}: {}", operation, e)),
        sqlx::Error::Tls(e) => StorageError::Unavailable(format!("tls error in {}: {}", operation, e)),
        _ => StorageError::Query(format!("sqlx error in {}: {}", operation, err)),
    }
}

struct UserRow {
    id: i32,
    username: String,
    password: String,
    email: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl<'r> FromRow<'r, PgRow> for UserRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(UserRow {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            password: row.try_get("password")?,
            email: row.try_get("email")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            deleted_at: row.try_get("deleted_at")?,
        })
    }
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        let mut user = User::new(UserId::new(row.id), row.username, row.email, row.created_at)
            .with_password_hash(row.password);
        user.updated_at = row.updated_at;
        user.deleted_at = row.deleted_at;
        user
    }
}

struct GroupRow {
    id: i32,
    parent_id: Option<i32>,
    name: String,
    description: Option<String>,
}

impl<'r> FromRow<'r, PgRow> for GroupRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(GroupRow {
            id: row.try_get("id")?,
            parent_id: row.try_get("parent_id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
        })
    }
}

impl From<GroupRow> for Group {
    fn from(row: GroupRow) -> Self {
        let mut group = Group::new(GroupId::new(row.id), row.name)
            .with_description(row.description.unwrap_or_default());
        // Roots are stored with parent 0 or NULL.
        group.parent_id = row.parent_id.filter(|p| *p != 0).map(GroupId::new);
        group
    }
}

struct GrantRow {
    permission: String,
    domain: String,
    read: bool,
    write: bool,
    delete: bool,
}

impl<'r> FromRow<'r, PgRow> for GrantRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(GrantRow {
            permission: row.try_get("permission")?,
            domain: row.try_get("domain")?,
            read: row.try_get("read")?,
            write: row.try_get("write")?,
            delete: row.try_get("delete")?,
        })
    }
}

impl From<GrantRow> for PermissionGrant {
    fn from(row: GrantRow) -> Self {
        PermissionGrant {
            permission: row.permission,
            domain: row.domain,
            read: row.read,
            write: row.write,
            delete: row.delete,
        }
    }
}

struct SessionRow {
    user_id: i32,
    token: String,
    platform_name: String,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for SessionRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(SessionRow {
            user_id: row.try_get("user_id")?,
            token: row.try_get("token")?,
            platform_name: row.try_get("platform_name")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Session {
            user_id: UserId::new(row.user_id),
            token: row.token,
            platform: row.platform_name,
            created_at: row.created_at,
        }
    }
}

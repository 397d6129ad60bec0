//! Read-through user cache.
//!
//! Users are cached by id with secondary username and email indices. The
//! index lock is only held for map access, never across a storage call, so
//! two concurrent misses for the same user both go to storage and the later
//! insert wins. Both copies are equivalent, so this is tolerated rather than
//! deduplicated.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::{debug, instrument, warn};

use guildgate_auth::User;
use guildgate_core::{DomainError, UserId};

use crate::catalog::GroupCatalog;
use crate::storage::{Storage, StorageError, is_email_login};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("invalid user: {0}")]
    Validation(String),

    #[error("user not found")]
    NotFound,

    /// Loading the user row failed.
    #[error("failed to load user: {0}")]
    Load(StorageError),

    /// Loading the user's group memberships failed.
    #[error("failed to load user groups: {0}")]
    Groups(StorageError),
}

impl From<DirectoryError> for DomainError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Validation(msg) => DomainError::Validation(msg),
            DirectoryError::NotFound => DomainError::NotFound,
            DirectoryError::Load(e) | DirectoryError::Groups(e) => e.into(),
        }
    }
}

#[derive(Debug, Default)]
struct Index {
    by_id: HashMap<UserId, Arc<User>>,
    by_username: HashMap<String, UserId>,
    by_email: HashMap<String, UserId>,
}

impl Index {
    fn insert(&mut self, user: Arc<User>) {
        if let Some(previous) = self.by_id.get(&user.id).cloned() {
            self.unlink(&previous);
        }
        self.by_username.insert(user.username.clone(), user.id);
        if !user.email.is_empty() {
            self.by_email.insert(user.email.clone(), user.id);
        }
        self.by_id.insert(user.id, user);
    }

    fn unlink(&mut self, user: &User) {
        if self.by_username.get(&user.username) == Some(&user.id) {
            self.by_username.remove(&user.username);
        }
        if self.by_email.get(&user.email) == Some(&user.id) {
            self.by_email.remove(&user.email);
        }
    }

    fn resolve(&self, login: &str) -> Option<Arc<User>> {
        let id = if is_email_login(login) {
            self.by_email.get(login)
        } else {
            self.by_username.get(login)
        }?;
        self.by_id.get(id).cloned()
    }
}

pub struct UserDirectory {
    storage: Arc<dyn Storage>,
    catalog: Arc<GroupCatalog>,
    index: Mutex<Index>,
}

impl core::fmt::Debug for UserDirectory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UserDirectory")
            .field("cached", &self.len())
            .field("groups", &self.catalog.len())
            .finish_non_exhaustive()
    }
}

impl UserDirectory {
    pub fn new(storage: Arc<dyn Storage>, catalog: Arc<GroupCatalog>) -> Self {
        Self {
            storage,
            catalog,
            index: Mutex::new(Index::default()),
        }
    }

    fn index(&self) -> MutexGuard<'_, Index> {
        self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cache a user. Id 0 and empty usernames are rejected.
    pub fn add(&self, user: User) -> Result<Arc<User>, DirectoryError> {
        if user.id.is_unset() {
            return Err(DirectoryError::Validation("user id is zero".to_string()));
        }
        if user.username.is_empty() {
            return Err(DirectoryError::Validation("username is empty".to_string()));
        }
        let user = Arc::new(user);
        self.index().insert(user.clone());
        Ok(user)
    }

    /// Evict a user from the cache. Storage is untouched.
    pub fn remove(&self, id: UserId) -> Option<Arc<User>> {
        let mut index = self.index();
        let user = index.by_id.remove(&id)?;
        index.unlink(&user);
        Some(user)
    }

    pub fn len(&self) -> usize {
        self.index().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached user without touching storage.
    pub fn cached(&self, id: UserId) -> Option<Arc<User>> {
        self.index().by_id.get(&id).cloned()
    }

    #[instrument(skip(self, id), fields(user_id = %id))]
    pub async fn get_by_id(&self, id: UserId) -> Result<Arc<User>, DirectoryError> {
        if id.is_unset() {
            return Err(DirectoryError::Validation("user id is zero".to_string()));
        }
        if let Some(user) = self.cached(id) {
            return Ok(user);
        }

        debug!("user cache miss");
        let user = match self.storage.load_user_by_id(id).await {
            Ok(user) => user,
            Err(StorageError::NotFound) => return Err(DirectoryError::NotFound),
            Err(err) => return Err(DirectoryError::Load(err)),
        };
        self.hydrate_and_insert(user).await
    }

    /// Resolve a login name; names containing `@` are matched against email.
    #[instrument(skip(self, login), fields(by_email = is_email_login(login)))]
    pub async fn get_by_username(&self, login: &str) -> Result<Arc<User>, DirectoryError> {
        if login.is_empty() {
            return Err(DirectoryError::Validation("username is empty".to_string()));
        }
        let hit = self.index().resolve(login);
        if let Some(user) = hit {
            return Ok(user);
        }

        debug!("user cache miss");
        let user = match self.storage.load_user_by_username(login).await {
            Ok(user) => user,
            Err(StorageError::NotFound) => return Err(DirectoryError::NotFound),
            Err(err) => return Err(DirectoryError::Load(err)),
        };
        self.hydrate_and_insert(user).await
    }

    async fn hydrate_and_insert(&self, mut user: User) -> Result<Arc<User>, DirectoryError> {
        let group_ids = self
            .storage
            .get_user_group_ids(user.id)
            .await
            .map_err(DirectoryError::Groups)?;

        let mut groups = Vec::with_capacity(group_ids.len());
        for group_id in group_ids {
            match self.catalog.get(group_id) {
                Some(group) => groups.push(group),
                None => warn!(user_id = %user.id, group_id = %group_id, "membership references a group missing from the catalog"),
            }
        }
        user.attach_groups(groups.iter().map(|g| g.as_ref()));

        let user = Arc::new(user);
        self.index().insert(user.clone());
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::Utc;
    use guildgate_auth::{Group, PermissionGrant, Scope};
    use guildgate_core::GroupId;

    use crate::storage::{InMemoryStorage, StorageOp};

    fn grant(name: &str, write: bool) -> PermissionGrant {
        PermissionGrant {
            permission: name.to_string(),
            domain: "own".to_string(),
            read: true,
            write,
            delete: false,
        }
    }

    fn seed(storage: &InMemoryStorage) {
        storage.insert_group(Group::new(GroupId::new(1), "players"));
        storage.insert_group(Group::new(GroupId::new(2), "muted"));
        storage.grant(GroupId::new(1), grant("chat.send", true));
        storage.grant(GroupId::new(2), grant("chat.send", false));

        storage.insert_user(User::new(UserId::new(10), "alice", "alice@example.com", Utc::now()));
        storage.add_member(UserId::new(10), GroupId::new(1));
        storage.add_member(UserId::new(10), GroupId::new(2));
        // Membership in a group the catalog never loaded.
        storage.add_member(UserId::new(10), GroupId::new(99));
    }

    async fn directory_with(storage: Arc<InMemoryStorage>) -> UserDirectory {
        let catalog = GroupCatalog::load(storage.as_ref()).await.unwrap();
        UserDirectory::new(storage, Arc::new(catalog))
    }

    #[tokio::test]
    async fn miss_loads_once_then_hits() {
        let storage = Arc::new(InMemoryStorage::new());
        seed(&storage);
        let directory = directory_with(storage.clone()).await;

        let first = directory.get_by_id(UserId::new(10)).await.unwrap();
        let second = directory.get_by_id(UserId::new(10)).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(storage.calls(StorageOp::LoadUserById), 1);
        assert_eq!(storage.calls(StorageOp::GetUserGroupIds), 1);
    }

    #[tokio::test]
    async fn attaches_groups_in_storage_order() {
        let storage = Arc::new(InMemoryStorage::new());
        seed(&storage);
        let directory = directory_with(storage).await;

        let user = directory.get_by_id(UserId::new(10)).await.unwrap();
        assert_eq!(user.groups, vec![GroupId::new(1), GroupId::new(2)]);
        // "muted" was merged last.
        assert!(!user.permission(Scope::Own, "chat.send").write);
    }

    #[tokio::test]
    async fn username_and_email_share_one_cache_entry() {
        let storage = Arc::new(InMemoryStorage::new());
        seed(&storage);
        let directory = directory_with(storage.clone()).await;

        let by_name = directory.get_by_username("alice").await.unwrap();
        let by_email = directory.get_by_username("alice@example.com").await.unwrap();
        let by_id = directory.get_by_id(UserId::new(10)).await.unwrap();

        assert!(Arc::ptr_eq(&by_name, &by_email));
        assert!(Arc::ptr_eq(&by_name, &by_id));
        assert_eq!(storage.calls(StorageOp::LoadUserByUsername), 1);
        assert_eq!(storage.calls(StorageOp::LoadUserById), 0);
        assert_eq!(directory.len(), 1);
    }

    #[tokio::test]
    async fn missing_users_are_not_found() {
        let storage = Arc::new(InMemoryStorage::new());
        let directory = directory_with(storage).await;

        assert_eq!(directory.get_by_id(UserId::new(5)).await.unwrap_err(), DirectoryError::NotFound);
        assert_eq!(directory.get_by_username("nobody").await.unwrap_err(), DirectoryError::NotFound);
        assert!(directory.is_empty());
    }

    #[tokio::test]
    async fn storage_failures_are_classified() {
        let storage = Arc::new(InMemoryStorage::new());
        seed(&storage);
        let directory = directory_with(storage.clone()).await;

        storage.fail(StorageOp::GetUserGroupIds);
        assert!(matches!(
            directory.get_by_username("alice").await,
            Err(DirectoryError::Groups(_))
        ));
        assert!(directory.is_empty());

        storage.fail(StorageOp::LoadUserByUsername);
        assert!(matches!(
            directory.get_by_username("alice").await,
            Err(DirectoryError::Load(_))
        ));
    }

    #[tokio::test]
    async fn add_validates_and_remove_evicts() {
        let storage = Arc::new(InMemoryStorage::new());
        let directory = directory_with(storage.clone()).await;

        let zero = User::new(UserId::new(0), "ghost", "", Utc::now());
        assert!(matches!(directory.add(zero), Err(DirectoryError::Validation(_))));
        let unnamed = User::new(UserId::new(3), "", "", Utc::now());
        assert!(matches!(directory.add(unnamed), Err(DirectoryError::Validation(_))));

        directory.add(User::new(UserId::new(3), "carol", "carol@example.com", Utc::now())).unwrap();
        assert!(directory.get_by_username("carol@example.com").await.is_ok());
        assert_eq!(storage.calls(StorageOp::LoadUserByUsername), 0);

        assert!(directory.remove(UserId::new(3)).is_some());
        assert!(directory.is_empty());
        assert_eq!(directory.get_by_username("carol").await.unwrap_err(), DirectoryError::NotFound);
        assert_eq!(storage.calls(StorageOp::LoadUserByUsername), 1);
    }

    #[tokio::test]
    async fn re_adding_a_user_drops_stale_names() {
        let storage = Arc::new(InMemoryStorage::new());
        let directory = directory_with(storage).await;

        directory.add(User::new(UserId::new(3), "carol", "carol@example.com", Utc::now())).unwrap();
        directory.add(User::new(UserId::new(3), "caroline", "caroline@example.com", Utc::now())).unwrap();

        assert_eq!(directory.len(), 1);
        assert!(directory.get_by_username("caroline").await.is_ok());
        assert_eq!(directory.get_by_username("carol").await.unwrap_err(), DirectoryError::NotFound);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_misses_both_hit_storage() {
        let storage = Arc::new(InMemoryStorage::new().with_latency(Duration::from_millis(10)));
        seed(&storage);
        let directory = directory_with(storage.clone()).await;

        let (a, b) = tokio::join!(
            directory.get_by_id(UserId::new(10)),
            directory.get_by_id(UserId::new(10))
        );

        assert_eq!(a.unwrap().id, b.unwrap().id);
        assert_eq!(storage.calls(StorageOp::LoadUserById), 2);
        assert_eq!(directory.len(), 1);
    }
}

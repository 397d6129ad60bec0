use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use guildgate_auth::{Group, PermissionGrant, Session, User};
use guildgate_core::{GroupId, UserId};

use super::{Storage, StorageError, is_email_login};

/// Storage operations, used to count calls and inject failures.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StorageOp {
    LoadUserByUsername,
    LoadUserById,
    LoadGroups,
    LoadGroupPermissions,
    GetUserGroupIds,
    GetSessionByToken,
    SaveSession,
}

#[derive(Debug, Default)]
struct State {
    users: Vec<User>,
    groups: Vec<Group>,
    grants: HashMap<GroupId, Vec<PermissionGrant>>,
    members: HashMap<UserId, Vec<GroupId>>,
    sessions: HashMap<String, Session>,
    calls: HashMap<StorageOp, usize>,
    failing: HashSet<StorageOp>,
    failing_groups: HashSet<GroupId>,
}

/// In-memory storage for tests and local development.
///
/// Counts calls per operation and can be told to fail specific operations.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    state: Mutex<State>,
    latency: Option<Duration>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `latency` inside every operation.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert_user(&self, user: User) {
        let mut state = self.state();
        state.users.retain(|u| u.id != user.id);
        state.users.push(user);
    }

    pub fn insert_group(&self, group: Group) {
        let mut state = self.state();
        state.groups.retain(|g| g.id != group.id);
        state.groups.push(group);
    }

    pub fn grant(&self, group_id: GroupId, grant: PermissionGrant) {
        self.state().grants.entry(group_id).or_default().push(grant);
    }

    pub fn add_member(&self, user_id: UserId, group_id: GroupId) {
        self.state().members.entry(user_id).or_default().push(group_id);
    }

    pub fn insert_session(&self, session: Session) {
        self.state().sessions.insert(session.token.clone(), session);
    }

    pub fn sessions(&self) -> Vec<Session> {
        self.state().sessions.values().cloned().collect()
    }

    pub fn calls(&self, op: StorageOp) -> usize {
        self.state().calls.get(&op).copied().unwrap_or(0)
    }

    pub fn fail(&self, op: StorageOp) {
        self.state().failing.insert(op);
    }

    pub fn recover(&self, op: StorageOp) {
        self.state().failing.remove(&op);
    }

    /// Fail `load_group_permissions` for one group only.
    pub fn fail_group_permissions(&self, group_id: GroupId) {
        self.state().failing_groups.insert(group_id);
    }

    async fn enter(&self, op: StorageOp) -> Result<(), StorageError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state();
        *state.calls.entry(op).or_default() += 1;
        if state.failing.contains(&op) {
            return Err(StorageError::Unavailable(format!("injected failure in {op:?}")));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Storage for InMemoryStorage {
    async fn load_user_by_username(&self, username: &str) -> Result<User, StorageError> {
        self.enter(StorageOp::LoadUserByUsername).await?;
        let by_email = is_email_login(username);
        self.state()
            .users
            .iter()
            .filter(|u| !u.is_deleted())
            .find(|u| if by_email { u.email == username } else { u.username == username })
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn load_user_by_id(&self, id: UserId) -> Result<User, StorageError> {
        self.enter(StorageOp::LoadUserById).await?;
        self.state()
            .users
            .iter()
            .find(|u| u.id == id && !u.is_deleted())
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn load_groups(&self) -> Result<Vec<Group>, StorageError> {
        self.enter(StorageOp::LoadGroups).await?;
        Ok(self.state().groups.clone())
    }

    async fn load_group_permissions(&self, group_id: GroupId) -> Result<Vec<PermissionGrant>, StorageError> {
        self.enter(StorageOp::LoadGroupPermissions).await?;
        let state = self.state();
        if state.failing_groups.contains(&group_id) {
            return Err(StorageError::Query(format!("injected failure for group {group_id}")));
        }
        Ok(state.grants.get(&group_id).cloned().unwrap_or_default())
    }

    async fn get_user_group_ids(&self, user_id: UserId) -> Result<Vec<GroupId>, StorageError> {
        self.enter(StorageOp::GetUserGroupIds).await?;
        Ok(self.state().members.get(&user_id).cloned().unwrap_or_default())
    }

    async fn get_session_by_token(&self, token: &str) -> Result<Option<Session>, StorageError> {
        self.enter(StorageOp::GetSessionByToken).await?;
        Ok(self.state().sessions.get(token).cloned())
    }

    async fn save_session(&self, session: &Session) -> Result<(), StorageError> {
        self.enter(StorageOp::SaveSession).await?;
        let mut state = self.state();
        if state.sessions.contains_key(&session.token) {
            return Err(StorageError::Conflict("duplicate session token".to_string()));
        }
        state.sessions.insert(session.token.clone(), session.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(id: i32, name: &str) -> User {
        User::new(UserId::new(id), name, format!("{name}@example.com"), Utc::now())
    }

    #[tokio::test]
    async fn email_logins_match_the_email_column() {
        let storage = InMemoryStorage::new();
        storage.insert_user(user(1, "alice"));

        assert_eq!(storage.load_user_by_username("alice").await.unwrap().id, UserId::new(1));
        assert_eq!(
            storage.load_user_by_username("alice@example.com").await.unwrap().id,
            UserId::new(1)
        );
        assert_eq!(
            storage.load_user_by_username("bob").await.unwrap_err(),
            StorageError::NotFound
        );
    }

    #[tokio::test]
    async fn soft_deleted_users_are_invisible() {
        let storage = InMemoryStorage::new();
        let mut gone = user(2, "gone");
        gone.deleted_at = Some(Utc::now());
        storage.insert_user(gone);

        assert_eq!(storage.load_user_by_id(UserId::new(2)).await.unwrap_err(), StorageError::NotFound);
    }

    #[tokio::test]
    async fn counts_calls_and_injects_failures() {
        let storage = InMemoryStorage::new();
        storage.fail(StorageOp::LoadGroups);

        assert!(matches!(storage.load_groups().await, Err(StorageError::Unavailable(_))));
        assert_eq!(storage.calls(StorageOp::LoadGroups), 1);

        storage.recover(StorageOp::LoadGroups);
        assert!(storage.load_groups().await.unwrap().is_empty());
        assert_eq!(storage.calls(StorageOp::LoadGroups), 2);
    }

    #[tokio::test]
    async fn duplicate_session_token_conflicts() {
        let storage = InMemoryStorage::new();
        let session = Session {
            user_id: UserId::new(1),
            token: "tok".into(),
            platform: "web".into(),
            created_at: Utc::now(),
        };
        storage.save_session(&session).await.unwrap();
        assert!(matches!(storage.save_session(&session).await, Err(StorageError::Conflict(_))));
    }
}

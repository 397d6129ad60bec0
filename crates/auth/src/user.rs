//! User account model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use guildgate_core::{GroupId, UserId};

use crate::group::Group;
use crate::permissions::{Permission, PermissionIndex, Scope};

/// A user account with its effective permissions.
///
/// `permissions` is derived from `groups` by [`User::attach_groups`]; it is
/// empty until groups are attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub groups: Vec<GroupId>,
    #[serde(skip)]
    pub permissions: PermissionIndex,
}

impl User {
    pub fn new(id: UserId, username: impl Into<String>, email: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            username: username.into(),
            email: email.into(),
            password_hash: String::new(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
            groups: Vec::new(),
            permissions: PermissionIndex::new(),
        }
    }

    pub fn with_password_hash(mut self, hash: impl Into<String>) -> Self {
        self.password_hash = hash.into();
        self
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Record membership in `groups` and merge their permission indices.
    ///
    /// Groups are merged in iteration order; on a (scope, name) collision the
    /// later group wins.
    pub fn attach_groups<'a>(&mut self, groups: impl IntoIterator<Item = &'a Group>) {
        for group in groups {
            if !self.groups.contains(&group.id) {
                self.groups.push(group.id);
            }
            self.permissions.merge_from(&group.permissions);
        }
    }

    pub fn permission(&self, scope: Scope, name: &str) -> Permission {
        self.permissions.get(scope, name)
    }
}

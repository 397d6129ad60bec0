//! Group catalog.
//!
//! Loaded once at startup and never refreshed. Lookups are plain map reads on
//! an immutable structure, so the catalog is shared behind an `Arc` without a
//! lock.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, instrument};

use guildgate_auth::{Group, PermissionIndex};
use guildgate_core::{DomainError, GroupId};

use crate::storage::{Storage, StorageError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("failed to list groups: {0}")]
    Unavailable(#[from] StorageError),
}

impl From<CatalogError> for DomainError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Unavailable(e) => DomainError::unavailable(e.to_string()),
        }
    }
}

#[derive(Debug, Default)]
pub struct GroupCatalog {
    groups: HashMap<GroupId, Arc<Group>>,
    order: Vec<GroupId>,
}

impl GroupCatalog {
    /// Build a catalog from already-populated groups.
    pub fn from_groups(groups: impl IntoIterator<Item = Group>) -> Self {
        let mut catalog = Self::default();
        for group in groups {
            catalog.insert(group);
        }
        catalog
    }

    fn insert(&mut self, group: Group) {
        let id = group.id;
        if self.groups.insert(id, Arc::new(group)).is_none() {
            self.order.push(id);
        }
    }

    /// Load every active group and its permissions.
    ///
    /// Failing to list groups is an error. A group whose permissions cannot be
    /// loaded is logged and left out; an invalid row is logged and dropped
    /// while the rest of the group is kept.
    #[instrument(skip(storage))]
    pub async fn load<S>(storage: &S) -> Result<Self, CatalogError>
    where
        S: Storage + ?Sized,
    {
        let groups = storage.load_groups().await?;
        let listed = groups.len();

        let mut catalog = Self::default();
        for mut group in groups {
            let grants = match storage.load_group_permissions(group.id).await {
                Ok(grants) => grants,
                Err(err) => {
                    error!(group_id = %group.id, error = %err, "failed to load group permissions; skipping group");
                    continue;
                }
            };

            let mut permissions = PermissionIndex::new();
            for grant in &grants {
                if let Err(err) = permissions.populate(grant) {
                    error!(group_id = %group.id, error = %err, "invalid permission row; skipping row");
                }
            }

            group.permissions = permissions;
            catalog.insert(group);
        }

        info!(listed, loaded = catalog.len(), "group catalog loaded");
        Ok(catalog)
    }

    pub fn get(&self, id: GroupId) -> Option<Arc<Group>> {
        self.groups.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Groups in load order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Group>> {
        self.order.iter().filter_map(|id| self.groups.get(id))
    }
}

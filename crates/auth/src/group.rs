use serde::{Deserialize, Serialize};

use guildgate_core::GroupId;

use crate::permissions::PermissionIndex;

/// A permission group as loaded at startup.
///
/// Groups form a forest through `parent_id`; the shape is not validated and
/// permissions are not inherited from parents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub parent_id: Option<GroupId>,
    pub name: String,
    pub description: String,
    #[serde(skip)]
    pub permissions: PermissionIndex,
}

impl Group {
    pub fn new(id: GroupId, name: impl Into<String>) -> Self {
        Self {
            id,
            parent_id: None,
            name: name.into(),
            description: String::new(),
            permissions: PermissionIndex::new(),
        }
    }

    pub fn with_parent(mut self, parent: GroupId) -> Self {
        self.parent_id = Some(parent);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_permissions(mut self, permissions: PermissionIndex) -> Self {
        self.permissions = permissions;
        self
    }
}

//! Scoped permission model.
//!
//! A permission is a named capability triple (read / write / delete) that
//! applies within one of four fixed scopes. Each group owns one
//! [`PermissionIndex`]; a user's effective index is the merge of the indices of
//! every group the user belongs to.

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Breadth of an action's effect.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Own,
    Party,
    Guild,
    Global,
}

impl Scope {
    pub const ALL: [Scope; 4] = [Scope::Own, Scope::Party, Scope::Guild, Scope::Global];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Own => "own",
            Scope::Party => "party",
            Scope::Guild => "guild",
            Scope::Global => "global",
        }
    }
}

impl core::fmt::Display for Scope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PermissionError {
    #[error("unknown scope '{0}'")]
    UnknownScope(String),

    #[error("permission name is empty")]
    EmptyName,

    #[error("permission scope is empty")]
    EmptyScope,
}

impl FromStr for Scope {
    type Err = PermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "own" => Ok(Scope::Own),
            "party" => Ok(Scope::Party),
            "guild" => Ok(Scope::Guild),
            "global" => Ok(Scope::Global),
            other => Err(PermissionError::UnknownScope(other.to_string())),
        }
    }
}

/// Capabilities granted for one permission name.
///
/// The zero value (all `false`) doubles as "no such permission".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub name: String,
    pub read: bool,
    pub write: bool,
    pub delete: bool,
}

impl Permission {
    pub fn new(name: impl Into<String>, read: bool, write: bool, delete: bool) -> Self {
        Self {
            name: name.into(),
            read,
            write,
            delete,
        }
    }

    /// `true` when no capability is granted.
    pub fn is_denied(&self) -> bool {
        !(self.read || self.write || self.delete)
    }
}

/// A raw permission row as stored for a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub permission: String,
    pub domain: String,
    pub read: bool,
    pub write: bool,
    pub delete: bool,
}

#[derive(Debug, Clone, Default)]
struct ScopeTable {
    by_name: HashMap<String, Permission>,
    order: Vec<String>,
}

impl ScopeTable {
    fn insert(&mut self, permission: Permission) {
        if !self.by_name.contains_key(&permission.name) {
            self.order.push(permission.name.clone());
        }
        self.by_name.insert(permission.name.clone(), permission);
    }

    fn list(&self) -> Vec<&Permission> {
        self.order.iter().filter_map(|n| self.by_name.get(n)).collect()
    }
}

/// Per-scope permission table.
#[derive(Debug, Clone, Default)]
pub struct PermissionIndex {
    own: ScopeTable,
    party: ScopeTable,
    guild: ScopeTable,
    global: ScopeTable,
}

impl PermissionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, scope: Scope) -> &ScopeTable {
        match scope {
            Scope::Own => &self.own,
            Scope::Party => &self.party,
            Scope::Guild => &self.guild,
            Scope::Global => &self.global,
        }
    }

    fn table_mut(&mut self, scope: Scope) -> &mut ScopeTable {
        match scope {
            Scope::Own => &mut self.own,
            Scope::Party => &mut self.party,
            Scope::Guild => &mut self.guild,
            Scope::Global => &mut self.global,
        }
    }

    /// Store `permission` under `scope`, replacing any entry with the same name.
    pub fn add(&mut self, scope: Scope, permission: Permission) {
        self.table_mut(scope).insert(permission);
    }

    /// Store `permission` under a scope given as text.
    ///
    /// Unknown scopes are logged and the permission is dropped. Returns whether
    /// the permission was stored.
    pub fn add_raw(&mut self, scope: &str, permission: Permission) -> bool {
        match scope.parse::<Scope>() {
            Ok(scope) => {
                self.add(scope, permission);
                true
            }
            Err(err) => {
                tracing::error!(scope, permission = %permission.name, error = %err, "dropping permission with unknown scope");
                false
            }
        }
    }

    /// Validate a stored grant and add it.
    ///
    /// An unknown scope is not an error here; see [`PermissionIndex::add_raw`].
    pub fn populate(&mut self, grant: &PermissionGrant) -> Result<(), PermissionError> {
        if grant.permission.is_empty() {
            return Err(PermissionError::EmptyName);
        }
        if grant.domain.is_empty() {
            return Err(PermissionError::EmptyScope);
        }

        let permission = Permission::new(grant.permission.clone(), grant.read, grant.write, grant.delete);
        self.add_raw(&grant.domain, permission);
        Ok(())
    }

    /// Look up a permission; absent entries come back as the all-false value.
    pub fn get(&self, scope: Scope, name: &str) -> Permission {
        self.table(scope)
            .by_name
            .get(name)
            .cloned()
            .unwrap_or_else(|| Permission {
                name: name.to_string(),
                ..Permission::default()
            })
    }

    /// Permissions of one scope in first-insertion order.
    pub fn list(&self, scope: Scope) -> Vec<&Permission> {
        self.table(scope).list()
    }

    pub fn count(&self) -> usize {
        Scope::ALL.iter().map(|s| self.table(*s).by_name.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Copy every entry of `other` into `self`. Entries of `other` overwrite
    /// entries already present under the same (scope, name).
    pub fn merge_from(&mut self, other: &PermissionIndex) {
        for scope in Scope::ALL {
            for permission in other.list(scope) {
                self.add(scope, permission.clone());
            }
        }
    }
}

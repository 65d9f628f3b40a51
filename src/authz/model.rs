// Permission resolution over the role table

use crate::authz::permissions::{Permission, Role, RolePermissionEntry, ROLE_TABLE};
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

/// Read-only mapping from roles to permission sets
///
/// Built once at startup and shared without locking. Lookups for roles with no
/// entry are denied.
#[derive(Debug, Clone)]
pub struct PermissionModel {
    entries: HashMap<Role, RolePermissionEntry>,
}

impl PermissionModel {
    /// Model over the built-in role table
    pub fn standard() -> Self {
        Self::from_entries(ROLE_TABLE.iter().cloned())
    }

    pub fn from_entries(entries: impl IntoIterator<Item = RolePermissionEntry>) -> Self {
        Self {
            entries: entries.into_iter().map(|e| (e.role, e)).collect(),
        }
    }

    /// Whether `role` may perform `permission`
    pub fn has_permission(&self, role: Role, permission: Permission) -> bool {
        self.entries
            .get(&role)
            .map(|entry| entry.grants(permission))
            .unwrap_or(false)
    }

    /// Same as `has_permission` for a role name taken off the wire
    pub fn role_name_has_permission(&self, role: &str, permission: Permission) -> bool {
        match Role::from_str(role) {
            Ok(role) => self.has_permission(role, permission),
            Err(_) => {
                tracing::debug!(role = %role, "Unknown role denied");
                false
            }
        }
    }

    /// Explicitly listed permissions of `role`; empty for unknown roles
    pub fn permissions_for(&self, role: Role) -> BTreeSet<Permission> {
        self.entries
            .get(&role)
            .map(|entry| entry.permissions.iter().copied().collect())
            .unwrap_or_default()
    }

    /// True iff every required permission is held
    pub fn can_access(&self, role: Role, required: &[Permission]) -> bool {
        required.iter().all(|p| self.has_permission(role, *p))
    }

    pub fn role_config(&self, role: Role) -> Option<&RolePermissionEntry> {
        self.entries.get(&role)
    }

    /// All entries, most privileged first
    pub fn all_roles(&self) -> Vec<&RolePermissionEntry> {
        let mut roles: Vec<_> = self.entries.values().collect();
        roles.sort_by(|a, b| b.level.cmp(&a.level));
        roles
    }
}

impl Default for PermissionModel {
    fn default() -> Self {
        Self::standard()
    }
}

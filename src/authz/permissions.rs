// Roles, permissions and the static role table

use crate::errors::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Permission
// ============================================================================

/// A capability scoped to a `resource:action` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Permission {
    // Dashboard
    #[serde(rename = "dashboard:view")]
    DashboardView,
    #[serde(rename = "dashboard:edit")]
    DashboardEdit,
    // Scans
    #[serde(rename = "scan:quick")]
    ScanQuick,
    #[serde(rename = "scan:full")]
    ScanFull,
    #[serde(rename = "scan:custom")]
    ScanCustom,
    #[serde(rename = "scan:ai_deep")]
    ScanAiDeep,
    #[serde(rename = "scan:schedule")]
    ScanSchedule,
    #[serde(rename = "scan:cancel")]
    ScanCancel,
    // Quarantine
    #[serde(rename = "quarantine:view")]
    QuarantineView,
    #[serde(rename = "quarantine:restore")]
    QuarantineRestore,
    #[serde(rename = "quarantine:delete")]
    QuarantineDelete,
    // Threats
    #[serde(rename = "threats:view")]
    ThreatsView,
    #[serde(rename = "threats:quarantine")]
    ThreatsQuarantine,
    #[serde(rename = "threats:delete")]
    ThreatsDelete,
    #[serde(rename = "threats:whitelist")]
    ThreatsWhitelist,
    // Analytics
    #[serde(rename = "analytics:view")]
    AnalyticsView,
    #[serde(rename = "analytics:export")]
    AnalyticsExport,
    // AI features
    #[serde(rename = "ai:view")]
    AiView,
    #[serde(rename = "ai:configure")]
    AiConfigure,
    #[serde(rename = "ai:run_analysis")]
    AiRunAnalysis,
    // Settings
    #[serde(rename = "settings:view")]
    SettingsView,
    #[serde(rename = "settings:edit")]
    SettingsEdit,
    #[serde(rename = "settings:exclusions")]
    SettingsExclusions,
    // Team
    #[serde(rename = "team:view")]
    TeamView,
    #[serde(rename = "team:manage")]
    TeamManage,
    #[serde(rename = "team:invite")]
    TeamInvite,
    // Admin
    #[serde(rename = "admin:full")]
    AdminFull,
    #[serde(rename = "admin:users")]
    AdminUsers,
    #[serde(rename = "admin:audit_logs")]
    AdminAuditLogs,
    #[serde(rename = "admin:system_config")]
    AdminSystemConfig,
}

impl Permission {
    /// Grants every other permission when held
    pub const SENTINEL: Permission = Permission::AdminFull;

    pub const ALL: [Permission; 30] = [
        Permission::DashboardView,
        Permission::DashboardEdit,
        Permission::ScanQuick,
        Permission::ScanFull,
        Permission::ScanCustom,
        Permission::ScanAiDeep,
        Permission::ScanSchedule,
        Permission::ScanCancel,
        Permission::QuarantineView,
        Permission::QuarantineRestore,
        Permission::QuarantineDelete,
        Permission::ThreatsView,
        Permission::ThreatsQuarantine,
        Permission::ThreatsDelete,
        Permission::ThreatsWhitelist,
        Permission::AnalyticsView,
        Permission::AnalyticsExport,
        Permission::AiView,
        Permission::AiConfigure,
        Permission::AiRunAnalysis,
        Permission::SettingsView,
        Permission::SettingsEdit,
        Permission::SettingsExclusions,
        Permission::TeamView,
        Permission::TeamManage,
        Permission::TeamInvite,
        Permission::AdminFull,
        Permission::AdminUsers,
        Permission::AdminAuditLogs,
        Permission::AdminSystemConfig,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::DashboardView => "dashboard:view",
            Permission::DashboardEdit => "dashboard:edit",
            Permission::ScanQuick => "scan:quick",
            Permission::ScanFull => "scan:full",
            Permission::ScanCustom => "scan:custom",
            Permission::ScanAiDeep => "scan:ai_deep",
            Permission::ScanSchedule => "scan:schedule",
            Permission::ScanCancel => "scan:cancel",
            Permission::QuarantineView => "quarantine:view",
            Permission::QuarantineRestore => "quarantine:restore",
            Permission::QuarantineDelete => "quarantine:delete",
            Permission::ThreatsView => "threats:view",
            Permission::ThreatsQuarantine => "threats:quarantine",
            Permission::ThreatsDelete => "threats:delete",
            Permission::ThreatsWhitelist => "threats:whitelist",
            Permission::AnalyticsView => "analytics:view",
            Permission::AnalyticsExport => "analytics:export",
            Permission::AiView => "ai:view",
            Permission::AiConfigure => "ai:configure",
            Permission::AiRunAnalysis => "ai:run_analysis",
            Permission::SettingsView => "settings:view",
            Permission::SettingsEdit => "settings:edit",
            Permission::SettingsExclusions => "settings:exclusions",
            Permission::TeamView => "team:view",
            Permission::TeamManage => "team:manage",
            Permission::TeamInvite => "team:invite",
            Permission::AdminFull => "admin:full",
            Permission::AdminUsers => "admin:users",
            Permission::AdminAuditLogs => "admin:audit_logs",
            Permission::AdminSystemConfig => "admin:system_config",
        }
    }

    /// Resource half of the `resource:action` pair
    pub fn resource(&self) -> &'static str {
        let s = self.as_str();
        s.split_once(':').map(|(resource, _)| resource).unwrap_or(s)
    }

    /// Action half of the `resource:action` pair
    pub fn action(&self) -> &'static str {
        let s = self.as_str();
        s.split_once(':').map(|(_, action)| action).unwrap_or(s)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| AppError::ValidationError(format!("Unknown permission '{}'", s)))
    }
}

// ============================================================================
// Role
// ============================================================================

/// Privilege tier assigned to a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    SecurityAnalyst,
    Viewer,
    Readonly,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::SuperAdmin,
        Role::Admin,
        Role::SecurityAnalyst,
        Role::Viewer,
        Role::Readonly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::Admin => "admin",
            Role::SecurityAnalyst => "security_analyst",
            Role::Viewer => "viewer",
            Role::Readonly => "readonly",
        }
    }

    /// Privilege level; higher means more privileged
    pub fn level(&self) -> u32 {
        match self {
            Role::SuperAdmin => 100,
            Role::Admin => 80,
            Role::SecurityAnalyst => 50,
            Role::Viewer => 20,
            Role::Readonly => 10,
        }
    }

    /// Strictly more privileged than `other`
    pub fn outranks(&self, other: Role) -> bool {
        self.level() > other.level()
    }
}

impl PartialOrd for Role {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

// Roles order by privilege level
impl Ord for Role {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.level().cmp(&other.level())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| AppError::ValidationError(format!("Unknown role '{}'", s)))
    }
}

// ============================================================================
// Role table
// ============================================================================

/// Static binding of a role to its display data and permission set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RolePermissionEntry {
    pub role: Role,
    pub name: &'static str,
    pub description: &'static str,
    pub level: u32,
    pub permissions: &'static [Permission],
}

impl RolePermissionEntry {
    pub fn grants(&self, permission: Permission) -> bool {
        self.permissions.contains(&Permission::SENTINEL) || self.permissions.contains(&permission)
    }
}

use Permission::*;

const SUPER_ADMIN_PERMISSIONS: &[Permission] = &[
    DashboardView, DashboardEdit,
    ScanQuick, ScanFull, ScanCustom, ScanAiDeep, ScanSchedule, ScanCancel,
    QuarantineView, QuarantineRestore, QuarantineDelete,
    ThreatsView, ThreatsQuarantine, ThreatsDelete, ThreatsWhitelist,
    AnalyticsView, AnalyticsExport,
    AiView, AiConfigure, AiRunAnalysis,
    SettingsView, SettingsEdit, SettingsExclusions,
    TeamView, TeamManage, TeamInvite,
    AdminFull, AdminUsers, AdminAuditLogs, AdminSystemConfig,
];

const ADMIN_PERMISSIONS: &[Permission] = &[
    DashboardView, DashboardEdit,
    ScanQuick, ScanFull, ScanCustom, ScanAiDeep, ScanSchedule, ScanCancel,
    QuarantineView, QuarantineRestore, QuarantineDelete,
    ThreatsView, ThreatsQuarantine, ThreatsDelete, ThreatsWhitelist,
    AnalyticsView, AnalyticsExport,
    AiView, AiConfigure, AiRunAnalysis,
    SettingsView, SettingsEdit, SettingsExclusions,
    TeamView, TeamManage, TeamInvite,
    AdminAuditLogs,
];

const SECURITY_ANALYST_PERMISSIONS: &[Permission] = &[
    DashboardView,
    ScanQuick, ScanFull, ScanCustom, ScanAiDeep,
    QuarantineView, QuarantineRestore,
    ThreatsView, ThreatsQuarantine,
    AnalyticsView, AnalyticsExport,
    AiView, AiRunAnalysis,
    SettingsView,
];

const VIEWER_PERMISSIONS: &[Permission] = &[
    DashboardView,
    ScanQuick,
    QuarantineView,
    ThreatsView,
    AnalyticsView,
    AiView,
    SettingsView,
];

const READONLY_PERMISSIONS: &[Permission] = &[DashboardView, ThreatsView, AnalyticsView];

/// The built-in role table, most privileged first
pub const ROLE_TABLE: [RolePermissionEntry; 5] = [
    RolePermissionEntry {
        role: Role::SuperAdmin,
        name: "Super Administrator",
        description: "Full system access with all permissions including user management and system configuration",
        level: 100,
        permissions: SUPER_ADMIN_PERMISSIONS,
    },
    RolePermissionEntry {
        role: Role::Admin,
        name: "Administrator",
        description: "Administrative access with most permissions except critical system changes",
        level: 80,
        permissions: ADMIN_PERMISSIONS,
    },
    RolePermissionEntry {
        role: Role::SecurityAnalyst,
        name: "Security Analyst",
        description: "Security team member with access to scans, threats, and analytics",
        level: 50,
        permissions: SECURITY_ANALYST_PERMISSIONS,
    },
    RolePermissionEntry {
        role: Role::Viewer,
        name: "Viewer",
        description: "Read-only access to dashboard and analytics",
        level: 20,
        permissions: VIEWER_PERMISSIONS,
    },
    RolePermissionEntry {
        role: Role::Readonly,
        name: "Read Only",
        description: "Minimal read-only access to basic information",
        level: 10,
        permissions: READONLY_PERMISSIONS,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_round_trips_through_wire_string() {
        for permission in Permission::ALL {
            let parsed: Permission = permission.as_str().parse().unwrap();
            assert_eq!(parsed, permission);
        }
        assert!("scan:nuke".parse::<Permission>().is_err());
    }

    #[test]
    fn test_permission_serde_uses_wire_string() {
        let json = serde_json::to_string(&Permission::QuarantineRestore).unwrap();
        assert_eq!(json, "\"quarantine:restore\"");
        assert_eq!(Permission::ScanAiDeep.resource(), "scan");
        assert_eq!(Permission::ScanAiDeep.action(), "ai_deep");
    }

    #[test]
    fn test_role_order_follows_level() {
        assert!(Role::SuperAdmin > Role::Admin);
        assert!(Role::Admin > Role::SecurityAnalyst);
        assert!(Role::SecurityAnalyst > Role::Viewer);
        assert!(Role::Viewer > Role::Readonly);
        assert!(Role::Admin.outranks(Role::Viewer));
        assert!(!Role::Viewer.outranks(Role::Viewer));
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("security_analyst".parse::<Role>().unwrap(), Role::SecurityAnalyst);
        assert!("root".parse::<Role>().is_err());
        assert_eq!(
            serde_json::to_string(&Role::SuperAdmin).unwrap(),
            "\"super_admin\""
        );
    }

    #[test]
    fn test_role_table_levels_match_roles() {
        for entry in ROLE_TABLE.iter() {
            assert_eq!(entry.level, entry.role.level());
        }
    }

    #[test]
    fn test_only_super_admin_holds_sentinel() {
        let holders: Vec<Role> = ROLE_TABLE
            .iter()
            .filter(|e| e.permissions.contains(&Permission::SENTINEL))
            .map(|e| e.role)
            .collect();
        assert_eq!(holders, vec![Role::SuperAdmin]);
    }
}

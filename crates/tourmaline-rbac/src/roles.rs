//! Role definitions.
//!
//! Three roles with escalating privileges:
//! - Viewer: public columns only (most restrictive)
//! - Analyst: explicitly granted columns
//! - Admin: everything (least restrictive)

use serde::{Deserialize, Serialize};

/// Role in the access control system.
///
/// Roles are ordered from least to most privileged:
/// Viewer < Analyst < Admin
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Read-only access to columns flagged public in the catalog, plus
    /// any explicit grants.
    ///
    /// **Use Cases:**
    /// - Dashboards and read-only integrations
    /// - External reviewers
    Viewer,

    /// Access to explicitly granted tables and columns only.
    ///
    /// **Use Cases:**
    /// - Business intelligence analysts
    /// - Data scientists working on approved column sets
    Analyst,

    /// Full access to every table and column.
    ///
    /// Admin bypasses the permission lookup entirely, but every admin
    /// query is still audited.
    ///
    /// **Use Cases:**
    /// - System administrators
    /// - Emergency break-glass access
    Admin,
}

impl Role {
    /// Returns whether this role skips the permission lookup.
    pub fn bypasses_permission_checks(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Returns whether this role may read catalog-public columns without
    /// an explicit grant.
    pub fn reads_public_columns(&self) -> bool {
        match self {
            Role::Viewer => true,
            Role::Analyst => false,
            Role::Admin => true, // Subsumed by the full bypass.
        }
    }

    /// Returns the role name as stored in audit records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::Analyst => "analyst",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

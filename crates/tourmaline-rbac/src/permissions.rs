//! Explicit permission rows and the permission store collaborator.

use std::collections::BTreeMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tourmaline_types::{ColumnName, TableName, UserId};
use tracing::info;

/// Whether a permission row grants or denies access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Grant,
    Deny,
}

/// One explicit permission row.
///
/// `column = None` is a table-wide rule covering every column of the table
/// unless a narrower rule exists for a specific column. Rows are unique per
/// `(user, table, column)` tuple; re-granting replaces the level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub user_id: UserId,
    pub table: TableName,
    pub column: Option<ColumnName>,
    pub level: AccessLevel,
}

impl Permission {
    /// Creates a grant row.
    pub fn grant(
        user_id: UserId,
        table: impl Into<TableName>,
        column: Option<impl Into<ColumnName>>,
    ) -> Self {
        Self {
            user_id,
            table: table.into(),
            column: column.map(Into::into),
            level: AccessLevel::Grant,
        }
    }

    /// Creates a deny row.
    pub fn deny(
        user_id: UserId,
        table: impl Into<TableName>,
        column: Option<impl Into<ColumnName>>,
    ) -> Self {
        Self {
            user_id,
            table: table.into(),
            column: column.map(Into::into),
            level: AccessLevel::Deny,
        }
    }

    /// Returns whether this row covers all columns of its table.
    pub fn is_table_wide(&self) -> bool {
        self.column.is_none()
    }
}

/// Permission store collaborator.
///
/// Reads must be atomic point reads: a concurrent grant or revoke is
/// observed entirely or not at all, never half-applied.
pub trait PermissionStore: Send + Sync {
    /// Returns every permission row for `user`.
    fn permissions_for(&self, user: UserId) -> Vec<Permission>;
}

/// Key enforcing row uniqueness per `(table, column)` within a user.
type RuleKey = (TableName, Option<ColumnName>);

/// In-memory permission store.
#[derive(Debug, Default)]
pub struct MemoryPermissionStore {
    rows: RwLock<BTreeMap<UserId, BTreeMap<RuleKey, AccessLevel>>>,
}

impl MemoryPermissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts (or replaces) a permission row.
    pub fn grant(&self, permission: Permission) {
        info!(
            user = %permission.user_id,
            table = %permission.table,
            column = ?permission.column,
            level = ?permission.level,
            "permission row installed"
        );

        let mut rows = self.rows.write().expect("permission lock poisoned");
        rows.entry(permission.user_id)
            .or_default()
            .insert((permission.table, permission.column), permission.level);
    }

    /// Removes a permission row if present.
    pub fn revoke(&self, user: UserId, table: &TableName, column: Option<&ColumnName>) {
        let mut rows = self.rows.write().expect("permission lock poisoned");
        if let Some(user_rows) = rows.get_mut(&user) {
            user_rows.remove(&(table.clone(), column.cloned()));
        }
    }
}

impl PermissionStore for MemoryPermissionStore {
    fn permissions_for(&self, user: UserId) -> Vec<Permission> {
        let rows = self.rows.read().expect("permission lock poisoned");
        rows.get(&user)
            .map(|user_rows| {
                user_rows
                    .iter()
                    .map(|((table, column), level)| Permission {
                        user_id: user,
                        table: table.clone(),
                        column: column.clone(),
                        level: *level,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_and_lookup() {
        let store = MemoryPermissionStore::new();
        let user = UserId::new(1);

        store.grant(Permission::grant(user, "employees", Some("name")));
        store.grant(Permission::grant(user, "employees", None::<&str>));

        let rows = store.permissions_for(user);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().any(Permission::is_table_wide));
    }

    #[test]
    fn test_rows_unique_per_tuple() {
        let store = MemoryPermissionStore::new();
        let user = UserId::new(1);

        store.grant(Permission::grant(user, "employees", Some("ssn")));
        store.grant(Permission::deny(user, "employees", Some("ssn")));

        let rows = store.permissions_for(user);
        assert_eq!(rows.len(), 1, "re-grant must replace, not duplicate");
        assert_eq!(rows[0].level, AccessLevel::Deny);
    }

    #[test]
    fn test_revoke() {
        let store = MemoryPermissionStore::new();
        let user = UserId::new(1);

        store.grant(Permission::grant(user, "employees", Some("name")));
        store.revoke(user, &"employees".into(), Some(&"name".into()));

        assert!(store.permissions_for(user).is_empty());
    }

    #[test]
    fn test_users_isolated() {
        let store = MemoryPermissionStore::new();
        store.grant(Permission::grant(UserId::new(1), "employees", Some("name")));

        assert!(store.permissions_for(UserId::new(2)).is_empty());
    }
}

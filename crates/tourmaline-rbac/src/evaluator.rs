//! The permission decision table.

use tourmaline_types::{ColumnName, SchemaCatalog, TableName};
use tracing::{info, warn};

use crate::permissions::{AccessLevel, Permission};
use crate::roles::Role;

/// Outcome of evaluating a reference set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Every referenced pair passed.
    Allow,
    /// A pair failed; `table.column` is the reason reported to the caller
    /// and recorded in the audit log.
    Deny {
        table: TableName,
        column: ColumnName,
    },
}

impl Verdict {
    /// Returns the denial reason as `table.column`, if denied.
    pub fn reason(&self) -> Option<String> {
        match self {
            Verdict::Allow => None,
            Verdict::Deny { table, column } => Some(format!("{table}.{column}")),
        }
    }
}

/// Evaluates a reference set against a user's role and explicit rows.
///
/// Pairs are checked in the order given; the first failing pair becomes
/// the verdict's reason, so callers should pass a deterministic order.
pub fn evaluate<'a>(
    role: Role,
    permissions: &[Permission],
    pairs: impl IntoIterator<Item = (&'a TableName, &'a ColumnName)>,
    catalog: &dyn SchemaCatalog,
) -> Verdict {
    for (table, column) in pairs {
        if !pair_allowed(role, permissions, table, column, catalog) {
            warn!(
                role = %role,
                table = %table,
                column = %column,
                "column access denied"
            );
            return Verdict::Deny {
                table: table.clone(),
                column: column.clone(),
            };
        }
    }

    info!(role = %role, "all referenced columns allowed");
    Verdict::Allow
}

/// The decision table for a single `(table, column)` pair.
///
/// Most specific explicit rule wins; explicit deny beats grant at equal
/// specificity; default is deny.
fn pair_allowed(
    role: Role,
    permissions: &[Permission],
    table: &TableName,
    column: &ColumnName,
    catalog: &dyn SchemaCatalog,
) -> bool {
    // 1. Admin bypasses the lookup (still audited by the orchestrator).
    if role.bypasses_permission_checks() {
        return true;
    }

    let rules_for_table = || permissions.iter().filter(|p| p.table == *table);

    // 2-3. Column-level rules are the most specific.
    let column_levels: Vec<AccessLevel> = rules_for_table()
        .filter(|p| p.column.as_ref() == Some(column))
        .map(|p| p.level)
        .collect();
    if column_levels.contains(&AccessLevel::Deny) {
        return false;
    }
    if column_levels.contains(&AccessLevel::Grant) {
        return true;
    }

    // 4-5. Table-wide rules.
    let table_levels: Vec<AccessLevel> = rules_for_table()
        .filter(|p| p.is_table_wide())
        .map(|p| p.level)
        .collect();
    if table_levels.contains(&AccessLevel::Deny) {
        return false;
    }
    if table_levels.contains(&AccessLevel::Grant) {
        return true;
    }

    // 6. Viewers may read catalog-public columns.
    if role.reads_public_columns() && catalog.is_public(table, column) {
        return true;
    }

    // 7. Default deny.
    false
}

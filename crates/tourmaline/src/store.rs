//! The execution store collaborator and a minimal in-memory
//! implementation for development and tests.

use std::collections::BTreeMap;
use std::sync::RwLock;

use sqlparser::ast::{Expr, SelectItem, SetExpr, Statement, TableFactor, Value as SqlValue};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use thiserror::Error;
use tourmaline_types::{ColumnName, TableName, Value};

/// Error from the underlying relational store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Generic store fault.
    #[error("store fault: {0}")]
    Fault(String),

    /// The bounded statement timeout elapsed. Classified by the engine as
    /// an execution error, never a denial.
    #[error("statement timed out after {0} ms")]
    Timeout(u64),

    /// The store does not know the table.
    #[error("table not found: {0}")]
    TableNotFound(String),
}

/// Result of executing a statement.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// Column names in result order.
    pub columns: Vec<ColumnName>,
    /// Result rows, aligned with `columns`.
    pub rows: Vec<Vec<Value>>,
}

/// Execution store collaborator.
///
/// The engine runs a statement only after the evaluator has allowed every
/// column it references. Calls are synchronous with a bounded timeout
/// owned by the implementation.
pub trait ExecutionStore: Send + Sync {
    /// Opens a transaction scope.
    fn begin(&self) -> Result<(), StoreError>;

    /// Executes one statement and returns its rows.
    fn execute(&self, sql: &str) -> Result<ResultSet, StoreError>;

    /// Commits the transaction scope.
    fn commit(&self) -> Result<(), StoreError>;

    /// Rewrites every value of one column in place.
    ///
    /// Used when a column is first secured (plaintext -> ciphertext) and
    /// on explicit re-encryption after key rotation.
    fn rewrite_column(
        &self,
        table: &TableName,
        column: &ColumnName,
        f: &dyn Fn(&Value) -> Result<Value, StoreError>,
    ) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
struct MemoryTable {
    columns: Vec<ColumnName>,
    rows: Vec<Vec<Value>>,
}

/// In-memory execution store.
///
/// Supports the SELECT subset the integration tests and development
/// tooling need: a column list or `*`, one table, and an optional
/// single-column equality filter. Rows are loaded through
/// [`MemoryStore::insert_row`] rather than INSERT statements.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<BTreeMap<TableName, MemoryTable>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates (or replaces) a table.
    pub fn create_table(&self, table: impl Into<TableName>, columns: Vec<ColumnName>) {
        let mut tables = self.tables.write().expect("store lock poisoned");
        tables.insert(
            table.into(),
            MemoryTable {
                columns,
                rows: Vec::new(),
            },
        );
    }

    /// Appends one row; values align with the table's column order.
    pub fn insert_row(&self, table: &TableName, row: Vec<Value>) -> Result<(), StoreError> {
        let mut tables = self.tables.write().expect("store lock poisoned");
        let t = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
        if row.len() != t.columns.len() {
            return Err(StoreError::Fault(format!(
                "row has {} values but table {table} has {} columns",
                row.len(),
                t.columns.len()
            )));
        }
        t.rows.push(row);
        Ok(())
    }
}

impl ExecutionStore for MemoryStore {
    fn begin(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn execute(&self, sql: &str) -> Result<ResultSet, StoreError> {
        let dialect = GenericDialect {};
        let statements =
            Parser::parse_sql(&dialect, sql).map_err(|e| StoreError::Fault(e.to_string()))?;
        if statements.len() != 1 {
            return Err(StoreError::Fault(format!(
                "expected exactly 1 statement, got {}",
                statements.len()
            )));
        }

        let Statement::Query(query) = &statements[0] else {
            return Err(StoreError::Fault(
                "memory store only executes SELECT".to_string(),
            ));
        };
        let SetExpr::Select(select) = query.body.as_ref() else {
            return Err(StoreError::Fault(
                "memory store only executes simple SELECT".to_string(),
            ));
        };

        if select.from.len() != 1 || !select.from[0].joins.is_empty() {
            return Err(StoreError::Fault(
                "memory store only executes single-table SELECT".to_string(),
            ));
        }
        let table_name = match &select.from[0].relation {
            TableFactor::Table { name, .. } => TableName::from(
                name.0
                    .iter()
                    .map(|i| i.value.clone())
                    .collect::<Vec<_>>()
                    .join("."),
            ),
            other => {
                return Err(StoreError::Fault(format!(
                    "unsupported FROM clause: {other:?}"
                )));
            }
        };

        let tables = self.tables.read().expect("store lock poisoned");
        let table = tables
            .get(&table_name)
            .ok_or_else(|| StoreError::TableNotFound(table_name.to_string()))?;

        // Projection: `*` or a list of plain column names.
        let mut projected: Vec<usize> = Vec::new();
        let mut columns: Vec<ColumnName> = Vec::new();
        for item in &select.projection {
            match item {
                SelectItem::Wildcard(_) => {
                    for (idx, col) in table.columns.iter().enumerate() {
                        projected.push(idx);
                        columns.push(col.clone());
                    }
                }
                SelectItem::UnnamedExpr(Expr::Identifier(ident)) => {
                    let idx = table
                        .columns
                        .iter()
                        .position(|c| c.as_str() == ident.value)
                        .ok_or_else(|| {
                            StoreError::Fault(format!("unknown column: {}", ident.value))
                        })?;
                    projected.push(idx);
                    columns.push(table.columns[idx].clone());
                }
                other => {
                    return Err(StoreError::Fault(format!(
                        "unsupported projection: {other:?}"
                    )));
                }
            }
        }

        // Optional `WHERE column = literal`.
        let filter = match &select.selection {
            None => None,
            Some(Expr::BinaryOp { left, op, right })
                if matches!(op, sqlparser::ast::BinaryOperator::Eq) =>
            {
                let (Expr::Identifier(ident), value) = (left.as_ref(), right.as_ref()) else {
                    return Err(StoreError::Fault("unsupported WHERE clause".to_string()));
                };
                let idx = table
                    .columns
                    .iter()
                    .position(|c| c.as_str() == ident.value)
                    .ok_or_else(|| StoreError::Fault(format!("unknown column: {}", ident.value)))?;
                Some((idx, literal_value(value)?))
            }
            Some(other) => {
                return Err(StoreError::Fault(format!(
                    "unsupported WHERE clause: {other:?}"
                )));
            }
        };

        let rows = table
            .rows
            .iter()
            .filter(|row| {
                filter
                    .as_ref()
                    .is_none_or(|(idx, value)| &row[*idx] == value)
            })
            .map(|row| projected.iter().map(|idx| row[*idx].clone()).collect())
            .collect();

        Ok(ResultSet { columns, rows })
    }

    fn commit(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn rewrite_column(
        &self,
        table: &TableName,
        column: &ColumnName,
        f: &dyn Fn(&Value) -> Result<Value, StoreError>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().expect("store lock poisoned");
        let t = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
        let idx = t
            .columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| StoreError::Fault(format!("unknown column: {column}")))?;

        for row in &mut t.rows {
            row[idx] = f(&row[idx])?;
        }
        Ok(())
    }
}

fn literal_value(expr: &Expr) -> Result<Value, StoreError> {
    match expr {
        Expr::Value(SqlValue::Number(n, _)) => n
            .parse::<i64>()
            .map(Value::BigInt)
            .map_err(|_| StoreError::Fault(format!("invalid number literal: {n}"))),
        Expr::Value(SqlValue::SingleQuotedString(s)) => Ok(Value::Text(s.clone())),
        Expr::Value(SqlValue::Boolean(b)) => Ok(Value::Boolean(*b)),
        Expr::Value(SqlValue::Null) => Ok(Value::Null),
        other => Err(StoreError::Fault(format!(
            "unsupported literal: {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store.create_table(
            "employees",
            vec!["id".into(), "name".into(), "salary".into()],
        );
        store
            .insert_row(
                &"employees".into(),
                vec![
                    Value::BigInt(1),
                    Value::Text("alice".into()),
                    Value::BigInt(120_000),
                ],
            )
            .expect("insert failed");
        store
            .insert_row(
                &"employees".into(),
                vec![
                    Value::BigInt(2),
                    Value::Text("bob".into()),
                    Value::BigInt(95_000),
                ],
            )
            .expect("insert failed");
        store
    }

    #[test]
    fn test_select_columns() {
        let result = store()
            .execute("SELECT name FROM employees")
            .expect("query failed");
        assert_eq!(result.columns, vec![ColumnName::from("name")]);
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0][0], Value::Text("alice".into()));
    }

    #[test]
    fn test_select_star() {
        let result = store()
            .execute("SELECT * FROM employees")
            .expect("query failed");
        assert_eq!(result.columns.len(), 3);
    }

    #[test]
    fn test_where_equality() {
        let result = store()
            .execute("SELECT name FROM employees WHERE id = 2")
            .expect("query failed");
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0][0], Value::Text("bob".into()));
    }

    #[test]
    fn test_unknown_table() {
        let result = store().execute("SELECT x FROM missing");
        assert!(matches!(result, Err(StoreError::TableNotFound(_))));
    }

    #[test]
    fn test_row_arity_checked() {
        let store = store();
        let result = store.insert_row(&"employees".into(), vec![Value::BigInt(3)]);
        assert!(matches!(result, Err(StoreError::Fault(_))));
    }

    #[test]
    fn test_rewrite_column() {
        let store = store();
        store
            .rewrite_column(&"employees".into(), &"salary".into(), &|v| match v {
                Value::BigInt(n) => Ok(Value::BigInt(n + 1)),
                other => Ok(other.clone()),
            })
            .expect("rewrite failed");

        let result = store
            .execute("SELECT salary FROM employees WHERE id = 1")
            .expect("query failed");
        assert_eq!(result.rows[0][0], Value::BigInt(120_001));
    }
}

//! The resolved reference set of a SQL statement.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tourmaline_types::{ColumnName, TableName};

/// The set of tables and, per table, the set of columns a statement reads.
///
/// Produced only after wildcard expansion, so every entry is a concrete
/// column name. Tables and columns are kept in sorted order, which makes
/// the "first failing pair" reported by the evaluator deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryReference {
    tables: BTreeMap<TableName, BTreeSet<ColumnName>>,
}

impl QueryReference {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `table` is touched, without naming a column yet.
    pub fn add_table(&mut self, table: TableName) {
        self.tables.entry(table).or_default();
    }

    /// Records that `column` of `table` is read.
    pub fn add_column(&mut self, table: TableName, column: ColumnName) {
        self.tables.entry(table).or_default().insert(column);
    }

    /// Returns whether no table is referenced at all.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Iterates over referenced tables in sorted order.
    pub fn tables(&self) -> impl Iterator<Item = &TableName> {
        self.tables.keys()
    }

    /// Returns the columns read from `table` (empty if only the table
    /// itself is touched).
    pub fn columns_of(&self, table: &TableName) -> Vec<&ColumnName> {
        self.tables
            .get(table)
            .map(|cols| cols.iter().collect())
            .unwrap_or_default()
    }

    /// Iterates over every `(table, column)` pair in sorted order.
    pub fn pairs(&self) -> impl Iterator<Item = (&TableName, &ColumnName)> {
        self.tables
            .iter()
            .flat_map(|(table, cols)| cols.iter().map(move |col| (table, col)))
    }

    /// Table names as plain strings, for audit records.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().map(ToString::to_string).collect()
    }

    /// Column names qualified as `table.column`, for audit records.
    pub fn column_names(&self) -> Vec<String> {
        self.pairs()
            .map(|(table, col)| format!("{table}.{col}"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pairs_sorted() {
        let mut refs = QueryReference::new();
        refs.add_column("b_table".into(), "z".into());
        refs.add_column("b_table".into(), "a".into());
        refs.add_column("a_table".into(), "m".into());

        let pairs: Vec<String> = refs
            .pairs()
            .map(|(t, c)| format!("{t}.{c}"))
            .collect();
        assert_eq!(pairs, vec!["a_table.m", "b_table.a", "b_table.z"]);
    }

    #[test]
    fn test_table_without_columns() {
        let mut refs = QueryReference::new();
        refs.add_table("events".into());

        assert!(!refs.is_empty());
        assert_eq!(refs.columns_of(&"events".into()).len(), 0);
        assert_eq!(refs.pairs().count(), 0);
        assert_eq!(refs.table_names(), vec!["events"]);
    }

    #[test]
    fn test_duplicate_column_deduplicated() {
        let mut refs = QueryReference::new();
        refs.add_column("t".into(), "c".into());
        refs.add_column("t".into(), "c".into());

        assert_eq!(refs.pairs().count(), 1);
    }
}

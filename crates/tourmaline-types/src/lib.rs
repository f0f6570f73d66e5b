//! # tourmaline-types: Core types for `Tourmaline`
//!
//! This crate contains shared types used across the `Tourmaline` system:
//! - Entity IDs ([`UserId`])
//! - Name newtypes ([`TableName`], [`ColumnName`])
//! - Cell values ([`Value`])
//! - Schema catalog ([`SchemaCatalog`], [`ColumnInfo`], [`DataType`],
//!   [`MemoryCatalog`], [`CatalogBuilder`])

use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

// ============================================================================
// Entity IDs
// ============================================================================

/// Unique identifier for a user.
///
/// Users themselves (credentials, password hashes) are owned by the
/// authentication collaborator; the engine only ever sees the id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(u64);

impl UserId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for UserId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<UserId> for u64 {
    fn from(id: UserId) -> Self {
        id.0
    }
}

// ============================================================================
// Name newtypes
// ============================================================================

/// Name of a table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TableName(String);

impl TableName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TableName {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TableName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Name of a column within a table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColumnName(String);

impl ColumnName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ColumnName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ColumnName {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ColumnName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ============================================================================
// Values
// ============================================================================

/// A single cell value.
///
/// Encrypted cells travel as [`Value::Bytes`] (ciphertext) until the engine
/// decrypts them back into their plaintext variant.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    /// SQL NULL.
    #[default]
    Null,
    /// 64-bit signed integer.
    BigInt(i64),
    /// UTF-8 text.
    Text(String),
    /// Boolean.
    Boolean(bool),
    /// Raw bytes (ciphertext of encrypted cells).
    Bytes(Vec<u8>),
}

impl Value {
    /// Returns whether this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::BigInt(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "{v}"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

// ============================================================================
// Schema catalog
// ============================================================================

/// Column data type as known to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    BigInt,
    Text,
    Boolean,
    Timestamp,
    Bytes,
}

/// Catalog metadata for one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name.
    pub name: ColumnName,
    /// Declared data type.
    pub data_type: DataType,
    /// Whether the column is readable by viewers without an explicit grant.
    pub public: bool,
}

impl ColumnInfo {
    /// Creates a non-public column.
    pub fn new(name: impl Into<ColumnName>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            public: false,
        }
    }

    /// Marks the column as public.
    pub fn public(mut self) -> Self {
        self.public = true;
        self
    }
}

/// Schema catalog collaborator.
///
/// Owned by the ingestion/schema-inference side of the system; the engine
/// consumes it for wildcard expansion and public-column lookups. Point reads
/// must be atomic: a concurrent schema change is observed entirely or not
/// at all.
pub trait SchemaCatalog: Send + Sync {
    /// Returns the columns of `table`, or `None` if the catalog does not
    /// know the table.
    fn columns(&self, table: &TableName) -> Option<Vec<ColumnInfo>>;

    /// Returns whether `column` of `table` is flagged public.
    ///
    /// Unknown tables and columns are not public.
    fn is_public(&self, table: &TableName, column: &ColumnName) -> bool {
        self.columns(table)
            .is_some_and(|cols| cols.iter().any(|c| c.public && c.name == *column))
    }

    /// Returns whether the catalog knows `table`.
    fn has_table(&self, table: &TableName) -> bool {
        self.columns(table).is_some()
    }
}

/// In-memory schema catalog.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    tables: RwLock<BTreeMap<TableName, Vec<ColumnInfo>>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a table definition.
    pub fn register(&self, table: impl Into<TableName>, columns: Vec<ColumnInfo>) {
        let mut tables = self.tables.write().expect("catalog lock poisoned");
        tables.insert(table.into(), columns);
    }

    /// Removes a table from the catalog.
    pub fn drop_table(&self, table: &TableName) {
        let mut tables = self.tables.write().expect("catalog lock poisoned");
        tables.remove(table);
    }
}

impl SchemaCatalog for MemoryCatalog {
    fn columns(&self, table: &TableName) -> Option<Vec<ColumnInfo>> {
        let tables = self.tables.read().expect("catalog lock poisoned");
        tables.get(table).cloned()
    }
}

/// Builder for [`MemoryCatalog`].
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    catalog: MemoryCatalog,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table with the given columns.
    pub fn table(self, name: impl Into<TableName>, columns: Vec<ColumnInfo>) -> Self {
        self.catalog.register(name, columns);
        self
    }

    pub fn build(self) -> MemoryCatalog {
        self.catalog
    }
}

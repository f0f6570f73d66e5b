//! # tourmaline-query: SQL reference extraction
//!
//! This crate answers one question: which tables and columns does a SQL
//! statement read? The answer drives the permission evaluator, so the
//! extraction is structural (a full AST traversal via `sqlparser`) and
//! fail-closed: any construct that cannot be resolved completely is an
//! error, never a partial reference set. Under-reporting a referenced
//! column would let an unauthorized read through.
//!
//! ## Supported SQL
//!
//! - `SELECT` with column lists, expressions, aliases, `*` and `table.*`
//! - `FROM` with table aliases, INNER/LEFT/RIGHT/FULL joins, derived tables
//! - `WHERE` / `GROUP BY` / `HAVING` / `ORDER BY` (all count as reads)
//! - Nested subqueries (`IN`, `EXISTS`, scalar, `FROM`), `UNION`
//! - `INSERT` / `UPDATE` / `DELETE` (classified for their column references)
//!
//! Not supported (fail closed): CTEs, window functions, `GROUP BY ALL`,
//! NATURAL joins, and any expression form not explicitly traversed.
//!
//! ## Usage
//!
//! ```
//! use tourmaline_query::extract_references;
//! use tourmaline_types::{CatalogBuilder, ColumnInfo, DataType, TableName};
//!
//! let catalog = CatalogBuilder::new()
//!     .table(
//!         "employees",
//!         vec![
//!             ColumnInfo::new("name", DataType::Text),
//!             ColumnInfo::new("ssn", DataType::Text),
//!         ],
//!     )
//!     .build();
//!
//! let refs = extract_references("SELECT * FROM employees", &catalog)?;
//! let table = TableName::from("employees");
//! assert_eq!(refs.columns_of(&table).len(), 2); // wildcard fully expanded
//! # Ok::<(), tourmaline_query::ExtractError>(())
//! ```

mod error;
mod extract;
mod reference;

pub use error::{ExtractError, Result};
pub use extract::extract_references;
pub use reference::QueryReference;

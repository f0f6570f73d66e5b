//! Error types for reference extraction.

use thiserror::Error;
use tourmaline_types::TableName;

/// Error produced while extracting references from a SQL statement.
///
/// Every variant is fail-closed: the caller must treat extraction failure
/// as a refusal to authorize, never as an empty reference set.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The statement did not parse.
    #[error("failed to parse SQL: {0}")]
    Parse(String),

    /// More or fewer than one statement was submitted.
    #[error("expected exactly 1 statement, got {0}")]
    StatementCount(usize),

    /// A construct the extractor does not understand.
    #[error("unsupported SQL construct: {0}")]
    Unsupported(String),

    /// A referenced table is not in the schema catalog, so wildcard
    /// expansion and column resolution are impossible.
    #[error("unknown table: {0}")]
    UnknownTable(TableName),

    /// A qualifier did not resolve to any table or alias in scope.
    #[error("unresolvable table alias: {0}")]
    UnknownAlias(String),

    /// An unqualified column was not found in any table in scope.
    #[error("column not found in any referenced table: {0}")]
    UnknownColumn(String),

    /// Subquery nesting exceeded the traversal depth limit.
    #[error("query nesting exceeds maximum depth")]
    NestingTooDeep,
}

/// Result type for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractError>;

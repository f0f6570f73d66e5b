//! Engine error taxonomy.

use thiserror::Error;
use tourmaline_compliance::AuditError;
use tourmaline_crypto::CryptoError;
use tourmaline_query::ExtractError;
use tourmaline_types::{ColumnName, TableName};

use crate::store::StoreError;

/// Error surfaced by [`crate::Tourmaline`].
///
/// Every variant except `AuditWrite` and `Config` has already been
/// recorded in the audit log by the time the caller sees it. `AuditWrite`
/// is the one fault that escalates past a successful query: an access that
/// cannot be logged must not be reported as having succeeded.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The statement could not be fully resolved (fail closed).
    #[error("query rejected: {0}")]
    Parse(#[from] ExtractError),

    /// A referenced column is not permitted for this user.
    #[error("access denied: {table}.{column}")]
    Denied {
        table: TableName,
        column: ColumnName,
    },

    /// Column decryption or key management failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The underlying store faulted or timed out.
    #[error("execution failed: {0}")]
    Execution(#[from] StoreError),

    /// The audit record could not be written; the whole operation fails.
    #[error("audit write failed: {0}")]
    AuditWrite(#[from] AuditError),

    /// Startup configuration is unusable (e.g. missing passphrase).
    #[error("configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// The denial reason as `table.column`, when this is a denial.
    pub fn denial_reason(&self) -> Option<String> {
        match self {
            EngineError::Denied { table, column } => Some(format!("{table}.{column}")),
            _ => None,
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

//! Error types for column encryption.

use thiserror::Error;
use tourmaline_types::{ColumnName, TableName};

/// Error produced by the column cipher layer.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// No key exists for the column.
    #[error("no encryption key for {table}.{column}")]
    MissingKey { table: TableName, column: ColumnName },

    /// `secure` was called on a column that already has an active key.
    #[error("{table}.{column} is already secured; use rotate to install a new key")]
    AlreadySecured { table: TableName, column: ColumnName },

    /// The ciphertext was produced under a key that is no longer active.
    #[error("ciphertext for {table}.{column} was encrypted under a superseded key")]
    SupersededKey { table: TableName, column: ColumnName },

    /// The authentication tag did not verify (tamper or wrong key).
    #[error("authentication failed: ciphertext tampered or wrong key")]
    AuthenticationFailed,

    /// The ciphertext is too short to contain its header.
    #[error("malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    /// The cipher itself failed (should not happen with valid key sizes).
    #[error("cipher failure: {0}")]
    CipherFailure(String),
}

/// Result type for crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;

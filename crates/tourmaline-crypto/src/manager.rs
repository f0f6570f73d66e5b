//! The column cipher manager and key store collaborator.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use tourmaline_types::{ColumnName, TableName};
use tracing::info;
use uuid::Uuid;

use crate::column_key::WrappedColumnKey;
use crate::error::{CryptoError, Result};
use crate::master::MasterKey;

/// Key store collaborator.
///
/// Holds only wrapped keys. Point reads must be atomic.
pub trait KeyStore: Send + Sync {
    /// Returns the active wrapped key for a column, if any.
    fn get(&self, table: &TableName, column: &ColumnName) -> Option<WrappedColumnKey>;

    /// Installs (or replaces) the active wrapped key for a column.
    fn put(&self, table: TableName, column: ColumnName, key: WrappedColumnKey);
}

/// In-memory key store.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    keys: RwLock<BTreeMap<(TableName, ColumnName), WrappedColumnKey>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyStore for MemoryKeyStore {
    fn get(&self, table: &TableName, column: &ColumnName) -> Option<WrappedColumnKey> {
        let keys = self.keys.read().expect("key store lock poisoned");
        keys.get(&(table.clone(), column.clone())).cloned()
    }

    fn put(&self, table: TableName, column: ColumnName, key: WrappedColumnKey) {
        let mut keys = self.keys.write().expect("key store lock poisoned");
        keys.insert((table, column), key);
    }
}

/// Manages per-column keys wrapped under the master key and encrypts or
/// decrypts individual cell values.
///
/// Value layout: `key_id(16) ‖ nonce(12) ‖ ciphertext+tag`, with
/// AAD = `"table.column"`.
pub struct ColumnCipherManager {
    master: MasterKey,
    keys: Arc<dyn KeyStore>,
}

impl ColumnCipherManager {
    pub fn new(master: MasterKey, keys: Arc<dyn KeyStore>) -> Self {
        Self { master, keys }
    }

    /// Returns whether the column has an active key.
    pub fn is_secured(&self, table: &TableName, column: &ColumnName) -> bool {
        self.keys.get(table, column).is_some()
    }

    /// Generates, wraps, and persists a key for a column that has none.
    ///
    /// Errors with [`CryptoError::AlreadySecured`] if a key exists; use
    /// [`ColumnCipherManager::rotate`] to install a new generation.
    pub fn secure(&self, table: &TableName, column: &ColumnName) -> Result<Uuid> {
        if self.keys.get(table, column).is_some() {
            return Err(CryptoError::AlreadySecured {
                table: table.clone(),
                column: column.clone(),
            });
        }
        self.install_key(table, column)
    }

    /// Installs a new key generation for an already-secured column.
    ///
    /// Old ciphertext remains on disk under the superseded key id and is
    /// only readable again after explicit re-encryption.
    pub fn rotate(&self, table: &TableName, column: &ColumnName) -> Result<Uuid> {
        if self.keys.get(table, column).is_none() {
            return Err(CryptoError::MissingKey {
                table: table.clone(),
                column: column.clone(),
            });
        }
        self.install_key(table, column)
    }

    fn install_key(&self, table: &TableName, column: &ColumnName) -> Result<Uuid> {
        let key = crate::column_key::ColumnKey::generate();
        let wrapped = self.master.wrap_key(&key)?;
        let key_id = Uuid::new_v4();

        self.keys.put(
            table.clone(),
            column.clone(),
            WrappedColumnKey::new(key_id, wrapped),
        );

        info!(table = %table, column = %column, %key_id, "column key installed");
        Ok(key_id)
    }

    /// Encrypts one value under the column's active key.
    pub fn encrypt(&self, table: &TableName, column: &ColumnName, plaintext: &[u8]) -> Result<Vec<u8>> {
        let wrapped = self.active_key(table, column)?;
        let key = self.master.unwrap_key(&wrapped.wrapped)?;

        let sealed = key.seal(&cell_aad(table, column), plaintext)?;

        let mut output = Vec::with_capacity(16 + sealed.len());
        output.extend_from_slice(wrapped.key_id.as_bytes());
        output.extend_from_slice(&sealed);
        Ok(output)
    }

    /// Decrypts one value; only called after the evaluator allowed the
    /// column.
    ///
    /// Fails with [`CryptoError::MissingKey`] if the column has no key,
    /// [`CryptoError::SupersededKey`] if the value was encrypted under a
    /// retired generation, and [`CryptoError::AuthenticationFailed`] if
    /// the tag does not verify.
    pub fn decrypt(&self, table: &TableName, column: &ColumnName, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() < 16 {
            return Err(CryptoError::MalformedCiphertext(
                "value too short to contain key id".to_string(),
            ));
        }

        let embedded_id = Uuid::from_slice(&data[..16])
            .map_err(|e| CryptoError::MalformedCiphertext(e.to_string()))?;

        let wrapped = self.active_key(table, column)?;
        if embedded_id != wrapped.key_id {
            return Err(CryptoError::SupersededKey {
                table: table.clone(),
                column: column.clone(),
            });
        }

        let key = self.master.unwrap_key(&wrapped.wrapped)?;
        key.open(&cell_aad(table, column), &data[16..])
    }

    fn active_key(&self, table: &TableName, column: &ColumnName) -> Result<WrappedColumnKey> {
        self.keys
            .get(table, column)
            .ok_or_else(|| CryptoError::MissingKey {
                table: table.clone(),
                column: column.clone(),
            })
    }
}

impl std::fmt::Debug for ColumnCipherManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ColumnCipherManager(<master key redacted>)")
    }
}

fn cell_aad(table: &TableName, column: &ColumnName) -> Vec<u8> {
    format!("{table}.{column}").into_bytes()
}

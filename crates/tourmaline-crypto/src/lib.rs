//! # tourmaline-crypto: Column encryption
//!
//! A two-level key hierarchy protecting secured columns:
//!
//! ```text
//! MasterKey (process-held, derived from passphrase, never persisted)
//!     │ wraps (AES-256-GCM)
//!     ▼
//! ColumnKey (one active key per secured column, persisted wrapped)
//!     │ encrypts (AES-256-GCM, AAD = "table.column")
//!     ▼
//! Cell values (key_id ‖ nonce ‖ ciphertext+tag)
//! ```
//!
//! Authenticated encryption gives confidentiality and integrity: any
//! tampering with a stored value, and any attempt to decrypt under the
//! wrong or a superseded key, fails with a [`CryptoError`] instead of
//! returning garbage.
//!
//! Key material is zeroed from memory on drop ([`zeroize`]), and the
//! `Debug` representations of key types redact their bytes.

mod column_key;
mod error;
mod manager;
mod masking;
mod master;

pub use column_key::{ColumnKey, WrappedColumnKey};
pub use error::{CryptoError, Result};
pub use manager::{ColumnCipherManager, KeyStore, MemoryKeyStore};
pub use masking::{MaskStyle, mask};
pub use master::MasterKey;

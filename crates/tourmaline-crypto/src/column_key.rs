//! Per-column data-encryption keys and value encryption.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CryptoError, Result};

/// Data-encryption key for one secured column - 32 bytes.
///
/// Lives unwrapped only inside the cipher manager while a value is being
/// encrypted or decrypted; at rest it exists only wrapped under the master
/// key. Key material is securely zeroed from memory when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ColumnKey {
    key: [u8; 32],
}

impl ColumnKey {
    /// Generates a fresh random key from system randomness.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut key = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut key);

        assert_ne!(key, [0u8; 32], "column key is all zeros (degenerate)");
        Self { key }
    }

    pub(crate) fn from_bytes(key: [u8; 32]) -> Self {
        Self { key }
    }

    pub(crate) fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }

    /// Encrypts one value under this key with a fresh random nonce.
    ///
    /// Output layout: `nonce(12) ‖ ciphertext+tag`. The AAD binds the
    /// ciphertext to its cell position so values cannot be spliced between
    /// columns.
    pub fn seal(&self, aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        use rand::RngCore;
        let mut nonce = [0u8; 12];
        rand::rngs::OsRng.fill_bytes(&mut nonce);

        let ciphertext = aes_gcm_encrypt(&self.key, &nonce, plaintext, aad)?;

        let mut output = Vec::with_capacity(12 + ciphertext.len());
        output.extend_from_slice(&nonce);
        output.extend_from_slice(&ciphertext);
        Ok(output)
    }

    /// Decrypts a value previously produced by [`ColumnKey::seal`].
    pub fn open(&self, aad: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        if data.len() < 12 {
            return Err(CryptoError::MalformedCiphertext(
                "value too short to contain nonce".to_string(),
            ));
        }

        let nonce: [u8; 12] = data[..12]
            .try_into()
            .map_err(|_| CryptoError::MalformedCiphertext("bad nonce".to_string()))?;
        aes_gcm_decrypt(&self.key, &nonce, &data[12..], aad)
    }
}

impl std::fmt::Debug for ColumnKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ColumnKey(<redacted>)")
    }
}

/// A column key as persisted: wrapped under the master key.
///
/// The unwrapped key never leaves memory; only this form reaches the key
/// store.
#[derive(Clone, Serialize, Deserialize)]
pub struct WrappedColumnKey {
    /// Identifier of this key generation. Embedded in every ciphertext so
    /// a value encrypted under a superseded generation is detected before
    /// decryption is attempted.
    pub key_id: Uuid,
    /// The key, encrypted under the master key.
    pub wrapped: Vec<u8>,
    /// When this generation was created.
    pub created_at: DateTime<Utc>,
}

impl WrappedColumnKey {
    pub fn new(key_id: Uuid, wrapped: Vec<u8>) -> Self {
        Self {
            key_id,
            wrapped,
            created_at: Utc::now(),
        }
    }
}

impl std::fmt::Debug for WrappedColumnKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WrappedColumnKey")
            .field("key_id", &self.key_id)
            .field("wrapped", &format!("<{} bytes>", self.wrapped.len()))
            .field("created_at", &self.created_at)
            .finish()
    }
}

pub(crate) fn aes_gcm_encrypt(
    key: &[u8; 32],
    nonce: &[u8; 12],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|e| CryptoError::CipherFailure(e.to_string()))?;
    let nonce_obj = Nonce::from_slice(nonce);

    let payload = Payload {
        msg: plaintext,
        aad,
    };

    cipher
        .encrypt(nonce_obj, payload)
        .map_err(|e| CryptoError::CipherFailure(e.to_string()))
}

pub(crate) fn aes_gcm_decrypt(
    key: &[u8; 32],
    nonce: &[u8; 12],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|e| CryptoError::CipherFailure(e.to_string()))?;
    let nonce_obj = Nonce::from_slice(nonce);

    let payload = Payload {
        msg: ciphertext,
        aad,
    };

    cipher
        .decrypt(nonce_obj, payload)
        .map_err(|_| CryptoError::AuthenticationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_roundtrip() {
        let key = ColumnKey::generate();
        let plaintext = b"123-45-6789";

        let sealed = key.seal(b"employees.ssn", plaintext).expect("seal failed");
        let opened = key.open(b"employees.ssn", &sealed).expect("open failed");

        assert_eq!(plaintext, &opened[..]);
    }

    #[test]
    fn test_wrong_key_fails() {
        let key = ColumnKey::generate();
        let other = ColumnKey::generate();

        let sealed = key.seal(b"aad", b"secret").expect("seal failed");
        let result = other.open(b"aad", &sealed);
        assert!(matches!(result, Err(CryptoError::AuthenticationFailed)));
    }

    #[test]
    fn test_wrong_aad_fails() {
        // A ciphertext spliced into a different cell must not decrypt.
        let key = ColumnKey::generate();

        let sealed = key.seal(b"employees.ssn", b"secret").expect("seal failed");
        let result = key.open(b"employees.email", &sealed);
        assert!(matches!(result, Err(CryptoError::AuthenticationFailed)));
    }

    #[test]
    fn test_tampered_value_fails() {
        let key = ColumnKey::generate();

        let mut sealed = key.seal(b"aad", b"secret").expect("seal failed");
        let last = sealed.len() - 1;
        sealed[last] ^= 0xFF;

        let result = key.open(b"aad", &sealed);
        assert!(matches!(result, Err(CryptoError::AuthenticationFailed)));
    }

    #[test]
    fn test_nonces_are_fresh() {
        let key = ColumnKey::generate();

        let a = key.seal(b"aad", b"same value").expect("seal failed");
        let b = key.seal(b"aad", b"same value").expect("seal failed");
        assert_ne!(a, b, "fresh nonce must make ciphertexts differ");
    }

    #[test]
    fn test_empty_plaintext() {
        let key = ColumnKey::generate();

        let sealed = key.seal(b"aad", b"").expect("seal failed");
        // nonce(12) + tag(16)
        assert_eq!(sealed.len(), 28);

        let opened = key.open(b"aad", &sealed).expect("open failed");
        assert!(opened.is_empty());
    }

    #[test]
    fn test_truncated_value_fails() {
        let key = ColumnKey::generate();
        let result = key.open(b"aad", &[0u8; 5]);
        assert!(matches!(result, Err(CryptoError::MalformedCiphertext(_))));
    }

    #[test]
    fn test_debug_redacts() {
        let key = ColumnKey::generate();
        assert_eq!(format!("{key:?}"), "ColumnKey(<redacted>)");

        let wrapped = WrappedColumnKey::new(Uuid::new_v4(), vec![1, 2, 3]);
        let debug = format!("{wrapped:?}");
        assert!(debug.contains("<3 bytes>"));
        assert!(!debug.contains("[1, 2, 3]"));
    }
}

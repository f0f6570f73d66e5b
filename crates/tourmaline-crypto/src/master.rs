//! The process-held master key.

use hkdf::Hkdf;
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::column_key::ColumnKey;
use crate::error::{CryptoError, Result};

/// Master key (top of the hierarchy) - 32 bytes.
///
/// Derived once at process start from a passphrase, held in memory for the
/// process lifetime, and never persisted. Key material is securely zeroed
/// from memory when dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    key: [u8; 32],
}

impl MasterKey {
    /// Derives the master key from a passphrase and salt.
    ///
    /// Uses RFC 5869 HKDF-SHA256 Extract+Expand. The same passphrase and
    /// salt always derive the same key, so key custody reduces to
    /// passphrase custody.
    pub fn derive(passphrase: &str, salt: &[u8]) -> Self {
        let hk = Hkdf::<Sha256>::new(Some(salt), passphrase.as_bytes());
        let mut key = [0u8; 32];
        hk.expand(b"tourmaline master key", &mut key)
            .expect("32-byte output within HKDF maximum");

        assert_ne!(key, [0u8; 32], "master key is all zeros (degenerate)");
        Self { key }
    }

    /// Generates a random master key from system randomness.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut key = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut key);

        assert_ne!(key, [0u8; 32], "master key is all zeros (degenerate)");
        Self { key }
    }

    /// Wraps (encrypts) a column key for storage.
    ///
    /// The nonce is synthetic, `SHA-256(master ‖ dek)[0..12]`, so it is
    /// unique per master/column-key pair without extra state, and is
    /// prepended to the wrapped blob for unwrap.
    pub fn wrap_key(&self, column_key: &ColumnKey) -> Result<Vec<u8>> {
        let nonce = Self::derive_wrap_nonce(&self.key, column_key.as_bytes());
        let ciphertext = crate::column_key::aes_gcm_encrypt(
            &self.key,
            &nonce,
            column_key.as_bytes(),
            b"",
        )?;

        let mut output = Vec::with_capacity(12 + ciphertext.len());
        output.extend_from_slice(&nonce);
        output.extend_from_slice(&ciphertext);
        Ok(output)
    }

    /// Unwraps (decrypts) a column key from storage.
    ///
    /// Fails with [`CryptoError::AuthenticationFailed`] if the blob was
    /// tampered with or wrapped under a different master key.
    pub fn unwrap_key(&self, wrapped: &[u8]) -> Result<ColumnKey> {
        if wrapped.len() < 12 {
            return Err(CryptoError::MalformedCiphertext(
                "wrapped key too short to contain nonce".to_string(),
            ));
        }

        let nonce: [u8; 12] = wrapped[..12]
            .try_into()
            .map_err(|_| CryptoError::MalformedCiphertext("bad nonce".to_string()))?;
        let plaintext = crate::column_key::aes_gcm_decrypt(&self.key, &nonce, &wrapped[12..], b"")?;

        if plaintext.len() != 32 {
            return Err(CryptoError::MalformedCiphertext(
                "unwrapped key has wrong length".to_string(),
            ));
        }

        let mut key = [0u8; 32];
        key.copy_from_slice(&plaintext);
        Ok(ColumnKey::from_bytes(key))
    }

    fn derive_wrap_nonce(master: &[u8; 32], dek: &[u8; 32]) -> [u8; 12] {
        let mut hasher = Sha256::new();
        hasher.update(master);
        hasher.update(dek);
        let hash = hasher.finalize();
        let mut nonce = [0u8; 12];
        nonce.copy_from_slice(&hash[..12]);
        nonce
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_deterministic() {
        let a = MasterKey::derive("correct horse battery staple", b"salt");
        let b = MasterKey::derive("correct horse battery staple", b"salt");

        let key = ColumnKey::generate();
        let wrapped = a.wrap_key(&key).expect("wrap failed");
        let unwrapped = b.unwrap_key(&wrapped).expect("same passphrase must unwrap");
        assert_eq!(key.as_bytes(), unwrapped.as_bytes());
    }

    #[test]
    fn test_different_passphrases_different_keys() {
        let a = MasterKey::derive("passphrase one", b"salt");
        let b = MasterKey::derive("passphrase two", b"salt");

        let key = ColumnKey::generate();
        let wrapped = a.wrap_key(&key).expect("wrap failed");
        assert!(b.unwrap_key(&wrapped).is_err());
    }

    #[test]
    fn test_different_salts_different_keys() {
        let a = MasterKey::derive("same passphrase", b"salt one");
        let b = MasterKey::derive("same passphrase", b"salt two");

        let key = ColumnKey::generate();
        let wrapped = a.wrap_key(&key).expect("wrap failed");
        assert!(b.unwrap_key(&wrapped).is_err());
    }

    #[test]
    fn test_wrap_unwrap_roundtrip() {
        let master = MasterKey::generate();
        let key = ColumnKey::generate();

        let wrapped = master.wrap_key(&key).expect("wrap failed");
        let unwrapped = master.unwrap_key(&wrapped).expect("unwrap failed");
        assert_eq!(key.as_bytes(), unwrapped.as_bytes());
    }

    #[test]
    fn test_tampered_wrapped_key_fails() {
        let master = MasterKey::generate();
        let key = ColumnKey::generate();

        let mut wrapped = master.wrap_key(&key).expect("wrap failed");
        wrapped[13] ^= 0xFF;

        let result = master.unwrap_key(&wrapped);
        assert!(matches!(result, Err(CryptoError::AuthenticationFailed)));
    }

    #[test]
    fn test_truncated_wrapped_key_fails() {
        let master = MasterKey::generate();
        let result = master.unwrap_key(&[0u8; 4]);
        assert!(matches!(result, Err(CryptoError::MalformedCiphertext(_))));
    }

    #[test]
    fn test_debug_redacts_key_material() {
        let master = MasterKey::derive("secret", b"salt");
        assert_eq!(format!("{master:?}"), "MasterKey(<redacted>)");
    }
}

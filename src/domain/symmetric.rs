//! AES-256-GCM encryption for the symmetric comparison branch.
//!
//! The ciphertext layout is `nonce (12 bytes) || AEAD ciphertext`, so a single
//! opaque blob can be uploaded and decrypted again without side metadata.

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

const NONCE_LEN: usize = 12;

/// Errors from the symmetric cipher.
#[derive(Debug, Error)]
pub enum SymmetricError {
    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: authentication tag mismatch")]
    Decryption,

    #[error("Ciphertext too short ({0} bytes)")]
    Truncated(usize),
}

/// 256-bit symmetric key, generated fresh per run and never persisted.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; 32]);

impl SymmetricKey {
    /// Generate a key from the OS random source.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Raw key bytes (used only for the KMS wrap).
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(aes_gcm::Key::<Aes256Gcm>::from_slice(&self.0))
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey([REDACTED])")
    }
}

/// Encrypt `plaintext` under `key` with a random nonce.
///
/// # Errors
/// Returns `SymmetricError::Encryption` if the AEAD rejects the input.
pub fn encrypt(key: &SymmetricKey, plaintext: &[u8]) -> Result<Vec<u8>, SymmetricError> {
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = key
        .cipher()
        .encrypt(nonce, plaintext)
        .map_err(|e| SymmetricError::Encryption(e.to_string()))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a blob produced by [`encrypt`].
///
/// # Errors
/// Returns `SymmetricError::Decryption` if the key is wrong or the data was
/// tampered with.
pub fn decrypt(key: &SymmetricKey, blob: &[u8]) -> Result<Vec<u8>, SymmetricError> {
    if blob.len() < NONCE_LEN {
        return Err(SymmetricError::Truncated(blob.len()));
    }
    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);

    key.cipher()
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| SymmetricError::Decryption)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = SymmetricKey::generate();
        let plaintext = br#"{"drg_type":[0,1,2,1,0]}"#;

        let blob = encrypt(&key, plaintext).expect("Encryption should succeed");
        let decrypted = decrypt(&key, &blob).expect("Decryption should succeed");

        assert_eq!(plaintext.to_vec(), decrypted);
    }

    #[test]
    fn test_wrong_key_fails() {
        let blob = encrypt(&SymmetricKey::generate(), b"payload").expect("encrypt");
        let result = decrypt(&SymmetricKey::generate(), &blob);

        assert!(matches!(result, Err(SymmetricError::Decryption)));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = SymmetricKey::generate();
        let mut blob = encrypt(&key, b"payload").expect("encrypt");
        let last = blob.len() - 1;
        blob[last] ^= 0x01;

        assert!(matches!(decrypt(&key, &blob), Err(SymmetricError::Decryption)));
    }

    #[test]
    fn test_random_nonce_per_encryption() {
        let key = SymmetricKey::generate();
        let a = encrypt(&key, b"same").expect("encrypt");
        let b = encrypt(&key, b"same").expect("encrypt");
        assert_ne!(a, b);
    }

    #[test]
    fn test_truncated_blob() {
        let key = SymmetricKey::generate();
        assert!(matches!(
            decrypt(&key, &[0u8; 5]),
            Err(SymmetricError::Truncated(5))
        ));
    }

    #[test]
    fn test_key_debug_redacted() {
        let key = SymmetricKey::generate();
        assert_eq!(format!("{key:?}"), "SymmetricKey([REDACTED])");
    }
}

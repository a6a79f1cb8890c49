//! HE Engine port: Trait for homomorphic encryption operations.
//!
//! This trait abstracts the HE library (tfhe-rs) from the pipeline and the
//! remote decryption function.

use crate::domain::{CiphertextVector, CryptoError, EncryptionContext, HeScheme};

/// Trait for homomorphic encryption operations.
///
/// Implementations provide:
/// - Fresh context (parameters + keys) per call
/// - Vector encryption with truncation to a maximum length
/// - Homomorphic element-wise squaring
/// - Decryption with the producing context
pub trait HeEngine: Send + Sync {
    /// Create a new context for `scheme` with freshly generated keys.
    ///
    /// # Errors
    /// Returns `CryptoError::KeyGeneration` if the library fails.
    fn create_context(&self, scheme: HeScheme) -> Result<EncryptionContext, CryptoError>;

    /// Encrypt up to `max_values` leading elements of `values`.
    ///
    /// # Errors
    /// Returns `CryptoError::Encryption` for values the scheme cannot encode,
    /// `CryptoError::MissingSecretKey` for a public context.
    fn encrypt(
        &self,
        ctx: &EncryptionContext,
        values: &[f64],
        max_values: usize,
    ) -> Result<CiphertextVector, CryptoError>;

    /// Square every element homomorphically using the evaluation key.
    ///
    /// Values must be within `SQUARE_LIMIT` after quantization; see
    /// `HeScheme::check_headroom`.
    ///
    /// # Errors
    /// Returns `CryptoError::Evaluation` if the ciphertext was already squared
    /// or the library fails.
    fn square(
        &self,
        ctx: &EncryptionContext,
        ciphertext: &CiphertextVector,
    ) -> Result<CiphertextVector, CryptoError>;

    /// Decrypt a vector produced under `ctx`.
    ///
    /// # Errors
    /// Returns `CryptoError::MissingSecretKey` for a public context,
    /// `CryptoError::Decryption` if the library rejects the ciphertext.
    fn decrypt(
        &self,
        ctx: &EncryptionContext,
        ciphertext: &CiphertextVector,
    ) -> Result<Vec<f64>, CryptoError>;
}

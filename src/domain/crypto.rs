//! Homomorphic encryption types.
//!
//! Opaque wrappers around serialized tfhe-rs material. The pipeline never
//! inspects the bytes; it only moves them between the engine, storage and
//! the remote decryption function.
//!
//! # Memory Security
//!
//! Key types implement `Zeroize` and `ZeroizeOnDrop` so key material is
//! erased when the run discards its context.

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Current version of the serialized context envelope.
const CONTEXT_FORMAT_VERSION: u8 = 1;

/// Error type for homomorphic operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Homomorphic evaluation failed: {0}")]
    Evaluation(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Context carries no secret key")]
    MissingSecretKey,
}

/// Homomorphic scheme variant used to build a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HeScheme {
    /// Real-valued plaintexts encoded with a global fixed-point scale of
    /// `2^scale_bits`. Decryption is approximate within `2^-scale_bits`.
    Approximate { scale_bits: u32 },

    /// Integer plaintexts, decrypted exactly.
    Exact,
}

impl HeScheme {
    /// Default global scale for the approximate scheme.
    pub const DEFAULT_SCALE_BITS: u32 = 20;

    /// Approximate scheme with the default scale.
    #[must_use]
    pub fn approximate() -> Self {
        Self::Approximate {
            scale_bits: Self::DEFAULT_SCALE_BITS,
        }
    }

    /// Fixed-point scale factor applied to plaintexts (1 for `Exact`).
    #[must_use]
    pub fn scale(&self) -> f64 {
        match self {
            Self::Approximate { scale_bits } => 2f64.powi(*scale_bits as i32),
            Self::Exact => 1.0,
        }
    }

    /// Encode a plaintext as the integer the engine encrypts.
    ///
    /// The result is bounded so that `evaluation` cannot overflow `i64`.
    ///
    /// # Errors
    /// Returns `CryptoError::Encryption` for non-finite values, fractional
    /// values under `Exact`, and magnitudes beyond the bound.
    pub fn quantize(
        &self,
        index: usize,
        value: f64,
        evaluation: Evaluation,
    ) -> Result<i64, CryptoError> {
        if !value.is_finite() {
            return Err(CryptoError::Encryption(format!(
                "Value {index} is not finite: {value}"
            )));
        }
        let scaled = match self {
            Self::Approximate { .. } => (value * self.scale()).round(),
            Self::Exact => {
                if value.fract() != 0.0 {
                    return Err(CryptoError::Encryption(format!(
                        "Value {index} is not an integer: {value}"
                    )));
                }
                value
            }
        };
        if scaled.abs() > evaluation.max_quantized() as f64 {
            return Err(CryptoError::Encryption(format!(
                "Value {index} is out of range for {self} with {evaluation} evaluation: {value}"
            )));
        }
        Ok(scaled as i64)
    }

    /// Decode an integer that carries `scale_power` factors of the scale.
    #[must_use]
    pub fn dequantize(&self, scale_power: u32, value: i64) -> f64 {
        value as f64 / self.scale().powi(scale_power as i32)
    }

    /// Check that every value can be encrypted and then evaluated.
    ///
    /// # Errors
    /// Returns the first value `quantize` rejects.
    pub fn check_headroom(
        &self,
        values: &[f64],
        evaluation: Evaluation,
    ) -> Result<(), CryptoError> {
        for (index, &value) in values.iter().enumerate() {
            self.quantize(index, value, evaluation)?;
        }
        Ok(())
    }
}

impl std::fmt::Display for HeScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Approximate { scale_bits } => write!(f, "approximate(2^{scale_bits})"),
            Self::Exact => write!(f, "exact"),
        }
    }
}

/// Largest quantized magnitude whose square still fits in `i64`.
pub const SQUARE_LIMIT: i64 = 3_037_000_499;

/// Homomorphic computation applied to the ciphertext before decryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Evaluation {
    /// Decrypt the values as encrypted.
    #[default]
    None,
    /// Square every element with the evaluation key.
    Square,
}

impl Evaluation {
    #[must_use]
    pub fn is_none(&self) -> bool {
        *self == Self::None
    }

    /// Bound on quantized plaintexts for this evaluation.
    #[must_use]
    pub fn max_quantized(&self) -> i64 {
        match self {
            Self::None => 1 << 62,
            Self::Square => SQUARE_LIMIT,
        }
    }

    /// Plaintext result the evaluation produces for `value`.
    #[must_use]
    pub fn expected(&self, value: f64) -> f64 {
        match self {
            Self::None => value,
            Self::Square => value * value,
        }
    }
}

impl std::fmt::Display for Evaluation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Square => write!(f, "square"),
        }
    }
}

/// Secret key for encryption/decryption.
///
/// # Security
///
/// - Implements `ZeroizeOnDrop`: key material is erased when dropped
/// - `Debug` implementation does NOT expose key bytes
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ClientKey {
    /// Serialized key bytes (tfhe-rs ClientKey)
    pub(crate) inner: Vec<u8>,

    /// Key fingerprint for identification (NOT secret)
    #[zeroize(skip)]
    pub fingerprint: String,
}

impl ClientKey {
    /// Create a new client key from raw bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let fingerprint = compute_fingerprint(&bytes);
        Self {
            inner: bytes,
            fingerprint,
        }
    }

    /// Get the raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.inner
    }
}

impl std::fmt::Debug for ClientKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientKey")
            .field("fingerprint", &self.fingerprint)
            .field("size_bytes", &self.inner.len())
            .finish()
    }
}

/// Public evaluation key. Allows computation on ciphertexts but cannot decrypt.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ServerKey {
    /// Serialized key bytes (tfhe-rs ServerKey)
    pub(crate) inner: Vec<u8>,

    /// Key fingerprint for identification (NOT secret)
    #[zeroize(skip)]
    pub fingerprint: String,
}

impl ServerKey {
    /// Create a new server key from raw bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let fingerprint = compute_fingerprint(&bytes);
        Self {
            inner: bytes,
            fingerprint,
        }
    }

    /// Get the raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.inner
    }
}

impl std::fmt::Debug for ServerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerKey")
            .field("fingerprint", &self.fingerprint)
            .field("size_bytes", &self.inner.len())
            .finish()
    }
}

/// Scheme parameters plus key material for one run.
///
/// Created once per run, serialized (with the secret key) for the remote
/// decryption function, then dropped.
#[derive(Debug, Clone)]
pub struct EncryptionContext {
    pub scheme: HeScheme,
    pub server_key: ServerKey,
    pub secret_key: Option<ClientKey>,
}

#[derive(Serialize, Deserialize)]
struct ContextEnvelope {
    version: u8,
    scheme: HeScheme,
    server_key: Vec<u8>,
    secret_key: Option<Vec<u8>>,
}

impl EncryptionContext {
    /// Create a context from freshly generated keys.
    pub fn new(scheme: HeScheme, server_key: ServerKey, secret_key: Option<ClientKey>) -> Self {
        Self {
            scheme,
            server_key,
            secret_key,
        }
    }

    /// Whether this context can decrypt.
    #[must_use]
    pub fn has_secret_key(&self) -> bool {
        self.secret_key.is_some()
    }

    /// Fingerprint of the secret key, or of the server key for public contexts.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        match &self.secret_key {
            Some(k) => &k.fingerprint,
            None => &self.server_key.fingerprint,
        }
    }

    /// Copy of this context without the secret key.
    #[must_use]
    pub fn public(&self) -> Self {
        Self {
            scheme: self.scheme,
            server_key: self.server_key.clone(),
            secret_key: None,
        }
    }

    /// Serialize the context. The secret key is only included on request.
    ///
    /// # Errors
    /// Returns `CryptoError::Serialization` if encoding fails.
    pub fn to_bytes(&self, include_secret: bool) -> Result<Vec<u8>, CryptoError> {
        let envelope = ContextEnvelope {
            version: CONTEXT_FORMAT_VERSION,
            scheme: self.scheme,
            server_key: self.server_key.inner.clone(),
            secret_key: if include_secret {
                self.secret_key.as_ref().map(|k| k.inner.clone())
            } else {
                None
            },
        };
        // Temporary copies of the key bytes are wiped when this goes out of scope.
        let envelope = zeroize::Zeroizing::new(envelope);
        bincode::serialize(&*envelope)
            .map_err(|e| CryptoError::Serialization(format!("Failed to encode context: {e}")))
    }

    /// Restore a context serialized with [`EncryptionContext::to_bytes`].
    ///
    /// # Errors
    /// Returns `CryptoError::Serialization` for malformed or unsupported input.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let envelope: ContextEnvelope = bincode::deserialize(bytes)
            .map_err(|e| CryptoError::Serialization(format!("Failed to decode context: {e}")))?;
        if envelope.version != CONTEXT_FORMAT_VERSION {
            return Err(CryptoError::Serialization(format!(
                "Unsupported context version: {}",
                envelope.version
            )));
        }
        Ok(Self {
            scheme: envelope.scheme,
            server_key: ServerKey::from_bytes(envelope.server_key),
            secret_key: envelope.secret_key.map(ClientKey::from_bytes),
        })
    }
}

impl Zeroize for ContextEnvelope {
    fn zeroize(&mut self) {
        self.server_key.zeroize();
        if let Some(secret) = self.secret_key.as_mut() {
            secret.zeroize();
        }
    }
}

/// Encrypted fixed-length numeric vector.
#[derive(Clone, Serialize, Deserialize)]
pub struct CiphertextVector {
    /// Serialized encrypted elements
    pub ciphertext: Vec<u8>,

    /// Number of encrypted elements
    pub len: usize,

    /// Power of the scheme scale carried by the plaintexts (1 after
    /// encryption, 2 after squaring).
    pub scale_power: u32,

    /// Fingerprint of the key used for encryption
    pub key_fingerprint: String,
}

impl CiphertextVector {
    /// Create a new ciphertext vector.
    pub fn new(ciphertext: Vec<u8>, len: usize, scale_power: u32, key_fingerprint: String) -> Self {
        Self {
            ciphertext,
            len,
            scale_power,
            key_fingerprint,
        }
    }

    /// Size of the encrypted payload in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.ciphertext.len()
    }

    /// Serialize for upload.
    ///
    /// # Errors
    /// Returns `CryptoError::Serialization` if encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        bincode::serialize(self)
            .map_err(|e| CryptoError::Serialization(format!("Failed to encode ciphertext: {e}")))
    }

    /// Restore a serialized ciphertext vector.
    ///
    /// # Errors
    /// Returns `CryptoError::Serialization` for malformed input.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        bincode::deserialize(bytes)
            .map_err(|e| CryptoError::Serialization(format!("Failed to decode ciphertext: {e}")))
    }
}

impl std::fmt::Debug for CiphertextVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CiphertextVector")
            .field("len", &self.len)
            .field("scale_power", &self.scale_power)
            .field("size_bytes", &self.ciphertext.len())
            .field("key_fingerprint", &self.key_fingerprint)
            .finish()
    }
}

/// Shannon entropy of a byte string in bits per byte (0.0 for empty input).
///
/// Logged next to ciphertext sizes for benchmarking only.
#[must_use]
pub fn byte_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mut counts = [0usize; 256];
    for &b in data {
        counts[b as usize] += 1;
    }
    let total = data.len() as f64;
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total;
            -p * p.log2()
        })
        .sum()
}

/// Compute a fingerprint for key identification using SHA-256.
///
/// Only the first 8 bytes of the hash are kept; the raw key never leaves
/// this function.
fn compute_fingerprint(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};

    let digest = Sha256::digest(bytes);
    digest[..8].iter().map(|b| format!("{b:02x}")).collect()
}

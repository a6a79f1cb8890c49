//! TFHE adapter: Implementation of HeEngine using tfhe-rs.
//!
//! # Thread Safety
//!
//! **IMPORTANT**: `tfhe::set_server_key()` writes to a *thread-local* (TLS) global.
//!
//! `square` sets the server key for the duration of the evaluation and clears
//! it through an RAII guard, so a key never outlives the call on a worker
//! thread. The evaluation runs to completion without async yields.
//!
//! # Encoding
//!
//! Every element is encrypted as an `FheInt64`:
//! - `HeScheme::Approximate { scale_bits }`: `round(x * 2^scale_bits)`
//! - `HeScheme::Exact`: the integer value itself
//!
//! Decryption divides by `scale^scale_power`, where `scale_power` is 2 after
//! squaring. Squaring wraps silently past `i64`, so callers that plan it
//! check inputs with `HeScheme::check_headroom` first.

use tfhe::prelude::*;
use tfhe::{
    generate_keys, set_server_key, unset_server_key, ClientKey as TfheClientKey, ConfigBuilder,
    FheInt64, ServerKey as TfheServerKey,
};

use crate::domain::{
    byte_entropy, CiphertextVector, ClientKey, CryptoError, EncryptionContext, Evaluation,
    HeScheme, ServerKey,
};
use crate::ports::HeEngine;

/// TFHE adapter for HE operations.
#[derive(Debug, Default)]
pub struct TfheAdapter;

impl TfheAdapter {
    /// Create a new TFHE adapter.
    #[must_use]
    pub fn new() -> Self {
        tracing::info!("Initializing TfheAdapter (tfhe-rs)");
        Self
    }

    fn secret_key(ctx: &EncryptionContext) -> Result<TfheClientKey, CryptoError> {
        let key = ctx.secret_key.as_ref().ok_or(CryptoError::MissingSecretKey)?;
        Self::deserialize_tfhe_client_key(key.as_bytes())
    }

    /// Deserialize tfhe-rs client key from bytes.
    fn deserialize_tfhe_client_key(bytes: &[u8]) -> Result<TfheClientKey, CryptoError> {
        bincode::deserialize(bytes).map_err(|e| {
            CryptoError::Serialization(format!("Failed to deserialize client key: {e}"))
        })
    }

    /// Deserialize tfhe-rs server key from bytes.
    fn deserialize_tfhe_server_key(bytes: &[u8]) -> Result<TfheServerKey, CryptoError> {
        bincode::deserialize(bytes).map_err(|e| {
            CryptoError::Serialization(format!("Failed to deserialize server key: {e}"))
        })
    }

    fn deserialize_elements(ciphertext: &CiphertextVector) -> Result<Vec<FheInt64>, CryptoError> {
        let elements: Vec<FheInt64> = bincode::deserialize(&ciphertext.ciphertext).map_err(|e| {
            CryptoError::Serialization(format!("Failed to deserialize ciphertext: {e}"))
        })?;
        if elements.len() != ciphertext.len {
            return Err(CryptoError::Serialization(format!(
                "Ciphertext holds {} elements, header says {}",
                elements.len(),
                ciphertext.len
            )));
        }
        Ok(elements)
    }
}

impl HeEngine for TfheAdapter {
    fn create_context(&self, scheme: HeScheme) -> Result<EncryptionContext, CryptoError> {
        tracing::info!("Generating HE keys for {scheme} context...");

        // Default parameters, fresh keys on every call
        let config = ConfigBuilder::default().build();
        let (client_key, server_key) = generate_keys(config);

        let client_bytes = bincode::serialize(&client_key).map_err(|e| {
            CryptoError::KeyGeneration(format!("Failed to serialize client key: {e}"))
        })?;
        let server_bytes = bincode::serialize(&server_key).map_err(|e| {
            CryptoError::KeyGeneration(format!("Failed to serialize server key: {e}"))
        })?;

        let client = ClientKey::from_bytes(client_bytes);
        let server = ServerKey::from_bytes(server_bytes);

        tracing::info!(
            "Created context - Client fingerprint: {}, Server fingerprint: {}",
            client.fingerprint,
            server.fingerprint
        );

        Ok(EncryptionContext::new(scheme, server, Some(client)))
    }

    fn encrypt(
        &self,
        ctx: &EncryptionContext,
        values: &[f64],
        max_values: usize,
    ) -> Result<CiphertextVector, CryptoError> {
        let tfhe_client_key = Self::secret_key(ctx)?;

        let take = values.len().min(max_values);
        if take < values.len() {
            tracing::debug!("Truncating input from {} to {take} values", values.len());
        }

        let mut encrypted = Vec::with_capacity(take);
        for (i, &value) in values[..take].iter().enumerate() {
            let q = ctx.scheme.quantize(i, value, Evaluation::None)?;
            encrypted.push(FheInt64::encrypt(q, &tfhe_client_key));
            tracing::trace!("Encrypted value {i}");
        }

        let ciphertext = bincode::serialize(&encrypted).map_err(|e| {
            CryptoError::Encryption(format!("Failed to serialize encrypted data: {e}"))
        })?;

        tracing::info!(
            "Encrypted {take} values (ciphertext size: {} bytes, entropy: {:.4} bits/byte)",
            ciphertext.len(),
            byte_entropy(&ciphertext)
        );

        Ok(CiphertextVector::new(
            ciphertext,
            take,
            1,
            ctx.fingerprint().to_string(),
        ))
    }

    fn square(
        &self,
        ctx: &EncryptionContext,
        ciphertext: &CiphertextVector,
    ) -> Result<CiphertextVector, CryptoError> {
        if ciphertext.scale_power != 1 {
            return Err(CryptoError::Evaluation(format!(
                "Cannot square a ciphertext at scale power {}",
                ciphertext.scale_power
            )));
        }

        let tfhe_server_key = Self::deserialize_tfhe_server_key(ctx.server_key.as_bytes())?;

        // Set the server key for homomorphic operations (TLS) and ensure it is cleared
        // when this evaluation finishes.
        struct ServerKeyGuard;
        impl Drop for ServerKeyGuard {
            fn drop(&mut self) {
                unset_server_key();
            }
        }

        set_server_key(tfhe_server_key);
        let _server_key_guard = ServerKeyGuard;

        let elements = Self::deserialize_elements(ciphertext)?;
        let squared: Vec<FheInt64> = elements.iter().map(|ct| ct * ct).collect();

        let bytes = bincode::serialize(&squared).map_err(|e| {
            CryptoError::Evaluation(format!("Failed to serialize squared ciphertext: {e}"))
        })?;

        tracing::info!("Squared {} encrypted values", squared.len());

        Ok(CiphertextVector::new(
            bytes,
            squared.len(),
            2,
            ciphertext.key_fingerprint.clone(),
        ))
    }

    fn decrypt(
        &self,
        ctx: &EncryptionContext,
        ciphertext: &CiphertextVector,
    ) -> Result<Vec<f64>, CryptoError> {
        tracing::debug!("Decrypting {} values...", ciphertext.len);

        let tfhe_client_key = Self::secret_key(ctx)?;
        let elements = Self::deserialize_elements(ciphertext)
            .map_err(|e| CryptoError::Decryption(e.to_string()))?;

        let values = elements
            .iter()
            .map(|ct| {
                let raw: i64 = ct.decrypt(&tfhe_client_key);
                ctx.scheme.dequantize(ciphertext.scale_power, raw)
            })
            .collect();

        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;

    // Key generation is slow; share one context across tests.
    fn shared_context() -> &'static EncryptionContext {
        static CTX: OnceLock<EncryptionContext> = OnceLock::new();
        CTX.get_or_init(|| {
            TfheAdapter::new()
                .create_context(HeScheme::approximate())
                .expect("Key generation should succeed")
        })
    }

    #[test]
    fn test_context_generation() {
        let ctx = shared_context();

        // HE keys are large
        assert!(ctx.server_key.as_bytes().len() > 100);
        assert!(ctx.has_secret_key());
        assert!(!ctx.fingerprint().is_empty());
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip_within_tolerance() {
        let adapter = TfheAdapter::new();
        let ctx = shared_context();
        let values = [0.0, 1.0, 2.0, 3.25, -4.5];

        let ct = adapter.encrypt(ctx, &values, 100).expect("encrypt");
        assert_eq!(ct.len, values.len());
        assert_eq!(ct.key_fingerprint, ctx.fingerprint());

        let restored = CiphertextVector::from_bytes(&ct.to_bytes().expect("encode")).expect("decode");
        let decrypted = adapter.decrypt(ctx, &restored).expect("decrypt");
        for (a, b) in values.iter().zip(&decrypted) {
            assert!((a - b).abs() < 1e-3, "{a} vs {b}");
        }
    }

    #[test]
    fn test_encrypt_truncates() {
        let adapter = TfheAdapter::new();
        let values: Vec<f64> = (0..8).map(f64::from).collect();

        let ct = adapter.encrypt(shared_context(), &values, 3).expect("encrypt");
        assert_eq!(ct.len, 3);
    }

    #[test]
    fn test_public_context_cannot_decrypt() {
        let adapter = TfheAdapter::new();
        let ctx = shared_context();
        let ct = adapter.encrypt(ctx, &[1.0], 100).expect("encrypt");

        assert!(matches!(
            adapter.decrypt(&ctx.public(), &ct),
            Err(CryptoError::MissingSecretKey)
        ));
        assert!(matches!(
            adapter.encrypt(&ctx.public(), &[1.0], 100),
            Err(CryptoError::MissingSecretKey)
        ));
    }

    #[test]
    fn test_context_survives_serialization() {
        let adapter = TfheAdapter::new();
        let ctx = shared_context();
        let ct = adapter.encrypt(ctx, &[2.0, 5.0], 100).expect("encrypt");

        let restored =
            EncryptionContext::from_bytes(&ctx.to_bytes(true).expect("encode")).expect("decode");
        let decrypted = adapter.decrypt(&restored, &ct).expect("decrypt");
        assert!((decrypted[1] - 5.0).abs() < 1e-3);
    }

    #[test]
    fn test_square_rejects_squared_input() {
        let adapter = TfheAdapter::new();
        let ct = CiphertextVector::new(Vec::new(), 0, 2, String::new());
        assert!(matches!(
            adapter.square(shared_context(), &ct),
            Err(CryptoError::Evaluation(_))
        ));
    }

    #[test]
    #[ignore = "homomorphic multiplication takes minutes on CPU"]
    fn test_square() {
        let adapter = TfheAdapter::new();
        let ctx = shared_context();
        let ct = adapter.encrypt(ctx, &[3.0, -1.5], 100).expect("encrypt");

        let squared = adapter.square(ctx, &ct).expect("square");
        assert_eq!(squared.scale_power, 2);

        let decrypted = adapter.decrypt(ctx, &squared).expect("decrypt");
        assert!((decrypted[0] - 9.0).abs() < 1e-3);
        assert!((decrypted[1] - 2.25).abs() < 1e-3);
    }
}

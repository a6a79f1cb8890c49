//! In-process HE engine that keeps quantized values in the clear.
//!
//! Encodes exactly like the tfhe adapter (same quantization, same scale
//! powers) but stores the integers as JSON, so runs finish instantly.
//! Squaring fails on `i64` overflow instead of wrapping.

use crate::domain::{
    CiphertextVector, ClientKey, CryptoError, EncryptionContext, Evaluation, HeScheme, ServerKey,
};
use crate::ports::HeEngine;

/// Clear-text engine; decryption still needs the context's secret key.
#[derive(Debug, Default)]
pub struct MemoryHeEngine;

impl MemoryHeEngine {
    pub fn new() -> Self {
        Self
    }

    fn elements(ciphertext: &CiphertextVector) -> Result<Vec<i64>, CryptoError> {
        let elements: Vec<i64> = serde_json::from_slice(&ciphertext.ciphertext)
            .map_err(|e| CryptoError::Serialization(format!("Invalid ciphertext: {e}")))?;
        if elements.len() != ciphertext.len {
            return Err(CryptoError::Serialization(format!(
                "Ciphertext holds {} elements, header says {}",
                elements.len(),
                ciphertext.len
            )));
        }
        Ok(elements)
    }

    fn seal(
        elements: &[i64],
        scale_power: u32,
        fingerprint: &str,
    ) -> Result<CiphertextVector, CryptoError> {
        let bytes =
            serde_json::to_vec(elements).map_err(|e| CryptoError::Serialization(e.to_string()))?;
        Ok(CiphertextVector::new(
            bytes,
            elements.len(),
            scale_power,
            fingerprint.to_string(),
        ))
    }
}

impl HeEngine for MemoryHeEngine {
    fn create_context(&self, scheme: HeScheme) -> Result<EncryptionContext, CryptoError> {
        use rand::{Rng, SeedableRng};

        let secret: [u8; 32] = rand_chacha::ChaCha20Rng::from_entropy().gen();
        Ok(EncryptionContext::new(
            scheme,
            ServerKey::from_bytes(secret.iter().map(|b| b ^ 0x5a).collect()),
            Some(ClientKey::from_bytes(secret.to_vec())),
        ))
    }

    fn encrypt(
        &self,
        ctx: &EncryptionContext,
        values: &[f64],
        max_values: usize,
    ) -> Result<CiphertextVector, CryptoError> {
        if !ctx.has_secret_key() {
            return Err(CryptoError::MissingSecretKey);
        }
        let elements = values
            .iter()
            .take(max_values)
            .enumerate()
            .map(|(i, &v)| ctx.scheme.quantize(i, v, Evaluation::None))
            .collect::<Result<Vec<_>, _>>()?;
        Self::seal(&elements, 1, ctx.fingerprint())
    }

    fn square(
        &self,
        _ctx: &EncryptionContext,
        ciphertext: &CiphertextVector,
    ) -> Result<CiphertextVector, CryptoError> {
        if ciphertext.scale_power != 1 {
            return Err(CryptoError::Evaluation(format!(
                "Cannot square a ciphertext at scale power {}",
                ciphertext.scale_power
            )));
        }
        let squared = Self::elements(ciphertext)?
            .iter()
            .enumerate()
            .map(|(i, q)| {
                q.checked_mul(*q).ok_or_else(|| {
                    CryptoError::Evaluation(format!("Value {i} overflows when squared"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::seal(&squared, 2, &ciphertext.key_fingerprint)
    }

    fn decrypt(
        &self,
        ctx: &EncryptionContext,
        ciphertext: &CiphertextVector,
    ) -> Result<Vec<f64>, CryptoError> {
        if !ctx.has_secret_key() {
            return Err(CryptoError::MissingSecretKey);
        }
        let elements =
            Self::elements(ciphertext).map_err(|e| CryptoError::Decryption(e.to_string()))?;
        Ok(elements
            .into_iter()
            .map(|q| ctx.scheme.dequantize(ciphertext.scale_power, q))
            .collect())
    }
}

//! Remote decryption function.
//!
//! Fetches the base64 ciphertext and the binary context from object storage,
//! applies the requested homomorphic evaluation, decrypts with the context's
//! secret key and returns the first values.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::domain::{
    CiphertextVector, CryptoError, DecryptionRequest, DecryptionResponse, EncryptionContext,
    Evaluation,
};
use crate::ports::{FunctionHandler, HeEngine, ObjectStorage};

const MISSING_KEYS: &str = "Missing required S3 keys";

/// Handler behind the decryption function.
pub struct DecryptionHandler {
    storage: Arc<dyn ObjectStorage>,
    he: Arc<dyn HeEngine>,
}

impl DecryptionHandler {
    pub fn new(storage: Arc<dyn ObjectStorage>, he: Arc<dyn HeEngine>) -> Self {
        Self { storage, he }
    }

    /// Answer one request. Never fails; errors become 400/500 responses.
    pub async fn handle(&self, request: &DecryptionRequest) -> DecryptionResponse {
        if !request.is_complete() {
            tracing::warn!("Rejecting request without storage references");
            return DecryptionResponse::error(400, MISSING_KEYS);
        }

        match self.decrypt(request).await {
            Ok(values) => {
                tracing::info!("Decrypted {} values", values.len());
                DecryptionResponse::ok(&values)
            }
            Err(e) => {
                tracing::error!("Decryption failed: {e}");
                DecryptionResponse::error(500, e.to_string())
            }
        }
    }

    async fn decrypt(&self, request: &DecryptionRequest) -> crate::Result<Vec<f64>> {
        let payload = self
            .storage
            .download(&request.s3_bucket, &request.encrypted_payload_key)
            .await?;
        let ciphertext_bytes = BASE64
            .decode(payload.trim_ascii())
            .map_err(|e| CryptoError::Serialization(format!("Payload is not base64: {e}")))?;
        let ciphertext = CiphertextVector::from_bytes(&ciphertext_bytes)?;

        let context_bytes = self
            .storage
            .download(&request.s3_bucket, &request.seal_context_key)
            .await?;
        let ctx = EncryptionContext::from_bytes(&context_bytes)?;
        tracing::debug!(
            "Loaded context {} and {} ciphertext bytes",
            ctx.fingerprint(),
            ciphertext.size_bytes()
        );

        let ciphertext = match request.evaluation {
            Evaluation::None => ciphertext,
            Evaluation::Square => {
                let squared = self.he.square(&ctx, &ciphertext)?;
                tracing::info!("Squared {} values with the evaluation key", squared.len);
                squared
            }
        };

        Ok(self.he.decrypt(&ctx, &ciphertext)?)
    }
}

#[async_trait]
impl FunctionHandler for DecryptionHandler {
    async fn call(&self, payload: &[u8]) -> Vec<u8> {
        // Anything that isn't a request object is treated as an empty request.
        let request: DecryptionRequest = serde_json::from_slice(payload).unwrap_or_default();
        let response = self.handle(&request).await;
        serde_json::to_vec(&response).unwrap_or_else(|e| {
            format!(r#"{{"statusCode":500,"error":"Failed to encode response: {e}"}}"#).into_bytes()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemoryHeEngine, MemoryStorage};
    use crate::domain::HeScheme;
    use crate::ports::Payload;

    async fn seeded_storage(with_secret: bool) -> Arc<MemoryStorage> {
        let storage = Arc::new(MemoryStorage::new("S3").with_container("bucket"));
        let engine = MemoryHeEngine::new();
        let ctx = engine.create_context(HeScheme::Exact).expect("ctx");
        let values: Vec<f64> = (0..25).map(f64::from).collect();
        let ct = engine.encrypt(&ctx, &values, 100).expect("encrypt");

        storage
            .upload(
                "bucket",
                "payload.json",
                Payload::Text(BASE64.encode(ct.to_bytes().expect("bytes"))),
                false,
            )
            .await
            .expect("upload");
        storage
            .upload(
                "bucket",
                "context.bin",
                Payload::Binary(ctx.to_bytes(with_secret).expect("ctx")),
                true,
            )
            .await
            .expect("upload");
        storage
    }

    fn request() -> DecryptionRequest {
        DecryptionRequest {
            s3_bucket: "bucket".into(),
            encrypted_payload_key: "payload.json".into(),
            seal_context_key: "context.bin".into(),
            evaluation: Evaluation::None,
        }
    }

    fn handler(storage: Arc<MemoryStorage>) -> DecryptionHandler {
        DecryptionHandler::new(storage, Arc::new(MemoryHeEngine::new()))
    }

    #[tokio::test]
    async fn test_returns_first_ten_values() {
        let handler = handler(seeded_storage(true).await);
        let response = handler.handle(&request()).await;

        assert_eq!(response.status_code, Some(200));
        let values = response.decrypted_result.expect("values");
        assert_eq!(values, (0..10).map(f64::from).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_square_is_applied_before_decrypting() {
        let handler = handler(seeded_storage(true).await);
        let mut squared = request();
        squared.evaluation = Evaluation::Square;

        let response = handler.handle(&squared).await;
        assert_eq!(response.status_code, Some(200));
        let values = response.decrypted_result.expect("values");
        assert_eq!(values, (0..10).map(|v| f64::from(v * v)).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_missing_keys_is_bad_request() {
        let handler = handler(seeded_storage(true).await);
        let mut partial = request();
        partial.seal_context_key.clear();

        let response = handler.handle(&partial).await;
        assert_eq!(response.status_code, Some(400));
        assert_eq!(response.error.as_deref(), Some(MISSING_KEYS));
    }

    #[tokio::test]
    async fn test_failures_are_server_errors() {
        let handler = handler(seeded_storage(false).await);
        let response = handler.handle(&request()).await;
        assert_eq!(response.status_code, Some(500));
        assert!(response.decrypted_result.is_none());

        let mut missing = request();
        missing.encrypted_payload_key = "nope.json".into();
        let response = handler.handle(&missing).await;
        assert_eq!(response.status_code, Some(500));
        assert!(response.error.expect("error").contains("nope.json"));
    }

    #[tokio::test]
    async fn test_raw_call_accepts_json_and_garbage() {
        let handler = handler(seeded_storage(true).await);

        let body = serde_json::to_vec(&request()).expect("json");
        let ok: DecryptionResponse =
            serde_json::from_slice(&handler.call(&body).await).expect("response");
        assert_eq!(ok.status_code, Some(200));

        let bad: DecryptionResponse =
            serde_json::from_slice(&handler.call(b"not json").await).expect("response");
        assert_eq!(bad.status_code, Some(400));
    }
}

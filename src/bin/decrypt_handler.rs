//! Decryption function for the AWS Lambda `provided.al2023` runtime.
//!
//! Reads the HE payload and the serialized context from S3, optionally squares
//! it with the evaluation key, decrypts with the context's secret key and
//! answers with the first decrypted values.
//!
//! # Usage
//!
//! Installed as `bootstrap` by the image `ehrcrypt deploy` builds; the
//! event is `{"s3_bucket", "encrypted_payload_key", "seal_context_key"}`
//! plus an optional `"evaluation": "square"`.

use std::sync::Arc;

use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ehrcrypt::adapters::aws::{self, S3Storage};
use ehrcrypt::adapters::sanitize::SanitizingMakeWriter;
use ehrcrypt::adapters::tfhe::TfheAdapter;
use ehrcrypt::application::DecryptionHandler;
use ehrcrypt::domain::{DecryptionRequest, DecryptionResponse};
use ehrcrypt::Config;

#[tokio::main]
async fn main() -> Result<(), Error> {
    // CloudWatch timestamps every line itself.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .without_time()
                .with_writer(SanitizingMakeWriter::new(std::io::stdout)),
        )
        .init();

    let region = match std::env::var("AWS_REGION") {
        Ok(region) => region,
        Err(_) => Config::load(None).map_err(|e| e.to_string())?.aws.region,
    };
    let sdk = aws::load_sdk_config(&region).await;
    let handler = Arc::new(DecryptionHandler::new(
        Arc::new(S3Storage::from_config(&sdk)),
        Arc::new(TfheAdapter::new()),
    ));
    tracing::info!("Decryption function ready in {region}");

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let handler = handler.clone();
        async move { Ok::<DecryptionResponse, Error>(respond(&handler, event.payload).await) }
    }))
    .await
}

async fn respond(handler: &DecryptionHandler, payload: Value) -> DecryptionResponse {
    // Malformed events become an empty request and a 400 answer.
    let request: DecryptionRequest = serde_json::from_value(payload).unwrap_or_default();
    handler.handle(&request).await
}

//! Remote decryption request/response and response interpretation.

use serde::{Deserialize, Serialize};

use super::crypto::Evaluation;

/// Number of decrypted values returned by the remote function.
pub const RESULT_PREVIEW_LEN: usize = 10;

/// Default element-wise tolerance for [`verify_decryption`].
pub const DEFAULT_TOLERANCE: f64 = 1e-3;

/// Storage references sent to the remote decryption function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DecryptionRequest {
    #[serde(default)]
    pub s3_bucket: String,
    #[serde(default)]
    pub encrypted_payload_key: String,
    #[serde(default)]
    pub seal_context_key: String,
    /// Applied to the ciphertext before decrypting; omitted when `None`.
    #[serde(default, skip_serializing_if = "Evaluation::is_none")]
    pub evaluation: Evaluation,
}

impl DecryptionRequest {
    /// Whether every storage reference is present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.s3_bucket.is_empty()
            && !self.encrypted_payload_key.is_empty()
            && !self.seal_context_key.is_empty()
    }
}

/// Body returned by the remote decryption function.
///
/// `error` also accepts the `errorMessage` field the Lambda runtime emits for
/// unhandled function errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DecryptionResponse {
    #[serde(rename = "statusCode", default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decrypted_result: Option<Vec<f64>>,
    #[serde(default, alias = "errorMessage", skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DecryptionResponse {
    /// Successful response carrying the first decrypted values.
    #[must_use]
    pub fn ok(values: &[f64]) -> Self {
        Self {
            status_code: Some(200),
            decrypted_result: Some(values.iter().take(RESULT_PREVIEW_LEN).copied().collect()),
            error: None,
        }
    }

    /// Error response with the given status.
    #[must_use]
    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status_code: Some(status),
            decrypted_result: None,
            error: Some(message.into()),
        }
    }
}

/// Terminal failures while interpreting an invocation.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum InvocationError {
    #[error("Remote function returned status {status}{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Status { status: u16, message: Option<String> },

    #[error("Remote function response is missing its payload")]
    MissingPayload,

    #[error("Failed to decode remote function response: {0}")]
    Decode(String),

    #[error("Remote function returned neither a result nor an error")]
    Empty,
}

/// Non-terminal outcome of an invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationOutcome {
    /// The function decrypted the payload.
    Decrypted(Vec<f64>),
    /// The function reported an error; downstream verification is skipped.
    RemoteError(String),
}

/// Classify the raw result of a synchronous invocation.
///
/// # Errors
/// Returns an `InvocationError` for every outcome that must abort the run.
pub fn interpret_invocation(
    transport_status: u16,
    payload: Option<&[u8]>,
) -> Result<InvocationOutcome, InvocationError> {
    if transport_status != 200 {
        return Err(InvocationError::Status {
            status: transport_status,
            message: payload.map(|p| String::from_utf8_lossy(p).into_owned()),
        });
    }

    let payload = payload.ok_or(InvocationError::MissingPayload)?;
    let body: DecryptionResponse =
        serde_json::from_slice(payload).map_err(|e| InvocationError::Decode(e.to_string()))?;

    if let Some(status) = body.status_code.filter(|&s| s != 200) {
        return Err(InvocationError::Status {
            status,
            message: body.error,
        });
    }

    match (body.decrypted_result, body.error) {
        (Some(values), _) if !values.is_empty() => Ok(InvocationOutcome::Decrypted(values)),
        (_, Some(message)) => Ok(InvocationOutcome::RemoteError(message)),
        _ => Err(InvocationError::Empty),
    }
}

/// Result of comparing decrypted values to the plaintext.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationReport {
    /// Number of compared positions.
    pub compared: usize,
    /// `(index, expected, actual)` for every position outside tolerance.
    pub mismatches: Vec<(usize, f64, f64)>,
}

impl VerificationReport {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.compared > 0 && self.mismatches.is_empty()
    }
}

/// Compare `decrypted` with `original` over their common prefix.
#[must_use]
pub fn verify_decryption(original: &[f64], decrypted: &[f64], tolerance: f64) -> VerificationReport {
    let mismatches = original
        .iter()
        .zip(decrypted)
        .enumerate()
        .filter(|(_, (o, d))| (*o - *d).abs() > tolerance || !d.is_finite())
        .map(|(i, (o, d))| (i, *o, *d))
        .collect();
    VerificationReport {
        compared: original.len().min(decrypted.len()),
        mismatches,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let req = DecryptionRequest {
            s3_bucket: "secure-ehr-bucket".into(),
            encrypted_payload_key: "encrypted_data_HE.json".into(),
            seal_context_key: "seal_context.bin".into(),
            evaluation: Evaluation::None,
        };
        let json = serde_json::to_value(&req).expect("serialize");
        assert_eq!(json["s3_bucket"], "secure-ehr-bucket");
        assert!(json.get("evaluation").is_none());
        assert!(req.is_complete());

        let squared: DecryptionRequest = serde_json::from_str(
            r#"{"s3_bucket":"b","encrypted_payload_key":"p","seal_context_key":"c","evaluation":"square"}"#,
        )
        .expect("deserialize");
        assert_eq!(squared.evaluation, Evaluation::Square);

        let partial: DecryptionRequest =
            serde_json::from_str(r#"{"s3_bucket":"b"}"#).expect("deserialize");
        assert!(!partial.is_complete());
    }

    #[test]
    fn test_ok_response_truncates() {
        let values: Vec<f64> = (0..25).map(f64::from).collect();
        let resp = DecryptionResponse::ok(&values);
        assert_eq!(resp.decrypted_result.as_ref().map(Vec::len), Some(RESULT_PREVIEW_LEN));

        let json = serde_json::to_string(&resp).expect("serialize");
        assert!(json.contains("\"statusCode\":200"));
        assert!(!json.contains("error"));
    }

    #[test]
    fn test_interpret_decrypted() {
        let body = br#"{"statusCode":200,"decrypted_result":[1.0,2.0]}"#;
        assert_eq!(
            interpret_invocation(200, Some(body)),
            Ok(InvocationOutcome::Decrypted(vec![1.0, 2.0]))
        );
    }

    #[test]
    fn test_interpret_transport_status_is_terminal() {
        let body = br#"{"statusCode":200,"decrypted_result":[1.0]}"#;
        assert!(matches!(
            interpret_invocation(502, Some(body)),
            Err(InvocationError::Status { status: 502, .. })
        ));
    }

    #[test]
    fn test_interpret_body_status_is_terminal_even_with_result() {
        let body = br#"{"statusCode":500,"decrypted_result":[1.0],"error":"boom"}"#;
        assert_eq!(
            interpret_invocation(200, Some(body)),
            Err(InvocationError::Status {
                status: 500,
                message: Some("boom".into())
            })
        );
    }

    #[test]
    fn test_interpret_missing_and_malformed_payload() {
        assert_eq!(
            interpret_invocation(200, None),
            Err(InvocationError::MissingPayload)
        );
        assert!(matches!(
            interpret_invocation(200, Some(b"not json")),
            Err(InvocationError::Decode(_))
        ));
    }

    #[test]
    fn test_interpret_remote_error_field() {
        let body = br#"{"errorMessage":"task timed out","errorType":"Timeout"}"#;
        assert_eq!(
            interpret_invocation(200, Some(body)),
            Ok(InvocationOutcome::RemoteError("task timed out".into()))
        );
    }

    #[test]
    fn test_interpret_empty_body() {
        assert_eq!(
            interpret_invocation(200, Some(br#"{"statusCode":200,"decrypted_result":[]}"#)),
            Err(InvocationError::Empty)
        );
    }

    #[test]
    fn test_verify_decryption() {
        let original = [0.0, 1.0, 2.0, 3.0];
        let close = [0.0002, 0.9995, 2.0];
        let report = verify_decryption(&original, &close, DEFAULT_TOLERANCE);
        assert_eq!(report.compared, 3);
        assert!(report.passed());

        let off = [0.0, 1.5];
        let report = verify_decryption(&original, &off, DEFAULT_TOLERANCE);
        assert_eq!(report.mismatches, vec![(1, 1.0, 1.5)]);
        assert!(!report.passed());

        assert!(!verify_decryption(&original, &[], DEFAULT_TOLERANCE).passed());
    }
}

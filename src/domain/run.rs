//! Summary of one pipeline run.

use serde::{Deserialize, Serialize};

use super::crypto::{Evaluation, HeScheme};

/// How the remote decryption stage ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DecryptionStatus {
    /// Values matched the plaintext within tolerance.
    Verified { compared: usize },
    /// Values were returned but differ from the plaintext.
    Mismatch { mismatches: usize },
    /// The function reported an error; verification was skipped.
    RemoteError { message: String },
}

/// Facts about a completed run, returned to the CLI and shown in reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub scheme: HeScheme,
    #[serde(default)]
    pub evaluation: Evaluation,
    pub values_encrypted: usize,
    pub he_ciphertext_bytes: usize,
    pub he_ciphertext_entropy: f64,
    pub context_bytes: usize,
    pub aes_ciphertext_bytes: usize,
    pub decryption: DecryptionStatus,
}

impl RunSummary {
    /// Whether the run should exit successfully.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        matches!(self.decryption, DecryptionStatus::Verified { .. })
    }
}

/// Generate a random UUID v4 for tagging a run.
///
/// Uses ChaCha20Rng seeded from OS entropy.
#[must_use]
pub fn new_run_id() -> String {
    use rand::Rng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    let mut rng = ChaCha20Rng::from_entropy();
    let bytes: [u8; 16] = rng.gen();

    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        bytes[0], bytes[1], bytes[2], bytes[3],
        bytes[4], bytes[5],
        (bytes[6] & 0x0f) | 0x40, bytes[7],
        (bytes[8] & 0x3f) | 0x80, bytes[9],
        bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_format() {
        let a = new_run_id();
        let b = new_run_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
        assert_eq!(a.chars().nth(14), Some('4'));
    }

    #[test]
    fn test_remote_error_is_failure() {
        let summary = RunSummary {
            run_id: new_run_id(),
            started_at: chrono::Utc::now(),
            scheme: HeScheme::approximate(),
            evaluation: Evaluation::None,
            values_encrypted: 3,
            he_ciphertext_bytes: 10,
            he_ciphertext_entropy: 7.9,
            context_bytes: 10,
            aes_ciphertext_bytes: 40,
            decryption: DecryptionStatus::RemoteError {
                message: "boom".into(),
            },
        };
        assert!(!summary.succeeded());
    }
}

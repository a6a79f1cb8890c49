//! Domain layer: Core types and logic.
//!
//! Pure types with no cloud or I/O dependencies beyond local metric files.

mod crypto;
mod dataset;
pub mod invocation;
pub mod metrics;
mod run;
pub mod symmetric;

pub use crypto::{
    byte_entropy, CiphertextVector, ClientKey, CryptoError, EncryptionContext, Evaluation,
    HeScheme, ServerKey, SQUARE_LIMIT,
};
pub use dataset::{is_null_token, DatasetError, EncodedDataset, LabelEncoder};
pub use invocation::{
    interpret_invocation, verify_decryption, DecryptionRequest, DecryptionResponse,
    InvocationError, InvocationOutcome, VerificationReport,
};
pub use metrics::{stage, GroupedMetrics, MetricsError, MetricsRecord};
pub use run::{new_run_id, DecryptionStatus, RunSummary};
pub use symmetric::{SymmetricError, SymmetricKey};

//! Encoded clinical dataset.
//!
//! The pipeline only ever encrypts one categorical column, turned into small
//! non-negative integer codes by [`LabelEncoder`].

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Errors while loading and encoding the dataset.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Dataset not found: {0}")]
    NotFound(PathBuf),

    #[error("Column '{0}' not present in dataset header")]
    MissingColumn(String),

    #[error("Dataset has no rows with a value in '{0}'")]
    Empty(String),

    #[error("Malformed CSV: {0}")]
    Csv(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Maps distinct labels to their index in sorted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Fit an encoder on the given labels.
    pub fn fit<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let classes: BTreeSet<String> = labels
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect();
        Self {
            classes: classes.into_iter().collect(),
        }
    }

    /// Sorted distinct classes.
    #[must_use]
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Code for a label, if it was seen during fitting.
    #[must_use]
    pub fn encode(&self, label: &str) -> Option<u32> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(label))
            .ok()
            .map(|i| i as u32)
    }

    /// `(label, code)` pairs in code order.
    pub fn mapping(&self) -> impl Iterator<Item = (&str, u32)> {
        self.classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i as u32))
    }
}

/// Label-encoded column ready for encryption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodedDataset {
    /// Name of the encoded column.
    pub column: String,
    /// Codes in row order.
    pub codes: Vec<u32>,
    /// Encoder fitted on the column.
    pub encoder: LabelEncoder,
}

impl EncodedDataset {
    /// Encode `labels` (already stripped of nulls) for `column`.
    ///
    /// # Errors
    /// Returns `DatasetError::Empty` if there is nothing to encode.
    pub fn from_labels(column: impl Into<String>, labels: &[String]) -> Result<Self, DatasetError> {
        let column = column.into();
        if labels.is_empty() {
            return Err(DatasetError::Empty(column));
        }
        let encoder = LabelEncoder::fit(labels);
        let codes = labels
            .iter()
            .filter_map(|l| encoder.encode(l))
            .collect();
        Ok(Self {
            column,
            codes,
            encoder,
        })
    }

    /// Codes as floating point values for the HE encoder.
    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        self.codes.iter().map(|&c| f64::from(c)).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// Whether a raw CSV field counts as missing.
///
/// Mirrors the null tokens pandas recognises by default.
#[must_use]
pub fn is_null_token(field: &str) -> bool {
    matches!(
        field.trim(),
        "" | "NA" | "N/A" | "NaN" | "nan" | "NULL" | "null" | "None" | "<NA>" | "#N/A" | "n/a"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_encoder_sorted_codes() {
        let encoder = LabelEncoder::fit(["HCFA", "APR", "MS", "APR"]);

        assert_eq!(encoder.classes(), &["APR", "HCFA", "MS"]);
        assert_eq!(encoder.encode("APR"), Some(0));
        assert_eq!(encoder.encode("MS"), Some(2));
        assert_eq!(encoder.encode("unknown"), None);
    }

    #[test]
    fn test_encoded_dataset_preserves_row_order() {
        let labels: Vec<String> = ["MS", "APR", "MS", "HCFA"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let ds = EncodedDataset::from_labels("drg_type", &labels).expect("encode");

        assert_eq!(ds.codes, vec![2, 0, 2, 1]);
        assert_eq!(ds.values(), vec![2.0, 0.0, 2.0, 1.0]);
        assert_eq!(
            ds.encoder.mapping().collect::<Vec<_>>(),
            vec![("APR", 0), ("HCFA", 1), ("MS", 2)]
        );
    }

    #[test]
    fn test_empty_labels_rejected() {
        assert!(matches!(
            EncodedDataset::from_labels("drg_type", &[]),
            Err(DatasetError::Empty(_))
        ));
    }

    #[test]
    fn test_null_tokens() {
        assert!(is_null_token(""));
        assert!(is_null_token("  "));
        assert!(is_null_token("NaN"));
        assert!(is_null_token("NULL"));
        assert!(!is_null_token("APR"));
        assert!(!is_null_token("0"));
    }
}

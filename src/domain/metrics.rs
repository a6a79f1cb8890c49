//! Per-stage timing metrics.
//!
//! A run records wall-clock seconds per stage in insertion order. The record
//! is persisted as a flat JSON object so the report and dashboard can pick it
//! up later.

use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Stage names used as metric keys.
pub mod stage {
    pub const CREATE_CONTEXT: &str = "create_context";
    pub const LOAD_PREPARE_DATA: &str = "load_prepare_data";
    pub const HE_ENCRYPT: &str = "he_encrypt";
    pub const KMS_ENCRYPT_DUMMY_HE_KEY: &str = "kms_encrypt_dummy_HE_key";
    pub const UPLOAD_S3_HE: &str = "upload_s3_HE";
    pub const UPLOAD_AZURE_HE: &str = "upload_azure_HE";
    pub const LAMBDA_INVOKE: &str = "lambda_invoke";
    pub const AES_ENCRYPT: &str = "aes_encrypt";
    pub const AES_DECRYPT: &str = "aes_decrypt";
    pub const UPLOAD_S3_AES: &str = "upload_s3_AES";
    pub const KMS_ENCRYPT_KEY: &str = "kms_encrypt_key";
}

/// Errors reading or writing a metrics file.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Metrics file not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid metrics JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Ordered mapping from stage name to elapsed seconds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsRecord {
    entries: Vec<(String, f64)>,
}

fn round4(secs: f64) -> f64 {
    (secs * 10_000.0).round() / 10_000.0
}

impl MetricsRecord {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a duration for `stage`, rounded to 4 decimals.
    ///
    /// Re-recording a stage replaces its value and keeps its position.
    pub fn record(&mut self, stage: &str, elapsed: Duration) {
        self.insert_secs(stage, elapsed.as_secs_f64());
    }

    fn insert_secs(&mut self, stage: &str, secs: f64) {
        let secs = round4(secs);
        match self.entries.iter_mut().find(|(k, _)| k == stage) {
            Some(entry) => entry.1 = secs,
            None => self.entries.push((stage.to_string(), secs)),
        }
    }

    /// Run `f` and record how long it took.
    pub fn time<T>(&mut self, stage: &str, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        self.record(stage, start.elapsed());
        tracing::debug!(stage, secs = self.get(stage).unwrap_or_default(), "Stage timed");
        out
    }

    /// Await `fut` and record how long it took.
    pub async fn time_async<F: Future>(&mut self, stage: &str, fut: F) -> F::Output {
        let start = Instant::now();
        let out = fut.await;
        self.record(stage, start.elapsed());
        tracing::debug!(stage, secs = self.get(stage).unwrap_or_default(), "Stage timed");
        out
    }

    #[must_use]
    pub fn get(&self, stage: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(k, _)| k == stage)
            .map(|(_, v)| *v)
    }

    /// Value for `stage`, zero when absent.
    #[must_use]
    pub fn get_or_zero(&self, stage: &str) -> f64 {
        self.get(stage).unwrap_or(0.0)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all recorded stages.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, v)| v).sum()
    }

    /// Write the record as pretty JSON.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), MetricsError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Read a record written by [`MetricsRecord::save`].
    ///
    /// # Errors
    /// Returns `MetricsError::NotFound` if the file is missing.
    pub fn load(path: &Path) -> Result<Self, MetricsError> {
        if !path.exists() {
            return Err(MetricsError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl Serialize for MetricsRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for MetricsRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RecordVisitor;

        impl<'de> Visitor<'de> for RecordVisitor {
            type Value = MetricsRecord;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a map of stage names to seconds")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut record = MetricsRecord::new();
                while let Some((k, v)) = access.next_entry::<String, f64>()? {
                    record.insert_secs(&k, v);
                }
                Ok(record)
            }
        }

        deserializer.deserialize_map(RecordVisitor)
    }
}

/// Stage totals grouped into the categories shown in charts.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GroupedMetrics {
    pub he_ops: f64,
    pub aes_ops: f64,
    pub upload_time: f64,
    pub kms_encryption: f64,
    pub lambda_compute: f64,
    pub data_prep: f64,
}

impl GroupedMetrics {
    /// Sum constituent stages; absent stages count as zero.
    #[must_use]
    pub fn from_record(record: &MetricsRecord) -> Self {
        let g = |s| record.get_or_zero(s);
        Self {
            he_ops: g(stage::HE_ENCRYPT),
            aes_ops: g(stage::AES_ENCRYPT) + g(stage::AES_DECRYPT),
            upload_time: g(stage::UPLOAD_S3_HE) + g(stage::UPLOAD_AZURE_HE) + g(stage::UPLOAD_S3_AES),
            kms_encryption: g(stage::KMS_ENCRYPT_KEY) + g(stage::KMS_ENCRYPT_DUMMY_HE_KEY),
            lambda_compute: g(stage::LAMBDA_INVOKE),
            data_prep: g(stage::LOAD_PREPARE_DATA),
        }
    }

    /// `(category label, seconds)` in display order.
    #[must_use]
    pub fn categories(&self) -> [(&'static str, f64); 6] {
        [
            ("HE Ops", self.he_ops),
            ("AES Ops", self.aes_ops),
            ("Upload Time", self.upload_time),
            ("KMS Encryption", self.kms_encryption),
            ("Lambda Compute", self.lambda_compute),
            ("Data Prep", self.data_prep),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_record_rounds_and_overwrites_in_place() {
        let mut m = MetricsRecord::new();
        m.record(stage::HE_ENCRYPT, Duration::from_micros(123_456));
        m.record(stage::AES_ENCRYPT, Duration::from_millis(2));
        m.record(stage::HE_ENCRYPT, Duration::from_millis(500));

        let keys: Vec<&str> = m.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![stage::HE_ENCRYPT, stage::AES_ENCRYPT]);
        assert_eq!(m.get(stage::HE_ENCRYPT), Some(0.5));
        assert_eq!(m.get(stage::AES_ENCRYPT), Some(0.002));
    }

    #[test]
    fn test_time_returns_closure_value() {
        let mut m = MetricsRecord::new();
        let v = m.time(stage::LOAD_PREPARE_DATA, || 41 + 1);
        assert_eq!(v, 42);
        assert!(m.get(stage::LOAD_PREPARE_DATA).is_some());
    }

    #[tokio::test]
    async fn test_time_async_records_stage() {
        let mut m = MetricsRecord::new();
        let v = m.time_async(stage::LAMBDA_INVOKE, async { "done" }).await;
        assert_eq!(v, "done");
        assert!(m.get(stage::LAMBDA_INVOKE).is_some());
    }

    #[test]
    fn test_json_preserves_order() {
        let mut m = MetricsRecord::new();
        m.record("zeta", Duration::from_secs(1));
        m.record("alpha", Duration::from_secs(2));

        let json = serde_json::to_string(&m).expect("serialize");
        assert_eq!(json, r#"{"zeta":1.0,"alpha":2.0}"#);

        let back: MetricsRecord = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, m);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("out").join("encryption_metrics.json");

        let mut m = MetricsRecord::new();
        m.record(stage::CREATE_CONTEXT, Duration::from_millis(1500));
        m.save(&path).expect("save");

        assert_eq!(MetricsRecord::load(&path).expect("load"), m);
        assert!(matches!(
            MetricsRecord::load(&dir.path().join("missing.json")),
            Err(MetricsError::NotFound(_))
        ));
    }

    #[test]
    fn test_grouped_sums_with_zero_defaults() {
        let mut m = MetricsRecord::new();
        m.record(stage::AES_ENCRYPT, Duration::from_millis(100));
        m.record(stage::AES_DECRYPT, Duration::from_millis(200));
        m.record(stage::UPLOAD_S3_HE, Duration::from_millis(1000));
        m.record(stage::UPLOAD_S3_AES, Duration::from_millis(500));
        m.record(stage::KMS_ENCRYPT_KEY, Duration::from_millis(50));

        let g = GroupedMetrics::from_record(&m);
        assert!((g.aes_ops - 0.3).abs() < 1e-9);
        assert!((g.upload_time - 1.5).abs() < 1e-9);
        assert!((g.kms_encryption - 0.05).abs() < 1e-9);
        assert_eq!(g.he_ops, 0.0);
        assert_eq!(g.lambda_compute, 0.0);
        assert_eq!(g.data_prep, 0.0);
    }

    #[test]
    fn test_grouped_empty_record_is_all_zero() {
        let g = GroupedMetrics::from_record(&MetricsRecord::new());
        assert_eq!(g, GroupedMetrics::default());
        assert_eq!(g.categories()[0].0, "HE Ops");
    }
}

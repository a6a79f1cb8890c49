//! CSV dataset loader.
//!
//! Reads the clinical CSV, drops rows with a null category and label-encodes
//! the remaining values.

use std::path::Path;

use csv::ReaderBuilder;

use crate::domain::{is_null_token, DatasetError, EncodedDataset};

/// Loads one categorical column from a CSV file with a header row.
#[derive(Debug, Clone)]
pub struct CsvDatasetLoader {
    category_column: String,
}

impl CsvDatasetLoader {
    pub fn new(category_column: impl Into<String>) -> Self {
        Self {
            category_column: category_column.into(),
        }
    }

    /// Load and encode the configured column.
    ///
    /// # Errors
    /// - `DatasetError::NotFound` if the file does not exist
    /// - `DatasetError::MissingColumn` if the header lacks the column
    /// - `DatasetError::Empty` if every row is null in that column
    pub fn load(&self, path: &Path) -> Result<EncodedDataset, DatasetError> {
        if !path.exists() {
            return Err(DatasetError::NotFound(path.to_path_buf()));
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .map_err(|e| DatasetError::Csv(e.to_string()))?;

        let headers = reader
            .headers()
            .map_err(|e| DatasetError::Csv(e.to_string()))?
            .clone();
        let column = headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(&self.category_column))
            .ok_or_else(|| DatasetError::MissingColumn(self.category_column.clone()))?;

        let mut labels = Vec::new();
        let mut dropped = 0usize;
        for record in reader.records() {
            let record = record.map_err(|e| DatasetError::Csv(e.to_string()))?;
            match record.get(column) {
                Some(field) if !is_null_token(field) => labels.push(field.trim().to_string()),
                _ => dropped += 1,
            }
        }

        tracing::debug!(
            "Read {} rows from {} ({dropped} dropped with null {})",
            labels.len(),
            path.display(),
            self.category_column
        );

        let dataset = EncodedDataset::from_labels(&self.category_column, &labels)?;

        let mapping = dataset
            .encoder
            .mapping()
            .map(|(label, code)| format!("{label}={code}"))
            .collect::<Vec<_>>()
            .join(", ");
        tracing::info!("Encoding map for {}: {{{mapping}}}", self.category_column);

        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(content.as_bytes()).expect("write");
        file
    }

    #[test]
    fn test_load_drops_nulls_and_encodes() {
        let file = write_csv(
            "row_id,subject_id,DRG_TYPE,drg_code\n\
             1,10,MS,190\n\
             2,11,,191\n\
             3,12,APR,192\n\
             4,13,NA,193\n\
             5,14,HCFA,194\n\
             6,15,MS,195\n",
        );

        let ds = CsvDatasetLoader::new("drg_type")
            .load(file.path())
            .expect("load");

        assert_eq!(ds.codes, vec![2, 0, 1, 2]);
        assert_eq!(ds.encoder.classes(), &["APR", "HCFA", "MS"]);
    }

    #[test]
    fn test_missing_file() {
        let result = CsvDatasetLoader::new("drg_type").load(Path::new("/nonexistent/DRGCODES.csv"));
        assert!(matches!(result, Err(DatasetError::NotFound(_))));
    }

    #[test]
    fn test_missing_column() {
        let file = write_csv("a,b\n1,2\n");
        let result = CsvDatasetLoader::new("drg_type").load(file.path());
        assert!(matches!(result, Err(DatasetError::MissingColumn(c)) if c == "drg_type"));
    }

    #[test]
    fn test_all_null_column() {
        let file = write_csv("drg_type\nNaN\n\n");
        let result = CsvDatasetLoader::new("drg_type").load(file.path());
        assert!(matches!(result, Err(DatasetError::Empty(_))));
    }
}

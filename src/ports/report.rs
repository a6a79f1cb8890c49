//! Report rendering port.

use std::path::{Path, PathBuf};

use crate::domain::{MetricsRecord, RunSummary};

/// Errors while rendering charts or the report.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Nothing to render: metrics record is empty")]
    EmptyMetrics,

    #[error("Chart rendering failed: {0}")]
    Render(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Files written by a renderer.
#[derive(Debug, Clone, Default)]
pub struct RenderedReport {
    pub charts: Vec<PathBuf>,
    pub document: Option<PathBuf>,
}

/// Turns a metrics record into charts and a printable document.
pub trait ReportRenderer: Send + Sync {
    /// Render into `out_dir`. `summary` is included when available.
    ///
    /// # Errors
    /// Returns `ReportError::EmptyMetrics` for an empty record.
    fn render(
        &self,
        metrics: &MetricsRecord,
        summary: Option<&RunSummary>,
        out_dir: &Path,
    ) -> Result<RenderedReport, ReportError>;
}

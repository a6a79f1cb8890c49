//! Report service: turns a persisted metrics file into charts and a document.

use std::path::Path;
use std::sync::Arc;

use crate::domain::{MetricsRecord, RunSummary};
use crate::ports::{RenderedReport, ReportRenderer};
use crate::Result;

pub struct ReportService {
    renderer: Arc<dyn ReportRenderer>,
}

impl ReportService {
    pub fn new(renderer: Arc<dyn ReportRenderer>) -> Self {
        Self { renderer }
    }

    /// Render metrics already in memory, e.g. right after a run.
    ///
    /// # Errors
    /// Returns `ReportError::EmptyMetrics` or a rendering failure.
    pub fn render(
        &self,
        metrics: &MetricsRecord,
        summary: Option<&RunSummary>,
        out_dir: &Path,
    ) -> Result<RenderedReport> {
        let rendered = self.renderer.render(metrics, summary, out_dir)?;
        tracing::info!(
            "Rendered {} chart(s) into {}",
            rendered.charts.len(),
            out_dir.display()
        );
        Ok(rendered)
    }

    /// Load `metrics_path` and render it.
    ///
    /// # Errors
    /// Returns `MetricsError::NotFound` if no run has saved metrics yet.
    pub fn render_saved(&self, metrics_path: &Path, out_dir: &Path) -> Result<RenderedReport> {
        let metrics = MetricsRecord::load(metrics_path)?;
        tracing::info!(
            "Loaded {} metric(s) from {}",
            metrics.len(),
            metrics_path.display()
        );
        self.render(&metrics, None, out_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{stage, MetricsError};
    use crate::ports::ReportError;
    use crate::PipelineError;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records what it was asked to render.
    #[derive(Default)]
    struct Recorder {
        rendered: Mutex<Vec<(usize, bool, PathBuf)>>,
    }

    impl ReportRenderer for Recorder {
        fn render(
            &self,
            metrics: &MetricsRecord,
            summary: Option<&RunSummary>,
            out_dir: &Path,
        ) -> std::result::Result<RenderedReport, ReportError> {
            if metrics.is_empty() {
                return Err(ReportError::EmptyMetrics);
            }
            self.rendered.lock().expect("lock").push((
                metrics.len(),
                summary.is_some(),
                out_dir.to_path_buf(),
            ));
            Ok(RenderedReport {
                charts: vec![out_dir.join("chart.png")],
                document: None,
            })
        }
    }

    #[test]
    fn test_render_saved_metrics() {
        let dir = tempfile::tempdir().expect("tempdir");
        let metrics_path = dir.path().join("encryption_metrics.json");
        let mut metrics = MetricsRecord::new();
        metrics.record(stage::HE_ENCRYPT, Duration::from_millis(40));
        metrics.record(stage::AES_ENCRYPT, Duration::from_millis(1));
        metrics.save(&metrics_path).expect("save");

        let recorder = Arc::new(Recorder::default());
        let service = ReportService::new(recorder.clone());
        let rendered = service
            .render_saved(&metrics_path, dir.path())
            .expect("render");

        assert_eq!(rendered.charts.len(), 1);
        assert_eq!(
            recorder.rendered.lock().expect("lock").as_slice(),
            [(2, false, dir.path().to_path_buf())]
        );
    }

    #[test]
    fn test_missing_metrics_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = ReportService::new(Arc::new(Recorder::default()));
        let result = service.render_saved(&dir.path().join("nope.json"), dir.path());

        assert!(matches!(
            result,
            Err(PipelineError::Metrics(MetricsError::NotFound(_)))
        ));
    }

    #[test]
    fn test_empty_metrics_propagate() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = ReportService::new(Arc::new(Recorder::default()));
        assert!(matches!(
            service.render(&MetricsRecord::new(), None, dir.path()),
            Err(PipelineError::Report(ReportError::EmptyMetrics))
        ));
    }
}

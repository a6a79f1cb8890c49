//! Chart and report rendering with plotters.
//!
//! Three charts are produced from a metrics record:
//! - per-operation vertical bars
//! - the same data as horizontal bars
//! - the grouped categories (HE Ops, AES Ops, Upload Time, ...)
//!
//! Each is written as PNG, and all three are embedded as inline SVG in a
//! print-paginated HTML report together with the timing table.

use std::fmt::Write as _;
use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;

use crate::domain::{DecryptionStatus, GroupedMetrics, MetricsRecord, RunSummary};
use crate::ports::{RenderedReport, ReportError, ReportRenderer};

pub const BAR_CHART: &str = "encryption_metrics_bar.png";
pub const HORIZONTAL_CHART: &str = "encryption_metrics_horizontal.png";
pub const GROUPED_CHART: &str = "encryption_metrics_grouped.png";
pub const REPORT_DOCUMENT: &str = "encryption_metrics_report.html";

const PNG_SIZE: (u32, u32) = (1200, 700);
const SVG_SIZE: (u32, u32) = (960, 560);
const FONT: &str = "sans-serif";
const BAR_COLOR: RGBColor = RGBColor(0x4c, 0x72, 0xb0);

/// Labels and values for one chart.
struct Series {
    title: &'static str,
    labels: Vec<String>,
    values: Vec<f64>,
}

impl Series {
    fn operations(metrics: &MetricsRecord) -> Self {
        let (labels, values) = metrics
            .iter()
            .map(|(stage, secs)| (stage.to_string(), secs))
            .unzip();
        Self {
            title: "Encryption Pipeline Timing per Operation",
            labels,
            values,
        }
    }

    fn grouped(metrics: &MetricsRecord) -> Self {
        let (labels, values) = GroupedMetrics::from_record(metrics)
            .categories()
            .iter()
            .map(|(label, secs)| ((*label).to_string(), *secs))
            .unzip();
        Self {
            title: "Grouped Timing by Category",
            labels,
            values,
        }
    }

    /// Upper bound of the value axis with headroom for the value labels.
    fn axis_max(&self) -> f64 {
        let max = self.values.iter().copied().fold(0.0_f64, f64::max);
        if max > 0.0 {
            max * 1.15
        } else {
            1.0
        }
    }

    fn label(&self, value: &SegmentValue<usize>) -> String {
        match value {
            SegmentValue::CenterOf(i) | SegmentValue::Exact(i) => {
                self.labels.get(*i).cloned().unwrap_or_default()
            }
            SegmentValue::Last => String::new(),
        }
    }
}

fn render_error(e: impl std::fmt::Display) -> ReportError {
    ReportError::Render(e.to_string())
}

fn draw_vertical<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    series: &Series,
    palette: bool,
) -> Result<(), ReportError> {
    area.fill(&WHITE).map_err(render_error)?;
    let n = series.values.len();

    let mut chart = ChartBuilder::on(area)
        .caption(series.title, (FONT, 26))
        .margin(20)
        .x_label_area_size(90)
        .y_label_area_size(70)
        .build_cartesian_2d((0usize..n).into_segmented(), 0.0..series.axis_max())
        .map_err(render_error)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n)
        .x_label_style((FONT, 12))
        .x_label_formatter(&|v| series.label(v))
        .y_desc("Time (seconds)")
        .draw()
        .map_err(render_error)?;

    for (i, value) in series.values.iter().enumerate() {
        let color = if palette {
            Palette99::pick(i).to_rgba()
        } else {
            BAR_COLOR.to_rgba()
        };
        chart
            .draw_series(
                Histogram::vertical(&chart)
                    .style(color.filled())
                    .margin(12)
                    .data(std::iter::once((i, *value))),
            )
            .map_err(render_error)?;
    }

    chart
        .draw_series(series.values.iter().enumerate().map(|(i, value)| {
            Text::new(
                format!("{value:.4}"),
                (SegmentValue::CenterOf(i), *value),
                (FONT, 12),
            )
        }))
        .map_err(render_error)?;

    area.present().map_err(render_error)
}

fn draw_horizontal<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    series: &Series,
) -> Result<(), ReportError> {
    area.fill(&WHITE).map_err(render_error)?;
    let n = series.values.len();

    let mut chart = ChartBuilder::on(area)
        .caption(series.title, (FONT, 26))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(190)
        .build_cartesian_2d(0.0..series.axis_max(), (0usize..n).into_segmented())
        .map_err(render_error)?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(n)
        .y_label_style((FONT, 12))
        .y_label_formatter(&|v| series.label(v))
        .x_desc("Time (seconds)")
        .draw()
        .map_err(render_error)?;

    chart
        .draw_series(
            Histogram::horizontal(&chart)
                .style(BAR_COLOR.filled())
                .margin(8)
                .data(series.values.iter().enumerate().map(|(i, v)| (i, *v))),
        )
        .map_err(render_error)?;

    area.present().map_err(render_error)
}

/// The three charts, in report order.
fn charts(metrics: &MetricsRecord) -> [(&'static str, Series, Layout); 3] {
    [
        (BAR_CHART, Series::operations(metrics), Layout::Vertical),
        (HORIZONTAL_CHART, Series::operations(metrics), Layout::Horizontal),
        (GROUPED_CHART, Series::grouped(metrics), Layout::Grouped),
    ]
}

#[derive(Clone, Copy)]
enum Layout {
    Vertical,
    Horizontal,
    Grouped,
}

fn draw<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    series: &Series,
    layout: Layout,
) -> Result<(), ReportError> {
    match layout {
        Layout::Vertical => draw_vertical(area, series, false),
        Layout::Horizontal => draw_horizontal(area, series),
        Layout::Grouped => draw_vertical(area, series, true),
    }
}

fn render_svg(series: &Series, layout: Layout) -> Result<String, ReportError> {
    let mut svg = String::new();
    {
        let area = SVGBackend::with_string(&mut svg, SVG_SIZE).into_drawing_area();
        draw(&area, series, layout)?;
    }
    Ok(svg)
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn summary_section(summary: &RunSummary) -> String {
    let decryption = match &summary.decryption {
        DecryptionStatus::Verified { compared } => {
            format!("verified ({compared} values within tolerance)")
        }
        DecryptionStatus::Mismatch { mismatches } => {
            format!("MISMATCH ({mismatches} values differ)")
        }
        DecryptionStatus::RemoteError { message } => format!("remote error: {message}"),
    };
    let rows = [
        ("Run", summary.run_id.clone()),
        ("Started", summary.started_at.to_rfc3339()),
        ("Scheme", summary.scheme.to_string()),
        ("Evaluation", summary.evaluation.to_string()),
        ("Values encrypted", summary.values_encrypted.to_string()),
        ("HE ciphertext", format!("{} bytes", summary.he_ciphertext_bytes)),
        (
            "HE ciphertext entropy",
            format!("{:.4} bits/byte", summary.he_ciphertext_entropy),
        ),
        ("Context", format!("{} bytes", summary.context_bytes)),
        ("AES ciphertext", format!("{} bytes", summary.aes_ciphertext_bytes)),
        ("Remote decryption", decryption),
    ];

    let mut html = String::from("<h2>Run summary</h2>\n<table>\n");
    for (name, value) in rows {
        let _ = writeln!(
            html,
            "<tr><th>{}</th><td>{}</td></tr>",
            name,
            escape_html(&value)
        );
    }
    html.push_str("</table>\n");
    html
}

fn timing_table(metrics: &MetricsRecord) -> String {
    let mut html = String::from(
        "<h2>Timing per operation</h2>\n<table>\n<tr><th>Operation</th><th>Seconds</th></tr>\n",
    );
    for (stage, secs) in metrics.iter() {
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td class=\"num\">{secs:.4}</td></tr>",
            escape_html(stage)
        );
    }
    let _ = writeln!(
        html,
        "<tr class=\"total\"><td>Total</td><td class=\"num\">{:.4}</td></tr>",
        metrics.total()
    );
    html.push_str("</table>\n");

    html.push_str("<h2>Grouped</h2>\n<table>\n<tr><th>Category</th><th>Seconds</th></tr>\n");
    for (label, secs) in GroupedMetrics::from_record(metrics).categories() {
        let _ = writeln!(
            html,
            "<tr><td>{label}</td><td class=\"num\">{secs:.4}</td></tr>"
        );
    }
    html.push_str("</table>\n");
    html
}

const STYLE: &str = "body { font-family: sans-serif; margin: 2em; color: #222; }
table { border-collapse: collapse; margin-bottom: 1.5em; }
th, td { border: 1px solid #bbb; padding: 4px 10px; text-align: left; }
td.num { text-align: right; font-variant-numeric: tabular-nums; }
tr.total td { font-weight: bold; }
.page { break-after: page; page-break-after: always; }
.page:last-child { break-after: auto; page-break-after: auto; }
svg { max-width: 100%; height: auto; }
";

/// Assemble the HTML document. One printed page per section.
fn report_document(
    metrics: &MetricsRecord,
    summary: Option<&RunSummary>,
    svgs: &[String],
) -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Encryption Metrics Report</title>\n<style>\n",
    );
    html.push_str(STYLE);
    html.push_str("</style>\n</head>\n<body>\n<section class=\"page\">\n<h1>Encryption Metrics Report</h1>\n");
    if let Some(summary) = summary {
        html.push_str(&summary_section(summary));
    }
    html.push_str(&timing_table(metrics));
    html.push_str("</section>\n");

    for svg in svgs {
        html.push_str("<section class=\"page\">\n");
        html.push_str(svg);
        html.push_str("\n</section>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

/// Renders PNG charts and the HTML report.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlotRenderer;

impl PlotRenderer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ReportRenderer for PlotRenderer {
    fn render(
        &self,
        metrics: &MetricsRecord,
        summary: Option<&RunSummary>,
        out_dir: &Path,
    ) -> Result<RenderedReport, ReportError> {
        if metrics.is_empty() {
            return Err(ReportError::EmptyMetrics);
        }
        std::fs::create_dir_all(out_dir)?;

        let mut report = RenderedReport::default();
        let mut svgs = Vec::with_capacity(3);

        for (file_name, series, layout) in charts(metrics) {
            let path = out_dir.join(file_name);
            {
                let area = BitMapBackend::new(&path, PNG_SIZE).into_drawing_area();
                draw(&area, &series, layout)?;
            }
            tracing::info!("Chart saved: {}", path.display());
            report.charts.push(path);
            svgs.push(render_svg(&series, layout)?);
        }

        let document = out_dir.join(REPORT_DOCUMENT);
        std::fs::write(&document, report_document(metrics, summary, &svgs))?;
        tracing::info!("Report saved: {}", document.display());
        report.document = Some(document);

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{new_run_id, stage, Evaluation, HeScheme};
    use std::time::Duration;

    fn sample_metrics() -> MetricsRecord {
        let mut metrics = MetricsRecord::new();
        metrics.record(stage::HE_ENCRYPT, Duration::from_millis(1500));
        metrics.record(stage::AES_ENCRYPT, Duration::from_millis(2));
        metrics.record(stage::AES_DECRYPT, Duration::from_millis(1));
        metrics.record(stage::UPLOAD_S3_HE, Duration::from_millis(300));
        metrics
    }

    #[test]
    fn test_empty_metrics_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = PlotRenderer::new().render(&MetricsRecord::new(), None, dir.path());
        assert!(matches!(result, Err(ReportError::EmptyMetrics)));
    }

    #[test]
    fn test_series_follow_record_order() {
        let series = Series::operations(&sample_metrics());
        assert_eq!(series.labels[0], stage::HE_ENCRYPT);
        assert_eq!(series.values, vec![1.5, 0.002, 0.001, 0.3]);
        assert!((series.axis_max() - 1.725).abs() < 1e-9);
        assert_eq!(series.label(&SegmentValue::CenterOf(3)), stage::UPLOAD_S3_HE);
        assert_eq!(series.label(&SegmentValue::Last), "");
    }

    #[test]
    fn test_grouped_series() {
        let series = Series::grouped(&sample_metrics());
        assert_eq!(series.labels.len(), 6);
        assert_eq!(series.labels[1], "AES Ops");
        assert!((series.values[1] - 0.003).abs() < 1e-9);
    }

    #[test]
    fn test_all_zero_axis() {
        let mut metrics = MetricsRecord::new();
        metrics.record(stage::LAMBDA_INVOKE, Duration::ZERO);
        assert_eq!(Series::operations(&metrics).axis_max(), 1.0);
    }

    #[test]
    fn test_document_layout() {
        let summary = RunSummary {
            run_id: new_run_id(),
            started_at: chrono::Utc::now(),
            scheme: HeScheme::approximate(),
            evaluation: Evaluation::Square,
            values_encrypted: 100,
            he_ciphertext_bytes: 2048,
            he_ciphertext_entropy: 7.99,
            context_bytes: 4096,
            aes_ciphertext_bytes: 340,
            decryption: DecryptionStatus::RemoteError {
                message: "bad <context>".into(),
            },
        };
        let svgs = vec!["<svg id=\"a\"></svg>".to_string(), "<svg id=\"b\"></svg>".to_string()];
        let html = report_document(&sample_metrics(), Some(&summary), &svgs);

        assert_eq!(html.matches("<section class=\"page\">").count(), 3);
        assert!(html.contains("remote error: bad &lt;context&gt;"));
        assert!(html.contains("<td>he_encrypt</td><td class=\"num\">1.5000</td>"));
        assert!(html.contains("<td>Upload Time</td><td class=\"num\">0.3000</td>"));
        assert!(html.contains("<svg id=\"b\"></svg>"));
    }

    // Needs a system font for axis labels.
    #[test]
    #[ignore]
    fn test_render_writes_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let report = PlotRenderer::new()
            .render(&sample_metrics(), None, dir.path())
            .expect("render");

        assert_eq!(report.charts.len(), 3);
        for chart in &report.charts {
            assert!(chart.exists());
        }
        let document = report.document.expect("document");
        let html = std::fs::read_to_string(document).expect("read");
        assert_eq!(html.matches("<svg").count(), 3);
    }
}

//! Bar chart views.
//!
//! Bars carry whole milliseconds; the printed value keeps the four
//! decimals of the metrics file.

use ratatui::{
    layout::{Direction, Rect},
    text::{Line, Span},
    widgets::{Bar, BarChart, BarGroup, Block, Borders},
    Frame,
};

use crate::tui::app::Snapshot;
use crate::tui::styles::MedicalTheme;

use super::{render_notice, NO_METRICS};

fn millis(secs: f64) -> u64 {
    (secs.max(0.0) * 1000.0).round() as u64
}

fn bar(label: &str, secs: f64) -> Bar<'static> {
    Bar::default()
        .label(Line::from(label.to_string()))
        .value(millis(secs))
        .text_value(format!("{secs:.4}s"))
        .style(MedicalTheme::series(label))
        .value_style(MedicalTheme::selected())
}

fn chart_block(title: &str) -> Block<'static> {
    Block::default()
        .title(Span::styled(format!(" {title} "), MedicalTheme::subtitle()))
        .borders(Borders::ALL)
        .border_style(MedicalTheme::border_focused())
}

/// One horizontal bar per recorded stage.
pub fn render_operations(f: &mut Frame, area: Rect, snapshot: &Snapshot) {
    if snapshot.metrics.is_empty() {
        render_notice(f, area, "Per operation", NO_METRICS);
        return;
    }

    let bars: Vec<Bar> = snapshot
        .metrics
        .iter()
        .map(|(stage, secs)| bar(stage, secs))
        .collect();

    let chart = BarChart::default()
        .block(chart_block("Encryption metrics (seconds)"))
        .direction(Direction::Horizontal)
        .bar_width(1)
        .bar_gap(1)
        .data(BarGroup::default().bars(&bars));
    f.render_widget(chart, area);
}

/// One vertical bar per category.
pub fn render_grouped(f: &mut Frame, area: Rect, snapshot: &Snapshot) {
    if snapshot.metrics.is_empty() {
        render_notice(f, area, "Grouped", NO_METRICS);
        return;
    }

    let categories = snapshot.grouped.categories();
    let bars: Vec<Bar> = categories
        .iter()
        .map(|(label, secs)| bar(label, *secs))
        .collect();

    let slot = area.width.saturating_sub(2) / categories.len() as u16;
    let chart = BarChart::default()
        .block(chart_block("Grouped encryption metrics"))
        .bar_width(slot.saturating_sub(2).max(3))
        .bar_gap(2)
        .data(BarGroup::default().bars(&bars));
    f.render_widget(chart, area);
}

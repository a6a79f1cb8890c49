//! Timing table view: every stage plus the grouped categories.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Row, Table},
    Frame,
};

use crate::tui::app::Snapshot;
use crate::tui::styles::MedicalTheme;

use super::{render_notice, NO_METRICS};

fn share(secs: f64, total: f64) -> String {
    if total > 0.0 {
        format!("{:5.1}%", secs / total * 100.0)
    } else {
        "   - ".to_string()
    }
}

pub fn render_timings(f: &mut Frame, area: Rect, snapshot: &Snapshot) {
    if snapshot.metrics.is_empty() {
        render_notice(f, area, "Timings", NO_METRICS);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    let total = snapshot.metrics.total();
    let mut rows: Vec<Row> = snapshot
        .metrics
        .iter()
        .map(|(stage, secs)| {
            Row::new(vec![
                Line::from(Span::styled(stage.to_string(), MedicalTheme::series(stage))),
                Line::from(format!("{secs:.4}")),
                Line::from(share(secs, total)),
            ])
        })
        .collect();
    rows.push(
        Row::new(vec![
            "total".to_string(),
            format!("{total:.4}"),
            String::new(),
        ])
        .style(MedicalTheme::title()),
    );

    let stages = Table::new(
        rows,
        [Constraint::Min(26), Constraint::Length(12), Constraint::Length(8)],
    )
    .header(Row::new(vec!["Stage", "Seconds", "Share"]).style(MedicalTheme::header()))
    .style(MedicalTheme::text())
    .block(
        Block::default()
            .title(Span::styled(" Stages ", MedicalTheme::subtitle()))
            .borders(Borders::ALL)
            .border_style(MedicalTheme::border_focused()),
    );
    f.render_widget(stages, chunks[0]);

    let grouped = &snapshot.grouped;
    let rows: Vec<Row> = grouped
        .categories()
        .iter()
        .map(|(label, secs)| {
            Row::new(vec![
                Line::from(Span::styled(label.to_string(), MedicalTheme::series(label))),
                Line::from(format!("{secs:.4}")),
            ])
        })
        .collect();

    let ratio = if grouped.aes_ops > 0.0 {
        format!(" HE/AES ×{:.0} ", grouped.he_ops / grouped.aes_ops)
    } else {
        String::new()
    };
    let categories = Table::new(rows, [Constraint::Min(16), Constraint::Length(12)])
        .header(Row::new(vec!["Category", "Seconds"]).style(MedicalTheme::header()))
        .style(MedicalTheme::text())
        .block(
            Block::default()
                .title(Span::styled(" Categories ", MedicalTheme::subtitle()))
                .title_bottom(Line::from(Span::styled(ratio, MedicalTheme::text_secondary())))
                .borders(Borders::ALL)
                .border_style(MedicalTheme::border()),
        );
    f.render_widget(categories, chunks[1]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_handles_zero_total() {
        assert_eq!(share(1.0, 4.0), " 25.0%");
        assert_eq!(share(0.0, 0.0), "   - ");
    }
}

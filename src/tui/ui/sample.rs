//! Decrypted sample view.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Row, Sparkline, Table},
    Frame,
};

use crate::tui::app::Snapshot;
use crate::tui::styles::MedicalTheme;

use super::render_notice;

pub fn render_sample(f: &mut Frame, area: Rect, snapshot: &Snapshot) {
    let Some(values) = snapshot.decrypted.as_deref().filter(|v| !v.is_empty()) else {
        render_notice(
            f,
            area,
            "Decrypted sample",
            "No decrypted sample; the remote function has not returned values yet",
        );
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Min(0)])
        .split(area);

    // Label codes are small non-negative integers.
    let heights: Vec<u64> = values.iter().map(|v| v.max(0.0).round() as u64).collect();
    let spark = Sparkline::default()
        .block(
            Block::default()
                .title(Span::styled(" Codes ", MedicalTheme::subtitle()))
                .borders(Borders::ALL)
                .border_style(MedicalTheme::border()),
        )
        .data(&heights)
        .style(MedicalTheme::series("HE Ops"));
    f.render_widget(spark, chunks[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(30), Constraint::Min(0)])
        .split(chunks[1]);

    let rows: Vec<Row> = values
        .iter()
        .enumerate()
        .map(|(i, v)| Row::new(vec![i.to_string(), format!("{v:.4}")]))
        .collect();
    let table = Table::new(rows, [Constraint::Length(8), Constraint::Min(12)])
        .header(Row::new(vec!["Index", "Value"]).style(MedicalTheme::header()))
        .style(MedicalTheme::text())
        .block(
            Block::default()
                .title(Span::styled(" Decrypted values ", MedicalTheme::subtitle()))
                .borders(Borders::ALL)
                .border_style(MedicalTheme::border_focused()),
        );
    f.render_widget(table, body[0]);

    let info = Paragraph::new(vec![
        Line::from(Span::styled(
            format!("{} value(s) returned by the remote function", values.len()),
            MedicalTheme::text(),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Values are label-encoded category codes, decrypted remotely",
            MedicalTheme::text_secondary(),
        )),
        Line::from(Span::styled(
            "with the context's secret key.",
            MedicalTheme::text_secondary(),
        )),
    ])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(MedicalTheme::border()),
    );
    f.render_widget(info, body[1]);
}

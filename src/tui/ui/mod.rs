//! UI module: view components for the dashboard.

pub mod charts;
pub mod sample;
pub mod table;

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs, Wrap},
    Frame,
};

use crate::tui::app::{Snapshot, View};
use crate::tui::styles::{MedicalTheme, LOGO_SMALL};

/// Draw the whole screen for `view`.
pub fn render(f: &mut Frame, view: View, snapshot: &Snapshot) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // View
            Constraint::Length(3), // Footer
        ])
        .split(f.area());

    render_header(f, chunks[0], view);
    match view {
        View::Table => table::render_timings(f, chunks[1], snapshot),
        View::Operations => charts::render_operations(f, chunks[1], snapshot),
        View::Grouped => charts::render_grouped(f, chunks[1], snapshot),
        View::Decrypted => sample::render_sample(f, chunks[1], snapshot),
    }
    render_footer(f, chunks[2], snapshot);
}

fn render_header(f: &mut Frame, area: Rect, view: View) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(40), Constraint::Min(0)])
        .split(area);

    let title = Paragraph::new(Line::from(vec![
        Span::styled(" ", MedicalTheme::text()),
        Span::styled(LOGO_SMALL, MedicalTheme::title()),
        Span::styled(" │ ", MedicalTheme::text_muted()),
        Span::styled("HE vs AES timings", MedicalTheme::text_secondary()),
    ]))
    .block(
        Block::default()
            .borders(Borders::BOTTOM)
            .border_style(MedicalTheme::border()),
    );
    f.render_widget(title, chunks[0]);

    let tabs = Tabs::new(View::ALL.iter().map(|v| v.title()))
        .select(view.index())
        .style(MedicalTheme::text_secondary())
        .highlight_style(MedicalTheme::selected())
        .divider("│")
        .block(
            Block::default()
                .borders(Borders::BOTTOM)
                .border_style(MedicalTheme::border()),
        );
    f.render_widget(tabs, chunks[1]);
}

fn render_footer(f: &mut Frame, area: Rect, snapshot: &Snapshot) {
    let mut spans = vec![
        Span::styled(" [Tab]", MedicalTheme::key_hint()),
        Span::styled(" Next view  ", MedicalTheme::key_desc()),
        Span::styled("[r]", MedicalTheme::key_hint()),
        Span::styled(" Reload  ", MedicalTheme::key_desc()),
        Span::styled("[q]", MedicalTheme::key_hint()),
        Span::styled(" Quit  ", MedicalTheme::key_desc()),
        Span::styled(
            format!("loaded {}", snapshot.loaded_at.format("%H:%M:%S")),
            MedicalTheme::text_muted(),
        ),
    ];
    if let Some(error) = &snapshot.error {
        spans.push(Span::styled("  ", MedicalTheme::text()));
        spans.push(Span::styled(error.clone(), MedicalTheme::danger()));
    }

    let p = Paragraph::new(Line::from(spans))
        .block(
            Block::default()
                .borders(Borders::TOP)
                .border_style(MedicalTheme::border()),
        )
        .wrap(Wrap { trim: true });
    f.render_widget(p, area);
}

/// Centered message used when a view has nothing to show.
pub(crate) fn render_notice(f: &mut Frame, area: Rect, title: &str, message: &str) {
    let p = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(message.to_string(), MedicalTheme::text_muted())),
    ])
    .alignment(Alignment::Center)
    .block(
        Block::default()
            .title(Span::styled(format!(" {title} "), MedicalTheme::subtitle()))
            .borders(Borders::ALL)
            .border_style(MedicalTheme::border()),
    );
    f.render_widget(p, area);
}

/// Message for views that need metrics when none were loaded.
pub(crate) const NO_METRICS: &str = "No metrics recorded yet";

//! Dashboard state machine.
//!
//! Handles:
//! - Loading the persisted metrics and decrypted sample
//! - View navigation
//! - Input event handling

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Local};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::domain::{GroupedMetrics, MetricsError, MetricsRecord};

use super::ui;

/// Current view of the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Table,
    Operations,
    Grouped,
    Decrypted,
}

impl View {
    pub const ALL: [View; 4] = [View::Table, View::Operations, View::Grouped, View::Decrypted];

    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            View::Table => "Timings",
            View::Operations => "Per operation",
            View::Grouped => "Grouped",
            View::Decrypted => "Decrypted sample",
        }
    }

    #[must_use]
    pub fn index(self) -> usize {
        Self::ALL.iter().position(|v| *v == self).unwrap_or(0)
    }

    #[must_use]
    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    #[must_use]
    pub fn previous(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// Everything read from disk for one refresh.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub metrics: MetricsRecord,
    pub grouped: GroupedMetrics,
    /// `None` when no decrypted sample has been written yet.
    pub decrypted: Option<Vec<f64>>,
    /// Problem reading the files, shown in the footer.
    pub error: Option<String>,
    pub loaded_at: DateTime<Local>,
}

impl Snapshot {
    /// Read both files. Missing or unreadable files leave the
    /// corresponding part empty and set `error`.
    #[must_use]
    pub fn load(metrics_path: &Path, decrypted_path: &Path) -> Self {
        let mut error = None;
        let metrics = match MetricsRecord::load(metrics_path) {
            Ok(m) => m,
            Err(MetricsError::NotFound(_)) => {
                error = Some(format!(
                    "No metrics at {}; run `ehrcrypt run` first",
                    metrics_path.display()
                ));
                MetricsRecord::new()
            }
            Err(e) => {
                tracing::warn!("Failed to load metrics: {e}");
                error = Some(e.to_string());
                MetricsRecord::new()
            }
        };

        let decrypted = match std::fs::read(decrypted_path) {
            Ok(bytes) => match serde_json::from_slice::<Vec<f64>>(&bytes) {
                Ok(values) => Some(values),
                Err(e) => {
                    tracing::warn!("Ignoring malformed {}: {e}", decrypted_path.display());
                    error.get_or_insert_with(|| {
                        format!("Malformed decrypted sample: {e}")
                    });
                    None
                }
            },
            Err(_) => None,
        };

        Self {
            grouped: GroupedMetrics::from_record(&metrics),
            metrics,
            decrypted,
            error,
            loaded_at: Local::now(),
        }
    }
}

/// Main application state
pub struct App {
    view: View,
    should_quit: bool,
    metrics_path: PathBuf,
    decrypted_path: PathBuf,
    snapshot: Snapshot,
}

impl App {
    /// Create the dashboard and perform the first load.
    pub fn new(metrics_path: impl Into<PathBuf>, decrypted_path: impl Into<PathBuf>) -> Self {
        let metrics_path = metrics_path.into();
        let decrypted_path = decrypted_path.into();
        let snapshot = Snapshot::load(&metrics_path, &decrypted_path);
        Self {
            view: View::Table,
            should_quit: false,
            metrics_path,
            decrypted_path,
            snapshot,
        }
    }

    #[must_use]
    pub fn view(&self) -> View {
        self.view
    }

    #[must_use]
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    #[must_use]
    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Re-read the files from disk.
    pub fn reload(&mut self) {
        self.snapshot = Snapshot::load(&self.metrics_path, &self.decrypted_path);
        tracing::debug!("Dashboard reloaded {} stages", self.snapshot.metrics.len());
    }

    /// Run the main application loop.
    ///
    /// # Errors
    /// Returns error if terminal operations fail.
    pub fn run(&mut self) -> Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.main_loop(&mut terminal);

        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        result
    }

    fn main_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
        while !self.should_quit {
            terminal.draw(|f| ui::render(f, self.view, &self.snapshot))?;

            if event::poll(Duration::from_millis(250))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key.code, key.modifiers);
                    }
                }
            }
        }
        Ok(())
    }

    pub fn handle_key(&mut self, key: KeyCode, modifiers: KeyModifiers) {
        if key == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }

        match key {
            KeyCode::Tab | KeyCode::Right => self.view = self.view.next(),
            KeyCode::BackTab | KeyCode::Left => self.view = self.view.previous(),
            KeyCode::Char('r') | KeyCode::Char('R') => self.reload(),
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => self.should_quit = true,
            _ => {}
        }
    }
}

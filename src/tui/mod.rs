//! Terminal dashboard over the persisted run artifacts.
//!
//! Provides:
//! - A timing table with the grouped categories
//! - Per-operation and grouped bar charts
//! - The decrypted sample returned by the remote function

mod app;
mod styles;
pub mod ui;

pub use app::{App, Snapshot, View};
pub use styles::MedicalTheme;

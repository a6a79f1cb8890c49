//! Dashboard palette.
//!
//! Homomorphic stages are drawn in teal, symmetric stages in amber and
//! cloud round-trips in blue so the two branches read apart at a glance.

use ratatui::style::{Color, Modifier, Style};

use crate::domain::stage;

pub struct MedicalTheme;

impl MedicalTheme {
    /// Deep teal (#0D9488)
    pub const PRIMARY: Color = Color::Rgb(13, 148, 136);
    /// #2DD4BF
    pub const PRIMARY_LIGHT: Color = Color::Rgb(45, 212, 191);
    /// #0F766E
    pub const PRIMARY_DARK: Color = Color::Rgb(15, 118, 110);

    /// #94A3B8
    pub const SECONDARY_LIGHT: Color = Color::Rgb(148, 163, 184);

    pub const SUCCESS: Color = Color::Rgb(16, 185, 129);
    pub const WARNING: Color = Color::Rgb(251, 191, 36);
    pub const DANGER: Color = Color::Rgb(244, 63, 94);
    pub const INFO: Color = Color::Rgb(59, 130, 246);

    pub const BG_DARK: Color = Color::Rgb(15, 23, 42);

    pub const TEXT_PRIMARY: Color = Color::Rgb(248, 250, 252);
    pub const TEXT_SECONDARY: Color = Color::Rgb(148, 163, 184);
    pub const TEXT_MUTED: Color = Color::Rgb(100, 116, 139);

    #[must_use]
    pub fn title() -> Style {
        Style::default()
            .fg(Self::TEXT_PRIMARY)
            .add_modifier(Modifier::BOLD)
    }

    #[must_use]
    pub fn subtitle() -> Style {
        Style::default()
            .fg(Self::PRIMARY_LIGHT)
            .add_modifier(Modifier::BOLD)
    }

    #[must_use]
    pub fn text() -> Style {
        Style::default().fg(Self::TEXT_PRIMARY)
    }

    #[must_use]
    pub fn text_secondary() -> Style {
        Style::default().fg(Self::TEXT_SECONDARY)
    }

    #[must_use]
    pub fn text_muted() -> Style {
        Style::default().fg(Self::TEXT_MUTED)
    }

    #[must_use]
    pub fn success() -> Style {
        Style::default().fg(Self::SUCCESS)
    }

    #[must_use]
    pub fn danger() -> Style {
        Style::default().fg(Self::DANGER)
    }

    /// Selected tab.
    #[must_use]
    pub fn selected() -> Style {
        Style::default()
            .fg(Self::BG_DARK)
            .bg(Self::PRIMARY)
            .add_modifier(Modifier::BOLD)
    }

    #[must_use]
    pub fn border() -> Style {
        Style::default().fg(Self::SECONDARY_LIGHT)
    }

    #[must_use]
    pub fn border_focused() -> Style {
        Style::default().fg(Self::PRIMARY)
    }

    /// Table header row.
    #[must_use]
    pub fn header() -> Style {
        Style::default()
            .fg(Self::TEXT_PRIMARY)
            .bg(Self::PRIMARY_DARK)
            .add_modifier(Modifier::BOLD)
    }

    #[must_use]
    pub fn key_hint() -> Style {
        Style::default()
            .fg(Self::PRIMARY_LIGHT)
            .add_modifier(Modifier::BOLD)
    }

    #[must_use]
    pub fn key_desc() -> Style {
        Style::default().fg(Self::TEXT_SECONDARY)
    }

    /// Bar colour for a stage key or grouped category label.
    #[must_use]
    pub fn series(name: &str) -> Style {
        let color = match name {
            stage::CREATE_CONTEXT | stage::HE_ENCRYPT | "HE Ops" => Self::PRIMARY_LIGHT,
            stage::AES_ENCRYPT | stage::AES_DECRYPT | "AES Ops" => Self::WARNING,
            stage::UPLOAD_S3_HE | stage::UPLOAD_AZURE_HE | stage::UPLOAD_S3_AES | "Upload Time" => {
                Self::INFO
            }
            stage::KMS_ENCRYPT_KEY | stage::KMS_ENCRYPT_DUMMY_HE_KEY | "KMS Encryption" => {
                Self::DANGER
            }
            stage::LAMBDA_INVOKE | "Lambda Compute" => Self::SUCCESS,
            _ => Self::SECONDARY_LIGHT,
        };
        Style::default().fg(color)
    }
}

/// Name shown in the header bar.
pub const LOGO_SMALL: &str = "ehrcrypt";

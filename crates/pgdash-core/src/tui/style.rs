//! Color scheme and styles.

use ratatui::style::{Color, Modifier, Style};

use crate::analysis::Severity;
use crate::plan::NodeKind;

pub struct Theme;

impl Theme {
    pub const BG: Color = Color::Reset;
    pub const HEADER_BG: Color = Color::Blue;
    pub const SELECTED_BG: Color = Color::DarkGray;

    pub const FG: Color = Color::White;
    pub const FG_DIM: Color = Color::DarkGray;
    pub const HEADER_FG: Color = Color::White;

    pub const HIGHLIGHT_OK: Color = Color::Green;
    pub const HIGHLIGHT_WARN: Color = Color::Yellow;
    pub const HIGHLIGHT_CRITICAL: Color = Color::Red;

    pub const TAB_ACTIVE: Color = Color::Cyan;
    pub const TAB_INACTIVE: Color = Color::DarkGray;

    pub const COST_BAR: Color = Color::Cyan;
    pub const TIME_BAR: Color = Color::Magenta;
}

/// Pre-defined styles.
pub struct Styles;

impl Styles {
    pub fn default() -> Style {
        Style::default().fg(Theme::FG).bg(Theme::BG)
    }

    pub fn header() -> Style {
        Style::default()
            .fg(Theme::HEADER_FG)
            .bg(Theme::HEADER_BG)
            .add_modifier(Modifier::BOLD)
    }

    pub fn selected() -> Style {
        Style::default()
            .bg(Theme::SELECTED_BG)
            .add_modifier(Modifier::BOLD)
    }

    pub fn table_header() -> Style {
        Style::default()
            .fg(Theme::HEADER_FG)
            .bg(Theme::HEADER_BG)
            .add_modifier(Modifier::BOLD)
    }

    /// Healthy / live indicator (green).
    pub fn ok() -> Style {
        Style::default().fg(Theme::HIGHLIGHT_OK)
    }

    /// Warning value style (yellow).
    pub fn warning() -> Style {
        Style::default().fg(Theme::HIGHLIGHT_WARN)
    }

    /// Critical value style (red).
    pub fn critical() -> Style {
        Style::default()
            .fg(Theme::HIGHLIGHT_CRITICAL)
            .add_modifier(Modifier::BOLD)
    }

    pub fn tab_active() -> Style {
        Style::default()
            .fg(Theme::TAB_ACTIVE)
            .add_modifier(Modifier::BOLD)
    }

    pub fn tab_inactive() -> Style {
        Style::default().fg(Theme::TAB_INACTIVE)
    }

    pub fn dim() -> Style {
        Style::default().fg(Theme::FG_DIM)
    }

    /// Error banner under the header.
    pub fn error_banner() -> Style {
        Style::default()
            .fg(Color::White)
            .bg(Theme::HIGHLIGHT_CRITICAL)
            .add_modifier(Modifier::BOLD)
    }

    pub fn input() -> Style {
        Style::default()
            .fg(Theme::FG)
            .add_modifier(Modifier::UNDERLINED)
    }

    /// Section header style for popups.
    pub fn section_header() -> Style {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    }

    pub fn help_key() -> Style {
        Style::default().fg(Theme::FG).add_modifier(Modifier::BOLD)
    }

    pub fn cost_bar() -> Style {
        Style::default().fg(Theme::COST_BAR)
    }

    pub fn time_bar() -> Style {
        Style::default().fg(Theme::TIME_BAR)
    }

    pub fn severity(severity: Severity) -> Style {
        match severity {
            Severity::Info => Style::default().fg(Color::Cyan),
            Severity::Warning => Self::warning(),
            Severity::Critical => Self::critical(),
        }
    }

    /// Node label color by operation family.
    pub fn node_kind(kind: NodeKind) -> Style {
        let fg = match kind {
            NodeKind::SeqScan => Color::Yellow,
            NodeKind::IndexScan | NodeKind::BitmapScan => Color::Green,
            NodeKind::Join => Color::Cyan,
            NodeKind::Sort | NodeKind::Aggregate => Color::Magenta,
            NodeKind::Materialize | NodeKind::Parallel => Color::Blue,
            NodeKind::Other => Theme::FG,
        };
        Style::default().fg(fg).add_modifier(Modifier::BOLD)
    }
}

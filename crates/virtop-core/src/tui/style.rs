//! Color scheme and styles.

use ratatui::style::{Color, Modifier, Style};

use crate::hypervisor::DomainState;

pub struct Theme;

impl Theme {
    pub const BG: Color = Color::Reset;
    pub const HEADER_BG: Color = Color::Blue;
    pub const SELECTED_BG: Color = Color::DarkGray;

    pub const FG: Color = Color::White;
    pub const FG_DIM: Color = Color::DarkGray;
    pub const HEADER_FG: Color = Color::White;

    pub const RUNNING: Color = Color::Green;
    pub const PAUSED: Color = Color::Yellow;
    pub const CRASHED: Color = Color::Red;

    pub const CPU_COLOR: Color = Color::Cyan;
    pub const MEM_COLOR: Color = Color::Magenta;
    pub const DISK_COLOR: Color = Color::Yellow;
    pub const NET_COLOR: Color = Color::Green;

    pub const POPUP_BORDER: Color = Color::Cyan;
    pub const KEY: Color = Color::Yellow;
}

/// Pre-defined styles.
pub struct Styles;

impl Styles {
    /// Default text style.
    pub fn default() -> Style {
        Style::default().fg(Theme::FG).bg(Theme::BG)
    }

    /// Header bar style.
    pub fn header() -> Style {
        Style::default()
            .fg(Theme::HEADER_FG)
            .bg(Theme::HEADER_BG)
            .add_modifier(Modifier::BOLD)
    }

    /// Selected row style.
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

    pub fn dim() -> Style {
        Style::default().fg(Theme::FG_DIM)
    }

    pub fn cpu() -> Style {
        Style::default().fg(Theme::CPU_COLOR)
    }

    pub fn mem() -> Style {
        Style::default().fg(Theme::MEM_COLOR)
    }

    pub fn disk() -> Style {
        Style::default().fg(Theme::DISK_COLOR)
    }

    pub fn net() -> Style {
        Style::default().fg(Theme::NET_COLOR)
    }

    /// Status line text.
    pub fn status() -> Style {
        Style::default().fg(Theme::FG)
    }

    /// Key name in legends and popups.
    pub fn key() -> Style {
        Style::default().fg(Theme::KEY).add_modifier(Modifier::BOLD)
    }

    pub fn popup_border() -> Style {
        Style::default().fg(Theme::POPUP_BORDER)
    }

    /// Focused form field.
    pub fn input_focused() -> Style {
        Style::default()
            .fg(Theme::FG)
            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
    }

    /// State column color by domain state label.
    pub fn state(label: &str) -> Style {
        let color = match label {
            l if l == DomainState::Running.label() => Theme::RUNNING,
            l if l == DomainState::Paused.label() || l == DomainState::PmSuspended.label() => {
                Theme::PAUSED
            }
            l if l == DomainState::Crashed.label() => Theme::CRASHED,
            _ => Theme::FG_DIM,
        };
        Style::default().fg(color)
    }
}

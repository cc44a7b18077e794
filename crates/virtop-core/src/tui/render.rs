//! Main rendering logic for TUI.

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout};

use crate::command::CommandRegistry;

use super::state::{AppState, PopupState, View};
use super::widgets::{
    LEGEND_HEIGHT, render_disk_form, render_domains, render_header, render_keybinds,
    render_quit_confirm, render_status,
};

/// Main render function.
pub fn render(frame: &mut Frame, state: &mut AppState, registry: &CommandRegistry) {
    let area = frame.area();

    let chunks = Layout::vertical([
        Constraint::Length(1),                     // Header
        Constraint::Min(3),                        // Domain table
        Constraint::Length(state.status.height()), // Status, 1..=6 rows
        Constraint::Length(LEGEND_HEIGHT),         // Key legend
    ])
    .split(area);

    render_header(frame, chunks[0], state);
    render_domains(frame, chunks[1], state);
    render_status(frame, chunks[2], &state.status);
    render_keybinds(frame, chunks[3], registry);

    if let View::DiskForm(form) = &state.view {
        render_disk_form(frame, chunks[1], form);
    }
    if state.popup == PopupState::QuitConfirm {
        render_quit_confirm(frame, area);
    }
}

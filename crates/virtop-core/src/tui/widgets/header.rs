//! Header bar: clock, connection and domain counts.

use chrono::Local;
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::widgets::Paragraph;

use crate::hypervisor::DomainState;
use crate::scheduler::Column;
use crate::tui::state::AppState;
use crate::tui::style::Styles;

pub fn render_header(frame: &mut Frame, area: Rect, state: &AppState) {
    let chunks = Layout::horizontal([
        Constraint::Length(21), // Time
        Constraint::Length(10), // Name
        Constraint::Min(20),    // URI
        Constraint::Length(28), // Counts
    ])
    .split(area);

    let time = state
        .last_refresh
        .unwrap_or_else(Local::now)
        .format(" %Y-%m-%d %H:%M:%S")
        .to_string();
    frame.render_widget(Paragraph::new(time).style(Styles::header()), chunks[0]);
    frame.render_widget(Paragraph::new(" virtop ").style(Styles::header()), chunks[1]);
    frame.render_widget(
        Paragraph::new(state.uri.as_str()).style(Styles::header()),
        chunks[2],
    );

    let running = state
        .rows
        .iter()
        .filter(|r| r.cell(Column::State) == DomainState::Running.label())
        .count();
    let counts = if state.last_refresh.is_some() {
        format!("{} domains, {} running ", state.rows.len(), running)
    } else {
        "loading... ".to_string()
    };
    frame.render_widget(
        Paragraph::new(counts)
            .alignment(ratatui::layout::Alignment::Right)
            .style(Styles::header()),
        chunks[3],
    );
}

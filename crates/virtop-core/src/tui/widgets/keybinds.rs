//! Key legend, generated from the command registry.

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::command::CommandRegistry;
use crate::tui::style::Styles;

pub const LEGEND_HEIGHT: u16 = 2;

/// Splits the registry's bindings over [`LEGEND_HEIGHT`] rows.
pub fn render_keybinds(frame: &mut Frame, area: Rect, registry: &CommandRegistry) {
    let entries: Vec<(String, &'static str)> = registry
        .bindings()
        .map(|(key, command)| (key.label(), command.action().label()))
        .collect();
    let per_row = entries.len().div_ceil(LEGEND_HEIGHT as usize).max(1);

    let lines: Vec<Line> = entries
        .chunks(per_row)
        .map(|chunk| {
            let spans: Vec<Span> = chunk
                .iter()
                .flat_map(|(key, label)| {
                    [
                        Span::styled(format!(" {} ", key), Styles::key()),
                        Span::styled(format!("{:<14}", label), Styles::dim()),
                    ]
                })
                .collect();
            Line::from(spans)
        })
        .collect();

    frame.render_widget(Paragraph::new(lines), area);
}

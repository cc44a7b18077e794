//! Status line.

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::text::Line;
use ratatui::widgets::Paragraph;

use crate::status::StatusFormatter;
use crate::tui::style::Styles;

/// Renders the pre-wrapped status lines. Wrapping is done by
/// [`StatusFormatter`] so the layout height and the text agree.
pub fn render_status(frame: &mut Frame, area: Rect, status: &StatusFormatter) {
    let lines: Vec<Line> = status
        .lines()
        .iter()
        .map(|l| Line::from(l.as_str()))
        .collect();
    frame.render_widget(Paragraph::new(lines).style(Styles::status()), area);
}

//! Quit confirmation popup widget.

use ratatui::Frame;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::tui::style::Styles;

/// Renders a centered quit confirmation popup.
pub fn render_quit_confirm(frame: &mut Frame, area: Rect) {
    let popup_width = (area.width / 2).clamp(36, 50).min(area.width);
    let popup_height = 6.min(area.height);
    let popup_area = Rect::new(
        area.x + area.width.saturating_sub(popup_width) / 2,
        area.y + area.height.saturating_sub(popup_height) / 2,
        popup_width,
        popup_height,
    );

    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .title(" Exit virtop ")
        .borders(Borders::ALL)
        .border_style(Styles::popup_border());
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let hint = Style::default().fg(Color::DarkGray);
    let content = vec![
        Line::from("Quit virtop?"),
        Line::from(""),
        Line::from(vec![
            Span::styled("Enter", Styles::key()),
            Span::styled("/", hint),
            Span::styled("y", Styles::key()),
            Span::styled(" quit   ", hint),
            Span::styled("Esc", Styles::key()),
            Span::styled("/", hint),
            Span::styled("n", Styles::key()),
            Span::styled(" cancel", hint),
        ]),
    ];

    frame.render_widget(
        Paragraph::new(content)
            .alignment(Alignment::Center)
            .style(Styles::default()),
        inner,
    );
}

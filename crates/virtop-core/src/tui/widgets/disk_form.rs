//! Disk hot-plug / unplug form.

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

use crate::disk::{AttachField, DiskForm, DiskFormKind};
use crate::tui::style::Styles;

fn field_line<'a>(label: &'a str, value: &'a str, focused: bool) -> Line<'a> {
    let (style, cursor) = if focused {
        (Styles::input_focused(), "█")
    } else {
        (Styles::default(), "")
    };
    Line::from(vec![
        Span::styled(format!("{:<12}", label), Styles::key()),
        Span::styled(value, style),
        Span::styled(cursor, Styles::default()),
    ])
}

/// Renders the form centered over `area`.
pub fn render_disk_form(frame: &mut Frame, area: Rect, form: &DiskForm) {
    let mut lines: Vec<Line> = Vec::new();
    match &form.kind {
        DiskFormKind::Attach {
            path,
            target,
            focus,
        } => {
            lines.push(field_line("Disk Path:", path, *focus == AttachField::Path));
            if !path.is_empty() && !form.path_exists() {
                lines.push(Line::from(Span::styled(
                    "            (no such file on this host)",
                    Styles::dim(),
                )));
            }
            lines.push(field_line("Target Dev:", target, *focus == AttachField::Target));
        }
        DiskFormKind::Detach { disks, .. } if disks.is_empty() => {
            lines.push(Line::from(Span::styled("No disks attached", Styles::dim())));
        }
        DiskFormKind::Detach { disks, selected } => {
            for (i, disk) in disks.iter().enumerate() {
                let (marker, style) = if i == *selected {
                    ("> ", Styles::selected())
                } else {
                    ("  ", Styles::default())
                };
                lines.push(Line::from(Span::styled(
                    format!("{}{}", marker, disk.label()),
                    style,
                )));
            }
        }
    }

    lines.push(Line::from(""));
    let hint = Styles::dim();
    let mut keys = vec![
        Span::styled("Enter", Styles::key()),
        Span::styled(" submit   ", hint),
        Span::styled("Esc", Styles::key()),
        Span::styled(" cancel   ", hint),
    ];
    match form.kind {
        DiskFormKind::Attach { .. } => keys.extend([
            Span::styled("Tab", Styles::key()),
            Span::styled(" complete path / next field", hint),
        ]),
        DiskFormKind::Detach { .. } => keys.extend([
            Span::styled("Up/Down", Styles::key()),
            Span::styled(" select", hint),
        ]),
    }
    lines.push(Line::from(keys));

    let popup_width = (area.width * 70 / 100).clamp(40, 100).min(area.width);
    let popup_height = (lines.len() as u16 + 2).min(area.height);
    let popup_area = Rect::new(
        area.x + area.width.saturating_sub(popup_width) / 2,
        area.y + area.height.saturating_sub(popup_height) / 2,
        popup_width,
        popup_height,
    );

    frame.render_widget(Clear, popup_area);
    let block = Block::default()
        .title(format!(" {} ", form.title()))
        .borders(Borders::ALL)
        .border_style(Styles::popup_border());
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);
    frame.render_widget(
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .style(Styles::default()),
        inner,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Messages;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn typed_form(path: &str) -> DiskForm {
        let mut form = DiskForm::attach(
            "web-01",
            Messages::new("Attaching disk to", "attached disk to", "Failed to attach disk to"),
        );
        path.chars().for_each(|c| form.input_char(c));
        form
    }

    fn rendered(form: &DiskForm) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 12)).unwrap();
        terminal
            .draw(|frame| render_disk_form(frame, frame.area(), form))
            .unwrap();
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn missing_path_is_flagged() {
        let content = rendered(&typed_form("/no/such/dir/extra.qcow2"));
        assert!(content.contains("Attach disk to web-01"));
        assert!(content.contains("no such file on this host"));
    }

    #[test]
    fn existing_path_is_not_flagged() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("extra.qcow2");
        std::fs::write(&file, b"").unwrap();

        let content = rendered(&typed_form(&file.display().to_string()));
        assert!(!content.contains("no such file on this host"));
    }
}

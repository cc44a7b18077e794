//! Domain table.

use ratatui::Frame;
use ratatui::layout::{Constraint, Rect};
use ratatui::text::Span;
use ratatui::widgets::{Block, Borders, Cell, Row, Table};

use crate::scheduler::Column;
use crate::tui::state::AppState;
use crate::tui::style::Styles;

fn width(col: Column) -> Constraint {
    match col {
        Column::Name => Constraint::Min(16),
        Column::State => Constraint::Length(14),
        Column::Cpu => Constraint::Length(10),
        Column::Memory => Constraint::Length(22),
        Column::Io => Constraint::Length(24),
        Column::Network => Constraint::Length(24),
    }
}

fn cell_style(col: Column, text: &str) -> ratatui::style::Style {
    match col {
        Column::State => Styles::state(text),
        Column::Cpu => Styles::cpu(),
        Column::Memory => Styles::mem(),
        Column::Io => Styles::disk(),
        Column::Network => Styles::net(),
        Column::Name => Styles::default(),
    }
}

pub fn render_domains(frame: &mut Frame, area: Rect, state: &mut AppState) {
    let header = Row::new(
        Column::all()
            .iter()
            .map(|c| Cell::from(c.header()))
            .collect::<Vec<_>>(),
    )
    .style(Styles::table_header());

    let rows: Vec<Row> = state
        .rows
        .iter()
        .map(|row| {
            Row::new(
                Column::all()
                    .iter()
                    .map(|col| {
                        let text = row.cell(*col);
                        Cell::from(Span::styled(text.to_string(), cell_style(*col, text)))
                    })
                    .collect::<Vec<_>>(),
            )
        })
        .collect();

    let block = Block::default().borders(Borders::TOP).border_style(Styles::dim());
    // header row + top border
    state.page_size = area.height.saturating_sub(2).max(1) as usize;

    let table = Table::new(rows, Column::all().iter().map(|c| width(*c)))
        .header(header)
        .block(block)
        .row_highlight_style(Styles::selected());
    frame.render_stateful_widget(table, area, &mut state.table_state);
}

//! Application state.
//!
//! Owned by the UI thread. The refresh scheduler never touches it directly:
//! its tables arrive as [`Event::Refresh`](super::event::Event::Refresh) and
//! are applied here.

use chrono::{DateTime, Local};
use ratatui::widgets::TableState as RatatuiTableState;

use crate::disk::DiskForm;
use crate::dispatch::Presentation;
use crate::scheduler::DomainRow;
use crate::status::StatusFormatter;

/// Active page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Main,
    DiskForm(DiskForm),
}

/// Popup drawn on top of the active page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PopupState {
    #[default]
    None,
    QuitConfirm,
}

#[derive(Debug)]
pub struct AppState {
    /// Connection URI shown in the header.
    pub uri: String,
    /// Rows of the last refresh, in listing order.
    pub rows: Vec<DomainRow>,
    /// Selected domain. Tracked by name so it survives reordering.
    pub selected: Option<String>,
    /// Ratatui table state (enables auto-scrolling).
    pub table_state: RatatuiTableState,
    pub status: StatusFormatter,
    pub view: View,
    pub popup: PopupState,
    pub terminal_width: u16,
    /// Visible table rows, updated on render, used for paging.
    pub page_size: usize,
    pub last_refresh: Option<DateTime<Local>>,
}

impl AppState {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            rows: Vec::new(),
            selected: None,
            table_state: RatatuiTableState::default(),
            status: StatusFormatter::new(),
            view: View::Main,
            popup: PopupState::None,
            terminal_width: 0,
            page_size: 10,
            last_refresh: None,
        }
    }

    /// Replaces the table with a fresh tick, keeping the selection on the
    /// same domain. If it vanished, the row at the same position is selected.
    pub fn apply_refresh(&mut self, rows: Vec<DomainRow>) {
        let previous_index = self.selected_index();
        self.rows = rows;
        self.last_refresh = Some(Local::now());

        let index = self
            .selected
            .as_deref()
            .and_then(|name| self.rows.iter().position(|r| r.name() == name))
            .or_else(|| {
                let last = self.rows.len().checked_sub(1)?;
                Some(previous_index.unwrap_or(0).min(last))
            });
        self.select_index(index);
    }

    pub fn selected_index(&self) -> Option<usize> {
        let name = self.selected.as_deref()?;
        self.rows.iter().position(|r| r.name() == name)
    }

    /// Name of the selected domain, if any.
    pub fn selected_name(&self) -> Option<&str> {
        self.selected.as_deref().filter(|n| !n.is_empty())
    }

    fn select_index(&mut self, index: Option<usize>) {
        self.selected = index.and_then(|i| self.rows.get(i)).map(|r| r.name().to_string());
        self.table_state.select(index.filter(|i| *i < self.rows.len()));
    }

    fn move_selection(&mut self, f: impl FnOnce(usize, usize) -> usize) {
        let Some(last) = self.rows.len().checked_sub(1) else {
            return;
        };
        let current = self.selected_index().unwrap_or(0);
        self.select_index(Some(f(current, last).min(last)));
    }

    pub fn select_up(&mut self) {
        self.move_selection(|cur, _| cur.saturating_sub(1));
    }

    pub fn select_down(&mut self) {
        self.move_selection(|cur, _| cur + 1);
    }

    pub fn page_up(&mut self) {
        let n = self.page_size.max(1);
        self.move_selection(|cur, _| cur.saturating_sub(n));
    }

    pub fn page_down(&mut self) {
        let n = self.page_size.max(1);
        self.move_selection(|cur, _| cur.saturating_add(n));
    }

    pub fn select_first(&mut self) {
        self.move_selection(|_, _| 0);
    }

    pub fn select_last(&mut self) {
        self.move_selection(|_, last| last);
    }

    /// Records the new width and re-wraps the status line.
    pub fn resize(&mut self, width: u16) {
        self.terminal_width = width;
        self.status.reflow(width as usize);
    }

    pub fn form_mut(&mut self) -> Option<&mut DiskForm> {
        match &mut self.view {
            View::DiskForm(form) => Some(form),
            View::Main => None,
        }
    }
}

impl Presentation for AppState {
    fn set_status(&mut self, message: String) {
        self.status.set_status(message);
    }

    fn open_form(&mut self, form: DiskForm) {
        self.view = View::DiskForm(form);
    }

    fn close_form(&mut self) {
        self.view = View::Main;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Column;

    fn row(name: &str) -> DomainRow {
        let mut r = DomainRow::default();
        r.set(Column::Name, name.to_string());
        r
    }

    fn rows(names: &[&str]) -> Vec<DomainRow> {
        names.iter().map(|n| row(n)).collect()
    }

    #[test]
    fn first_refresh_selects_first_row() {
        let mut state = AppState::new("mock:///default");
        assert_eq!(state.selected_name(), None);
        state.apply_refresh(rows(&["a", "b"]));
        assert_eq!(state.selected_name(), Some("a"));
        assert_eq!(state.table_state.selected(), Some(0));
    }

    #[test]
    fn selection_follows_name_across_reorder() {
        let mut state = AppState::new("mock:///default");
        state.apply_refresh(rows(&["a", "b", "c"]));
        state.select_down();
        state.apply_refresh(rows(&["c", "a", "b"]));
        assert_eq!(state.selected_name(), Some("b"));
        assert_eq!(state.table_state.selected(), Some(2));
    }

    #[test]
    fn vanished_selection_falls_back_to_position() {
        let mut state = AppState::new("mock:///default");
        state.apply_refresh(rows(&["a", "b", "c"]));
        state.select_last();
        state.apply_refresh(rows(&["a", "b"]));
        assert_eq!(state.selected_name(), Some("b"));

        state.apply_refresh(Vec::new());
        assert_eq!(state.selected_name(), None);
        assert_eq!(state.table_state.selected(), None);
    }

    #[test]
    fn navigation_is_clamped() {
        let mut state = AppState::new("mock:///default");
        state.select_down();
        assert_eq!(state.selected_name(), None);

        state.apply_refresh(rows(&["a", "b", "c"]));
        state.select_up();
        assert_eq!(state.selected_name(), Some("a"));
        state.page_down();
        assert_eq!(state.selected_name(), Some("c"));
        state.select_first();
        assert_eq!(state.selected_name(), Some("a"));
    }

    #[test]
    fn resize_reflows_status() {
        let mut state = AppState::new("mock:///default");
        state.set_status("Failed to start web-01: Libvirt err 55: domain is already running".into());
        state.resize(20);
        assert!(state.status.height() > 1);
        state.resize(200);
        assert_eq!(state.status.height(), 1);
    }
}

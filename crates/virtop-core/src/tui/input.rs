//! Input handling and keybindings.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::command::KeyChord;

use super::state::{AppState, PopupState, View};

/// Result of handling a key event.
#[derive(Debug, PartialEq, Eq)]
pub enum KeyAction {
    /// No action, continue.
    None,
    /// Quit the application.
    Quit,
    /// Run the command bound to this chord against the selected domain.
    Dispatch(KeyChord),
    /// Submit the open disk form.
    SubmitForm,
    /// Leave the open disk form.
    CancelForm,
}

/// Handles key input and updates state.
pub fn handle_key(state: &mut AppState, key: KeyEvent) -> KeyAction {
    if is_ctrl_c(&key) {
        return KeyAction::Quit;
    }
    if state.popup == PopupState::QuitConfirm {
        return handle_quit_confirm(state, key);
    }
    match state.view {
        View::Main => handle_main(state, key),
        View::DiskForm(_) => handle_form(state, key),
    }
}

fn is_ctrl_c(key: &KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('C'))
}

fn handle_quit_confirm(state: &mut AppState, key: KeyEvent) -> KeyAction {
    match key.code {
        KeyCode::Enter | KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Char('y') => {
            state.popup = PopupState::None;
            KeyAction::Quit
        }
        KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
            state.popup = PopupState::None;
            KeyAction::None
        }
        _ => KeyAction::None,
    }
}

fn handle_main(state: &mut AppState, key: KeyEvent) -> KeyAction {
    if key.modifiers.contains(KeyModifiers::CONTROL)
        && let KeyCode::Char(c) = key.code
    {
        return KeyAction::Dispatch(KeyChord::ctrl(c));
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') => state.popup = PopupState::QuitConfirm,
        KeyCode::Up | KeyCode::Char('k') => state.select_up(),
        KeyCode::Down | KeyCode::Char('j') => state.select_down(),
        KeyCode::PageUp => state.page_up(),
        KeyCode::PageDown => state.page_down(),
        KeyCode::Home => state.select_first(),
        KeyCode::End => state.select_last(),
        KeyCode::Char(c) => return KeyAction::Dispatch(KeyChord::plain(c)),
        _ => {}
    }
    KeyAction::None
}

fn handle_form(state: &mut AppState, key: KeyEvent) -> KeyAction {
    match key.code {
        KeyCode::Esc => return KeyAction::CancelForm,
        KeyCode::Enter => return KeyAction::SubmitForm,
        _ => {}
    }
    let Some(form) = state.form_mut() else {
        return KeyAction::None;
    };
    match key.code {
        KeyCode::Tab => form.tab(),
        KeyCode::Up | KeyCode::BackTab => form.prev(),
        KeyCode::Down => form.next(),
        KeyCode::Backspace => form.backspace(),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => form.input_char(c),
        _ => {}
    }
    KeyAction::None
}

//! Main TUI application.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::{Backend, CrosstermBackend};
use tracing::{debug, info, warn};

use crate::command::CommandRegistry;
use crate::disk::DiskForm;
use crate::dispatch::{Dispatcher, Outcome, Presentation};
use crate::hypervisor::Hypervisor;
use crate::scheduler::RefreshScheduler;

use super::event::{Event, EventHandler};
use super::input::{KeyAction, handle_key};
use super::render::render;
use super::state::{AppState, View};

/// Main TUI application.
pub struct App {
    hypervisor: Arc<dyn Hypervisor>,
    interval: Duration,
    dispatcher: Dispatcher,
    state: AppState,
    should_quit: bool,
}

impl App {
    /// `interval` is the refresh period of the domain table.
    pub fn new(hypervisor: Arc<dyn Hypervisor>, interval: Duration) -> Self {
        let dispatcher = Dispatcher::new(Arc::clone(&hypervisor), CommandRegistry::new());
        let state = AppState::new(hypervisor.uri());
        Self {
            hypervisor,
            interval,
            dispatcher,
            state,
            should_quit: false,
        }
    }

    /// Runs the TUI application until the user quits.
    pub fn run(mut self) -> io::Result<()> {
        // Setup terminal
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.run_loop(&mut terminal);

        // Restore terminal
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn run_loop<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        let events = EventHandler::new();
        RefreshScheduler::new(self.interval)
            .spawn(Arc::clone(&self.hypervisor), events.table_sink());

        if let Ok(size) = terminal.size() {
            self.state.resize(size.width);
        }
        self.state
            .set_status(format!("Connected to {}", self.hypervisor.uri()));

        loop {
            terminal.draw(|frame| render(frame, &mut self.state, self.dispatcher.registry()))?;

            match events.next() {
                Ok(Event::Refresh(rows)) => self.state.apply_refresh(rows),
                Ok(Event::RefreshSkipped) => {}
                Ok(Event::Resize(width)) => self.state.resize(width),
                Ok(Event::Key(key)) => {
                    let action = handle_key(&mut self.state, key);
                    self.apply_action(action, terminal);
                }
                Err(_) => self.should_quit = true,
            }

            if self.should_quit {
                info!("quitting");
                break;
            }
        }
        Ok(())
    }

    fn apply_action<B: Backend>(&mut self, action: KeyAction, terminal: &mut Terminal<B>) {
        let mut ui = LiveFrontend {
            state: &mut self.state,
            terminal,
            registry: self.dispatcher.registry(),
        };
        match action {
            KeyAction::None => {}
            KeyAction::Quit => self.should_quit = true,
            KeyAction::Dispatch(chord) => {
                let selected = ui.state.selected_name().map(str::to_string);
                let outcome = self.dispatcher.handle(chord, selected.as_deref(), &mut ui);
                if outcome == Outcome::PassThrough {
                    debug!(key = %chord.label(), "key not handled");
                }
            }
            KeyAction::SubmitForm => {
                if let View::DiskForm(form) = &ui.state.view {
                    let form = form.clone();
                    self.dispatcher.submit_form(&form, &mut ui);
                }
            }
            KeyAction::CancelForm => self.dispatcher.cancel_form(&mut ui),
        }
    }
}

/// [`Presentation`] for the running app: status changes are drawn right away
/// so the start message is on screen before a blocking hypervisor call.
struct LiveFrontend<'a, B: Backend> {
    state: &'a mut AppState,
    terminal: &'a mut Terminal<B>,
    registry: &'a CommandRegistry,
}

impl<B: Backend> Presentation for LiveFrontend<'_, B> {
    fn set_status(&mut self, message: String) {
        self.state.set_status(message);
        let (state, registry) = (&mut *self.state, self.registry);
        if let Err(e) = self.terminal.draw(|frame| render(frame, state, registry)) {
            warn!(error = %e, "failed to draw status");
        }
    }

    fn open_form(&mut self, form: DiskForm) {
        self.state.open_form(form);
    }

    fn close_form(&mut self) {
        self.state.close_form();
    }
}

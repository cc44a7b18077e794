//! Event handling for TUI.
//!
//! Terminal input is polled on a separate thread; the refresh scheduler
//! publishes its table on the same channel, so the UI thread sees one ordered
//! stream of events and is the only place that mutates or draws state.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};

use crate::scheduler::{Column, Disconnected, DomainRow, TableSink};

/// How long the input thread waits for a terminal event before re-checking
/// whether the UI is still listening.
const INPUT_POLL: Duration = Duration::from_millis(250);

/// Application events.
#[derive(Debug)]
pub enum Event {
    /// Keyboard input.
    Key(KeyEvent),
    /// Terminal resize (width).
    Resize(u16),
    /// Table produced by one refresh tick.
    Refresh(Vec<DomainRow>),
    /// A tick that could not list the domains.
    RefreshSkipped,
}

/// Event handler that polls for terminal events in a separate thread.
pub struct EventHandler {
    rx: Receiver<Event>,
    tx: Sender<Event>,
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        let event_tx = tx.clone();

        thread::spawn(move || {
            loop {
                if event::poll(INPUT_POLL).unwrap_or(false) {
                    if let Ok(evt) = event::read() {
                        let event = match evt {
                            CrosstermEvent::Key(key) if key.kind != KeyEventKind::Release => {
                                Event::Key(key)
                            }
                            CrosstermEvent::Resize(w, _) => Event::Resize(w),
                            _ => continue,
                        };
                        if event_tx.send(event).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Self { rx, tx }
    }

    /// Sink for the refresh scheduler, feeding this handler's channel.
    pub fn table_sink(&self) -> ChannelSink {
        ChannelSink::new(self.tx.clone())
    }

    /// Receives the next event, blocking until one is available.
    pub fn next(&self) -> Result<Event, mpsc::RecvError> {
        self.rx.recv()
    }
}

/// [`TableSink`] that ships each completed tick to the UI thread as one
/// [`Event::Refresh`].
pub struct ChannelSink {
    tx: Sender<Event>,
    rows: Vec<DomainRow>,
}

impl ChannelSink {
    pub fn new(tx: Sender<Event>) -> Self {
        Self {
            tx,
            rows: Vec::new(),
        }
    }
}

impl TableSink for ChannelSink {
    fn set_cell(&mut self, row: usize, col: Column, text: String) {
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, DomainRow::default);
        }
        self.rows[row].set(col, text);
    }

    fn queue_redraw(&mut self) -> Result<(), Disconnected> {
        let rows = std::mem::take(&mut self.rows);
        self.tx.send(Event::Refresh(rows)).map_err(|_| Disconnected)
    }

    fn keep_previous(&mut self) -> Result<(), Disconnected> {
        self.rows.clear();
        self.tx.send(Event::RefreshSkipped).map_err(|_| Disconnected)
    }
}

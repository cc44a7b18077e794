//! Terminal user interface.
//!
//! One UI thread owns [`AppState`] and draws; the terminal input thread and
//! the refresh scheduler thread only send it events.

mod app;
mod event;
mod input;
mod render;
pub mod state;
mod style;
mod widgets;

pub use app::App;
pub use event::{ChannelSink, Event, EventHandler};
pub use state::{AppState, PopupState, View};

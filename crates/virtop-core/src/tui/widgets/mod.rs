//! TUI widgets.

mod disk_form;
mod domains;
mod header;
mod keybinds;
mod quit_confirm;
mod status_bar;

pub use disk_form::render_disk_form;
pub use domains::render_domains;
pub use header::render_header;
pub use keybinds::{LEGEND_HEIGHT, render_keybinds};
pub use quit_confirm::render_quit_confirm;
pub use status_bar::render_status;

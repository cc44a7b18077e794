//! virtop-core - domain telemetry and control for the virtop dashboard.
//!
//! Provides:
//! - `hypervisor`: capability traits for the hypervisor control plane, plus
//!   an in-memory mock
//! - `rates`: per-domain conversion of cumulative counters into rates
//! - `scheduler`: the periodic refresh loop that produces the domain table
//! - `command`: keystroke-bound lifecycle and disk commands
//! - `dispatch`: runs a command against the selected domain, reports status
//! - `disk` / `device`: disk hot-plug forms and device descriptors
//! - `status`: status line wrapping
//! - `fmt`: byte/rate/percent formatting
//!
//! With `tui` feature (default):
//! - `tui`: ratatui front end
//!
//! With `libvirt` feature:
//! - `hypervisor::LibvirtHypervisor`: backend over the system libvirt

pub mod command;
pub mod device;
pub mod disk;
pub mod dispatch;
pub mod error;
pub mod fmt;
pub mod hypervisor;
pub mod rates;
pub mod scheduler;
pub mod status;

#[cfg(feature = "tui")]
pub mod tui;

pub use error::Error;

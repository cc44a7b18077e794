//! Keypress to hypervisor operation, with status reporting.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::command::{Command, CommandRegistry, KeyChord};
use crate::disk::DiskForm;
use crate::error::Error;
use crate::hypervisor::Hypervisor;

/// What the dispatcher needs from the presentation layer.
///
/// Implemented by the UI thread's frontend; the dispatcher is only ever
/// called from that thread.
pub trait Presentation {
    fn set_status(&mut self, message: String);
    fn open_form(&mut self, form: DiskForm);
    fn close_form(&mut self);
}

/// Whether a key event was handled or should fall through to other bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Consumed,
    PassThrough,
}

pub struct Dispatcher {
    hypervisor: Arc<dyn Hypervisor>,
    registry: CommandRegistry,
}

impl Dispatcher {
    pub fn new(hypervisor: Arc<dyn Hypervisor>, registry: CommandRegistry) -> Self {
        Self {
            hypervisor,
            registry,
        }
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Runs the command bound to `key` against the `selected` domain.
    ///
    /// Stale selections (domain gone since the last refresh) are logged and
    /// otherwise ignored.
    pub fn handle(
        &self,
        key: KeyChord,
        selected: Option<&str>,
        ui: &mut dyn Presentation,
    ) -> Outcome {
        let Some(name) = selected.filter(|n| !n.is_empty()) else {
            return Outcome::PassThrough;
        };
        let Some(command) = self.registry.resolve(key) else {
            return Outcome::PassThrough;
        };
        let dom = match self.hypervisor.lookup_domain_by_name(name) {
            Ok(dom) => dom,
            Err(source) => {
                let err = Error::DomainLookupFailed {
                    name: name.to_string(),
                    source,
                };
                warn!(key = %key.label(), "{}", err);
                return Outcome::PassThrough;
            }
        };

        let messages = *command.messages();
        ui.set_status(messages.started(name));
        debug!(domain = name, action = ?command.action(), "dispatching");

        match command {
            Command::Direct { op, .. } => match op(&*dom) {
                Ok(()) => {
                    info!(domain = name, "{}", messages.succeeded(name));
                    ui.set_status(messages.succeeded(name));
                }
                Err(e) => {
                    let err = Error::HypervisorOperationFailed(e);
                    warn!(domain = name, error = %err, "{}", messages.fail);
                    ui.set_status(messages.failed(name, &err));
                }
            },
            Command::Interactive { open, .. } => match open(&*dom, name, messages) {
                Ok(form) => ui.open_form(form),
                Err(err) => {
                    warn!(domain = name, error = %err, "{}", messages.fail);
                    ui.set_status(messages.failed(name, &err));
                }
            },
        }
        Outcome::Consumed
    }

    /// Submits an open disk form. On success the form closes; on failure it
    /// stays open so the input can be corrected.
    pub fn submit_form(&self, form: &DiskForm, ui: &mut dyn Presentation) {
        match form.submit(self.hypervisor.as_ref()) {
            Ok(()) => {
                ui.set_status(form.messages.succeeded(&form.domain));
                ui.close_form();
            }
            Err(err) => ui.set_status(form.messages.failed(&form.domain, &err)),
        }
    }

    /// Leaves the form without touching the hypervisor.
    pub fn cancel_form(&self, ui: &mut dyn Presentation) {
        ui.close_form();
    }
}

//! Keystroke-bound domain commands.
//!
//! Every command carries three messages and an operation. The operation is
//! either *direct* (one hypervisor call that completes before the keypress is
//! handled) or *interactive* (it opens a disk form; the hypervisor call happens
//! later, when the form is submitted).

use std::collections::HashMap;

use crate::device::parse_attached_disks;
use crate::disk::{DiskForm, DiskFormKind};
use crate::error::Error;
use crate::hypervisor::{Domain, HypervisorError};

/// Identifies a key combination independent of the terminal backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyChord {
    pub ctrl: bool,
    pub ch: char,
}

impl KeyChord {
    /// Ctrl + `ch` (case-insensitive).
    pub const fn ctrl(ch: char) -> Self {
        Self {
            ctrl: true,
            ch: ch.to_ascii_lowercase(),
        }
    }

    pub const fn plain(ch: char) -> Self {
        Self { ctrl: false, ch }
    }

    /// Legend text, e.g. `^Q`.
    pub fn label(&self) -> String {
        if self.ctrl {
            format!("^{}", self.ch.to_ascii_uppercase())
        } else {
            self.ch.to_string()
        }
    }
}

/// The fixed set of domain actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Start,
    Stop,
    Resume,
    Suspend,
    Reboot,
    Destroy,
    AttachDisk,
    DetachDisk,
}

impl Action {
    pub fn all() -> &'static [Action] {
        &[
            Action::Start,
            Action::Stop,
            Action::Resume,
            Action::Suspend,
            Action::Reboot,
            Action::Destroy,
            Action::AttachDisk,
            Action::DetachDisk,
        ]
    }

    /// Short name shown in the key legend.
    pub fn label(&self) -> &'static str {
        match self {
            Action::Start => "Start",
            Action::Stop => "Stop",
            Action::Resume => "Resume",
            Action::Suspend => "Suspend",
            Action::Reboot => "Reboot",
            Action::Destroy => "Destroy",
            Action::AttachDisk => "Hotplug disk",
            Action::DetachDisk => "Unplug disk",
        }
    }
}

/// Status texts of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Messages {
    /// Present participle, e.g. "Starting".
    pub start: &'static str,
    /// Past tense, e.g. "started".
    pub success: &'static str,
    /// Failure prefix, e.g. "Failed to start".
    pub fail: &'static str,
}

impl Messages {
    pub const fn new(start: &'static str, success: &'static str, fail: &'static str) -> Self {
        Self {
            start,
            success,
            fail,
        }
    }

    pub fn started(&self, domain: &str) -> String {
        format!("{} {}", self.start, domain)
    }

    pub fn succeeded(&self, domain: &str) -> String {
        format!("Successfully {} {}", self.success, domain)
    }

    pub fn failed(&self, domain: &str, err: &Error) -> String {
        format!("{} {}: {}", self.fail, domain, err.humanize())
    }
}

/// A single hypervisor call.
pub type DirectOp = fn(&dyn Domain) -> Result<(), HypervisorError>;

/// Builds the form an interactive command opens for the given domain.
pub type FormOp = fn(&dyn Domain, &str, Messages) -> Result<DiskForm, Error>;

/// A command bound to a key. Immutable once registered.
#[derive(Clone, Copy)]
pub enum Command {
    Direct {
        action: Action,
        messages: Messages,
        op: DirectOp,
    },
    Interactive {
        action: Action,
        messages: Messages,
        open: FormOp,
    },
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Command::Direct { .. } => "Direct",
            Command::Interactive { .. } => "Interactive",
        };
        f.debug_struct(kind)
            .field("action", &self.action())
            .field("messages", self.messages())
            .finish()
    }
}

impl Command {
    pub fn action(&self) -> Action {
        match self {
            Command::Direct { action, .. } | Command::Interactive { action, .. } => *action,
        }
    }

    pub fn messages(&self) -> &Messages {
        match self {
            Command::Direct { messages, .. } | Command::Interactive { messages, .. } => messages,
        }
    }

    pub fn is_interactive(&self) -> bool {
        matches!(self, Command::Interactive { .. })
    }
}

fn open_attach_form(_dom: &dyn Domain, name: &str, messages: Messages) -> Result<DiskForm, Error> {
    Ok(DiskForm::attach(name, messages))
}

fn open_detach_form(dom: &dyn Domain, name: &str, messages: Messages) -> Result<DiskForm, Error> {
    let xml = dom.xml_desc()?;
    let disks = parse_attached_disks(&xml)?;
    Ok(DiskForm::new(name, messages, DiskFormKind::detach(disks)))
}

/// Map from key chord to command. Built once, read-only afterwards.
#[derive(Debug, Clone)]
pub struct CommandRegistry {
    commands: HashMap<KeyChord, Command>,
    /// Legend order.
    order: Vec<KeyChord>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    /// The standard key map.
    pub fn new() -> Self {
        let entries = [
            (
                KeyChord::ctrl('q'),
                Command::Direct {
                    action: Action::Start,
                    messages: Messages::new("Starting", "started", "Failed to start"),
                    op: |d| d.start(),
                },
            ),
            (
                KeyChord::ctrl('a'),
                Command::Direct {
                    action: Action::Stop,
                    messages: Messages::new("Stopping", "stopped", "Failed to stop"),
                    op: |d| d.shutdown(),
                },
            ),
            (
                KeyChord::ctrl('w'),
                Command::Direct {
                    action: Action::Resume,
                    messages: Messages::new("Resuming", "resumed", "Failed to resume"),
                    op: |d| d.resume(),
                },
            ),
            (
                KeyChord::ctrl('s'),
                Command::Direct {
                    action: Action::Suspend,
                    messages: Messages::new("Suspending", "suspended", "Failed to suspend"),
                    op: |d| d.suspend(),
                },
            ),
            (
                KeyChord::ctrl('e'),
                Command::Direct {
                    action: Action::Reboot,
                    messages: Messages::new("Rebooting", "rebooted", "Failed to reboot"),
                    op: |d| d.reboot(0),
                },
            ),
            (
                KeyChord::ctrl('d'),
                Command::Direct {
                    action: Action::Destroy,
                    messages: Messages::new("Destroying", "destroyed", "Failed to destroy"),
                    op: |d| d.destroy(),
                },
            ),
            (
                KeyChord::ctrl('r'),
                Command::Interactive {
                    action: Action::AttachDisk,
                    messages: Messages::new(
                        "Attaching disk to",
                        "attached disk to",
                        "Failed to attach disk to",
                    ),
                    open: open_attach_form,
                },
            ),
            (
                KeyChord::ctrl('f'),
                Command::Interactive {
                    action: Action::DetachDisk,
                    messages: Messages::new(
                        "Detaching disk from",
                        "detached disk from",
                        "Failed to detach disk from",
                    ),
                    open: open_detach_form,
                },
            ),
        ];
        Self::from_entries(entries)
    }

    /// Builds a registry from explicit bindings. Later duplicates of a key are ignored.
    pub fn from_entries(entries: impl IntoIterator<Item = (KeyChord, Command)>) -> Self {
        let mut commands = HashMap::new();
        let mut order = Vec::new();
        for (key, command) in entries {
            if commands.contains_key(&key) {
                continue;
            }
            commands.insert(key, command);
            order.push(key);
        }
        Self { commands, order }
    }

    pub fn resolve(&self, key: KeyChord) -> Option<&Command> {
        self.commands.get(&key)
    }

    /// Bindings in registration order, for the key legend.
    pub fn bindings(&self) -> impl Iterator<Item = (KeyChord, &Command)> + '_ {
        self.order
            .iter()
            .filter_map(|k| self.commands.get(k).map(|c| (*k, c)))
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hypervisor::{DomainState, Hypervisor, MockHypervisor};

    #[test]
    fn every_action_is_bound_exactly_once() {
        let registry = CommandRegistry::new();
        assert_eq!(registry.len(), Action::all().len());
        for action in Action::all() {
            let count = registry
                .bindings()
                .filter(|(_, c)| c.action() == *action)
                .count();
            assert_eq!(count, 1, "{:?}", action);
        }
    }

    #[test]
    fn unbound_key_resolves_to_none() {
        let registry = CommandRegistry::new();
        assert!(registry.resolve(KeyChord::ctrl('z')).is_none());
        assert!(registry.resolve(KeyChord::plain('q')).is_none());
    }

    #[test]
    fn ctrl_chords_are_case_insensitive() {
        assert_eq!(KeyChord::ctrl('Q'), KeyChord::ctrl('q'));
        assert_eq!(KeyChord::ctrl('q').label(), "^Q");
    }

    #[test]
    fn disk_commands_are_interactive() {
        let registry = CommandRegistry::new();
        let attach = registry.resolve(KeyChord::ctrl('r')).unwrap();
        assert!(attach.is_interactive());
        assert_eq!(attach.messages().start, "Attaching disk to");
        assert!(!registry.resolve(KeyChord::ctrl('d')).unwrap().is_interactive());
    }

    #[test]
    fn direct_op_calls_hypervisor() {
        let hv = MockHypervisor::typical_host();
        let dom = hv.lookup_domain_by_name("web-01").unwrap();
        let registry = CommandRegistry::new();
        let Some(Command::Direct { op, .. }) = registry.resolve(KeyChord::ctrl('s')) else {
            panic!("suspend must be direct");
        };
        op(&*dom).unwrap();
        assert_eq!(hv.domain("web-01").unwrap().state, DomainState::Paused);
    }

    #[test]
    fn detach_form_lists_attached_disks() {
        let hv = MockHypervisor::typical_host();
        let dom = hv.lookup_domain_by_name("db-01").unwrap();
        let registry = CommandRegistry::new();
        let Some(Command::Interactive { open, messages, .. }) =
            registry.resolve(KeyChord::ctrl('f'))
        else {
            panic!("detach must be interactive");
        };
        let form = open(&*dom, "db-01", *messages).unwrap();
        match form.kind {
            DiskFormKind::Detach { disks, .. } => assert_eq!(disks.len(), 2),
            other => panic!("unexpected form {:?}", other),
        }
    }

    #[test]
    fn duplicate_keys_keep_first_binding() {
        let noop: DirectOp = |_| Ok(());
        let first = Command::Direct {
            action: Action::Start,
            messages: Messages::new("a", "b", "c"),
            op: noop,
        };
        let second = Command::Direct {
            action: Action::Stop,
            messages: Messages::new("d", "e", "f"),
            op: noop,
        };
        let registry = CommandRegistry::from_entries([
            (KeyChord::ctrl('x'), first),
            (KeyChord::ctrl('x'), second),
        ]);
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.resolve(KeyChord::ctrl('x')).unwrap().action(),
            Action::Start
        );
    }

    #[test]
    fn messages_format_status_lines() {
        let m = Messages::new("Starting", "started", "Failed to start");
        assert_eq!(m.started("web-01"), "Starting web-01");
        assert_eq!(m.succeeded("web-01"), "Successfully started web-01");
        let err = Error::HypervisorOperationFailed(HypervisorError::Other("nope".into()));
        assert_eq!(m.failed("web-01", &err), "Failed to start web-01: nope");
    }
}

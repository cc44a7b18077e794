//! Disk hot-plug / unplug form model.
//!
//! The form is pure state: the front end feeds it keystrokes and renders it,
//! and [`DiskForm::submit`] performs the live device call.

use std::path::Path;

use tracing::{info, warn};

use crate::command::Messages;
use crate::device::{AttachedDisk, DiskDescriptor};
use crate::error::Error;
use crate::hypervisor::Hypervisor;

/// Editable field of the attach form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachField {
    Path,
    Target,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiskFormKind {
    /// Free-form source path and target device.
    Attach {
        path: String,
        target: String,
        focus: AttachField,
    },
    /// Choice among the disks currently attached.
    Detach {
        disks: Vec<AttachedDisk>,
        selected: usize,
    },
}

impl DiskFormKind {
    pub fn attach() -> Self {
        DiskFormKind::Attach {
            path: String::new(),
            target: String::new(),
            focus: AttachField::Path,
        }
    }

    pub fn detach(disks: Vec<AttachedDisk>) -> Self {
        DiskFormKind::Detach { disks, selected: 0 }
    }
}

/// Sub-view opened by the disk commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskForm {
    pub domain: String,
    pub messages: Messages,
    pub kind: DiskFormKind,
    /// Whether the attach path names an existing file, checked on edit.
    path_exists: bool,
}

impl DiskForm {
    pub fn new(domain: &str, messages: Messages, kind: DiskFormKind) -> Self {
        Self {
            domain: domain.to_string(),
            messages,
            kind,
            path_exists: false,
        }
        .with_path_checked()
    }

    fn with_path_checked(mut self) -> Self {
        self.check_path();
        self
    }

    fn check_path(&mut self) {
        self.path_exists = match &self.kind {
            DiskFormKind::Attach { path, .. } => !path.is_empty() && is_existing_file(path),
            DiskFormKind::Detach { .. } => false,
        };
    }

    /// Result of the last filesystem check of the attach path.
    pub fn path_exists(&self) -> bool {
        self.path_exists
    }

    fn editing_path(&self) -> bool {
        matches!(
            self.kind,
            DiskFormKind::Attach {
                focus: AttachField::Path,
                ..
            }
        )
    }

    pub fn attach(domain: &str, messages: Messages) -> Self {
        Self::new(domain, messages, DiskFormKind::attach())
    }

    pub fn title(&self) -> String {
        match self.kind {
            DiskFormKind::Attach { .. } => format!("Attach disk to {}", self.domain),
            DiskFormKind::Detach { .. } => format!("Detach disk from {}", self.domain),
        }
    }

    /// Descriptor the form would submit right now.
    pub fn descriptor(&self) -> Result<DiskDescriptor, Error> {
        let descriptor = match &self.kind {
            DiskFormKind::Attach { path, target, .. } => {
                DiskDescriptor::new(path.trim(), target.trim())
            }
            DiskFormKind::Detach { disks, selected } => disks
                .get(*selected)
                .map(AttachedDisk::descriptor)
                .ok_or_else(|| Error::MalformedInput("no disk selected".to_string()))?,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Issues the live hot-plug or unplug call for the form's domain.
    ///
    /// The domain is resolved again by name, so a form left open while the
    /// domain disappeared fails with [`Error::DomainLookupFailed`].
    pub fn submit(&self, hypervisor: &dyn Hypervisor) -> Result<(), Error> {
        let descriptor = self.descriptor()?;
        let dom = hypervisor
            .lookup_domain_by_name(&self.domain)
            .map_err(|source| Error::DomainLookupFailed {
                name: self.domain.clone(),
                source,
            })?;
        let xml = descriptor.to_xml();
        let result = match self.kind {
            DiskFormKind::Attach { .. } => dom.attach_device(&xml, true),
            DiskFormKind::Detach { .. } => dom.detach_device(&xml, true),
        };
        match result {
            Ok(()) => {
                info!(
                    domain = %self.domain,
                    target = %descriptor.target_dev,
                    source = %descriptor.source_path,
                    "{}",
                    self.messages.succeeded(&self.domain)
                );
                Ok(())
            }
            Err(e) => {
                warn!(domain = %self.domain, error = %e, "{}", self.messages.fail);
                Err(e.into())
            }
        }
    }

    pub fn input_char(&mut self, c: char) {
        if let Some(field) = self.focused_text_mut() {
            field.push(c);
        }
        if self.editing_path() {
            self.check_path();
        }
    }

    pub fn backspace(&mut self) {
        if let Some(field) = self.focused_text_mut() {
            field.pop();
        }
        if self.editing_path() {
            self.check_path();
        }
    }

    fn focused_text_mut(&mut self) -> Option<&mut String> {
        match &mut self.kind {
            DiskFormKind::Attach {
                path,
                focus: AttachField::Path,
                ..
            } => Some(path),
            DiskFormKind::Attach {
                target,
                focus: AttachField::Target,
                ..
            } => Some(target),
            DiskFormKind::Detach { .. } => None,
        }
    }

    /// Moves focus (attach) or selection (detach) down.
    pub fn next(&mut self) {
        match &mut self.kind {
            DiskFormKind::Attach { focus, .. } => *focus = AttachField::Target,
            DiskFormKind::Detach { disks, selected } => {
                if *selected + 1 < disks.len() {
                    *selected += 1;
                }
            }
        }
    }

    /// Moves focus (attach) or selection (detach) up.
    pub fn prev(&mut self) {
        match &mut self.kind {
            DiskFormKind::Attach { focus, .. } => *focus = AttachField::Path,
            DiskFormKind::Detach { selected, .. } => *selected = selected.saturating_sub(1),
        }
    }

    /// Tab: completes the path field from the filesystem, otherwise cycles focus.
    pub fn tab(&mut self) {
        if matches!(self.kind, DiskFormKind::Detach { .. }) {
            self.next();
            return;
        }
        let DiskFormKind::Attach { path, focus, .. } = &mut self.kind else {
            return;
        };
        if *focus == AttachField::Target {
            *focus = AttachField::Path;
            return;
        }
        match complete_path(path) {
            Some(completed) if completed != *path => {
                *path = completed;
                self.check_path();
            }
            _ => *focus = AttachField::Target,
        }
    }
}

/// Completes `text` to the longest unambiguous filesystem path.
///
/// A single matching directory gets a trailing separator so the next Tab
/// descends into it. Returns `None` when nothing matches.
pub fn complete_path(text: &str) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    let (dir, prefix) = match text.rfind('/') {
        Some(idx) => (&text[..=idx], &text[idx + 1..]),
        None => ("", text),
    };
    let read_from = if dir.is_empty() { "." } else { dir };

    let mut matches: Vec<(String, bool)> = std::fs::read_dir(read_from)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().into_string().ok()?;
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            name.starts_with(prefix).then_some((name, is_dir))
        })
        .collect();
    matches.sort();

    match matches.as_slice() {
        [] => None,
        [(name, is_dir)] => {
            let mut completed = format!("{}{}", dir, name);
            if *is_dir && !completed.ends_with('/') {
                completed.push('/');
            }
            Some(completed)
        }
        [(first, _), rest @ ..] => {
            let common = rest.iter().fold(first.clone(), |acc, (name, _)| {
                common_prefix(&acc, name).to_string()
            });
            Some(format!("{}{}", dir, common))
        }
    }
}

fn common_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let end = a
        .char_indices()
        .zip(b.chars())
        .find(|((_, ca), cb)| ca != cb)
        .map(|((i, _), _)| i)
        .unwrap_or_else(|| a.len().min(b.len()));
    &a[..end]
}

/// Whether `path` names an existing regular file, for form hints.
pub fn is_existing_file(path: &str) -> bool {
    Path::new(path.trim()).is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hypervisor::{HypervisorError, MockHypervisor};
    use crate::hypervisor::mock::MockOp;

    fn attach_messages() -> Messages {
        Messages::new("Attaching disk to", "attached disk to", "Failed to attach disk to")
    }

    fn filled_attach_form(path: &str, target: &str) -> DiskForm {
        let mut form = DiskForm::attach("web-01", attach_messages());
        path.chars().for_each(|c| form.input_char(c));
        form.next();
        target.chars().for_each(|c| form.input_char(c));
        form
    }

    #[test]
    fn typing_goes_to_focused_field() {
        let mut form = filled_attach_form("/srv/x.qcow2", "vdc");
        form.backspace();
        assert_eq!(
            form.kind,
            DiskFormKind::Attach {
                path: "/srv/x.qcow2".into(),
                target: "vd".into(),
                focus: AttachField::Target,
            }
        );
        assert_eq!(form.title(), "Attach disk to web-01");
    }

    #[test]
    fn attach_submit_hot_plugs_disk() {
        let hv = MockHypervisor::typical_host();
        let form = filled_attach_form("/srv/extra.qcow2", "vdc");
        form.submit(&hv).unwrap();

        let disks = hv.domain("web-01").unwrap().disks;
        assert!(disks.iter().any(|d| d.device == "vdc" && d.file == "/srv/extra.qcow2"));
    }

    #[test]
    fn attach_with_malformed_input_never_reaches_hypervisor() {
        let hv = MockHypervisor::typical_host();
        let form = filled_attach_form("/srv/a'b.qcow2", "vdc");
        assert!(matches!(form.submit(&hv), Err(Error::MalformedInput(_))));
        assert_eq!(hv.domain("web-01").unwrap().disks.len(), 1);
    }

    #[test]
    fn attach_failure_is_reported() {
        let hv = MockHypervisor::typical_host();
        hv.fail(
            "web-01",
            MockOp::AttachDevice,
            HypervisorError::Api {
                code: 1,
                message: "unable to open disk path".into(),
            },
        );
        let form = filled_attach_form("/srv/extra.qcow2", "vdc");
        let err = form.submit(&hv).unwrap_err();
        assert_eq!(err.humanize(), "Libvirt err 1: unable to open disk path");
    }

    #[test]
    fn detach_submit_removes_selected_disk() {
        let hv = MockHypervisor::typical_host();
        let disks = hv.domain("db-01").unwrap().disks;
        let mut form = DiskForm::new(
            "db-01",
            Messages::new("Detaching disk from", "detached disk from", "Failed to detach disk from"),
            DiskFormKind::detach(disks),
        );
        form.next();
        form.next();
        assert_eq!(form.descriptor().unwrap().target_dev, "vdb");
        form.submit(&hv).unwrap();

        let left = hv.domain("db-01").unwrap().disks;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].device, "vda");
    }

    #[test]
    fn detach_without_disks_is_malformed() {
        let form = DiskForm::new("db-01", attach_messages(), DiskFormKind::detach(Vec::new()));
        assert!(matches!(form.descriptor(), Err(Error::MalformedInput(_))));
    }

    #[test]
    fn submit_for_vanished_domain_is_lookup_failure() {
        let hv = MockHypervisor::typical_host();
        let form = filled_attach_form("/srv/extra.qcow2", "vdc");
        hv.remove_domain("web-01");
        assert!(matches!(
            form.submit(&hv),
            Err(Error::DomainLookupFailed { .. })
        ));
    }

    #[test]
    fn path_completion() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        std::fs::create_dir_all(dir.join("images")).unwrap();
        std::fs::write(dir.join("disk-a.qcow2"), b"").unwrap();
        std::fs::write(dir.join("disk-b.qcow2"), b"").unwrap();
        let base = format!("{}/", dir.display());

        assert_eq!(complete_path(&format!("{base}di")), Some(format!("{base}disk-")));
        assert_eq!(
            complete_path(&format!("{base}disk-b")),
            Some(format!("{base}disk-b.qcow2"))
        );
        assert_eq!(complete_path(&format!("{base}im")), Some(format!("{base}images/")));
        assert_eq!(complete_path(&format!("{base}zzz")), None);
        assert!(is_existing_file(&format!("{base}disk-a.qcow2")));
    }

    #[test]
    fn path_check_runs_on_edit_only() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("extra.qcow2");
        std::fs::write(&file, b"").unwrap();

        let mut form = DiskForm::attach("web-01", attach_messages());
        assert!(!form.path_exists());
        file.display()
            .to_string()
            .chars()
            .for_each(|c| form.input_char(c));
        assert!(form.path_exists());

        // editing the target keeps the cached result
        std::fs::remove_file(&file).unwrap();
        form.next();
        form.input_char('v');
        assert!(form.path_exists());

        form.prev();
        form.backspace();
        form.input_char('2');
        assert!(!form.path_exists());
    }

    #[test]
    fn tab_cycles_focus_when_nothing_to_complete() {
        let mut form = DiskForm::attach("web-01", attach_messages());
        form.tab();
        assert!(matches!(
            form.kind,
            DiskFormKind::Attach {
                focus: AttachField::Target,
                ..
            }
        ));
        form.tab();
        assert!(matches!(
            form.kind,
            DiskFormKind::Attach {
                focus: AttachField::Path,
                ..
            }
        ));
    }

    #[test]
    fn common_prefix_respects_char_boundaries() {
        assert_eq!(common_prefix("disk-a", "disk-b"), "disk-");
        assert_eq!(common_prefix("é1", "é2"), "é");
        assert_eq!(common_prefix("abc", "ab"), "ab");
    }
}

//! Disk device descriptors for hot-plug and unplug.

use crate::error::Error;

/// Characters that would change the meaning of the descriptor XML.
const XML_SIGNIFICANT: &[char] = &['<', '>', '&', '\'', '"'];

/// A file-backed virtio disk, as exchanged with the hypervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskDescriptor {
    pub source_path: String,
    pub target_dev: String,
}

impl DiskDescriptor {
    pub fn new(source_path: impl Into<String>, target_dev: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            target_dev: target_dev.into(),
        }
    }

    /// Rejects input that cannot be embedded verbatim in the descriptor.
    pub fn validate(&self) -> Result<(), Error> {
        check_field("disk path", &self.source_path)?;
        check_field("target device", &self.target_dev)
    }

    /// Descriptor XML. Call [`validate`](Self::validate) first: fields are
    /// inserted without escaping.
    pub fn to_xml(&self) -> String {
        format!(
            "<disk type='file' device='disk'>\
             <driver name='qemu' type='qcow2'/>\
             <source file='{}'/>\
             <target dev='{}' bus='virtio'/>\
             </disk>",
            self.source_path, self.target_dev
        )
    }
}

fn check_field(label: &str, value: &str) -> Result<(), Error> {
    if value.trim().is_empty() {
        return Err(Error::MalformedInput(format!("{} is empty", label)));
    }
    if let Some(c) = value.chars().find(|c| XML_SIGNIFICANT.contains(c)) {
        return Err(Error::MalformedInput(format!(
            "{} contains unsupported character '{}'",
            label, c
        )));
    }
    Ok(())
}

/// A disk currently attached to a domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedDisk {
    pub device: String,
    pub file: String,
}

impl AttachedDisk {
    /// Option text in the detach list.
    pub fn label(&self) -> String {
        format!("Device: {}, File: {}", self.device, self.file)
    }

    pub fn descriptor(&self) -> DiskDescriptor {
        DiskDescriptor::new(self.file.clone(), self.device.clone())
    }
}

/// Lists `<disk>` elements that have both a source file and a target device.
///
/// Works on a full domain description as well as on a bare `<disk>` fragment.
pub fn parse_attached_disks(xml: &str) -> Result<Vec<AttachedDisk>, Error> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|e| Error::MalformedInput(format!("failed to parse domain XML: {}", e)))?;

    let disks = doc
        .descendants()
        .filter(|n| n.has_tag_name("disk"))
        .filter_map(|disk| {
            let file = disk
                .children()
                .find(|c| c.has_tag_name("source"))?
                .attribute("file")?;
            let dev = disk
                .children()
                .find(|c| c.has_tag_name("target"))?
                .attribute("dev")?;
            Some(AttachedDisk {
                device: dev.to_string(),
                file: file.to_string(),
            })
        })
        .collect();
    Ok(disks)
}

/// Host-side device names (`<interface><target dev=…/>`) of a domain's
/// network interfaces, as accepted by interface statistics calls.
pub fn interface_targets(xml: &str) -> Result<Vec<String>, Error> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|e| Error::MalformedInput(format!("failed to parse domain XML: {}", e)))?;

    Ok(doc
        .descendants()
        .filter(|n| n.has_tag_name("interface"))
        .filter_map(|iface| {
            iface
                .children()
                .find(|c| c.has_tag_name("target"))?
                .attribute("dev")
                .map(str::to_string)
        })
        .collect())
}

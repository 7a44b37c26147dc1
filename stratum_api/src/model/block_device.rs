use std::{
    fs,
    os::unix::fs::FileTypeExt,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::error::{InvalidInputError, ReportError, StratumError};

use super::partition::Partition;

/// A physical or logical device, addressed either by its device file or by its
/// slot on a hardware storage controller.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct BlockDevice {
    /// World wide name, informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wwn: Option<String>,

    /// Path to the device node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    /// Physical device ID on the hardware RAID controller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_physical_device_id: Option<u32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partitions: Vec<Partition>,
}

impl BlockDevice {
    pub fn from_file(file: impl Into<PathBuf>) -> Self {
        Self {
            file: Some(file.into()),
            ..Default::default()
        }
    }

    pub fn from_controller_id(id: u32) -> Self {
        Self {
            controller_physical_device_id: Some(id),
            ..Default::default()
        }
    }

    /// Checks whether the device can be referenced by a destructive command.
    ///
    /// Controller-addressed devices are always valid. File-addressed devices
    /// are valid when the path, after resolving symlinks, is an accessible
    /// block device node. The check hits the filesystem on every call.
    pub fn validate(&self) -> bool {
        if self.controller_physical_device_id.is_some() {
            return true;
        }

        let Some(file) = &self.file else {
            return false;
        };

        fs::canonicalize(file)
            .and_then(fs::metadata)
            .map(|metadata| metadata.file_type().is_block_device())
            .unwrap_or(false)
    }

    /// Returns the device file, failing when the device is only known by its
    /// controller slot.
    pub fn device_file(&self) -> Result<&Path, StratumError> {
        self.file
            .as_deref()
            .structured(InvalidInputError::MissingDeviceFile)
    }

    /// Human readable identifier for logs and errors.
    pub fn describe(&self) -> String {
        match (&self.file, self.controller_physical_device_id) {
            (Some(file), _) => file.display().to_string(),
            (None, Some(id)) => format!("controller device {id}"),
            (None, None) => "<unaddressed device>".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_controller_device() {
        assert!(BlockDevice::from_controller_id(0).validate());
        assert!(BlockDevice {
            file: Some("/does/not/exist".into()),
            controller_physical_device_id: Some(3),
            ..Default::default()
        }
        .validate());
    }

    #[test]
    fn test_validate_rejects_non_block_devices() {
        // Missing path
        assert!(!BlockDevice::from_file("/dev/does-not-exist").validate());

        // Character device
        assert!(!BlockDevice::from_file("/dev/null").validate());

        // Regular file, also through a symlink
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("disk.img");
        fs::write(&file, [0u8; 512]).unwrap();
        assert!(!BlockDevice::from_file(&file).validate());

        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&file, &link).unwrap();
        assert!(!BlockDevice::from_file(&link).validate());

        // Neither file nor controller slot
        assert!(!BlockDevice::default().validate());
    }

    #[test]
    fn test_device_file() {
        assert_eq!(
            BlockDevice::from_file("/dev/sda").device_file().unwrap(),
            Path::new("/dev/sda")
        );
        assert!(BlockDevice::from_controller_id(1).device_file().is_err());
        assert_eq!(BlockDevice::from_controller_id(1).describe(), "controller device 1");
    }
}

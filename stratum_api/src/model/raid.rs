use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::error::{InvalidInputError, StratumError};

use super::block_device::BlockDevice;

/// Backend used to assemble a RAID array.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RaidType {
    /// Linux software RAID, managed with mdadm.
    #[default]
    #[serde(rename = "linuxsw")]
    LinuxSoftware,

    /// Virtual disk on a hardware storage controller.
    #[serde(rename = "hardware")]
    Hardware,
}

impl RaidType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LinuxSoftware => "linuxsw",
            Self::Hardware => "hardware",
        }
    }
}

impl fmt::Display for RaidType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RaidType {
    type Err = StratumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linuxsw" => Ok(Self::LinuxSoftware),
            "hardware" => Ok(Self::Hardware),
            _ => Err(StratumError::new(InvalidInputError::InvalidRaidType {
                raid_type: s.into(),
            })),
        }
    }
}

/// Kind of object listed by `raid list`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RaidObjectType {
    VirtualDisk,
    PhysicalDisk,
}

impl FromStr for RaidObjectType {
    type Err = StratumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vd" => Ok(Self::VirtualDisk),
            "pd" => Ok(Self::PhysicalDisk),
            _ => Err(StratumError::new(InvalidInputError::InvalidRaidObjectType {
                object_type: s.into(),
            })),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RaidArray {
    pub name: String,

    /// RAID level as understood by mdadm or the controller, e.g. `1`.
    pub level: String,

    /// Member devices, in order.
    pub devices: Vec<BlockDevice>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_virtual_disk_id: Option<u32>,
}

impl RaidArray {
    pub fn new(name: impl Into<String>, level: impl Into<String>, devices: Vec<BlockDevice>) -> Self {
        Self {
            name: name.into(),
            level: level.into(),
            devices,
            controller_virtual_disk_id: None,
        }
    }

    /// Builds the handle used to tear an array down. A numeric name doubles as
    /// the controller virtual disk ID.
    pub fn for_deletion(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            controller_virtual_disk_id: name.parse().ok(),
            name,
            level: String::new(),
            devices: Vec::new(),
        }
    }

    /// Path of the named software array under `md_root`.
    pub fn device_path(&self, md_root: impl AsRef<Path>) -> PathBuf {
        md_root.as_ref().join(&self.name)
    }
}

/// A RAID array as reported by a backend.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct VirtualDisk {
    pub id: String,
    pub name: String,
    /// RAID mode as reported by the backend, e.g. `RAID1` or `raid1`.
    pub raid_mode: String,
}

impl VirtualDisk {
    pub const CSV_HEADER: &'static str = "id,name,raid-type";

    pub fn to_csv(&self) -> String {
        format!("{},{},{}", self.id, self.name, self.raid_mode)
    }
}

/// A drive that can be used as a RAID member.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct PhysicalDisk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_controller_drive_id: Option<u32>,
    pub drive_type: String,
    pub serial: String,
}

impl PhysicalDisk {
    pub const CSV_HEADER: &'static str = "storage-controller-drive-id,drive-type,serial";

    pub fn to_csv(&self) -> String {
        format!(
            "{},{},{}",
            self.storage_controller_drive_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
            self.drive_type,
            self.serial
        )
    }
}

use std::{collections::HashSet, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    error::{InvalidInputError, ReportError, StratumError, StratumResultExt},
    model::{check_position, BlockDevice, FileSystem, RaidArray, RaidType},
};

/// Static problems found in a storage layout before anything is applied.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum StorageLayoutValidationError {
    #[error("Block device #{index} has neither a file nor a controller physical device ID")]
    UnaddressedBlockDevice { index: usize },

    #[error("Partition '{name}' on '{device}' has position {position} outside of [1, 128]")]
    PartitionPositionOutOfRange {
        device: String,
        name: String,
        position: u8,
    },

    #[error("Partition position {position} is used more than once on '{device}'")]
    DuplicatePartitionPosition { device: String, position: u8 },

    #[error("Block device '{device}' has partitions but no device file")]
    PartitionsWithoutDeviceFile { device: String },

    #[error("RAID array name '{name}' is used more than once")]
    DuplicateRaidArrayName { name: String },

    #[error("RAID array '{name}' has no member devices")]
    EmptyRaidArray { name: String },

    #[error("Hardware RAID array '{name}' has a member without a controller physical device ID")]
    HardwareMemberWithoutControllerId { name: String },
}

/// A RAID array entry of a storage layout.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct LayoutRaidArray {
    pub name: String,

    pub level: String,

    #[serde(default)]
    pub raid_type: RaidType,

    pub devices: Vec<BlockDevice>,
}

impl LayoutRaidArray {
    pub fn to_array(&self) -> RaidArray {
        RaidArray::new(&self.name, &self.level, self.devices.clone())
    }
}

/// Declarative description of the storage of a host.
///
/// Applied in order: partitions on every block device, then RAID arrays, then
/// the whole-device filesystems.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct StorageLayout {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub block_devices: Vec<BlockDevice>,

    #[serde(default)]
    pub raid_arrays: Vec<LayoutRaidArray>,

    #[serde(default)]
    pub file_systems: Vec<FileSystem>,
}

impl StorageLayout {
    pub fn from_yaml(contents: &str) -> Result<Self, StratumError> {
        serde_yaml::from_str(contents).structured(InvalidInputError::ParseStorageLayout)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, StratumError> {
        let contents = std::fs::read_to_string(path.as_ref()).structured(
            InvalidInputError::LoadStorageLayout {
                path: path.as_ref().display().to_string(),
            },
        )?;
        Self::from_yaml(&contents).message(format!(
            "Failed to parse storage layout '{}'",
            path.as_ref().display()
        ))
    }

    pub fn validate(&self) -> Result<(), StorageLayoutValidationError> {
        for (index, device) in self.block_devices.iter().enumerate() {
            if device.file.is_none() && device.controller_physical_device_id.is_none() {
                return Err(StorageLayoutValidationError::UnaddressedBlockDevice { index });
            }

            if device.file.is_none() && !device.partitions.is_empty() {
                return Err(StorageLayoutValidationError::PartitionsWithoutDeviceFile {
                    device: device.describe(),
                });
            }

            let mut positions = HashSet::new();
            for partition in &device.partitions {
                if check_position(i64::from(partition.position)).is_err() {
                    return Err(StorageLayoutValidationError::PartitionPositionOutOfRange {
                        device: device.describe(),
                        name: partition.name.clone(),
                        position: partition.position,
                    });
                }
                if !positions.insert(partition.position) {
                    return Err(StorageLayoutValidationError::DuplicatePartitionPosition {
                        device: device.describe(),
                        position: partition.position,
                    });
                }
            }
        }

        let mut names = HashSet::new();
        for array in &self.raid_arrays {
            if !names.insert(array.name.as_str()) {
                return Err(StorageLayoutValidationError::DuplicateRaidArrayName {
                    name: array.name.clone(),
                });
            }
            if array.devices.is_empty() {
                return Err(StorageLayoutValidationError::EmptyRaidArray {
                    name: array.name.clone(),
                });
            }
            if array.raid_type == RaidType::Hardware
                && array
                    .devices
                    .iter()
                    .any(|d| d.controller_physical_device_id.is_none())
            {
                return Err(
                    StorageLayoutValidationError::HardwareMemberWithoutControllerId {
                        name: array.name.clone(),
                    },
                );
            }
        }

        Ok(())
    }
}

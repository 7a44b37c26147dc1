use std::{path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, IntoStaticStr};

use crate::error::{InvalidInputError, StratumError};

/// Filesystems Stratum knows how to create.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FileSystemType {
    Ext2,
    Ext3,
    Ext4,
    Xfs,
    Vfat,
    Btrfs,
    /// Not a filesystem, gets a swap signature instead.
    Swap,
}

impl FileSystemType {
    pub fn name(&self) -> &'static str {
        self.into()
    }

    pub fn is_swap(&self) -> bool {
        matches!(self, Self::Swap)
    }

    /// Flag telling mkfs to overwrite an existing signature, if the tool has one.
    pub fn force_flag(&self) -> Option<&'static str> {
        match self {
            Self::Ext2 | Self::Ext3 | Self::Ext4 => Some("-F"),
            Self::Xfs | Self::Btrfs => Some("-f"),
            Self::Vfat | Self::Swap => None,
        }
    }
}

impl FromStr for FileSystemType {
    type Err = StratumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "ext2" => Self::Ext2,
            "ext3" => Self::Ext3,
            "ext4" => Self::Ext4,
            "xfs" => Self::Xfs,
            "vfat" | "fat32" => Self::Vfat,
            "btrfs" => Self::Btrfs,
            "swap" => Self::Swap,
            _ => {
                return Err(StratumError::new(InvalidInputError::UnknownFileSystem {
                    label: s.into(),
                }))
            }
        })
    }
}

/// A filesystem to create on a whole device, typically a RAID array.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileSystem {
    pub device: PathBuf,

    pub format: FileSystemType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_point: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

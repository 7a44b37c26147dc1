use std::{fmt, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    constants::{PARTITION_POSITION_MAX, PARTITION_POSITION_MIN, PARTITION_SPEC_DELIMITER},
    error::{InvalidInputError, StratumError},
};

use super::filesystem::FileSystemType;

/// A GPT partition to create on a block device.
///
/// The target device is supplied when the partition is created, a partition
/// does not own its device.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Partition {
    pub name: String,

    /// Partition table slot, in [1, 128].
    pub position: u8,

    /// Size as understood by sgdisk, e.g. `+512M` or `0` for the rest of the disk.
    pub size: String,

    /// Partition type code, e.g. `8300` or `ef00`.
    #[serde(rename = "type")]
    pub partition_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_system: Option<FileSystemType>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_system_options: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_point: Option<PathBuf>,

    /// Filesystem UUID, known once the partition has been formatted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
}

impl Partition {
    pub fn new(
        name: impl Into<String>,
        position: i64,
        size: impl Into<String>,
        partition_type: impl Into<String>,
    ) -> Result<Self, StratumError> {
        Ok(Self {
            name: name.into(),
            position: check_position(position)?,
            size: size.into(),
            partition_type: partition_type.into(),
            file_system: None,
            file_system_options: Vec::new(),
            mount_point: None,
            uuid: None,
        })
    }

    /// Parses the `NAME:POSITION:SIZE:TYPE` shorthand.
    pub fn parse_delimited(spec: &str) -> Result<Self, StratumError> {
        let malformed = || {
            StratumError::new(InvalidInputError::InvalidDelimitedPartition { spec: spec.into() })
        };

        let fields: Vec<&str> = spec.split(PARTITION_SPEC_DELIMITER).collect();
        let [name, position, size, partition_type] = fields[..] else {
            return Err(malformed());
        };

        let position = position.trim().parse::<i64>().map_err(|_| malformed())?;
        Self::new(name, position, size, partition_type)
    }

    pub fn with_file_system(mut self, file_system: FileSystemType, options: Vec<String>) -> Self {
        self.file_system = Some(file_system);
        self.file_system_options = options;
        self
    }
}

/// Range check shared by every way of building a partition.
pub fn check_position(position: i64) -> Result<u8, StratumError> {
    if !(PARTITION_POSITION_MIN..=PARTITION_POSITION_MAX).contains(&position) {
        return Err(StratumError::new(InvalidInputError::FailedPartitioning {
            position,
        }));
    }
    u8::try_from(position).map_err(|_| StratumError::internal("Partition position overflow"))
}

impl FromStr for Partition {
    type Err = StratumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_delimited(s)
    }
}

/// Renders the `NAME:POSITION:SIZE:TYPE` shorthand.
impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{d}{}{d}{}{d}{}",
            self.name,
            self.position,
            self.size,
            self.partition_type,
            d = PARTITION_SPEC_DELIMITER
        )
    }
}

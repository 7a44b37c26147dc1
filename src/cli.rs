use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
};

use clap::{Args, Parser, Subcommand};
use log::LevelFilter;

use stratum_api::{
    constants::DEFAULT_WIPE_TIMEOUT,
    error::{InvalidInputError, StratumError},
    model::{BlockDevice, RaidArray, RaidObjectType, RaidType},
};

use crate::{engine::PartitionPlanner, logging::LogFormat, STRATUM_VERSION};

#[derive(Parser, Debug)]
#[clap(version = STRATUM_VERSION)]
pub struct Cli {
    /// Logging verbosity [OFF, ERROR, WARN, INFO, DEBUG, TRACE]
    #[arg(global = true, short, long, default_value_t = LevelFilter::Debug)]
    pub verbosity: LevelFilter,

    /// Log everything, overriding --verbosity
    #[arg(global = true, long)]
    pub debug: bool,

    /// Format of the log lines written to stderr
    #[arg(global = true, long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create, delete and list RAID arrays
    Raid {
        /// RAID type (linuxsw, hardware)
        #[arg(global = true, long, default_value = "linuxsw")]
        raid_type: String,

        #[clap(subcommand)]
        command: RaidCommand,
    },

    /// Create and format partitions
    Partition {
        #[clap(subcommand)]
        command: PartitionCommand,
    },

    /// Operate on whole disks
    Disk {
        #[clap(subcommand)]
        command: DiskCommand,
    },

    /// Apply a storage layout to the host
    Apply {
        /// Path to a storage layout file
        #[clap(index = 1)]
        config: PathBuf,
    },

    /// Validate a storage layout without touching the host
    Validate {
        /// Path to a storage layout file
        #[clap(index = 1)]
        config: PathBuf,
    },

    /// Create or delete a RAID array (use `raid create` and `raid delete`)
    #[clap(name = "configure-raid", hide(true))]
    ConfigureRaid {
        #[clap(flatten)]
        array: RaidArrayArgs,

        /// RAID type (linuxsw, hardware)
        #[arg(long, default_value = "linuxsw")]
        raid_type: String,

        /// Delete the array instead of creating it
        #[arg(long)]
        delete: bool,
    },

    /// Partition a block device (use `disk partition`)
    #[clap(name = "partition-disk", hide(true))]
    PartitionDisk(PartitionArgs),

    /// Format a partition (use `partition format`)
    #[clap(name = "format-partition", hide(true))]
    FormatPartition(FormatArgs),
}

#[derive(Subcommand, Debug)]
pub enum RaidCommand {
    /// Create a virtual disk from one or more physical disks
    Create(RaidArrayArgs),

    /// Delete a virtual disk
    Delete {
        /// Virtual disk name, or controller virtual disk ID
        #[arg(long)]
        name: String,
    },

    /// List virtual or physical disks
    List {
        /// Type of RAID objects to list (vd, pd)
        #[arg(long, default_value = "vd")]
        object_type: String,
    },
}

#[derive(Args, Debug)]
pub struct RaidArrayArgs {
    /// RAID volume name
    #[arg(long)]
    pub name: String,

    /// RAID level
    #[arg(long, default_value = "1")]
    pub raid_level: String,

    /// Comma-separated member devices, or controller physical device IDs
    /// for hardware arrays
    #[arg(long, value_delimiter = ',', num_args = 1.., required = true)]
    pub devices: Vec<String>,
}

impl RaidArrayArgs {
    /// Builds the array to create. Hardware members are controller physical
    /// device IDs, software members are device files.
    pub fn to_array(&self, raid_type: RaidType) -> Result<RaidArray, StratumError> {
        let devices = match raid_type {
            RaidType::LinuxSoftware => self.devices.iter().map(BlockDevice::from_file).collect(),
            RaidType::Hardware => self
                .devices
                .iter()
                .map(|id| {
                    id.parse().map(BlockDevice::from_controller_id).map_err(|_| {
                        StratumError::new(InvalidInputError::InvalidControllerDeviceId {
                            id: id.clone(),
                        })
                    })
                })
                .collect::<Result<_, _>>()?,
        };
        Ok(RaidArray::new(&self.name, &self.raid_level, devices))
    }
}

#[derive(Subcommand, Debug)]
pub enum PartitionCommand {
    /// Create GPT partitions on a block device
    Create(PartitionArgs),

    /// Format a partition
    Format(FormatArgs),
}

#[derive(Args, Debug)]
pub struct PartitionArgs {
    /// Device to be partitioned
    #[arg(long)]
    pub device: PathBuf,

    /// Comma-separated partition definitions NAME:POSITION:SIZE:TYPE
    #[arg(long, value_delimiter = ',', num_args = 1.., required = true)]
    pub partitions: Vec<String>,
}

#[derive(Args, Debug)]
pub struct FormatArgs {
    /// Block device holding the partition
    #[arg(long)]
    pub device: Option<PathBuf>,

    /// Partition number on --device
    #[arg(long)]
    pub partition: Option<u8>,

    /// Block device to format directly
    #[arg(long)]
    pub filesystem_device: Option<PathBuf>,

    /// Filesystem to create
    #[arg(long, default_value = "ext4")]
    pub format: String,

    /// Intended mount point of the filesystem. Nothing is mounted.
    #[arg(long, default_value = "/")]
    pub mount_point: PathBuf,

    /// Comma-separated filesystem creation options
    #[arg(long, value_delimiter = ',', num_args = 0.., allow_hyphen_values = true)]
    pub options: Vec<String>,
}

impl FormatArgs {
    /// Resolves the device node to format. `--filesystem-device` wins,
    /// otherwise both `--device` and a non-zero `--partition` are needed.
    pub fn target(&self, planner: &PartitionPlanner) -> Result<PathBuf, StratumError> {
        if let Some(device) = &self.filesystem_device {
            return Ok(device.clone());
        }
        match (&self.device, self.partition) {
            (Some(device), Some(position)) if position > 0 => {
                Ok(planner.partition_path(device, position))
            }
            _ => Err(StratumError::new(InvalidInputError::MissingFormatTarget)),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum DiskCommand {
    /// Wipe all data from the given disks
    Wipe {
        /// Comma-separated list of disks, e.g. /dev/sda,/dev/sdb
        #[clap(index = 1, value_delimiter = ',', num_args = 1.., required = true)]
        drives: Vec<PathBuf>,

        /// Deadline shared by every drive, e.g. 30s or 2h
        #[arg(long, default_value_t = DEFAULT_WIPE_TIMEOUT.into())]
        timeout: humantime::Duration,

        /// Path to save the JSON wipe report
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Partition a disk with a GPT table
    Partition(PartitionArgs),
}

/// Parses a `--raid-type` value.
pub fn raid_type(value: &str) -> Result<RaidType, StratumError> {
    value.parse()
}

/// Parses an `--object-type` value.
pub fn raid_object_type(value: &str) -> Result<RaidObjectType, StratumError> {
    value.parse()
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Raid { command, .. } => match command {
                RaidCommand::Create(_) => "raid create",
                RaidCommand::Delete { .. } => "raid delete",
                RaidCommand::List { .. } => "raid list",
            },
            Commands::Partition { command } => match command {
                PartitionCommand::Create(_) => "partition create",
                PartitionCommand::Format(_) => "partition format",
            },
            Commands::Disk { command } => match command {
                DiskCommand::Wipe { .. } => "disk wipe",
                DiskCommand::Partition(_) => "disk partition",
            },
            Commands::Apply { .. } => "apply",
            Commands::Validate { .. } => "validate",
            Commands::ConfigureRaid { .. } => "configure-raid",
            Commands::PartitionDisk(_) => "partition-disk",
            Commands::FormatPartition(_) => "format-partition",
        }
    }
}

impl Display for Commands {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.name())
    }
}

use std::time::Duration;

// Partitioning constants

/// First addressable partition table slot.
pub const PARTITION_POSITION_MIN: i64 = 1;

/// Last addressable partition table slot.
pub const PARTITION_POSITION_MAX: i64 = 128;

/// Separator of the NAME:POSITION:SIZE:TYPE partition shorthand.
pub const PARTITION_SPEC_DELIMITER: char = ':';

/// Directory holding the per-partition nodes of loop-backed devices.
pub const DEVICE_MAPPER_ROOT: &str = "/dev/mapper";

// RAID constants

/// Directory holding named software RAID arrays.
pub const MD_ROOT: &str = "/dev/md";

/// The only hardware RAID controller vendor Stratum can drive.
pub const SUPPORTED_CONTROLLER_VENDOR: &str = "Marvell";

/// Block size in KiB requested for new controller virtual disks.
pub const VIRTUAL_DISK_BLOCK_SIZE_KIB: u32 = 64;

// Wipe constants

/// Default deadline shared by all drives of a single wipe run.
pub const DEFAULT_WIPE_TIMEOUT: Duration = Duration::from_secs(60);

/// Chunk size used when overwriting a drive with zeroes.
pub const FILL_ZERO_CHUNK_SIZE: usize = 1024 * 1024;

/// User password set on an ATA drive for the length of an enhanced security
/// erase. Unlocks a drive left locked by an interrupted erase.
pub const ATA_SECURITY_PASSWORD: &str = "stratum";

/// Interval between two polls of a running sanitize operation.
pub const SANITIZE_POLL_INTERVAL: Duration = Duration::from_secs(5);

mod block_device;
mod drive;
mod filesystem;
mod partition;
mod raid;
mod wipe;

pub use block_device::BlockDevice;
pub use drive::{Capabilities, Capability, Drive, Protocol};
pub use filesystem::{FileSystem, FileSystemType};
pub use partition::{check_position, Partition};
pub use raid::{PhysicalDisk, RaidArray, RaidObjectType, RaidType, VirtualDisk};
pub use wipe::{WipeAction, WipeMethod, WipeOutcome, WipeReport, WipeResult};

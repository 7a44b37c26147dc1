use std::path::Path;

use anyhow::{Context, Error};
use log::debug;

use crate::dependencies::Dependency;

/// Creates device-mapper nodes for every partition of `device`, needed for
/// loop devices which the kernel does not partition on its own.
pub fn add(device: &Path) -> Result<(), Error> {
    debug!("Mapping partitions of '{}'", device.display());
    Dependency::Kpartx
        .cmd()
        .arg("-a")
        .arg("-s")
        .arg(device)
        .run_and_check()
        .with_context(|| format!("Failed to map partitions of '{}'", device.display()))
}

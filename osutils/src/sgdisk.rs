use std::path::Path;

use anyhow::{Context, Error};
use log::info;

use crate::dependencies::{Command, Dependency};

/// Builds `sgdisk -n POS:0:SIZE -c POS:NAME -t POS:TYPE DEVICE`.
///
/// The partition starts at the first free sector (`0`) and `size` is passed
/// through untouched, so both absolute ends and `+N[KMGT]` offsets work.
pub fn new_partition_command(
    device: &Path,
    position: u8,
    size: &str,
    name: &str,
    type_code: &str,
) -> Command {
    let mut cmd = Dependency::Sgdisk.cmd();
    cmd.arg("-n")
        .arg(format!("{position}:0:{size}"))
        .arg("-c")
        .arg(format!("{position}:{name}"))
        .arg("-t")
        .arg(format!("{position}:{type_code}"))
        .arg(device);
    cmd
}

pub fn new_partition(
    device: &Path,
    position: u8,
    size: &str,
    name: &str,
    type_code: &str,
) -> Result<(), Error> {
    info!(
        "Creating partition '{name}' at position {position} on '{}'",
        device.display()
    );
    new_partition_command(device, position, size, name, type_code)
        .run_and_check()
        .with_context(|| {
            format!(
                "Failed to create partition {position} on '{}'",
                device.display()
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_partition_command() {
        assert_eq!(
            new_partition_command(Path::new("/dev/sdb"), 2, "+1G", "root", "8300")
                .render_command(),
            "sgdisk -n 2:0:+1G -c 2:root -t 2:8300 /dev/sdb"
        );
        assert_eq!(
            new_partition_command(Path::new("/dev/loop0"), 1, "0", "my data", "8300")
                .render_command(),
            "sgdisk -n 1:0:0 -c '1:my data' -t 1:8300 /dev/loop0"
        );
    }
}

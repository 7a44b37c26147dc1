use std::path::Path;

use anyhow::{bail, Context, Error};

use stratum_api::model::FileSystemType;

use crate::dependencies::{Command, Dependency};

fn dependency(fs_type: FileSystemType) -> Option<Dependency> {
    Some(match fs_type {
        FileSystemType::Ext2 => Dependency::MkfsExt2,
        FileSystemType::Ext3 => Dependency::MkfsExt3,
        FileSystemType::Ext4 => Dependency::MkfsExt4,
        FileSystemType::Xfs => Dependency::MkfsXfs,
        FileSystemType::Vfat => Dependency::MkfsVfat,
        FileSystemType::Btrfs => Dependency::MkfsBtrfs,
        FileSystemType::Swap => return None,
    })
}

/// Builds `mkfs.<fs> [FORCE] [OPTIONS...] DEVICE`.
pub fn command(
    device_path: &Path,
    fs_type: FileSystemType,
    options: &[String],
) -> Result<Command, Error> {
    let Some(dependency) = dependency(fs_type) else {
        bail!("'{fs_type}' is not created with mkfs");
    };

    let mut cmd = dependency.cmd();
    if let Some(force) = fs_type.force_flag() {
        cmd.arg(force);
    }
    cmd.args(options).arg(device_path);
    Ok(cmd)
}

pub fn run(device_path: &Path, fs_type: FileSystemType, options: &[String]) -> Result<String, Error> {
    command(device_path, fs_type, options)?
        .output_and_check()
        .with_context(|| format!("Failed to execute mkfs.{fs_type}"))
}

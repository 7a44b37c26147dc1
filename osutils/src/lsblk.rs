use std::path::PathBuf;

use anyhow::{Context, Error};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::dependencies::Dependency;

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct LsBlkOutput {
    pub blockdevices: Vec<BlockDevice>,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct BlockDevice {
    pub name: PathBuf,
    #[serde(rename = "type")]
    pub device_type: String,
    /// Transport, e.g. `nvme`, `sata`, `sas` or `usb`. Missing for virtual devices.
    pub tran: Option<String>,
    pub model: Option<String>,
    pub serial: Option<String>,
    pub size: u64,
}

impl BlockDevice {
    pub fn is_disk(&self) -> bool {
        self.device_type == "disk"
    }
}

/// Lists every top level block device, without partitions.
pub fn list_disks() -> Result<Vec<BlockDevice>, Error> {
    let result = Dependency::Lsblk
        .cmd()
        .arg("--json")
        .arg("--path")
        .arg("--bytes")
        .arg("--nodeps")
        .arg("--output")
        .arg("NAME,TYPE,TRAN,MODEL,SERIAL,SIZE")
        .output_and_check()
        .context("Failed to execute lsblk")?;

    let parsed = parse_lsblk_output(result.as_str());
    if parsed.is_err() {
        warn!("lsblk output: {}", result);
    }

    parsed
}

fn parse_lsblk_output(output: &str) -> Result<Vec<BlockDevice>, Error> {
    let parsed: LsBlkOutput =
        serde_json::from_str(output).context("Failed to parse lsblk output")?;

    Ok(parsed.blockdevices)
}

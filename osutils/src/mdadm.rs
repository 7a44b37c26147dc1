use std::path::{Path, PathBuf};

use anyhow::{Context, Error};
use log::{debug, info};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::dependencies::{Command, Dependency};

/// Builds the array assembly command. Argument order is fixed: array path,
/// force and run flags, level, device count, then the members.
pub fn create_command(raid_path: &Path, level: &str, device_paths: &[PathBuf]) -> Command {
    let mut cmd = Dependency::Mdadm.cmd();
    cmd.arg("--create")
        .arg(raid_path)
        .arg("--force")
        .arg("--run")
        .arg("--level")
        .arg(level)
        .arg("--raid-devices")
        .arg(device_paths.len().to_string())
        .args(device_paths);
    cmd
}

pub fn create(raid_path: &Path, level: &str, device_paths: &[PathBuf]) -> Result<String, Error> {
    info!("Creating RAID array '{}'", raid_path.display());

    create_command(raid_path, level, device_paths)
        .output_and_check()
        .context("Failed to run mdadm create")
}

pub fn stop_command(raid_path: &Path) -> Command {
    let mut cmd = Dependency::Mdadm.cmd();
    cmd.arg("--manage").arg("--stop").arg(raid_path);
    cmd
}

pub fn stop(raid_path: &Path) -> Result<String, Error> {
    info!("Stopping RAID array '{}'", raid_path.display());

    stop_command(raid_path)
        .output_and_check()
        .with_context(|| format!("Failed to stop RAID array '{}'", raid_path.display()))
}

#[derive(Serialize, Deserialize, Clone, Debug, Hash, Eq, PartialEq, Default)]
pub struct MdadmDetail {
    pub raid_path: PathBuf,
    pub name: String,
    pub level: String,
    pub uuid: String,
    pub devices: Vec<PathBuf>,
}

pub fn details() -> Result<Vec<MdadmDetail>, Error> {
    debug!("Getting details for all RAID arrays");

    let output = Dependency::Mdadm
        .cmd()
        .arg("--detail")
        .arg("--scan")
        .arg("--verbose")
        .output_and_check()
        .context("Failed to run mdadm detail")?;

    mdadm_detail_to_struct(&output).context("Failed to parse mdadm detail")
}

fn mdadm_detail_to_struct(mdadm_output: &str) -> Result<Vec<MdadmDetail>, Error> {
    let mut mdadm_details = Vec::new();

    let array_regex = Regex::new(r"ARRAY\s+(/dev/md\S+)").context("Invalid array regex")?;
    let level_regex = Regex::new(r"(?:^|\s)level=(\w+)").context("Invalid level regex")?;
    let name_regex = Regex::new(r"(?:^|\s)name=(\S+)").context("Invalid name regex")?;
    let uuid_regex = Regex::new(r"(?:^|\s)UUID=([\da-zA-Z:]+)").context("Invalid UUID regex")?;
    let devices_regex = Regex::new(r"(?:^|\s)devices=([^=]+)").context("Invalid devices regex")?;

    let mut current_mdadm_detail = MdadmDetail::default();

    for line in mdadm_output.lines() {
        if let Some(captures) = array_regex.captures(line) {
            current_mdadm_detail.raid_path = PathBuf::from(
                captures
                    .get(1)
                    .context("Failed to parse RAID path from details")?
                    .as_str(),
            );
        }
        if let Some(captures) = level_regex.captures(line) {
            current_mdadm_detail.level = captures
                .get(1)
                .context("Failed to parse RAID level from details")?
                .as_str()
                .to_string();
        }
        if let Some(captures) = name_regex.captures(line) {
            // Names are reported as HOST:NAME.
            let name = captures
                .get(1)
                .context("Failed to parse RAID name from details")?
                .as_str();
            current_mdadm_detail.name = name.rsplit(':').next().unwrap_or(name).to_string();
        }
        if let Some(captures) = uuid_regex.captures(line) {
            current_mdadm_detail.uuid = captures
                .get(1)
                .context("Failed to parse RAID UUID from details")?
                .as_str()
                .to_string();
        }
        if let Some(captures) = devices_regex.captures(line) {
            current_mdadm_detail.devices = captures
                .get(1)
                .context("Failed to parse RAID devices from details")?
                .as_str()
                .trim()
                .split(',')
                .map(PathBuf::from)
                .collect();

            mdadm_details.push(std::mem::take(&mut current_mdadm_detail));
        }
    }

    Ok(mdadm_details)
}

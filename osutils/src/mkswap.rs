use std::path::Path;

use anyhow::{Context, Error};

use crate::dependencies::{Command, Dependency};

pub fn command(device_path: &Path) -> Command {
    Dependency::Mkswap.cmd().with_arg(device_path)
}

pub fn run(device_path: &Path) -> Result<String, Error> {
    command(device_path)
        .output_and_check()
        .context("Failed to execute mkswap")
}

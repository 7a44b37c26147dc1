use std::path::Path;

use anyhow::{Context, Error};

use crate::dependencies::Dependency;

fn run(device_path: impl AsRef<Path>, tag: &str) -> Result<String, Error> {
    let output = Dependency::Blkid
        .cmd()
        .arg("-s") // tag
        .arg(tag)
        .arg("-o") // output format
        .arg("value") // single value
        .arg(device_path.as_ref())
        .output_and_check()
        .context("Failed to execute blkid")?;

    Ok(output.trim_end_matches('\n').to_owned())
}

/// Reads the filesystem UUID of a formatted device.
pub fn get_filesystem_uuid(device_path: impl AsRef<Path>) -> Result<String, Error> {
    run(&device_path, "UUID").with_context(|| {
        format!(
            "Failed to get UUID for path '{}'",
            device_path.as_ref().display()
        )
    })
}

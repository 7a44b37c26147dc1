use std::path::Path;

use crate::dependencies::{Command, Dependency, DependencyError};

pub fn command(device: &Path) -> Command {
    Dependency::Blkdiscard.cmd().with_arg(device)
}

/// Discards every sector of `device`.
pub async fn discard(device: &Path) -> Result<(), Box<DependencyError>> {
    command(device).run_and_check_async().await
}

use std::path::Path;

use tracing::{info, Span};

use osutils::{blkid, dependencies::Command, mkfs, mkswap};
use stratum_api::{
    error::{ReportError, ServicingError, StratumError, StratumResultExt},
    model::FileSystemType,
};

/// Creates filesystems and swap areas.
pub struct Formatter {
    span: Span,
}

impl Formatter {
    pub fn new(span: Span) -> Self {
        Self { span }
    }

    /// Formats `device` with `fs`, returning the tool output.
    pub fn format(
        &self,
        fs: FileSystemType,
        options: &[String],
        device: &Path,
    ) -> Result<String, StratumError> {
        let _entered = self.span.enter();

        info!("Formatting '{}' as {fs}", device.display());
        let output = if fs.is_swap() {
            mkswap::run(device)
        } else {
            mkfs::run(device, fs, options)
        };
        output
            .structured(ServicingError::FormatFileSystem)
            .message(format!("Failed to format '{}' as {fs}", device.display()))
    }

    /// Command that [`Formatter::format`] runs.
    pub fn command(
        fs: FileSystemType,
        options: &[String],
        device: &Path,
    ) -> Result<Command, StratumError> {
        if fs.is_swap() {
            Ok(mkswap::command(device))
        } else {
            mkfs::command(device, fs, options).structured(ServicingError::FormatFileSystem)
        }
    }

    /// Reads the filesystem UUID of `device`.
    pub fn get_uuid(&self, device: &Path) -> Result<String, StratumError> {
        let _entered = self.span.enter();

        blkid::get_filesystem_uuid(device)
            .structured(ServicingError::ReadFileSystemUuid)
            .message(format!("Failed to read UUID of '{}'", device.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command() {
        assert_eq!(
            Formatter::command(FileSystemType::Swap, &[], Path::new("/dev/loop0p1"))
                .unwrap()
                .render_command(),
            "mkswap /dev/loop0p1"
        );
        assert_eq!(
            Formatter::command(
                FileSystemType::Ext4,
                &["-L".into(), "root".into()],
                Path::new("/dev/sda2")
            )
            .unwrap()
            .render_command(),
            "mkfs.ext4 -F -L root /dev/sda2"
        );
    }
}

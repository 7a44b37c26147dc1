//! ATA drive identification and erase through hdparm.

use std::path::Path;

use anyhow::{Context, Error};
use log::{debug, info, warn};

use stratum_api::{
    constants::{ATA_SECURITY_PASSWORD, SANITIZE_POLL_INTERVAL},
    model::{Capabilities, Capability},
};

use crate::dependencies::{Command, Dependency, DependencyError};

/// Flag hdparm requires before running any destructive command.
const CONFIRM_FLAG: &str = "--yes-i-know-what-i-am-doing";

/// Runs `hdparm -I` and extracts the erase capabilities of the drive.
pub fn identify(device: &Path) -> Result<Capabilities, Error> {
    let output = Dependency::Hdparm
        .cmd()
        .arg("-I")
        .arg(device)
        .output_and_check()
        .with_context(|| format!("Failed to identify '{}'", device.display()))?;

    Ok(parse_capabilities(&output))
}

fn parse_capabilities(identify_output: &str) -> Capabilities {
    let mut capabilities = Capabilities::empty();
    for line in identify_output.lines().map(str::trim) {
        if line.contains("Data Set Management TRIM supported") {
            capabilities |= Capability::Trim;
        } else if line.contains("SANITIZE feature set") {
            capabilities |= Capability::AtaSanitize;
        } else if line.contains("CRYPTO_SCRAMBLE_EXT command") {
            capabilities |= Capability::AtaCryptoScramble;
        } else if line.contains("BLOCK_ERASE_EXT command") {
            capabilities |= Capability::AtaBlockEraseExt;
        } else if line == "supported: enhanced erase" {
            capabilities |= Capability::EnhancedSecureErase;
        } else if line.contains("for ENHANCED SECURITY ERASE UNIT") {
            capabilities |= Capability::EnhancedEraseTime;
        }
    }
    capabilities
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SanitizeAction {
    CryptoScramble,
    BlockErase,
}

impl SanitizeAction {
    fn flag(&self) -> &'static str {
        match self {
            Self::CryptoScramble => "--sanitize-crypto-scramble",
            Self::BlockErase => "--sanitize-block-erase",
        }
    }
}

pub fn sanitize_command(device: &Path, action: SanitizeAction) -> Command {
    let mut cmd = Dependency::Hdparm.cmd();
    cmd.arg(CONFIRM_FLAG).arg(action.flag()).arg(device);
    cmd
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SanitizeState {
    InProgress,
    Idle,
    Failed,
}

fn parse_sanitize_status(output: &str) -> SanitizeState {
    if output.contains("In Process") {
        SanitizeState::InProgress
    } else if output.contains("Failed") {
        SanitizeState::Failed
    } else {
        SanitizeState::Idle
    }
}

/// Starts a sanitize operation and waits for the drive to report it done.
pub async fn sanitize(device: &Path, action: SanitizeAction) -> Result<(), Box<DependencyError>> {
    info!("Starting ATA sanitize ({action:?}) of '{}'", device.display());
    sanitize_command(device, action).run_and_check_async().await?;

    let mut status_cmd = Dependency::Hdparm.cmd();
    status_cmd.arg("--sanitize-status").arg(device);
    loop {
        let status = status_cmd.output_async().await?;
        status.check()?;
        match parse_sanitize_status(&status.output()) {
            SanitizeState::InProgress => {
                debug!("Sanitize of '{}' still in progress", device.display());
                tokio::time::sleep(SANITIZE_POLL_INTERVAL).await;
            }
            SanitizeState::Idle => return Ok(()),
            SanitizeState::Failed => return Err(status.failure("sanitize operation failed")),
        }
    }
}

/// Sets the well-known user password and runs the enhanced security erase
/// with it.
///
/// A failed erase leaves security enabled, so the password is removed again
/// before returning the error. A drive locked by an interrupted erase can be
/// unlocked with [`ATA_SECURITY_PASSWORD`].
pub async fn security_erase_enhanced(device: &Path) -> Result<(), Box<DependencyError>> {
    info!("Starting enhanced security erase of '{}'", device.display());
    set_password_command(device).run_and_check_async().await?;

    let res = security_erase_command(device).run_and_check_async().await;
    if res.is_err() {
        warn!(
            "Enhanced security erase of '{}' failed, disabling drive security",
            device.display()
        );
        if let Err(e) = security_disable_command(device).run_and_check_async().await {
            warn!("Failed to disable security of '{}': {e}", device.display());
        }
    }
    res
}

fn security_command(device: &Path, operation: &str) -> Command {
    let mut cmd = Dependency::Hdparm.cmd();
    cmd.args(["--user-master", "u", operation])
        .arg(ATA_SECURITY_PASSWORD)
        .arg(device);
    cmd
}

pub fn set_password_command(device: &Path) -> Command {
    security_command(device, "--security-set-pass")
}

pub fn security_erase_command(device: &Path) -> Command {
    security_command(device, "--security-erase-enhanced")
}

pub fn security_disable_command(device: &Path) -> Command {
    security_command(device, "--security-disable")
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    const IDENTIFY_OUTPUT: &str = indoc! {"
        /dev/sda:

        ATA device, with non-removable media
        \tModel Number:       Samsung SSD 860 EVO 500GB
        \tSerial Number:      S3Z9NB0K
        Commands/features:
        \tEnabled\tSupported:
        \t   *\tSMART feature set
        \t   *\tData Set Management TRIM supported (limit 8 blocks)
        \t   *\tSANITIZE feature set
        \t   *\tCRYPTO_SCRAMBLE_EXT command
        \t   *\tBLOCK_ERASE_EXT command
        Security:
        \tMaster password revision code = 65534
        \t\tsupported
        \tnot\tenabled
        \tnot\tlocked
        \tnot\tfrozen
        \tnot\texpired: security count
        \t\tsupported: enhanced erase
        \t2min for SECURITY ERASE UNIT. 8min for ENHANCED SECURITY ERASE UNIT.
    "};

    #[test]
    fn test_parse_capabilities() {
        let capabilities = parse_capabilities(IDENTIFY_OUTPUT);
        assert_eq!(
            capabilities,
            Capability::Trim
                | Capability::AtaSanitize
                | Capability::AtaCryptoScramble
                | Capability::AtaBlockEraseExt
                | Capability::EnhancedSecureErase
                | Capability::EnhancedEraseTime
        );
    }

    #[test]
    fn test_parse_capabilities_plain_drive() {
        let output = indoc! {"
            /dev/sdb:
            Commands/features:
            \tEnabled\tSupported:
            \t   *\tSMART feature set
            Security:
            \t\tsupported
            \tnot\tenabled
        "};
        assert!(parse_capabilities(output).is_empty());
    }

    #[test]
    fn test_parse_sanitize_status() {
        assert_eq!(
            parse_sanitize_status("State:    SD2 Sanitize operation In Process\n"),
            SanitizeState::InProgress
        );
        assert_eq!(
            parse_sanitize_status("State:    SD0 Sanitize Idle\nLast Sanitize Operation Completed Without Error\n"),
            SanitizeState::Idle
        );
        assert_eq!(
            parse_sanitize_status("State:    SD0 Sanitize Idle\nLast Sanitize Operation Failed\n"),
            SanitizeState::Failed
        );
    }

    #[test]
    fn test_commands() {
        assert_eq!(
            sanitize_command(Path::new("/dev/sdb"), SanitizeAction::CryptoScramble)
                .render_command(),
            "hdparm --yes-i-know-what-i-am-doing --sanitize-crypto-scramble /dev/sdb"
        );
        assert_eq!(
            sanitize_command(Path::new("/dev/sdb"), SanitizeAction::BlockErase).render_command(),
            "hdparm --yes-i-know-what-i-am-doing --sanitize-block-erase /dev/sdb"
        );
    }

    #[test]
    fn test_security_erase_commands() {
        let device = Path::new("/dev/sdc");
        let rendered = [
            set_password_command(device),
            security_erase_command(device),
            security_disable_command(device),
        ]
        .map(|cmd| cmd.render_command());
        assert_eq!(
            rendered,
            [
                "hdparm --user-master u --security-set-pass stratum /dev/sdc",
                "hdparm --user-master u --security-erase-enhanced stratum /dev/sdc",
                "hdparm --user-master u --security-disable stratum /dev/sdc",
            ]
        );
    }
}

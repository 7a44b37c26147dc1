//! NVMe drive identification and erase through nvme-cli.

use std::path::Path;

use anyhow::{Context, Error};
use log::{debug, info};
use serde::Deserialize;
use serde_json::Value;

use stratum_api::{
    constants::SANITIZE_POLL_INTERVAL,
    model::{Capabilities, Capability},
};

use crate::dependencies::{Command, Dependency, DependencyError};

/// SANICAP: crypto erase sanitize operation supported.
const SANICAP_CRYPTO_ERASE: u64 = 1 << 0;
/// SANICAP: block erase sanitize operation supported.
const SANICAP_BLOCK_ERASE: u64 = 1 << 1;
/// FNA: cryptographic erase supported as part of the secure erase of a format.
const FNA_CRYPTO_ERASE: u64 = 1 << 2;

#[derive(Deserialize, Debug, Default)]
struct IdCtrl {
    #[serde(default)]
    sanicap: u64,
    #[serde(default)]
    fna: u64,
}

/// Runs `nvme id-ctrl` and extracts the erase capabilities of the controller.
pub fn identify(device: &Path) -> Result<Capabilities, Error> {
    let output = Dependency::Nvme
        .cmd()
        .arg("id-ctrl")
        .arg(device)
        .arg("--output-format=json")
        .output_and_check()
        .with_context(|| format!("Failed to identify '{}'", device.display()))?;

    parse_capabilities(&output)
}

fn parse_capabilities(id_ctrl_output: &str) -> Result<Capabilities, Error> {
    let id_ctrl: IdCtrl =
        serde_json::from_str(id_ctrl_output).context("Failed to parse nvme id-ctrl output")?;

    let mut capabilities = Capabilities::empty();
    if id_ctrl.sanicap & SANICAP_CRYPTO_ERASE != 0 {
        capabilities |= Capability::NvmeSanitizeCryptoErase;
    }
    if id_ctrl.sanicap & SANICAP_BLOCK_ERASE != 0 {
        capabilities |= Capability::NvmeSanitizeBlockErase;
    }
    if id_ctrl.fna & FNA_CRYPTO_ERASE != 0 {
        capabilities |= Capability::NvmeFormatCryptoErase;
    }
    Ok(capabilities)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SanitizeAction {
    BlockErase = 2,
    CryptoErase = 4,
}

pub fn sanitize_command(device: &Path, action: SanitizeAction) -> Command {
    let mut cmd = Dependency::Nvme.cmd();
    cmd.arg("sanitize")
        .arg(device)
        .arg(format!("--sanact={}", action as u8));
    cmd
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SanitizeStatus {
    NeverSanitized,
    Completed,
    InProgress,
    Failed,
}

/// Reads SSTAT from `nvme sanitize-log` JSON. nvme-cli keys the log by
/// controller name, so the first entry is taken.
fn parse_sanitize_status(sanitize_log: &str) -> Result<SanitizeStatus, Error> {
    let log: Value =
        serde_json::from_str(sanitize_log).context("Failed to parse nvme sanitize-log output")?;
    let entry = match log.as_object().and_then(|o| o.values().next()) {
        Some(entry) if entry.is_object() => entry,
        _ => &log,
    };
    let sstat = entry
        .get("sstat")
        .and_then(Value::as_u64)
        .context("Missing 'sstat' in sanitize log")?;

    Ok(match sstat & 0x7 {
        0 => SanitizeStatus::NeverSanitized,
        1 | 4 => SanitizeStatus::Completed,
        2 => SanitizeStatus::InProgress,
        _ => SanitizeStatus::Failed,
    })
}

/// Starts a sanitize operation and polls the sanitize log until it finishes.
pub async fn sanitize(device: &Path, action: SanitizeAction) -> Result<(), Box<DependencyError>> {
    info!("Starting NVMe sanitize ({action:?}) of '{}'", device.display());
    sanitize_command(device, action).run_and_check_async().await?;

    let mut log_cmd = Dependency::Nvme.cmd();
    log_cmd
        .arg("sanitize-log")
        .arg(device)
        .arg("--output-format=json");
    loop {
        let log = log_cmd.output_async().await?;
        log.check()?;
        match parse_sanitize_status(&log.output()) {
            Ok(SanitizeStatus::InProgress) | Ok(SanitizeStatus::NeverSanitized) => {
                debug!("Sanitize of '{}' still in progress", device.display());
                tokio::time::sleep(SANITIZE_POLL_INTERVAL).await;
            }
            Ok(SanitizeStatus::Completed) => return Ok(()),
            Ok(SanitizeStatus::Failed) => return Err(log.failure("sanitize operation failed")),
            Err(e) => return Err(log.failure(format!("{e:#}"))),
        }
    }
}

/// Secure erase setting of an NVMe format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecureEraseSetting {
    UserDataErase = 1,
    CryptographicErase = 2,
}

pub fn format_command(device: &Path, ses: SecureEraseSetting) -> Command {
    let mut cmd = Dependency::Nvme.cmd();
    cmd.arg("format")
        .arg(device)
        .arg(format!("--ses={}", ses as u8))
        .arg("--force");
    cmd
}

pub async fn format(device: &Path, ses: SecureEraseSetting) -> Result<(), Box<DependencyError>> {
    info!("Formatting '{}' with {ses:?}", device.display());
    format_command(device, ses).run_and_check_async().await
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[test]
    fn test_parse_capabilities() {
        let output = indoc! {r#"
            {
              "vid" : 5197,
              "sn" : "S27FNYAH407000      ",
              "mn" : "SAMSUNG MZVPV512HDGL-000H1              ",
              "fna" : 4,
              "sanicap" : 3
            }
        "#};
        assert_eq!(
            parse_capabilities(output).unwrap(),
            Capability::NvmeSanitizeCryptoErase
                | Capability::NvmeSanitizeBlockErase
                | Capability::NvmeFormatCryptoErase
        );

        assert!(parse_capabilities(r#"{"fna": 0, "sanicap": 4}"#)
            .unwrap()
            .is_empty());
        assert!(parse_capabilities("{}").unwrap().is_empty());
        assert!(parse_capabilities("nope").is_err());
    }

    #[test]
    fn test_parse_sanitize_status() {
        let log = indoc! {r#"
            {
              "nvme0" : {
                "sprog" : 65535,
                "sstat" : 257,
                "cdw10_info" : 4
              }
            }
        "#};
        assert_eq!(
            parse_sanitize_status(log).unwrap(),
            SanitizeStatus::Completed
        );
        assert_eq!(
            parse_sanitize_status(r#"{"nvme1": {"sstat": 2}}"#).unwrap(),
            SanitizeStatus::InProgress
        );
        assert_eq!(
            parse_sanitize_status(r#"{"sstat": 3}"#).unwrap(),
            SanitizeStatus::Failed
        );
        assert!(parse_sanitize_status(r#"{"nvme0": {}}"#).is_err());
    }

    #[test]
    fn test_commands() {
        assert_eq!(
            sanitize_command(Path::new("/dev/nvme0n1"), SanitizeAction::CryptoErase)
                .render_command(),
            "nvme sanitize /dev/nvme0n1 --sanact=4"
        );
        assert_eq!(
            sanitize_command(Path::new("/dev/nvme0n1"), SanitizeAction::BlockErase)
                .render_command(),
            "nvme sanitize /dev/nvme0n1 --sanact=2"
        );
        assert_eq!(
            format_command(Path::new("/dev/nvme0n1"), SecureEraseSetting::UserDataErase)
                .render_command(),
            "nvme format /dev/nvme0n1 --ses=1 --force"
        );
        assert_eq!(
            format_command(
                Path::new("/dev/nvme0n1"),
                SecureEraseSetting::CryptographicErase
            )
            .render_command(),
            "nvme format /dev/nvme0n1 --ses=2 --force"
        );
    }
}

use osutils::{hdparm, nvme};
use stratum_api::{
    error::{LookupError, StratumError},
    model::{Capability, Drive, Protocol, WipeAction, WipeMethod},
};

use super::Wiper;

/// The erase chosen for one drive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WipePlan {
    pub method: WipeMethod,
    pub action: WipeAction,
    pub wiper: Wiper,
}

impl WipePlan {
    fn new(method: WipeMethod, action: WipeAction, wiper: Wiper) -> Self {
        Self {
            method,
            action,
            wiper,
        }
    }
}

/// Picks the strongest erase the drive advertises.
///
/// NVMe drives always get a plan since every controller supports a plain
/// format. SATA and SAS drives fall back to overwriting with zeroes unless they
/// advertise sanitize without a usable erase. Any other transport has no wiper.
pub fn select_method(drive: &Drive) -> Result<WipePlan, StratumError> {
    match drive.protocol {
        Protocol::Nvme => Ok(select_nvme(drive)),
        Protocol::Sata | Protocol::Sas => select_ata(drive),
        Protocol::Other(_) => Err(no_wiper(drive)),
    }
}

fn select_nvme(drive: &Drive) -> WipePlan {
    if drive.has(Capability::NvmeSanitizeCryptoErase) {
        WipePlan::new(
            WipeMethod::Sanitize,
            WipeAction::CryptoErase,
            Wiper::NvmeSanitize(nvme::SanitizeAction::CryptoErase),
        )
    } else if drive.has(Capability::NvmeSanitizeBlockErase) {
        WipePlan::new(
            WipeMethod::Sanitize,
            WipeAction::BlockErase,
            Wiper::NvmeSanitize(nvme::SanitizeAction::BlockErase),
        )
    } else if drive.has(Capability::NvmeFormatCryptoErase) {
        WipePlan::new(
            WipeMethod::Format,
            WipeAction::CryptographicErase,
            Wiper::NvmeFormat(nvme::SecureEraseSetting::CryptographicErase),
        )
    } else {
        WipePlan::new(
            WipeMethod::Format,
            WipeAction::UserDataErase,
            Wiper::NvmeFormat(nvme::SecureEraseSetting::UserDataErase),
        )
    }
}

/// Sanitize or enhanced secure erase always claims the drive, the sub-flags
/// only pick the variant. TRIM and zero-fill are for drives with neither.
fn select_ata(drive: &Drive) -> Result<WipePlan, StratumError> {
    let sanitize = drive.has(Capability::AtaSanitize);
    let enhanced_erase = drive.has(Capability::EnhancedSecureErase);
    Ok(if sanitize && drive.has(Capability::AtaCryptoScramble) {
        WipePlan::new(
            WipeMethod::Sanitize,
            WipeAction::SanitizeCryptoScramble,
            Wiper::AtaSanitize(hdparm::SanitizeAction::CryptoScramble),
        )
    } else if sanitize && drive.has(Capability::AtaBlockEraseExt) {
        WipePlan::new(
            WipeMethod::Sanitize,
            WipeAction::SanitizeBlockErase,
            Wiper::AtaSanitize(hdparm::SanitizeAction::BlockErase),
        )
    } else if enhanced_erase {
        WipePlan::new(
            WipeMethod::SecurityErase,
            WipeAction::SecurityEraseEnhanced,
            Wiper::AtaSecurityErase,
        )
    } else if sanitize {
        // Sanitize with no erase we know how to issue.
        return Err(no_wiper(drive));
    } else if drive.has(Capability::Trim) {
        WipePlan::new(
            WipeMethod::Blkdiscard,
            WipeAction::Blkdiscard,
            Wiper::Blkdiscard,
        )
    } else {
        WipePlan::new(WipeMethod::FillZero, WipeAction::FillZero, Wiper::FillZero)
    })
}

fn no_wiper(drive: &Drive) -> StratumError {
    StratumError::new(LookupError::DriveWiperNotFound {
        disk: drive.logical_name.to_string_lossy().into(),
        protocol: drive.protocol.to_string(),
    })
}

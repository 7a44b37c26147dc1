use std::path::Path;

use osutils::{
    blkdiscard,
    dependencies::DependencyResultExt,
    hdparm, nvme, zerofill,
};
use stratum_api::error::{ReportError, ServicingError, StratumError, StratumResultExt};

use crate::inventory::SystemDrives;

use super::WipeExecutor;

/// Concrete erase procedure run against one drive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wiper {
    NvmeSanitize(nvme::SanitizeAction),
    NvmeFormat(nvme::SecureEraseSetting),
    AtaSanitize(hdparm::SanitizeAction),
    AtaSecurityErase,
    Blkdiscard,
    FillZero,
}

impl Wiper {
    /// Erases `disk`. Dropping the returned future kills any running command.
    pub async fn run(&self, disk: &Path) -> Result<(), StratumError> {
        let context = || format!("Failed to wipe '{}' with {self:?}", disk.display());
        match *self {
            Self::NvmeSanitize(action) => nvme::sanitize(disk, action).await.message(context()),
            Self::NvmeFormat(ses) => nvme::format(disk, ses).await.message(context()),
            Self::AtaSanitize(action) => hdparm::sanitize(disk, action).await.message(context()),
            Self::AtaSecurityErase => hdparm::security_erase_enhanced(disk)
                .await
                .message(context()),
            Self::Blkdiscard => blkdiscard::discard(disk).await.message(context()),
            Self::FillZero => zerofill::fill_zero(disk)
                .await
                .map(|_| ())
                .structured(ServicingError::WipeDrive)
                .message(context()),
        }
    }
}

impl WipeExecutor for SystemDrives {
    async fn wipe(&self, disk: &Path, wiper: &Wiper) -> Result<(), StratumError> {
        wiper.run(disk).await
    }
}

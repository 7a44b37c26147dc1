use log::{debug, warn};

use osutils::{hdparm, lsblk, nvme};
use stratum_api::{
    error::{ReportError, ServicingError, StratumError},
    model::{Capabilities, Drive, Protocol},
};

/// Source of the drive records a wipe run or a RAID listing works from.
pub trait DriveInventory: Send + Sync {
    /// Takes a snapshot of every drive currently attached to the host.
    fn drives(&self) -> Result<Vec<Drive>, StratumError>;
}

/// Inventory of the local host, built from lsblk and the per-protocol
/// identify commands.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDrives;

impl SystemDrives {
    fn capabilities(device: &lsblk::BlockDevice, protocol: &Protocol) -> Capabilities {
        if !device.is_disk() {
            return Capabilities::empty();
        }

        let queried = match protocol {
            Protocol::Nvme => nvme::identify(&device.name),
            Protocol::Sata | Protocol::Sas => hdparm::identify(&device.name),
            Protocol::Other(_) => return Capabilities::empty(),
        };

        queried.unwrap_or_else(|e| {
            warn!(
                "Failed to query erase capabilities of '{}', assuming none: {e:#}",
                device.name.display()
            );
            Capabilities::empty()
        })
    }
}

impl DriveInventory for SystemDrives {
    fn drives(&self) -> Result<Vec<Drive>, StratumError> {
        let devices = lsblk::list_disks().structured(ServicingError::CollectInventory)?;

        Ok(devices
            .into_iter()
            .map(|device| {
                let protocol = device
                    .tran
                    .as_deref()
                    .unwrap_or_default()
                    .parse::<Protocol>()
                    .unwrap_or_else(|never| match never {});
                let capabilities = Self::capabilities(&device, &protocol);
                debug!(
                    "Found drive '{}' ({protocol}) with capabilities {capabilities:?}",
                    device.name.display()
                );

                Drive {
                    logical_name: device.name,
                    protocol,
                    capabilities,
                    model: device.model.unwrap_or_default(),
                    serial: device.serial.unwrap_or_default(),
                    capacity_bytes: device.size,
                }
            })
            .collect())
    }
}

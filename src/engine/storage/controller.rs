use osutils::mvcli;
use stratum_api::{
    constants::SUPPORTED_CONTROLLER_VENDOR,
    error::{ReportError, ServicingError, StratumError, StratumResultExt},
    model::{PhysicalDisk, VirtualDisk},
};

/// A hardware RAID controller present on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageController {
    pub id: u32,
    pub vendor: String,
    pub product: String,
}

impl StorageController {
    pub fn is_supported(&self) -> bool {
        self.vendor.eq_ignore_ascii_case(SUPPORTED_CONTROLLER_VENDOR)
    }
}

/// Management interface of hardware RAID controllers.
pub trait ControllerProvider: Send + Sync {
    fn controllers(&self) -> Result<Vec<StorageController>, StratumError>;

    fn virtual_disks(
        &self,
        controller: &StorageController,
    ) -> Result<Vec<VirtualDisk>, StratumError>;

    fn physical_disks(
        &self,
        controller: &StorageController,
    ) -> Result<Vec<PhysicalDisk>, StratumError>;

    /// Creates a virtual disk out of the given controller drive IDs and
    /// returns the tool output.
    fn create_virtual_disk(
        &self,
        controller: &StorageController,
        level: &str,
        name: &str,
        disk_ids: &[u32],
    ) -> Result<String, StratumError>;

    fn destroy_virtual_disk(
        &self,
        controller: &StorageController,
        id: u32,
    ) -> Result<String, StratumError>;
}

/// Marvell controllers driven through `mvcli`. mvcli always acts on its
/// current adapter, so the controller argument only selects what is reported.
#[derive(Debug, Default, Clone, Copy)]
pub struct MvcliProvider;

impl ControllerProvider for MvcliProvider {
    fn controllers(&self) -> Result<Vec<StorageController>, StratumError> {
        Ok(mvcli::adapters()
            .structured(ServicingError::ListRaid)
            .message("Failed to list Marvell adapters")?
            .into_iter()
            .map(|adapter| StorageController {
                id: adapter.id,
                vendor: SUPPORTED_CONTROLLER_VENDOR.into(),
                product: adapter.product,
            })
            .collect())
    }

    fn virtual_disks(
        &self,
        controller: &StorageController,
    ) -> Result<Vec<VirtualDisk>, StratumError> {
        Ok(mvcli::virtual_disks()
            .structured(ServicingError::ListRaid)
            .message(format!(
                "Failed to list virtual disks of adapter {}",
                controller.id
            ))?
            .into_iter()
            .map(|vd| VirtualDisk {
                id: vd.id.to_string(),
                name: vd.name,
                raid_mode: vd.raid_mode,
            })
            .collect())
    }

    fn physical_disks(
        &self,
        controller: &StorageController,
    ) -> Result<Vec<PhysicalDisk>, StratumError> {
        Ok(mvcli::physical_disks()
            .structured(ServicingError::ListRaid)
            .message(format!(
                "Failed to list physical disks of adapter {}",
                controller.id
            ))?
            .into_iter()
            .map(|pd| PhysicalDisk {
                storage_controller_drive_id: Some(pd.id),
                drive_type: pd.disk_type,
                serial: pd.serial,
            })
            .collect())
    }

    fn create_virtual_disk(
        &self,
        _controller: &StorageController,
        level: &str,
        name: &str,
        disk_ids: &[u32],
    ) -> Result<String, StratumError> {
        mvcli::create_virtual_disk(level, name, disk_ids).structured(ServicingError::CreateRaid)
    }

    fn destroy_virtual_disk(
        &self,
        _controller: &StorageController,
        id: u32,
    ) -> Result<String, StratumError> {
        mvcli::delete_virtual_disk(id).structured(ServicingError::DeleteRaid)
    }
}

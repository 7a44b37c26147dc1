use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use tracing::{debug, info, Span};

use osutils::mdadm;
use stratum_api::{
    constants::SUPPORTED_CONTROLLER_VENDOR,
    error::{
        InvalidInputError, LookupError, ReportError, ServicingError, StratumError,
        StratumResultExt, ValidationError,
    },
    model::{BlockDevice, PhysicalDisk, RaidArray, RaidType, VirtualDisk},
};

use crate::inventory::DriveInventory;

use super::controller::{ControllerProvider, StorageController};

/// Creates, deletes and lists RAID arrays, either as Linux software arrays
/// or as virtual disks of a hardware controller.
pub struct RaidManager {
    span: Span,
    controllers: Arc<dyn ControllerProvider>,
    inventory: Arc<dyn DriveInventory>,
    md_root: PathBuf,
}

impl RaidManager {
    pub fn new(
        span: Span,
        controllers: Arc<dyn ControllerProvider>,
        inventory: Arc<dyn DriveInventory>,
        md_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            span,
            controllers,
            inventory,
            md_root: md_root.into(),
        }
    }

    /// Creates `array`. Every member is validated first and nothing is run
    /// when one of them fails.
    pub fn create(&self, array: &RaidArray, raid_type: RaidType) -> Result<(), StratumError> {
        let _entered = self.span.enter();

        if let Some(device) = array.devices.iter().find(|device| !device.validate()) {
            return Err(StratumError::new(
                ValidationError::ArrayDeviceFailedValidation {
                    device: device.describe(),
                },
            ))
            .message(format!("Cannot create RAID array '{}'", array.name));
        }

        match raid_type {
            RaidType::LinuxSoftware => self.create_software(array),
            RaidType::Hardware => self.create_hardware(array),
        }
    }

    /// Stops a software array or destroys a controller virtual disk, returning
    /// the tool output.
    pub fn delete(&self, array: &RaidArray, raid_type: RaidType) -> Result<String, StratumError> {
        let _entered = self.span.enter();

        match raid_type {
            RaidType::LinuxSoftware => self.delete_software(array),
            RaidType::Hardware => self.delete_hardware(array),
        }
    }

    pub fn list_virtual_disks(&self, raid_type: RaidType) -> Result<Vec<VirtualDisk>, StratumError> {
        let _entered = self.span.enter();

        match raid_type {
            RaidType::LinuxSoftware => Ok(mdadm::details()
                .structured(ServicingError::ListRaid)?
                .into_iter()
                .map(|detail| VirtualDisk {
                    id: detail.uuid,
                    name: detail.name,
                    raid_mode: detail.level,
                })
                .collect()),
            RaidType::Hardware => {
                let mut disks = Vec::new();
                for controller in self.supported_controllers()? {
                    disks.extend(self.controllers.virtual_disks(&controller)?);
                }
                Ok(disks)
            }
        }
    }

    pub fn list_physical_disks(
        &self,
        raid_type: RaidType,
    ) -> Result<Vec<PhysicalDisk>, StratumError> {
        let _entered = self.span.enter();

        match raid_type {
            // Any attached drive is a software RAID candidate.
            RaidType::LinuxSoftware => Ok(self
                .inventory
                .drives()?
                .into_iter()
                .map(|drive| PhysicalDisk {
                    storage_controller_drive_id: None,
                    drive_type: drive.protocol.to_string(),
                    serial: drive.serial,
                })
                .collect()),
            RaidType::Hardware => {
                let mut disks = Vec::new();
                for controller in self.supported_controllers()? {
                    disks.extend(
                        self.controllers
                            .physical_disks(&controller)?
                            .into_iter()
                            .filter(|disk| disk.storage_controller_drive_id.is_some()),
                    );
                }
                Ok(disks)
            }
        }
    }

    fn create_software(&self, array: &RaidArray) -> Result<(), StratumError> {
        let device_paths = array
            .devices
            .iter()
            .map(|device| device.device_file().map(Path::to_path_buf))
            .collect::<Result<Vec<_>, _>>()
            .message(format!(
                "Software RAID array '{}' needs device files",
                array.name
            ))?;

        let output = mdadm::create(&array.device_path(&self.md_root), &array.level, &device_paths)
            .structured(ServicingError::CreateRaid)
            .message(format!("Failed to create RAID array '{}'", array.name))?;
        debug!("mdadm output: {output}");
        info!("Created software RAID array '{}'", array.name);
        Ok(())
    }

    fn delete_software(&self, array: &RaidArray) -> Result<String, StratumError> {
        let raid_path = array.device_path(&self.md_root);
        if !raid_path.exists() {
            return Err(StratumError::new(LookupError::ArrayNotFound {
                name: array.name.clone(),
            }))
            .message(format!("'{}' does not exist", raid_path.display()));
        }

        mdadm::stop(&raid_path)
            .structured(ServicingError::DeleteRaid)
            .message(format!("Failed to delete RAID array '{}'", array.name))
    }

    fn supported_controllers(&self) -> Result<Vec<StorageController>, StratumError> {
        let controllers = self
            .controllers
            .controllers()?
            .into_iter()
            .filter(StorageController::is_supported)
            .collect::<Vec<_>>();

        if controllers.is_empty() {
            return Err(StratumError::new(LookupError::ControllerNotFound {
                vendor: SUPPORTED_CONTROLLER_VENDOR,
            }));
        }
        Ok(controllers)
    }

    fn create_hardware(&self, array: &RaidArray) -> Result<(), StratumError> {
        let disk_ids = array
            .devices
            .iter()
            .map(controller_id)
            .collect::<Result<Vec<_>, _>>()?;

        // Controllers are reported in adapter order, the first one is used.
        let controller = self
            .supported_controllers()?
            .into_iter()
            .next()
            .structured(LookupError::ControllerNotFound {
                vendor: SUPPORTED_CONTROLLER_VENDOR,
            })?;

        let level = controller_raid_level(&array.level);
        let output = self
            .controllers
            .create_virtual_disk(&controller, &level, &array.name, &disk_ids)
            .message(format!("Failed to create virtual disk '{}'", array.name))?;
        debug!("Controller output: {output}");
        info!(
            "Created virtual disk '{}' on controller {}",
            array.name, controller.id
        );
        Ok(())
    }

    fn delete_hardware(&self, array: &RaidArray) -> Result<String, StratumError> {
        for controller in self.supported_controllers()? {
            let disks = self.controllers.virtual_disks(&controller)?;
            let Some(disk) = disks.iter().find(|disk| {
                disk.name == array.name
                    || array
                        .controller_virtual_disk_id
                        .is_some_and(|id| disk.id == id.to_string())
            }) else {
                continue;
            };

            let id = disk
                .id
                .parse::<u32>()
                .structured(InvalidInputError::InvalidControllerDeviceId {
                    id: disk.id.clone(),
                })
                .message("Controller reported a non-numeric virtual disk ID")?;

            info!(
                "Destroying virtual disk '{}' ({id}) on controller {}",
                disk.name, controller.id
            );
            return self
                .controllers
                .destroy_virtual_disk(&controller, id)
                .message(format!("Failed to delete virtual disk '{}'", array.name));
        }

        Err(StratumError::new(LookupError::VirtualDiskNotFound {
            name: array.name.clone(),
        }))
    }
}

fn controller_id(device: &BlockDevice) -> Result<u32, StratumError> {
    device
        .controller_physical_device_id
        .structured(ValidationError::ArrayDeviceFailedValidation {
            device: device.describe(),
        })
        .message("Hardware RAID members must be addressed by controller ID")
}

/// Controllers expect the level as `raidN`.
fn controller_raid_level(level: &str) -> String {
    let level = level.to_ascii_lowercase();
    if level.starts_with("raid") {
        level
    } else {
        format!("raid{level}")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use stratum_api::{
        error::ErrorKind,
        model::{Drive, Protocol},
    };

    use super::*;

    #[derive(Default)]
    struct FakeControllers {
        vendor: &'static str,
        virtual_disks: Vec<VirtualDisk>,
        created: Mutex<Vec<(String, String, Vec<u32>)>>,
        destroyed: Mutex<Vec<u32>>,
    }

    impl FakeControllers {
        fn marvell() -> Self {
            Self {
                vendor: "Marvell",
                virtual_disks: vec![
                    VirtualDisk {
                        id: "0".into(),
                        name: "OS".into(),
                        raid_mode: "raid1".into(),
                    },
                    VirtualDisk {
                        id: "1".into(),
                        name: "DATA".into(),
                        raid_mode: "raid0".into(),
                    },
                ],
                ..Default::default()
            }
        }
    }

    impl ControllerProvider for FakeControllers {
        fn controllers(&self) -> Result<Vec<StorageController>, StratumError> {
            Ok(vec![StorageController {
                id: 0,
                vendor: self.vendor.into(),
                product: "fake".into(),
            }])
        }

        fn virtual_disks(&self, _: &StorageController) -> Result<Vec<VirtualDisk>, StratumError> {
            Ok(self.virtual_disks.clone())
        }

        fn physical_disks(&self, _: &StorageController) -> Result<Vec<PhysicalDisk>, StratumError> {
            Ok(vec![
                PhysicalDisk {
                    storage_controller_drive_id: Some(0),
                    drive_type: "SATA PD".into(),
                    serial: "A".into(),
                },
                PhysicalDisk {
                    storage_controller_drive_id: None,
                    drive_type: "SATA PD".into(),
                    serial: "B".into(),
                },
            ])
        }

        fn create_virtual_disk(
            &self,
            _: &StorageController,
            level: &str,
            name: &str,
            disk_ids: &[u32],
        ) -> Result<String, StratumError> {
            self.created
                .lock()
                .unwrap()
                .push((level.into(), name.into(), disk_ids.to_vec()));
            Ok(String::new())
        }

        fn destroy_virtual_disk(&self, _: &StorageController, id: u32) -> Result<String, StratumError> {
            self.destroyed.lock().unwrap().push(id);
            Ok(format!("deleted {id}"))
        }
    }

    struct StaticInventory;

    impl DriveInventory for StaticInventory {
        fn drives(&self) -> Result<Vec<Drive>, StratumError> {
            let mut drive = Drive::new("/dev/sda", Protocol::Sata);
            drive.serial = "S3Z9NB0K".into();
            Ok(vec![drive])
        }
    }

    fn manager(controllers: Arc<FakeControllers>, md_root: &Path) -> RaidManager {
        RaidManager::new(Span::none(), controllers, Arc::new(StaticInventory), md_root)
    }

    #[test]
    fn test_create_rejects_invalid_member() {
        let md_root = tempfile::tempdir().unwrap();
        let member = tempfile::NamedTempFile::new().unwrap();
        let controllers = Arc::new(FakeControllers::marvell());

        let array = RaidArray::new(
            "DATA",
            "1",
            vec![BlockDevice::from_file(member.path())],
        );
        for raid_type in [RaidType::LinuxSoftware, RaidType::Hardware] {
            let err = manager(controllers.clone(), md_root.path())
                .create(&array, raid_type)
                .unwrap_err();
            assert!(matches!(
                err.kind(),
                ErrorKind::Validation(ValidationError::ArrayDeviceFailedValidation { .. })
            ));
        }
        assert!(controllers.created.lock().unwrap().is_empty());
    }

    #[test]
    fn test_create_hardware() {
        let md_root = tempfile::tempdir().unwrap();
        let controllers = Arc::new(FakeControllers::marvell());
        let array = RaidArray::new(
            "DATA",
            "1",
            vec![BlockDevice::from_controller_id(0), BlockDevice::from_controller_id(1)],
        );

        manager(controllers.clone(), md_root.path())
            .create(&array, RaidType::Hardware)
            .unwrap();
        assert_eq!(
            *controllers.created.lock().unwrap(),
            [("raid1".to_string(), "DATA".to_string(), vec![0, 1])]
        );
    }

    #[test]
    fn test_unsupported_controller() {
        let md_root = tempfile::tempdir().unwrap();
        let controllers = Arc::new(FakeControllers {
            vendor: "Broadcom",
            ..Default::default()
        });
        let err = manager(controllers, md_root.path())
            .list_virtual_disks(RaidType::Hardware)
            .unwrap_err();
        assert_eq!(
            err.kind(),
            &ErrorKind::Lookup(LookupError::ControllerNotFound { vendor: "Marvell" })
        );
    }

    #[test]
    fn test_delete_hardware() {
        let md_root = tempfile::tempdir().unwrap();
        let controllers = Arc::new(FakeControllers::marvell());
        let raid = manager(controllers.clone(), md_root.path());

        // By name.
        assert_eq!(
            raid.delete(&RaidArray::for_deletion("DATA"), RaidType::Hardware)
                .unwrap(),
            "deleted 1"
        );
        // By virtual disk ID.
        raid.delete(&RaidArray::for_deletion("0"), RaidType::Hardware)
            .unwrap();
        assert_eq!(*controllers.destroyed.lock().unwrap(), [1, 0]);

        let err = raid
            .delete(&RaidArray::for_deletion("SCRATCH"), RaidType::Hardware)
            .unwrap_err();
        assert_eq!(
            err.kind(),
            &ErrorKind::Lookup(LookupError::VirtualDiskNotFound {
                name: "SCRATCH".into()
            })
        );
    }

    #[test]
    fn test_delete_missing_software_array() {
        let md_root = tempfile::tempdir().unwrap();
        let err = manager(Arc::new(FakeControllers::marvell()), md_root.path())
            .delete(&RaidArray::for_deletion("DATA"), RaidType::LinuxSoftware)
            .unwrap_err();
        assert_eq!(
            err.kind(),
            &ErrorKind::Lookup(LookupError::ArrayNotFound {
                name: "DATA".into()
            })
        );
    }

    #[test]
    fn test_list_physical_disks() {
        let md_root = tempfile::tempdir().unwrap();
        let raid = manager(Arc::new(FakeControllers::marvell()), md_root.path());

        let hardware = raid.list_physical_disks(RaidType::Hardware).unwrap();
        assert_eq!(hardware.len(), 1);
        assert_eq!(hardware[0].to_csv(), "0,SATA PD,A");

        let software = raid.list_physical_disks(RaidType::LinuxSoftware).unwrap();
        assert_eq!(software.len(), 1);
        assert_eq!(software[0].to_csv(), ",sata,S3Z9NB0K");
    }

    #[test]
    fn test_list_virtual_disks_hardware() {
        let md_root = tempfile::tempdir().unwrap();
        let disks = manager(Arc::new(FakeControllers::marvell()), md_root.path())
            .list_virtual_disks(RaidType::Hardware)
            .unwrap();
        assert_eq!(
            disks.iter().map(VirtualDisk::to_csv).collect::<Vec<_>>(),
            ["0,OS,raid1", "1,DATA,raid0"]
        );
    }

    #[test]
    fn test_controller_raid_level() {
        assert_eq!(controller_raid_level("1"), "raid1");
        assert_eq!(controller_raid_level("RAID10"), "raid10");
        assert_eq!(controller_raid_level("raid0"), "raid0");
    }
}

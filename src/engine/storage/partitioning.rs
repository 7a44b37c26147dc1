use std::path::{Path, PathBuf};

use tracing::{debug, info, Span};

use osutils::{kpartx, sgdisk};
use stratum_api::{
    error::{ReportError, ServicingError, StratumError, StratumResultExt, ValidationError},
    model::{check_position, BlockDevice, Partition},
};

/// Lays out GPT partitions on block devices with sgdisk.
pub struct PartitionPlanner {
    span: Span,
    mapper_root: PathBuf,
}

impl PartitionPlanner {
    pub fn new(span: Span, mapper_root: impl Into<PathBuf>) -> Self {
        Self {
            span,
            mapper_root: mapper_root.into(),
        }
    }

    /// Parses a list of `NAME:POSITION:SIZE:TYPE` partition specs.
    pub fn parse_specs<S: AsRef<str>>(specs: &[S]) -> Result<Vec<Partition>, StratumError> {
        specs
            .iter()
            .map(|spec| Partition::parse_delimited(spec.as_ref()))
            .collect()
    }

    /// Creates a single partition on `device`.
    pub fn create(&self, device: &BlockDevice, partition: &Partition) -> Result<(), StratumError> {
        let _entered = self.span.enter();

        check_position(partition.position.into())?;
        let device_file = validated_file(device)?;
        self.run_sgdisk(device_file, partition)
    }

    /// Creates every partition of `device`, then exposes them when the device
    /// is a loop device. All positions are checked before the first command.
    pub fn create_all(&self, device: &BlockDevice) -> Result<(), StratumError> {
        let _entered = self.span.enter();

        for partition in &device.partitions {
            check_position(partition.position.into())
                .message(format!("Invalid partition '{}'", partition.name))?;
        }
        let device_file = validated_file(device)?;

        for partition in &device.partitions {
            self.run_sgdisk(device_file, partition)?;
        }
        info!(
            "Created {} partition(s) on '{}'",
            device.partitions.len(),
            device_file.display()
        );

        if is_loop_device(device_file) && !device.partitions.is_empty() {
            self.expose_partitions(device_file)?;
        }
        Ok(())
    }

    /// Path of the node for partition `position` of `device`.
    ///
    /// Loop device partitions are mapped by kpartx under the mapper root,
    /// any other device gets the position appended to its path.
    pub fn partition_path(&self, device: &Path, position: u8) -> PathBuf {
        if is_loop_device(device) {
            let name = device
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            return self.mapper_root.join(format!("{name}p{position}"));
        }

        let mut path = device.as_os_str().to_owned();
        path.push(position.to_string());
        PathBuf::from(path)
    }

    /// Maps the partitions of a loop device to device-mapper nodes.
    pub fn expose_partitions(&self, device: &Path) -> Result<(), StratumError> {
        let _entered = self.span.enter();

        debug!("Exposing partitions of '{}'", device.display());
        kpartx::add(device)
            .structured(ServicingError::ExposePartitions)
            .message(format!(
                "Failed to expose partitions of '{}'",
                device.display()
            ))
    }

    fn run_sgdisk(&self, device_file: &Path, partition: &Partition) -> Result<(), StratumError> {
        info!(
            "Creating partition {} '{}' on '{}'",
            partition.position,
            partition.name,
            device_file.display()
        );
        sgdisk::new_partition(
            device_file,
            partition.position,
            &partition.size,
            &partition.name,
            &partition.partition_type,
        )
        .structured(ServicingError::CreatePartitions)
        .message(format!(
            "Failed to create partition '{}' on '{}'",
            partition.name,
            device_file.display()
        ))
    }
}

fn validated_file(device: &BlockDevice) -> Result<&Path, StratumError> {
    let device_file = device.device_file()?;
    if !device.validate() {
        return Err(StratumError::new(
            ValidationError::BlockDeviceFailedValidation {
                device: device.describe(),
            },
        ));
    }
    Ok(device_file)
}

fn is_loop_device(device: &Path) -> bool {
    device.to_string_lossy().contains("loop")
}

#[cfg(test)]
mod tests {
    use stratum_api::error::{ErrorKind, InvalidInputError};

    use super::*;

    fn planner() -> PartitionPlanner {
        PartitionPlanner::new(Span::none(), "/dev/mapper")
    }

    #[test]
    fn test_parse_specs() {
        let partitions =
            PartitionPlanner::parse_specs(&["BIOS:1:+1M:ef02", "ROOT:2:0:8300"]).unwrap();
        assert_eq!(partitions.len(), 2);
        assert_eq!(partitions[1].name, "ROOT");
        assert_eq!(partitions[1].position, 2);
        assert_eq!(partitions[1].size, "0");
        assert_eq!(partitions[1].partition_type, "8300");

        let err = PartitionPlanner::parse_specs(&["BIOS:1:+1M:ef02", "ROOT:2:0"]).unwrap_err();
        assert_eq!(
            err.kind(),
            &ErrorKind::InvalidInput(InvalidInputError::InvalidDelimitedPartition {
                spec: "ROOT:2:0".into()
            })
        );
    }

    #[test]
    fn test_partition_path() {
        let planner = planner();
        assert_eq!(
            planner.partition_path(Path::new("/dev/loop0"), 1),
            Path::new("/dev/mapper/loop0p1")
        );
        assert_eq!(
            planner.partition_path(Path::new("/dev/sda"), 3),
            Path::new("/dev/sda3")
        );
        assert_eq!(
            planner.partition_path(Path::new("/dev/disk/by-id/wwn-0x5002538e4"), 2),
            Path::new("/dev/disk/by-id/wwn-0x5002538e42")
        );
    }

    #[test]
    fn test_create_out_of_range() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut device = BlockDevice::from_file(file.path());
        let mut partition = Partition::new("ROOT", 1, "0", "8300").unwrap();
        partition.position = 129;
        device.partitions = vec![Partition::new("BOOT", 1, "+1M", "ef02").unwrap(), partition];

        let err = planner().create_all(&device).unwrap_err();
        assert_eq!(
            err.kind(),
            &ErrorKind::InvalidInput(InvalidInputError::FailedPartitioning { position: 129 })
        );
    }

    #[test]
    fn test_create_rejects_non_block_device() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let device = BlockDevice::from_file(file.path());
        let partition = Partition::new("ROOT", 1, "0", "8300").unwrap();

        let err = planner().create(&device, &partition).unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::Validation(ValidationError::BlockDeviceFailedValidation { .. })
        ));

        let err = planner()
            .create(&BlockDevice::from_controller_id(0), &partition)
            .unwrap_err();
        assert_eq!(
            err.kind(),
            &ErrorKind::InvalidInput(InvalidInputError::MissingDeviceFile)
        );
    }
}

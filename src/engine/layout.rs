use tracing::{debug, info, Span};

use stratum_api::{
    config::StorageLayout,
    error::{InvalidInputError, StratumError, StratumResultExt},
};

use super::storage::{filesystem::Formatter, partitioning::PartitionPlanner, raid::RaidManager};

/// Applies a [`StorageLayout`] to the host.
pub struct LayoutEngine {
    span: Span,
    partitions: PartitionPlanner,
    raid: RaidManager,
    formatter: Formatter,
}

impl LayoutEngine {
    pub fn new(
        span: Span,
        partitions: PartitionPlanner,
        raid: RaidManager,
        formatter: Formatter,
    ) -> Self {
        Self {
            span,
            partitions,
            raid,
            formatter,
        }
    }

    /// Partitions the block devices, formats their partitions, assembles the
    /// RAID arrays, then formats the standalone filesystems, in that order.
    ///
    /// The UUID of every formatted partition is written back into `layout`.
    /// Nothing is mounted.
    pub fn apply(&self, layout: &mut StorageLayout) -> Result<(), StratumError> {
        let _entered = self.span.enter();

        layout
            .validate()
            .map_err(|e| StratumError::new(InvalidInputError::from(e)))
            .message(format!("Storage layout '{}' is invalid", layout.name))?;

        info!("Applying storage layout '{}'", layout.name);

        for device in &layout.block_devices {
            if device.partitions.is_empty() {
                continue;
            }
            self.partitions
                .create_all(device)
                .message(format!("Failed to partition '{}'", device.describe()))?;
        }

        for device in &mut layout.block_devices {
            let Some(file) = device.file.clone() else {
                continue;
            };
            for partition in &mut device.partitions {
                let Some(fs) = partition.file_system else {
                    continue;
                };
                let path = self.partitions.partition_path(&file, partition.position);
                let output = self
                    .formatter
                    .format(fs, &partition.file_system_options, &path)
                    .message(format!("Failed to format partition '{}'", partition.name))?;
                debug!("Format output: {output}");
                partition.uuid = Some(self.formatter.get_uuid(&path)?);
            }
        }

        for array in &layout.raid_arrays {
            self.raid
                .create(&array.to_array(), array.raid_type)
                .message(format!("Failed to assemble RAID array '{}'", array.name))?;
        }

        for fs in &layout.file_systems {
            let output = self
                .formatter
                .format(fs.format, &fs.options, &fs.device)
                .message(format!(
                    "Failed to create filesystem on '{}'",
                    fs.device.display()
                ))?;
            debug!("Format output: {output}");
        }

        info!("Storage layout '{}' applied", layout.name);
        Ok(())
    }
}

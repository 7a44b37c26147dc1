use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Arc,
    time::Duration,
};

use clap::Parser;
use log::{debug, error, info};
use tracing::info_span;

use stratum::{
    cli::{
        self, Cli, Commands, DiskCommand, FormatArgs, PartitionArgs, PartitionCommand,
        RaidCommand,
    },
    engine::{Formatter, LayoutEngine, MvcliProvider, PartitionPlanner, RaidManager},
    inventory::SystemDrives,
    logging, validation,
    wipe::WipeOrchestrator,
    STRATUM_VERSION,
};
use stratum_api::{
    config::StorageLayout,
    constants::{DEVICE_MAPPER_ROOT, MD_ROOT},
    error::{
        InternalError, InvalidInputError, ReportError, ServicingError, StratumError,
        StratumResultExt,
    },
    model::{
        BlockDevice, FileSystemType, PhysicalDisk, RaidArray, RaidObjectType, RaidType,
        VirtualDisk,
    },
};

fn raid_manager() -> RaidManager {
    RaidManager::new(
        info_span!("raid"),
        Arc::new(MvcliProvider),
        Arc::new(SystemDrives),
        MD_ROOT,
    )
}

fn partition_planner() -> PartitionPlanner {
    PartitionPlanner::new(info_span!("partition"), DEVICE_MAPPER_ROOT)
}

fn run_raid(raid_type: RaidType, command: &RaidCommand) -> Result<(), StratumError> {
    let raid = raid_manager();
    match command {
        RaidCommand::Create(array) => raid.create(&array.to_array(raid_type)?, raid_type),
        RaidCommand::Delete { name } => {
            let output = raid.delete(&RaidArray::for_deletion(name), raid_type)?;
            debug!("Delete output: {output}");
            Ok(())
        }
        RaidCommand::List { object_type } => {
            match cli::raid_object_type(object_type)? {
                RaidObjectType::VirtualDisk => {
                    let disks = raid.list_virtual_disks(raid_type)?;
                    println!("{}", VirtualDisk::CSV_HEADER);
                    for disk in disks {
                        println!("{}", disk.to_csv());
                    }
                }
                RaidObjectType::PhysicalDisk => {
                    let disks = raid.list_physical_disks(raid_type)?;
                    println!("{}", PhysicalDisk::CSV_HEADER);
                    for disk in disks {
                        println!("{}", disk.to_csv());
                    }
                }
            }
            Ok(())
        }
    }
}

fn partition(args: &PartitionArgs) -> Result<(), StratumError> {
    let device = BlockDevice {
        partitions: PartitionPlanner::parse_specs(&args.partitions)?,
        ..BlockDevice::from_file(&args.device)
    };
    partition_planner().create_all(&device)
}

fn format(args: &FormatArgs) -> Result<(), StratumError> {
    let target = args.target(&partition_planner())?;
    let fs: FileSystemType = args.format.parse()?;

    let output = Formatter::new(info_span!("format")).format(fs, &args.options, &target)?;
    debug!("Format output: {output}");
    debug!(
        "Formatted '{}' for mount point '{}'",
        target.display(),
        args.mount_point.display()
    );
    Ok(())
}

fn wipe(drives: &[PathBuf], timeout: Duration, output: Option<&Path>) -> Result<(), StratumError> {
    if timeout.is_zero() {
        return Err(StratumError::new(InvalidInputError::InvalidTimeout));
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .structured(InternalError::StartRuntime)?;

    let report = runtime.block_on(async {
        let deadline = tokio::time::Instant::now() + timeout;
        WipeOrchestrator::new(
            info_span!("wipe"),
            Arc::new(SystemDrives),
            Arc::new(SystemDrives),
        )
        .wipe_all(drives, deadline)
        .await
    });
    // A capability query stuck past the deadline must not hold the process.
    runtime.shutdown_background();
    let report = report?;

    let json =
        serde_json::to_string_pretty(&report).structured(InternalError::SerializeWipeReport)?;
    info!("Wipe report:\n{json}");

    if let Some(path) = output {
        fs::write(path, &json).structured(ServicingError::WriteWipeReport {
            path: path.display().to_string(),
        })?;
    }

    if !report.is_success() {
        return Err(StratumError::new(ServicingError::WipeFailed {
            failed: report.failed(),
            total: report.len(),
        }));
    }
    Ok(())
}

fn apply(config: &Path) -> Result<(), StratumError> {
    let mut layout = StorageLayout::load(config)?;

    LayoutEngine::new(
        info_span!("apply", layout = %layout.name),
        partition_planner(),
        raid_manager(),
        Formatter::new(info_span!("format")),
    )
    .apply(&mut layout)?;

    // The applied layout carries the UUIDs of the new filesystems.
    let applied =
        serde_yaml::to_string(&layout).structured(InternalError::SerializeStorageLayout)?;
    print!("{applied}");
    Ok(())
}

fn run(args: &Cli) -> Result<(), StratumError> {
    // Log version ASAP
    info!("Stratum version: {STRATUM_VERSION}");

    let res = match &args.command {
        Commands::Raid { raid_type, command } => run_raid(cli::raid_type(raid_type)?, command),
        Commands::ConfigureRaid {
            array,
            raid_type,
            delete,
        } => {
            let raid_type = cli::raid_type(raid_type)?;
            if *delete {
                run_raid(
                    raid_type,
                    &RaidCommand::Delete {
                        name: array.name.clone(),
                    },
                )
            } else {
                raid_manager().create(&array.to_array(raid_type)?, raid_type)
            }
        }
        Commands::Partition {
            command: PartitionCommand::Create(args),
        }
        | Commands::Disk {
            command: DiskCommand::Partition(args),
        }
        | Commands::PartitionDisk(args) => partition(args),
        Commands::Partition {
            command: PartitionCommand::Format(args),
        }
        | Commands::FormatPartition(args) => format(args),
        Commands::Disk {
            command:
                DiskCommand::Wipe {
                    drives,
                    timeout,
                    output,
                },
        } => wipe(drives, (*timeout).into(), output.as_deref()),
        Commands::Apply { config } => apply(config),
        Commands::Validate { config } => validation::validate_layout_file(config).map(|_| ()),
    };

    res.message(format!("Failed to execute '{}' command", args.command))
}

fn main() -> ExitCode {
    // Parse args
    let args = Cli::parse();

    // Initialize the logger
    if let Err(e) = logging::init(args.verbosity, args.debug, args.log_format) {
        eprintln!("Failed to initialize logging: {e:?}");
        return ExitCode::from(1);
    }

    if let Err(e) = run(&args) {
        error!("Stratum failed: {e:?}");
        return ExitCode::from(2);
    }
    ExitCode::SUCCESS
}

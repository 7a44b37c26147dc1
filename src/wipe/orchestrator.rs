use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use tokio::{
    task::JoinSet,
    time::{timeout_at, Instant},
};
use tracing::{debug, info, warn, Instrument, Span};

use stratum_api::{
    error::{
        InternalError, LookupError, ReportError, ServicingError, StratumError, StratumResultExt,
    },
    model::{Drive, WipeOutcome, WipeReport},
};

use crate::inventory::DriveInventory;

use super::{select_method, WipeExecutor};

type DriveIndex = Arc<HashMap<PathBuf, Drive>>;

/// Wipes a set of drives concurrently, one task per drive.
pub struct WipeOrchestrator<E> {
    span: Span,
    inventory: Arc<dyn DriveInventory>,
    executor: Arc<E>,
}

impl<E: WipeExecutor> WipeOrchestrator<E> {
    pub fn new(span: Span, inventory: Arc<dyn DriveInventory>, executor: Arc<E>) -> Self {
        Self {
            span,
            inventory,
            executor,
        }
    }

    /// Wipes every drive in `disks` before `deadline`.
    ///
    /// Per-drive failures land in the report and never abort the other
    /// drives. An error is only returned when the inventory cannot be taken or
    /// a task cannot be joined. The inventory snapshot counts against the
    /// deadline too.
    pub async fn wipe_all(
        &self,
        disks: &[PathBuf],
        deadline: Instant,
    ) -> Result<WipeReport, StratumError> {
        let mut outcomes = Vec::with_capacity(disks.len());
        let mut targets = Vec::with_capacity(disks.len());
        let mut seen = HashSet::new();

        for disk in disks {
            // Aliases of one device, e.g. a by-id symlink, count as duplicates.
            let resolved = tokio::fs::canonicalize(disk)
                .await
                .unwrap_or_else(|_| disk.clone());
            if !seen.insert(resolved) {
                warn!(parent: &self.span, "Drive '{}' requested more than once", disk.display());
                outcomes.push(WipeOutcome::failure(
                    disk,
                    None,
                    Duration::ZERO,
                    "Drive requested more than once",
                ));
                continue;
            }

            if !tokio::fs::try_exists(disk).await.unwrap_or(false) {
                let err = drive_not_exist(disk);
                warn!(parent: &self.span, "{err}");
                outcomes.push(WipeOutcome::failure(disk, None, Duration::ZERO, err));
                continue;
            }

            targets.push(disk.clone());
        }

        if targets.is_empty() {
            return Ok(WipeReport::new(outcomes));
        }

        let start = Instant::now();
        let inventory = self.inventory.clone();
        let Ok(snapshot) =
            timeout_at(deadline, tokio::task::spawn_blocking(move || inventory.drives())).await
        else {
            let err = StratumError::new(ServicingError::WipeDeadlineExceeded);
            warn!(parent: &self.span, "{err} while collecting the drive inventory");
            outcomes.extend(
                targets
                    .into_iter()
                    .map(|disk| WipeOutcome::failure(disk, None, start.elapsed(), &err)),
            );
            return Ok(WipeReport::new(outcomes));
        };
        let drives: DriveIndex = Arc::new(
            snapshot
                .structured(ServicingError::CollectInventory)??
                .into_iter()
                .map(|drive| (drive.logical_name.clone(), drive))
                .collect(),
        );
        debug!(parent: &self.span, "Inventory reports {} drive(s)", drives.len());

        let mut tasks = JoinSet::new();
        for disk in targets {
            let span = tracing::info_span!(parent: &self.span, "wipe_drive", disk = %disk.display());
            tasks.spawn(
                wipe_one(disk, drives.clone(), self.executor.clone(), deadline).instrument(span),
            );
        }

        while let Some(joined) = tasks.join_next().await {
            outcomes.push(
                joined
                    .structured(InternalError::JoinWipeTask)
                    .message("Wipe task did not complete")?,
            );
        }

        let report = WipeReport::new(outcomes);
        info!(
            parent: &self.span,
            "Wiped {} of {} drive(s)",
            report.len() - report.failed(),
            report.len()
        );
        Ok(report)
    }
}

fn drive_not_exist(disk: &Path) -> StratumError {
    StratumError::new(LookupError::DriveNotExist {
        disk: disk.to_string_lossy().into(),
    })
}

/// Inventory records are keyed by kernel name, requests may go through a
/// symlink such as `/dev/disk/by-id/...`.
fn lookup<'a>(drives: &'a HashMap<PathBuf, Drive>, disk: &Path) -> Option<&'a Drive> {
    drives.get(disk).or_else(|| {
        disk.canonicalize()
            .ok()
            .and_then(|resolved| drives.get(&resolved))
    })
}

async fn wipe_one<E: WipeExecutor>(
    disk: PathBuf,
    drives: DriveIndex,
    executor: Arc<E>,
    deadline: Instant,
) -> WipeOutcome {
    let start = Instant::now();

    let Some(drive) = lookup(&drives, &disk) else {
        let err = drive_not_exist(&disk);
        warn!("{err}");
        return WipeOutcome::failure(disk, None, start.elapsed(), err);
    };

    let plan = match select_method(drive) {
        Ok(plan) => plan,
        Err(err) => {
            warn!("{err}");
            return WipeOutcome::failure(disk, None, start.elapsed(), err);
        }
    };
    let planned = Some((plan.method, plan.action));

    if Instant::now() >= deadline {
        let err = StratumError::new(ServicingError::WipeDeadlineExceeded);
        warn!("{err} before '{}' was started", disk.display());
        return WipeOutcome::failure(disk, planned, start.elapsed(), err);
    }

    info!(
        "Wiping '{}' using {}/{}",
        disk.display(),
        <&str>::from(plan.method),
        <&str>::from(plan.action)
    );
    match timeout_at(deadline, executor.wipe(&disk, &plan.wiper)).await {
        Ok(Ok(())) => {
            info!("Wiped '{}' in {:?}", disk.display(), start.elapsed());
            WipeOutcome::success(disk, plan.method, plan.action, start.elapsed())
        }
        Ok(Err(err)) => {
            warn!("Failed to wipe '{}': {err}", disk.display());
            WipeOutcome::failure(disk, planned, start.elapsed(), err)
        }
        Err(_) => {
            let err = StratumError::new(ServicingError::WipeDeadlineExceeded);
            warn!("{err} while wiping '{}'", disk.display());
            WipeOutcome::failure(disk, planned, start.elapsed(), err)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use stratum_api::{
        error::ErrorKind,
        model::{Capability, Protocol, WipeResult},
    };

    use crate::wipe::Wiper;

    use super::*;

    struct StaticInventory(Vec<Drive>);

    impl DriveInventory for StaticInventory {
        fn drives(&self) -> Result<Vec<Drive>, StratumError> {
            Ok(self.0.clone())
        }
    }

    struct FailingInventory;

    /// Never answers within any reasonable deadline.
    struct HangingInventory;

    impl DriveInventory for HangingInventory {
        fn drives(&self) -> Result<Vec<Drive>, StratumError> {
            std::thread::sleep(Duration::from_secs(3));
            Ok(Vec::new())
        }
    }

    impl DriveInventory for FailingInventory {
        fn drives(&self) -> Result<Vec<Drive>, StratumError> {
            Err(StratumError::new(ServicingError::CollectInventory))
        }
    }

    #[derive(Default)]
    struct RecordingExecutor {
        calls: Mutex<Vec<(PathBuf, Wiper)>>,
    }

    impl WipeExecutor for RecordingExecutor {
        async fn wipe(&self, disk: &Path, wiper: &Wiper) -> Result<(), StratumError> {
            self.calls.lock().unwrap().push((disk.to_owned(), *wiper));
            Ok(())
        }
    }

    fn orchestrator<E: WipeExecutor>(
        inventory: impl DriveInventory + 'static,
        executor: Arc<E>,
    ) -> WipeOrchestrator<E> {
        WipeOrchestrator::new(Span::none(), Arc::new(inventory), executor)
    }

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(60)
    }

    #[tokio::test]
    async fn test_empty_request() {
        let executor = Arc::new(RecordingExecutor::default());
        let report = orchestrator(FailingInventory, executor.clone())
            .wipe_all(&[], far_deadline())
            .await
            .unwrap();
        assert!(report.is_empty());
        assert!(report.is_success());
        assert!(executor.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_inventory_failure() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = orchestrator(FailingInventory, Arc::new(RecordingExecutor::default()))
            .wipe_all(&[file.path().to_owned()], far_deadline())
            .await
            .unwrap_err();
        assert_eq!(
            err.kind(),
            &ErrorKind::Servicing(ServicingError::CollectInventory)
        );
    }

    #[tokio::test]
    async fn test_duplicate_and_missing() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let executor = Arc::new(RecordingExecutor::default());

        let report = orchestrator(
            StaticInventory(vec![Drive::new(file.path(), Protocol::Sata)]),
            executor.clone(),
        )
        .wipe_all(
            &[file.path().to_owned(), missing.clone(), file.path().to_owned()],
            far_deadline(),
        )
        .await
        .unwrap();

        assert_eq!(report.len(), 3);
        assert_eq!(report.failed(), 2);

        let for_file = report
            .outcomes()
            .iter()
            .filter(|o| o.disk == file.path())
            .collect::<Vec<_>>();
        assert_eq!(for_file.len(), 2);
        assert_eq!(for_file.iter().filter(|o| o.is_success()).count(), 1);

        let for_missing = report
            .outcomes()
            .iter()
            .find(|o| o.disk == missing)
            .unwrap();
        assert_eq!(for_missing.result, WipeResult::Failure);
        assert!(for_missing.method.is_none());

        assert_eq!(
            *executor.calls.lock().unwrap(),
            [(file.path().to_owned(), Wiper::FillZero)]
        );
    }

    #[tokio::test]
    async fn test_not_in_inventory() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let executor = Arc::new(RecordingExecutor::default());
        let report = orchestrator(StaticInventory(vec![]), executor.clone())
            .wipe_all(&[file.path().to_owned()], far_deadline())
            .await
            .unwrap();

        assert_eq!(report.failed(), 1);
        assert!(report.outcomes()[0]
            .error
            .as_deref()
            .unwrap()
            .contains("does not exist"));
        assert!(executor.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expired_deadline() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let executor = Arc::new(RecordingExecutor::default());
        let report = orchestrator(
            StaticInventory(vec![
                Drive::new(file.path(), Protocol::Nvme)
                    .with_capabilities(Capability::NvmeSanitizeCryptoErase),
            ]),
            executor.clone(),
        )
        .wipe_all(&[file.path().to_owned()], Instant::now())
        .await
        .unwrap();

        // Expiry may hit during the inventory or right before the wipe.
        let outcome = &report.outcomes()[0];
        assert_eq!(outcome.result, WipeResult::Failure);
        assert_eq!(outcome.error.as_deref(), Some("Wipe deadline exceeded"));
        assert!(executor.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deadline_covers_inventory() {
        let files = [
            tempfile::NamedTempFile::new().unwrap(),
            tempfile::NamedTempFile::new().unwrap(),
        ];
        let executor = Arc::new(RecordingExecutor::default());

        let start = Instant::now();
        let report = orchestrator(HangingInventory, executor.clone())
            .wipe_all(
                &[files[0].path().to_owned(), files[1].path().to_owned()],
                Instant::now() + Duration::from_millis(100),
            )
            .await
            .unwrap();

        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(report.len(), 2);
        for outcome in report.outcomes() {
            assert_eq!(outcome.result, WipeResult::Failure);
            assert!(outcome.method.is_none());
            assert_eq!(outcome.error.as_deref(), Some("Wipe deadline exceeded"));
        }
        assert!(executor.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_symlink_alias_is_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let disk = dir.path().join("sda");
        std::fs::write(&disk, b"data").unwrap();
        let alias = dir.path().join("wwn-0x5000c500a1b2c3d4");
        std::os::unix::fs::symlink(&disk, &alias).unwrap();
        let executor = Arc::new(RecordingExecutor::default());

        let report = orchestrator(
            StaticInventory(vec![Drive::new(&disk, Protocol::Sata)]),
            executor.clone(),
        )
        .wipe_all(&[disk.clone(), alias.clone()], far_deadline())
        .await
        .unwrap();

        assert_eq!(report.len(), 2);
        assert_eq!(report.failed(), 1);
        let duplicate = report.outcomes().iter().find(|o| o.disk == alias).unwrap();
        assert_eq!(
            duplicate.error.as_deref(),
            Some("Drive requested more than once")
        );
        assert_eq!(
            *executor.calls.lock().unwrap(),
            [(disk, Wiper::FillZero)]
        );
    }
}

//! Sync orchestrator
//!
//! Fans one change set out to many devices. Devices run concurrently and
//! independently; a failure on one never affects another. Each device keeps
//! its [`DeviceSyncStrategy`] (and with it its debug connection) across
//! cycles, behind an async mutex so overlapping cycles for the same device
//! run one after the other.
//!
//! Per device, one cycle is:
//!
//! ```text
//! resolve paths ─▶ remove deleted ─▶ push modified ─▶ decide
//!                                                      │
//!                     ┌────────────── restart ◀────────┤ reason
//!                     │                                │ none
//!                     │   restart(refresh failed) ◀─ try_refresh ─▶ refreshed
//!                     ▼
//!                 restarted / failed
//! ```

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Instant;

use futures_util::future::join_all;
use tokio::sync::Mutex;

use livesync_core::prelude::*;
use livesync_core::{LocalToDeviceFile, ProjectInfo, SyncFlags, SyncResultInfo};
use livesync_device::DeviceCapabilities;

use crate::file_ops::merge_file_results;
use crate::policy::SyncPolicy;
use crate::report::{DeviceSyncResult, SyncOutcome, SyncReport};
use crate::strategy::{DeviceSyncStrategy, RestartReason};

/// Local files touched since the last cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Added or modified files
    pub modified: Vec<PathBuf>,
    /// Files deleted locally
    pub removed: Vec<PathBuf>,
}

impl ChangeSet {
    pub fn modified(paths: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            modified: paths.into_iter().map(Into::into).collect(),
            removed: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.modified.is_empty() && self.removed.is_empty()
    }
}

type SharedStrategy<D> = Arc<Mutex<DeviceSyncStrategy<D>>>;

/// Cached strategy, tied to the device handle it was built for
struct StrategySlot<D: DeviceCapabilities> {
    device: Arc<D>,
    strategy: SharedStrategy<D>,
}

/// Runs sync cycles for one project across devices.
pub struct SyncOrchestrator<D: DeviceCapabilities> {
    project: ProjectInfo,
    local_app_dir: PathBuf,
    policy: Arc<SyncPolicy>,
    strategies: StdMutex<HashMap<String, StrategySlot<D>>>,
}

impl<D: DeviceCapabilities> SyncOrchestrator<D> {
    pub fn new(project: ProjectInfo, local_app_dir: impl Into<PathBuf>, policy: SyncPolicy) -> Self {
        Self {
            project,
            local_app_dir: local_app_dir.into(),
            policy: Arc::new(policy),
            strategies: StdMutex::new(HashMap::new()),
        }
    }

    pub fn project(&self) -> &ProjectInfo {
        &self.project
    }

    /// Run one sync cycle on every device.
    ///
    /// Devices listed more than once are synced once.
    pub async fn run(&self, devices: &[Arc<D>], changes: &ChangeSet, flags: SyncFlags) -> SyncReport {
        let mut seen = HashSet::new();
        let targets: Vec<_> = devices
            .iter()
            .filter(|d| seen.insert(d.id().to_string()))
            .map(|d| self.strategy_for(d))
            .collect();

        info!(
            "Syncing {} modified / {} removed file(s) to {} device(s)",
            changes.modified.len(),
            changes.removed.len(),
            targets.len()
        );

        let results = join_all(
            targets
                .into_iter()
                .map(|strategy| self.sync_device(strategy, changes, flags)),
        )
        .await;

        let mut report = SyncReport::default();
        for result in results {
            report.insert(result);
        }
        report
    }

    /// Drop the cached strategy (and debug connection) of a device.
    pub async fn forget_device(&self, device_id: &str) {
        let slot = self.lock_strategies().remove(device_id);
        if let Some(slot) = slot {
            slot.strategy.lock().await.shutdown().await;
            debug!("[{}] Forgot device", device_id);
        }
    }

    /// Close every debug connection.
    pub async fn shutdown(&self) {
        let slots: Vec<_> = self.lock_strategies().drain().map(|(_, s)| s).collect();
        for slot in slots {
            slot.strategy.lock().await.shutdown().await;
        }
    }

    fn lock_strategies(&self) -> std::sync::MutexGuard<'_, HashMap<String, StrategySlot<D>>> {
        self.strategies.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Strategy for `device`, rebuilt when the device handle changed.
    fn strategy_for(&self, device: &Arc<D>) -> SharedStrategy<D> {
        let mut strategies = self.lock_strategies();

        if let Some(slot) = strategies.get(device.id()) {
            if Arc::ptr_eq(&slot.device, device) {
                return Arc::clone(&slot.strategy);
            }
            debug!("[{}] Device handle changed, starting fresh", device.id());
        }

        let strategy = Arc::new(Mutex::new(DeviceSyncStrategy::new(
            Arc::clone(device),
            self.project.clone(),
            Arc::clone(&self.policy),
        )));
        strategies.insert(
            device.id().to_string(),
            StrategySlot {
                device: Arc::clone(device),
                strategy: Arc::clone(&strategy),
            },
        );
        strategy
    }

    async fn sync_device(
        &self,
        strategy: SharedStrategy<D>,
        changes: &ChangeSet,
        flags: SyncFlags,
    ) -> DeviceSyncResult {
        let started = Instant::now();
        let mut strategy = strategy.lock().await;
        let device_id = strategy.device().id().to_string();
        let platform = strategy.device().platform();

        let outcome = match self.run_cycle(&mut strategy, changes, flags).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("[{}] Sync failed: {}", device_id, e);
                SyncOutcome::Failed {
                    error: e.to_string(),
                    restart_reason: None,
                }
            }
        };

        match &outcome {
            SyncOutcome::UpToDate => debug!("[{}] Up to date", device_id),
            SyncOutcome::Refreshed { files } => {
                info!("[{}] Refreshed {} file(s)", device_id, files.len())
            }
            SyncOutcome::Restarted { reason } => info!("[{}] Restarted: {}", device_id, reason),
            SyncOutcome::Failed { .. } => {}
        }

        DeviceSyncResult {
            device_id,
            platform,
            outcome,
            duration_ms: started.elapsed().as_millis() as u64,
            finished_at: chrono::Local::now(),
        }
    }

    async fn run_cycle(
        &self,
        strategy: &mut DeviceSyncStrategy<D>,
        changes: &ChangeSet,
        flags: SyncFlags,
    ) -> Result<SyncOutcome> {
        if changes.is_empty() && !flags.full_sync && !flags.wait_for_debugger {
            return Ok(SyncOutcome::UpToDate);
        }

        let data = strategy.device_app_data();
        let modified = self.resolve_all(&changes.modified, &data.device_project_root)?;
        let removed = self.resolve_all(&changes.removed, &data.device_project_root)?;

        // A failed removal must not hold back unrelated pushes.
        let removal = strategy.remove_files(&data, &removed).await;
        let transfer = strategy.transfer_files(&data, &modified).await;
        merge_file_results([removal, transfer])?;

        // Deletions count as changes for the restart decision and the reload.
        let mut changed = modified;
        changed.extend(removed);
        let info = SyncResultInfo::new(data, changed, flags);

        let reason = match strategy.restart_decision(&info).await {
            Some(reason) => reason,
            None => {
                if strategy.try_refresh(&info).await {
                    let files = strategy
                        .classify_changes(&info.modified_files)
                        .refreshable
                        .iter()
                        .map(|f| f.device_path().to_string())
                        .collect();
                    return Ok(SyncOutcome::Refreshed { files });
                }
                RestartReason::RefreshFailed
            }
        };

        Ok(match strategy.restart(&info).await {
            Ok(()) => SyncOutcome::Restarted { reason },
            Err(e) => {
                warn!(
                    "[{}] Restart ({}) failed: {}",
                    info.device_app_data.device_id, reason, e
                );
                SyncOutcome::Failed {
                    error: e.to_string(),
                    restart_reason: Some(reason),
                }
            }
        })
    }

    fn resolve_all(&self, paths: &[PathBuf], device_root: &str) -> Result<Vec<LocalToDeviceFile>> {
        paths
            .iter()
            .map(|p| LocalToDeviceFile::resolve(&self.absolute(p), &self.local_app_dir, device_root))
            .collect()
    }

    /// Relative change paths are taken relative to the project directory.
    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project.dir.join(path)
        }
    }
}

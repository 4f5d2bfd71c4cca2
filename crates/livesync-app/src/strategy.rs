//! Device sync strategy
//!
//! One [`DeviceSyncStrategy`] per device. It owns the device's debug channel
//! and decides, per cycle, whether the running app can reload in place or
//! must be restarted.
//!
//! Decision order:
//! 1. `full_sync` or `wait_for_debugger` always restart
//! 2. restart-required files (scripts, exclusion globs) restart
//! 3. platforms without in-place reload restart
//! 4. no debug connection restarts
//! 5. otherwise refresh

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use livesync_core::prelude::*;
use livesync_core::{DeviceAppData, LocalToDeviceFile, ProjectInfo, SyncResultInfo};
use livesync_device::{DebugChannel, DeviceCapabilities, RestartOptions};

use crate::classify::ChangeClassification;
use crate::file_ops::for_each_file;
use crate::policy::SyncPolicy;

/// Why a device was (or had to be) restarted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartReason {
    FullSync,
    WaitForDebugger,
    RestartRequiredFiles,
    UnsupportedPlatform,
    ConnectionUnavailable,
    RefreshFailed,
}

impl fmt::Display for RestartReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RestartReason::FullSync => "full sync requested",
            RestartReason::WaitForDebugger => "waiting for debugger",
            RestartReason::RestartRequiredFiles => "changed files require a restart",
            RestartReason::UnsupportedPlatform => "platform cannot reload in place",
            RestartReason::ConnectionUnavailable => "debug connection unavailable",
            RestartReason::RefreshFailed => "in-place reload failed",
        };
        f.write_str(text)
    }
}

/// Restart-vs-refresh policy and file operations for one device.
pub struct DeviceSyncStrategy<D: DeviceCapabilities> {
    device: Arc<D>,
    project: ProjectInfo,
    policy: Arc<SyncPolicy>,
    channel: DebugChannel<D>,
}

impl<D: DeviceCapabilities> fmt::Debug for DeviceSyncStrategy<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceSyncStrategy")
            .field("device", &self.device.id())
            .field("app_id", &self.project.app_id)
            .field("channel", &self.channel)
            .finish()
    }
}

impl<D: DeviceCapabilities> DeviceSyncStrategy<D> {
    pub fn new(device: Arc<D>, project: ProjectInfo, policy: Arc<SyncPolicy>) -> Self {
        let channel = DebugChannel::new(
            Arc::clone(&device),
            project.name.clone(),
            project.dir.clone(),
            policy.channel,
        );

        Self {
            device,
            project,
            policy,
            channel,
        }
    }

    pub fn device(&self) -> &Arc<D> {
        &self.device
    }

    /// Identity of the project's app on this device
    pub fn device_app_data(&self) -> DeviceAppData {
        DeviceAppData {
            device_id: self.device.id().to_string(),
            platform: self.device.platform(),
            app_id: self.project.app_id.clone(),
            device_project_root: self.device.device_project_root(&self.project.app_id),
        }
    }

    pub fn supports_refresh(&self) -> bool {
        self.policy.supports_refresh(self.device.platform())
    }

    pub fn classify_changes(&self, files: &[LocalToDeviceFile]) -> ChangeClassification {
        self.policy.classifier.classify(files)
    }

    /// Decide whether this cycle needs a restart, and why.
    ///
    /// Opens the debug connection when every other check allows a refresh.
    pub async fn restart_decision(&mut self, info: &SyncResultInfo) -> Option<RestartReason> {
        if info.is_full_sync {
            return Some(RestartReason::FullSync);
        }
        if info.wait_for_debugger {
            return Some(RestartReason::WaitForDebugger);
        }
        if self.classify_changes(&info.modified_files).requires_restart() {
            return Some(RestartReason::RestartRequiredFiles);
        }
        if !self.supports_refresh() {
            return Some(RestartReason::UnsupportedPlatform);
        }
        if !self
            .channel
            .ensure_connected(&info.device_app_data.app_id)
            .await
        {
            return Some(RestartReason::ConnectionUnavailable);
        }
        None
    }

    pub async fn should_restart(&mut self, info: &SyncResultInfo) -> bool {
        self.restart_decision(info).await.is_some()
    }

    /// Ask the running app to reload the refreshable files.
    ///
    /// Returns `false` when no connection could be made or the reload could
    /// not be delivered.
    pub async fn try_refresh(&mut self, info: &SyncResultInfo) -> bool {
        let classification = self.classify_changes(&info.modified_files);

        if !self
            .channel
            .ensure_connected(&info.device_app_data.app_id)
            .await
        {
            return false;
        }

        match self.channel.send_reload(&classification.refreshable).await {
            Ok(()) => true,
            Err(e) => {
                debug!("[{}] Refresh failed: {}", self.device.id(), e);
                false
            }
        }
    }

    pub async fn restart(&self, info: &SyncResultInfo) -> Result<()> {
        let options = RestartOptions {
            app_id: info.device_app_data.app_id.clone(),
            project_name: self.project.name.clone(),
            project_dir: self.project.dir.clone(),
            wait_for_debugger: info.wait_for_debugger,
        };

        info!(
            "[{}] Restarting {}{}",
            self.device.id(),
            options.app_id,
            if options.wait_for_debugger {
                " (waiting for debugger)"
            } else {
                ""
            }
        );
        self.device.restart_application(&options).await
    }

    /// Push every file to the device concurrently.
    pub async fn transfer_files(
        &self,
        device_app_data: &DeviceAppData,
        files: &[LocalToDeviceFile],
    ) -> Result<()> {
        let app_id = device_app_data.app_id.as_str();
        for_each_file(files, |file| {
            self.device
                .push_file(file.local_path(), file.device_path(), app_id)
        })
        .await
    }

    /// Delete every file from the device concurrently.
    pub async fn remove_files(
        &self,
        device_app_data: &DeviceAppData,
        files: &[LocalToDeviceFile],
    ) -> Result<()> {
        let app_id = device_app_data.app_id.as_str();
        for_each_file(files, |file| {
            self.device.delete_file(file.device_path(), app_id)
        })
        .await
    }

    /// Tear down the debug connection.
    pub async fn shutdown(&mut self) {
        self.channel.destroy().await;
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::*;
    use crate::config::LiveSyncSettings;
    use livesync_core::{Platform, SyncFlags};
    use livesync_device::test_utils::{test_device, test_device_with_platform, FakeDevice};
    use livesync_device::{read_frame, DebugMessage, PAGE_RELOAD_METHOD};

    fn project() -> ProjectInfo {
        ProjectInfo {
            name: "demo".to_string(),
            dir: PathBuf::from("/work/demo"),
            app_id: "org.example.demo".to_string(),
        }
    }

    fn policy() -> Arc<SyncPolicy> {
        let settings = LiveSyncSettings {
            connect_timeout_ms: 500,
            close_grace_ms: 50,
            ..Default::default()
        };
        Arc::new(SyncPolicy::from_settings(&settings).unwrap())
    }

    fn strategy(device: &Arc<FakeDevice>) -> DeviceSyncStrategy<FakeDevice> {
        DeviceSyncStrategy::new(Arc::clone(device), project(), policy())
    }

    fn sync_info(
        strategy: &DeviceSyncStrategy<FakeDevice>,
        names: &[&str],
        flags: SyncFlags,
    ) -> SyncResultInfo {
        let data = strategy.device_app_data();
        let files = names
            .iter()
            .map(|n| {
                LocalToDeviceFile::resolve(
                    &Path::new("/work/demo/app").join(n),
                    Path::new("/work/demo/app"),
                    &data.device_project_root,
                )
                .unwrap()
            })
            .collect();
        SyncResultInfo::new(data, files, flags)
    }

    #[tokio::test]
    async fn test_device_app_data() {
        let device = Arc::new(test_device("iphone-1"));
        let data = strategy(&device).device_app_data();

        assert_eq!(data.device_id, "iphone-1");
        assert_eq!(data.platform, Platform::Ios);
        assert_eq!(data.app_id, "org.example.demo");
        assert_eq!(data.device_project_root, "app");
    }

    #[tokio::test]
    async fn test_full_sync_and_debugger_win_without_connecting() {
        let device = Arc::new(test_device("iphone-1"));
        let mut strategy = strategy(&device);

        let full = sync_info(
            &strategy,
            &["app.css"],
            SyncFlags {
                full_sync: true,
                ..Default::default()
            },
        );
        assert_eq!(
            strategy.restart_decision(&full).await,
            Some(RestartReason::FullSync)
        );

        let debug = sync_info(
            &strategy,
            &["app.css"],
            SyncFlags {
                wait_for_debugger: true,
                ..Default::default()
            },
        );
        assert_eq!(
            strategy.restart_decision(&debug).await,
            Some(RestartReason::WaitForDebugger)
        );
        assert_eq!(device.acquire_count(), 0);
    }

    #[tokio::test]
    async fn test_script_or_excluded_file_requires_restart() {
        let device = Arc::new(test_device("iphone-1"));
        let mut strategy = strategy(&device);

        for name in ["main.js", "shared/model.ts", "main.js.map"] {
            let info = sync_info(&strategy, &["app.css", name], SyncFlags::default());
            assert!(strategy.should_restart(&info).await, "{name}");
        }
        assert_eq!(
            strategy
                .restart_decision(&sync_info(&strategy, &["main.js"], SyncFlags::default()))
                .await,
            Some(RestartReason::RestartRequiredFiles)
        );
    }

    #[tokio::test]
    async fn test_unsupported_platform_restarts() {
        let device = Arc::new(test_device_with_platform("pixel", Platform::Android));
        let mut strategy = strategy(&device);

        let info = sync_info(&strategy, &["app.css"], SyncFlags::default());
        assert_eq!(
            strategy.restart_decision(&info).await,
            Some(RestartReason::UnsupportedPlatform)
        );
        assert_eq!(device.acquire_count(), 0);
    }

    #[tokio::test]
    async fn test_should_restart_follows_connection() {
        let device = Arc::new(test_device("iphone-1"));
        let mut strategy = strategy(&device);
        let info = sync_info(&strategy, &["app.css"], SyncFlags::default());

        assert!(!strategy.should_restart(&info).await);

        let failing = Arc::new(test_device("iphone-2"));
        failing.fail_acquire(true);
        let mut strategy = DeviceSyncStrategy::new(Arc::clone(&failing), project(), policy());
        assert_eq!(
            strategy.restart_decision(&info).await,
            Some(RestartReason::ConnectionUnavailable)
        );
    }

    #[tokio::test]
    async fn test_try_refresh_sends_one_reload_frame() {
        let device = Arc::new(test_device("iphone-1"));
        let mut strategy = strategy(&device);
        let info = sync_info(&strategy, &["app.css"], SyncFlags::default());

        assert!(!strategy.should_restart(&info).await);
        assert!(strategy.try_refresh(&info).await);

        let mut peer = device.take_peer().unwrap();
        let message: DebugMessage =
            serde_json::from_str(&read_frame(&mut peer).await.unwrap()).unwrap();
        assert_eq!(message.method, PAGE_RELOAD_METHOD);
        assert_eq!(device.acquire_count(), 1);
    }

    #[tokio::test]
    async fn test_try_refresh_false_when_acquire_fails() {
        let device = Arc::new(test_device("iphone-1"));
        device.fail_acquire(true);
        let mut strategy = strategy(&device);
        let info = sync_info(&strategy, &["app.css"], SyncFlags::default());

        assert!(!strategy.try_refresh(&info).await);
        assert!(device.take_peer().is_none());
    }

    #[tokio::test]
    async fn test_try_refresh_false_when_socket_closed() {
        let device = Arc::new(test_device("iphone-1"));
        device.use_scripted_socket(
            tokio_test::io::Builder::new()
                .write_error(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "broken pipe",
                ))
                .wait(std::time::Duration::from_secs(60))
                .build(),
        );
        let mut strategy = strategy(&device);
        let info = sync_info(&strategy, &["app.css"], SyncFlags::default());

        assert!(!strategy.try_refresh(&info).await);
        assert_eq!(device.destroy_count(), 1);
    }

    #[tokio::test]
    async fn test_restart_passes_wait_for_debugger() {
        let device = Arc::new(test_device("iphone-1"));
        let strategy = strategy(&device);
        let info = sync_info(
            &strategy,
            &[],
            SyncFlags {
                wait_for_debugger: true,
                ..Default::default()
            },
        );

        strategy.restart(&info).await.unwrap();

        let restarts = device.restarts();
        assert_eq!(restarts.len(), 1);
        assert_eq!(restarts[0].app_id, "org.example.demo");
        assert_eq!(restarts[0].project_name, "demo");
        assert_eq!(restarts[0].project_dir, PathBuf::from("/work/demo"));
        assert!(restarts[0].wait_for_debugger);
    }

    #[tokio::test]
    async fn test_transfer_files_pushes_every_file() {
        let device = Arc::new(test_device("iphone-1"));
        let strategy = strategy(&device);
        let info = sync_info(&strategy, &["app.css", "views/main.xml"], SyncFlags::default());

        strategy
            .transfer_files(&info.device_app_data, &info.modified_files)
            .await
            .unwrap();

        let mut remotes: Vec<_> = device.pushed_files().into_iter().map(|(_, r)| r).collect();
        remotes.sort();
        assert_eq!(remotes, vec!["app/app.css", "app/views/main.xml"]);
    }

    #[tokio::test]
    async fn test_remove_files_aggregates_failures() {
        let device = Arc::new(test_device("iphone-1"));
        device.fail_path("app/locked.css");
        let strategy = strategy(&device);
        let info = sync_info(
            &strategy,
            &["a.css", "locked.css", "b.css"],
            SyncFlags::default(),
        );

        let err = strategy
            .remove_files(&info.device_app_data, &info.modified_files)
            .await
            .unwrap_err();

        match err {
            Error::FileOperations { failures } => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].path, "app/locked.css");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let mut deleted = device.deleted_files();
        deleted.sort();
        assert_eq!(deleted, vec!["app/a.css", "app/b.css"]);
    }

    #[tokio::test]
    async fn test_shutdown_destroys_connection() {
        let device = Arc::new(test_device("iphone-1"));
        let mut strategy = strategy(&device);
        let info = sync_info(&strategy, &["app.css"], SyncFlags::default());
        assert!(!strategy.should_restart(&info).await);

        strategy.shutdown().await;
        assert_eq!(device.destroy_count(), 1);
    }
}

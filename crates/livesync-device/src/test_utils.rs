//! Test utilities for device types
//!
//! Provides [`FakeDevice`], an in-memory [`DeviceCapabilities`] implementation
//! that records every call and hands out in-memory debug sockets whose peer end
//! the test can read from or close.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};

use livesync_core::prelude::*;
use livesync_core::Platform;

use crate::capabilities::{DeviceCapabilities, RestartOptions};

/// Buffer size of the in-memory socket pair
const DUPLEX_BUFFER_SIZE: usize = 64 * 1024;

/// Object-safe bundle of the socket traits
pub trait FakeSocketIo: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> FakeSocketIo for T {}

/// Socket type handed out by [`FakeDevice`]
pub type FakeSocket = Box<dyn FakeSocketIo>;

/// Arguments of the most recent debug socket request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquireRequest {
    pub app_id: String,
    pub app_name: String,
    pub project_dir: PathBuf,
    pub ensure_app_started: bool,
}

/// In-memory device for tests.
#[derive(Default)]
pub struct FakeDevice {
    id: String,
    platform: Option<Platform>,
    acquire_count: AtomicUsize,
    destroy_count: AtomicUsize,
    fail_acquire: AtomicBool,
    fail_restart: AtomicBool,
    acquire_delay: Mutex<Option<Duration>>,
    scripted_socket: Mutex<Option<FakeSocket>>,
    peer: Mutex<Option<DuplexStream>>,
    last_acquire: Mutex<Option<AcquireRequest>>,
    pushed: Mutex<Vec<(PathBuf, String)>>,
    deleted: Mutex<Vec<String>>,
    restarts: Mutex<Vec<RestartOptions>>,
    failing_paths: Mutex<HashSet<String>>,
    files: Mutex<BTreeSet<String>>,
}

impl std::fmt::Debug for FakeDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeDevice").field("id", &self.id).finish()
    }
}

/// Creates an iOS fake device.
pub fn test_device(id: &str) -> FakeDevice {
    test_device_with_platform(id, Platform::Ios)
}

/// Creates a fake device for `platform`.
pub fn test_device_with_platform(id: &str, platform: Platform) -> FakeDevice {
    FakeDevice {
        id: id.to_string(),
        platform: Some(platform),
        ..Default::default()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl FakeDevice {
    /// Make every following acquisition fail
    pub fn fail_acquire(&self, fail: bool) {
        self.fail_acquire.store(fail, Ordering::SeqCst);
    }

    /// Delay acquisitions (to exercise the connect timeout)
    pub fn set_acquire_delay(&self, delay: Duration) {
        *lock(&self.acquire_delay) = Some(delay);
    }

    /// Hand out `socket` on the next acquisition instead of an in-memory pair
    pub fn use_scripted_socket(&self, socket: impl FakeSocketIo + 'static) {
        *lock(&self.scripted_socket) = Some(Box::new(socket));
    }

    /// Make push and delete of `path` fail
    pub fn fail_path(&self, path: &str) {
        lock(&self.failing_paths).insert(path.to_string());
    }

    pub fn fail_restart(&self, fail: bool) {
        self.fail_restart.store(fail, Ordering::SeqCst);
    }

    /// Seed a file for `list_files`
    pub fn add_file(&self, remote_path: &str) {
        lock(&self.files).insert(remote_path.to_string());
    }

    /// Take the app-side end of the most recent debug socket.
    ///
    /// Dropping it closes the socket as seen by the channel.
    pub fn take_peer(&self) -> Option<DuplexStream> {
        lock(&self.peer).take()
    }

    pub fn acquire_count(&self) -> usize {
        self.acquire_count.load(Ordering::SeqCst)
    }

    pub fn destroy_count(&self) -> usize {
        self.destroy_count.load(Ordering::SeqCst)
    }

    pub fn last_acquire_request(&self) -> Option<AcquireRequest> {
        lock(&self.last_acquire).clone()
    }

    /// `(local, remote)` pairs of successful pushes, in completion order
    pub fn pushed_files(&self) -> Vec<(PathBuf, String)> {
        lock(&self.pushed).clone()
    }

    pub fn deleted_files(&self) -> Vec<String> {
        lock(&self.deleted).clone()
    }

    pub fn restarts(&self) -> Vec<RestartOptions> {
        lock(&self.restarts).clone()
    }

    fn check_path(&self, path: &str) -> Result<()> {
        if lock(&self.failing_paths).contains(path) {
            Err(Error::device(format!("injected failure for {path}")))
        } else {
            Ok(())
        }
    }
}

impl DeviceCapabilities for FakeDevice {
    type Socket = FakeSocket;

    fn id(&self) -> &str {
        &self.id
    }

    fn platform(&self) -> Platform {
        self.platform.unwrap_or(Platform::Ios)
    }

    fn device_project_root(&self, _app_id: &str) -> String {
        "app".to_string()
    }

    async fn acquire_debug_socket(
        &self,
        app_id: &str,
        app_name: &str,
        project_dir: &Path,
        ensure_app_started: bool,
    ) -> Result<FakeSocket> {
        self.acquire_count.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_acquire) = Some(AcquireRequest {
            app_id: app_id.to_string(),
            app_name: app_name.to_string(),
            project_dir: project_dir.to_path_buf(),
            ensure_app_started,
        });

        let delay = *lock(&self.acquire_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_acquire.load(Ordering::SeqCst) {
            return Err(Error::connection_unavailable(format!(
                "{app_id} is not running on {}",
                self.id
            )));
        }

        if let Some(socket) = lock(&self.scripted_socket).take() {
            return Ok(socket);
        }

        let (local, peer) = tokio::io::duplex(DUPLEX_BUFFER_SIZE);
        *lock(&self.peer) = Some(peer);
        Ok(Box::new(local))
    }

    async fn destroy_all_sockets(&self) -> Result<()> {
        self.destroy_count.fetch_add(1, Ordering::SeqCst);
        lock(&self.peer).take();
        Ok(())
    }

    async fn push_file(&self, local_path: &Path, remote_path: &str, _app_id: &str) -> Result<()> {
        self.check_path(remote_path)?;
        lock(&self.pushed).push((local_path.to_path_buf(), remote_path.to_string()));
        lock(&self.files).insert(remote_path.to_string());
        Ok(())
    }

    async fn delete_file(&self, remote_path: &str, _app_id: &str) -> Result<()> {
        self.check_path(remote_path)?;
        lock(&self.deleted).push(remote_path.to_string());
        lock(&self.files).remove(remote_path);
        Ok(())
    }

    async fn list_files(&self, remote_path: &str, _app_id: &str) -> Result<Vec<String>> {
        let prefix = remote_path.trim_end_matches('/');
        Ok(lock(&self.files)
            .iter()
            .filter(|f| prefix.is_empty() || *f == prefix || f.starts_with(&format!("{prefix}/")))
            .cloned()
            .collect())
    }

    async fn restart_application(&self, options: &RestartOptions) -> Result<()> {
        lock(&self.restarts).push(options.clone());
        if self.fail_restart.load(Ordering::SeqCst) {
            return Err(Error::restart(format!("injected failure on {}", self.id)));
        }
        Ok(())
    }
}

//! The device operations the sync engine depends on
//!
//! Device discovery and the underlying transports (usbmux, adb, simulator
//! control) live outside this crate. Anything that can push and delete files,
//! restart an app, and hand out a debug socket can be synced to.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncRead, AsyncWrite};

use livesync_core::prelude::*;
use livesync_core::Platform;

/// Arguments for [`DeviceCapabilities::restart_application`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartOptions {
    pub app_id: String,
    pub project_name: String,
    pub project_dir: PathBuf,
    /// Start the app paused until a debugger attaches
    pub wait_for_debugger: bool,
}

/// A connected device, as seen by the sync engine.
///
/// Implement the `Send` variant ([`DeviceCapabilities`]); the local variant is
/// provided by a blanket impl.
#[trait_variant::make(DeviceCapabilities: Send)]
pub trait LocalDeviceCapabilities {
    /// Byte stream to the app runtime's debug transport
    type Socket: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Stable device identifier
    fn id(&self) -> &str;

    fn platform(&self) -> Platform;

    /// Device-side root directory of the synced app files for `app_id`
    fn device_project_root(&self, app_id: &str) -> String;

    /// Open a debug socket to the app.
    ///
    /// With `ensure_app_started` the device starts the app first if it is not
    /// running. Fails when the app cannot be reached.
    async fn acquire_debug_socket(
        &self,
        app_id: &str,
        app_name: &str,
        project_dir: &Path,
        ensure_app_started: bool,
    ) -> Result<Self::Socket>;

    /// Tear down every debug socket the device holds, for all apps.
    async fn destroy_all_sockets(&self) -> Result<()>;

    async fn push_file(&self, local_path: &Path, remote_path: &str, app_id: &str) -> Result<()>;

    async fn delete_file(&self, remote_path: &str, app_id: &str) -> Result<()>;

    /// List files below `remote_path`, relative to the app's file root
    async fn list_files(&self, remote_path: &str, app_id: &str) -> Result<Vec<String>>;

    async fn restart_application(&self, options: &RestartOptions) -> Result<()>;
}

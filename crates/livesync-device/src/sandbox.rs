//! Directory-backed device
//!
//! A [`SandboxDevice`] keeps each app's files under `<root>/<app_id>/`, reaches
//! the app's debug transport over TCP and restarts the app by running a shell
//! command. It stands in for a simulator whose app container is visible on the
//! host filesystem.

use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::process::Command;

use livesync_core::prelude::*;
use livesync_core::Platform;

use crate::capabilities::{DeviceCapabilities, RestartOptions};

/// Default device-side directory the synced files live under
pub const DEFAULT_DEVICE_APP_DIR: &str = "app";

/// Connect retries after starting the app for a debug connection
const START_CONNECT_ATTEMPTS: usize = 20;
const START_CONNECT_INTERVAL: Duration = Duration::from_millis(100);

/// Configuration of one sandbox device (`[[devices]]` in config.toml)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SandboxDeviceConfig {
    /// Unique device identifier
    pub id: String,

    /// Human-readable device name
    #[serde(default)]
    pub name: Option<String>,

    pub platform: Platform,

    /// Directory holding the app containers
    pub root: PathBuf,

    /// `host:port` of the app's debug transport
    #[serde(default)]
    pub debug_addr: Option<String>,

    /// Shell command that restarts the app
    #[serde(default)]
    pub restart_command: Option<String>,

    /// Directory below the app container the synced files go to
    #[serde(default = "default_app_dir")]
    pub app_dir: String,
}

fn default_app_dir() -> String {
    DEFAULT_DEVICE_APP_DIR.to_string()
}

/// A device whose app filesystem is a local directory
#[derive(Debug, Clone)]
pub struct SandboxDevice {
    config: SandboxDeviceConfig,
}

impl SandboxDevice {
    pub fn new(config: SandboxDeviceConfig) -> Self {
        Self { config }
    }

    /// Get a display string for the device
    pub fn display_name(&self) -> String {
        match &self.config.name {
            Some(name) => format!("{} ({})", name, self.config.platform),
            None => format!("{} ({})", self.config.id, self.config.platform),
        }
    }

    pub fn config(&self) -> &SandboxDeviceConfig {
        &self.config
    }

    /// Map a device path of `app_id` to the host filesystem.
    fn host_path(&self, remote_path: &str, app_id: &str) -> Result<PathBuf> {
        let mut path = self.config.root.join(app_id);
        for component in Path::new(remote_path).components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir | Component::RootDir => {}
                _ => {
                    return Err(Error::device(format!(
                        "device path escapes the app container: {remote_path}"
                    )))
                }
            }
        }
        Ok(path)
    }

    fn unreachable(app_id: &str, addr: &str, e: std::io::Error) -> Error {
        Error::connection_unavailable(format!(
            "{app_id} is not accepting debug connections at {addr}: {e}"
        ))
    }

    fn restart_shell(command: &str) -> Command {
        #[cfg(windows)]
        {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(command);
            cmd
        }
        #[cfg(not(windows))]
        {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command);
            cmd
        }
    }
}

impl DeviceCapabilities for SandboxDevice {
    type Socket = TcpStream;

    fn id(&self) -> &str {
        &self.config.id
    }

    fn platform(&self) -> Platform {
        self.config.platform
    }

    fn device_project_root(&self, _app_id: &str) -> String {
        self.config.app_dir.clone()
    }

    async fn acquire_debug_socket(
        &self,
        app_id: &str,
        app_name: &str,
        project_dir: &Path,
        ensure_app_started: bool,
    ) -> Result<TcpStream> {
        let addr = self.config.debug_addr.as_deref().ok_or_else(|| {
            Error::connection_unavailable(format!(
                "device {} has no debug endpoint configured",
                self.config.id
            ))
        })?;

        let first = match TcpStream::connect(addr).await {
            Ok(socket) => return Ok(socket),
            Err(e) => e,
        };
        if !ensure_app_started || self.config.restart_command.is_none() {
            return Err(Self::unreachable(app_id, addr, first));
        }

        debug!(
            "[{}] {} not reachable at {} ({}), starting it",
            self.config.id, app_id, addr, first
        );
        self.restart_application(&RestartOptions {
            app_id: app_id.to_string(),
            project_name: app_name.to_string(),
            project_dir: project_dir.to_path_buf(),
            wait_for_debugger: false,
        })
        .await?;

        let mut last = first;
        for _ in 0..START_CONNECT_ATTEMPTS {
            tokio::time::sleep(START_CONNECT_INTERVAL).await;
            match TcpStream::connect(addr).await {
                Ok(socket) => return Ok(socket),
                Err(e) => last = e,
            }
        }
        Err(Self::unreachable(app_id, addr, last))
    }

    async fn destroy_all_sockets(&self) -> Result<()> {
        // Sockets are owned by their channels; nothing is pooled here.
        trace!("[{}] No pooled sockets to destroy", self.config.id);
        Ok(())
    }

    async fn push_file(&self, local_path: &Path, remote_path: &str, app_id: &str) -> Result<()> {
        let target = self.host_path(remote_path, app_id)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("[{}] Failed to create {}", self.config.id, parent.display())
            })?;
        }
        tokio::fs::copy(local_path, &target).await.map_err(|e| {
            Error::device(format!(
                "failed to copy {} to {}: {}",
                local_path.display(),
                remote_path,
                e
            ))
        })?;
        trace!("[{}] Pushed {}", self.config.id, remote_path);
        Ok(())
    }

    async fn delete_file(&self, remote_path: &str, app_id: &str) -> Result<()> {
        let target = self.host_path(remote_path, app_id)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => {
                trace!("[{}] Deleted {}", self.config.id, remote_path);
                Ok(())
            }
            // Already gone is what we wanted
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::device(format!("failed to delete {remote_path}: {e}"))),
        }
    }

    async fn list_files(&self, remote_path: &str, app_id: &str) -> Result<Vec<String>> {
        let container = self.config.root.join(app_id);
        let start = self.host_path(remote_path, app_id)?;

        let metadata = match tokio::fs::metadata(&start).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        if metadata.is_file() {
            files.push(start);
        } else {
            let mut pending = vec![start];
            while let Some(dir) = pending.pop() {
                let mut entries = tokio::fs::read_dir(&dir).await.with_context(|| {
                    format!("[{}] Failed to list {}", self.config.id, dir.display())
                })?;
                while let Some(entry) = entries.next_entry().await? {
                    if entry.file_type().await?.is_dir() {
                        pending.push(entry.path());
                    } else {
                        files.push(entry.path());
                    }
                }
            }
        }

        let mut listed: Vec<String> = files
            .iter()
            .filter_map(|p| p.strip_prefix(&container).ok())
            .map(|p| {
                p.components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .collect();
        listed.sort();
        Ok(listed)
    }

    async fn restart_application(&self, options: &RestartOptions) -> Result<()> {
        let command = self.config.restart_command.as_deref().ok_or_else(|| {
            Error::restart(format!(
                "device {} has no restart command configured",
                self.config.id
            ))
        })?;

        info!(
            "[{}] Restarting {} (wait_for_debugger={})",
            self.config.id, options.app_id, options.wait_for_debugger
        );

        let status = Self::restart_shell(command)
            .current_dir(&options.project_dir)
            .env("LIVESYNC_APP_ID", &options.app_id)
            .env("LIVESYNC_PROJECT_NAME", &options.project_name)
            .env(
                "LIVESYNC_WAIT_FOR_DEBUGGER",
                if options.wait_for_debugger { "1" } else { "0" },
            )
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| Error::restart(format!("failed to run restart command: {e}")))?;

        if status.success() {
            Ok(())
        } else {
            Err(Error::restart(format!(
                "restart command exited with {:?}",
                status.code()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::net::TcpListener;

    fn config(root: &Path) -> SandboxDeviceConfig {
        SandboxDeviceConfig {
            id: "sim-1".to_string(),
            name: Some("iPhone Sandbox".to_string()),
            platform: Platform::Ios,
            root: root.to_path_buf(),
            debug_addr: None,
            restart_command: None,
            app_dir: default_app_dir(),
        }
    }

    #[test]
    fn test_display_name() {
        let device = SandboxDevice::new(config(Path::new("/tmp")));
        assert_eq!(device.display_name(), "iPhone Sandbox (iOS)");
    }

    #[test]
    fn test_config_deserialize_defaults() {
        let parsed: SandboxDeviceConfig = serde_json::from_value(serde_json::json!({
            "id": "sim-1",
            "platform": "ios",
            "root": "/tmp/sim",
        }))
        .unwrap();

        assert_eq!(parsed.app_dir, "app");
        assert!(parsed.name.is_none());
        assert!(parsed.debug_addr.is_none());
        assert!(parsed.restart_command.is_none());
    }

    #[test]
    fn test_host_path_rejects_parent_components() {
        let device = SandboxDevice::new(config(Path::new("/tmp/sim")));
        assert!(device.host_path("../escape.css", "org.example").is_err());
        assert_eq!(
            device.host_path("app/app.css", "org.example").unwrap(),
            PathBuf::from("/tmp/sim/org.example/app/app.css")
        );
    }

    #[tokio::test]
    async fn test_push_list_delete() {
        let temp = tempdir().unwrap();
        let local = temp.path().join("app.css");
        std::fs::write(&local, "body {}").unwrap();

        let device = SandboxDevice::new(config(&temp.path().join("device")));
        device
            .push_file(&local, "app/styles/app.css", "org.example")
            .await
            .unwrap();
        device
            .push_file(&local, "app/main.xml", "org.example")
            .await
            .unwrap();

        let listed = device.list_files("app", "org.example").await.unwrap();
        assert_eq!(listed, vec!["app/main.xml", "app/styles/app.css"]);

        device
            .delete_file("app/main.xml", "org.example")
            .await
            .unwrap();
        let listed = device.list_files("app", "org.example").await.unwrap();
        assert_eq!(listed, vec!["app/styles/app.css"]);
    }

    #[tokio::test]
    async fn test_delete_missing_file_is_ok() {
        let temp = tempdir().unwrap();
        let device = SandboxDevice::new(config(temp.path()));
        assert!(device.delete_file("app/none.css", "org.example").await.is_ok());
    }

    #[tokio::test]
    async fn test_list_missing_directory_is_empty() {
        let temp = tempdir().unwrap();
        let device = SandboxDevice::new(config(temp.path()));
        assert!(device
            .list_files("app", "org.example")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_acquire_without_endpoint_fails() {
        let device = SandboxDevice::new(config(Path::new("/tmp/sim")));
        let err = device
            .acquire_debug_socket("org.example", "demo", Path::new("."), true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConnectionUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_acquire_connects_to_debug_endpoint() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut cfg = config(Path::new("/tmp/sim"));
        cfg.debug_addr = Some(addr.to_string());
        let device = SandboxDevice::new(cfg);

        let (socket, accepted) = tokio::join!(
            device.acquire_debug_socket("org.example", "demo", Path::new("."), true),
            listener.accept()
        );
        assert!(socket.is_ok());
        assert!(accepted.is_ok());
    }

    /// Address of a port nothing listens on
    async fn free_addr() -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_acquire_starts_app_when_unreachable() {
        let temp = tempdir().unwrap();
        let addr = free_addr().await;

        let mut cfg = config(temp.path());
        cfg.debug_addr = Some(addr.to_string());
        cfg.restart_command = Some("echo \"$LIVESYNC_PROJECT_NAME\" > started".to_string());
        let device = SandboxDevice::new(cfg);

        // Plays the app: opens the debug port once the start command ran
        let marker = temp.path().join("started");
        let app = tokio::spawn(async move {
            while !marker.exists() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            let listener = TcpListener::bind(addr).await.unwrap();
            listener.accept().await.unwrap();
        });

        let socket = device
            .acquire_debug_socket("org.example", "demo", temp.path(), true)
            .await;
        assert!(socket.is_ok());
        tokio::time::timeout(Duration::from_secs(5), app)
            .await
            .unwrap()
            .unwrap();

        let started = std::fs::read_to_string(temp.path().join("started")).unwrap();
        assert_eq!(started.trim(), "demo");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_acquire_does_not_start_app_unless_asked() {
        let temp = tempdir().unwrap();
        let addr = free_addr().await;

        let mut cfg = config(temp.path());
        cfg.debug_addr = Some(addr.to_string());
        cfg.restart_command = Some("touch started".to_string());
        let device = SandboxDevice::new(cfg);

        let err = device
            .acquire_debug_socket("org.example", "demo", temp.path(), false)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ConnectionUnavailable { .. }));
        assert!(!temp.path().join("started").exists());
    }

    #[tokio::test]
    async fn test_restart_without_command_fails() {
        let device = SandboxDevice::new(config(Path::new("/tmp/sim")));
        let err = device
            .restart_application(&RestartOptions {
                app_id: "org.example".to_string(),
                project_name: "demo".to_string(),
                project_dir: PathBuf::from("."),
                wait_for_debugger: false,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Restart { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_restart_runs_command_with_app_env() {
        let temp = tempdir().unwrap();
        let marker = temp.path().join("restarted");

        let mut cfg = config(temp.path());
        cfg.restart_command = Some(format!(
            "echo \"$LIVESYNC_APP_ID $LIVESYNC_WAIT_FOR_DEBUGGER\" > {}",
            marker.display()
        ));
        let device = SandboxDevice::new(cfg);

        device
            .restart_application(&RestartOptions {
                app_id: "org.example".to_string(),
                project_name: "demo".to_string(),
                project_dir: temp.path().to_path_buf(),
                wait_for_debugger: true,
            })
            .await
            .unwrap();

        let written = std::fs::read_to_string(&marker).unwrap();
        assert_eq!(written.trim(), "org.example 1");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_restart_reports_failing_command() {
        let temp = tempdir().unwrap();
        let mut cfg = config(temp.path());
        cfg.restart_command = Some("exit 3".to_string());
        let device = SandboxDevice::new(cfg);

        let err = device
            .restart_application(&RestartOptions {
                app_id: "org.example".to_string(),
                project_name: "demo".to_string(),
                project_dir: temp.path().to_path_buf(),
                wait_for_debugger: false,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Some(3)"));
    }
}

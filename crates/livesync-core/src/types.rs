//! Domain types shared by the device layer and the sync engine

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Target mobile platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
}

impl Platform {
    /// Lowercase identifier used in config files and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::Android => "android",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Ios => write!(f, "iOS"),
            Platform::Android => write!(f, "Android"),
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ios" => Ok(Platform::Ios),
            "android" => Ok(Platform::Android),
            other => Err(Error::config_invalid(format!("unknown platform '{other}'"))),
        }
    }
}

/// The project being synced, as the device layer needs to see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInfo {
    /// Project (and application) name
    pub name: String,
    /// Project root on the development machine
    pub dir: PathBuf,
    /// Application identifier (bundle id / package name)
    pub app_id: String,
}

/// Identifies the application a sync cycle targets on one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceAppData {
    pub device_id: String,
    pub platform: Platform,
    pub app_id: String,
    /// Root of the synced application files on the device filesystem
    pub device_project_root: String,
}

/// A changed project file paired with its resolved location on the device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalToDeviceFile {
    local_path: PathBuf,
    relative_path: String,
    device_path: String,
}

impl LocalToDeviceFile {
    /// Pair `local_path` with its device location.
    ///
    /// The part of `local_path` below `local_root` is appended to `device_root`
    /// with `/` separators regardless of the host platform.
    pub fn resolve(local_path: &Path, local_root: &Path, device_root: &str) -> Result<Self> {
        let relative = local_path.strip_prefix(local_root).map_err(|_| {
            Error::config(format!(
                "{} is outside of the app directory {}",
                local_path.display(),
                local_root.display()
            ))
        })?;

        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
                Component::CurDir => {}
                _ => {
                    return Err(Error::config(format!(
                        "{} does not resolve inside the app directory",
                        local_path.display()
                    )))
                }
            }
        }

        if parts.is_empty() {
            return Err(Error::config(format!(
                "{} is the app directory itself, not a file",
                local_path.display()
            )));
        }

        let relative_path = parts.join("/");
        let root = device_root.trim_end_matches('/');
        let device_path = if root.is_empty() {
            relative_path.clone()
        } else {
            format!("{root}/{relative_path}")
        };

        Ok(Self {
            local_path: local_path.to_path_buf(),
            relative_path,
            device_path,
        })
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    /// Path relative to the app root, `/`-separated
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}

/// Caller-supplied overrides for one sync cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncFlags {
    /// Force a restart even if every change could be refreshed in place
    pub full_sync: bool,
    /// Restart and pause the app until a debugger attaches
    pub wait_for_debugger: bool,
}

/// Everything one device needs for one sync cycle.
#[derive(Debug, Clone)]
pub struct SyncResultInfo {
    pub device_app_data: DeviceAppData,
    pub modified_files: Vec<LocalToDeviceFile>,
    pub is_full_sync: bool,
    pub wait_for_debugger: bool,
}

impl SyncResultInfo {
    pub fn new(
        device_app_data: DeviceAppData,
        modified_files: Vec<LocalToDeviceFile>,
        flags: SyncFlags,
    ) -> Self {
        Self {
            device_app_data,
            modified_files,
            is_full_sync: flags.full_sync,
            wait_for_debugger: flags.wait_for_debugger,
        }
    }
}

//! Configuration types for LiveSync
//!
//! Defines:
//! - `Settings` - Everything in `.livesync/config.toml`
//! - `ProjectSettings` - App identity and local app directory
//! - `LiveSyncSettings` - Classification patterns, refresh platforms, timeouts

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use livesync_core::prelude::*;
use livesync_core::{Platform, ProjectInfo};
use livesync_device::{ChannelSettings, SandboxDeviceConfig};

/// Application settings (.livesync/config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub project: ProjectSettings,

    #[serde(default)]
    pub livesync: LiveSyncSettings,

    /// Directory-backed devices available to sync to
    #[serde(default)]
    pub devices: Vec<SandboxDeviceConfig>,
}

/// Project identity
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProjectSettings {
    /// Project name (defaults to the project directory name)
    #[serde(default)]
    pub name: Option<String>,

    /// Application identifier, e.g. "org.example.demo"
    #[serde(default)]
    pub app_id: Option<String>,

    /// Directory (relative to the project root) whose files are synced
    #[serde(default = "default_app_dir")]
    pub app_dir: String,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            name: None,
            app_id: None,
            app_dir: default_app_dir(),
        }
    }
}

impl ProjectSettings {
    /// Resolve the project against its root directory.
    pub fn resolve(&self, project_dir: &Path) -> Result<ProjectInfo> {
        let app_id = self
            .app_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| Error::config_invalid("project.app_id is not set"))?;

        let name = self.name.clone().unwrap_or_else(|| {
            project_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| app_id.clone())
        });

        Ok(ProjectInfo {
            name,
            dir: project_dir.to_path_buf(),
            app_id,
        })
    }

    /// Local directory holding the synced files
    pub fn local_app_dir(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.app_dir)
    }
}

fn default_app_dir() -> String {
    "app".to_string()
}

/// Sync policy settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LiveSyncSettings {
    /// Globs (matched case-insensitively against device paths) that force a restart
    #[serde(default = "default_excluded_patterns")]
    pub excluded_patterns: Vec<String>,

    /// Extension of script files, which always force a restart
    #[serde(default = "default_script_extension")]
    pub script_extension: String,

    /// Platforms whose apps accept in-place reloads
    #[serde(default = "default_refresh_platforms")]
    pub refresh_platforms: Vec<Platform>,

    /// Bound on opening the debug socket
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// How long an errored debug socket may linger before it counts as closed
    #[serde(default = "default_close_grace_ms")]
    pub close_grace_ms: u64,
}

impl Default for LiveSyncSettings {
    fn default() -> Self {
        Self {
            excluded_patterns: default_excluded_patterns(),
            script_extension: default_script_extension(),
            refresh_platforms: default_refresh_platforms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            close_grace_ms: default_close_grace_ms(),
        }
    }
}

impl LiveSyncSettings {
    pub fn channel_settings(&self) -> ChannelSettings {
        ChannelSettings {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            close_grace: Duration::from_millis(self.close_grace_ms),
        }
    }
}

fn default_excluded_patterns() -> Vec<String> {
    vec!["**/*.js.map".to_string(), "**/*.ts".to_string()]
}

fn default_script_extension() -> String {
    ".js".to_string()
}

fn default_refresh_platforms() -> Vec<Platform> {
    vec![Platform::Ios]
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_close_grace_ms() -> u64 {
    2_000
}

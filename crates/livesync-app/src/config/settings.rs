//! Settings parser for .livesync/config.toml

use super::types::Settings;
use livesync_core::prelude::*;
use std::path::Path;

const CONFIG_FILENAME: &str = "config.toml";
const LIVESYNC_DIR: &str = ".livesync";

/// Load settings from .livesync/config.toml
///
/// Returns default settings if file doesn't exist or can't be parsed.
pub fn load_settings(project_path: &Path) -> Settings {
    let config_path = project_path.join(LIVESYNC_DIR).join(CONFIG_FILENAME);

    if !config_path.exists() {
        debug!("No config file at {:?}, using defaults", config_path);
        return Settings::default();
    }

    match std::fs::read_to_string(&config_path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(settings) => {
                debug!("Loaded settings from {:?}", config_path);
                settings
            }
            Err(e) => {
                warn!("Failed to parse {:?}: {}", config_path, e);
                Settings::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {:?}: {}", config_path, e);
            Settings::default()
        }
    }
}

/// Create the default config file in .livesync/ directory
///
/// Leaves an existing config.toml untouched.
pub fn init_config_dir(project_path: &Path) -> Result<()> {
    let livesync_dir = project_path.join(LIVESYNC_DIR);

    if !livesync_dir.exists() {
        std::fs::create_dir_all(&livesync_dir)
            .map_err(|e| Error::config(format!("Failed to create .livesync dir: {}", e)))?;
        info!("Created .livesync directory");
    }

    let config_path = livesync_dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        std::fs::write(&config_path, generate_default_config())
            .map_err(|e| Error::config(format!("Failed to write config.toml: {}", e)))?;
        info!("Created default config.toml");
    }

    Ok(())
}

fn generate_default_config() -> String {
    r#"# LiveSync Configuration

[project]
# name = "demo"                 # Defaults to the project directory name
app_id = ""                     # Application identifier, e.g. "org.example.demo"
app_dir = "app"                 # Directory whose files are synced to devices

[livesync]
# Device paths matching these globs (case-insensitive) always restart the app
excluded_patterns = ["**/*.js.map", "**/*.ts"]
script_extension = ".js"        # Script changes always restart the app
refresh_platforms = ["ios"]     # Platforms that accept in-place reloads
connect_timeout_ms = 10000      # Bound on opening the debug socket
close_grace_ms = 2000           # Errored sockets count as closed after this

# Directory-backed devices
# [[devices]]
# id = "sim-1"
# name = "iPhone Sandbox"
# platform = "ios"
# root = "/path/to/app/containers"
# debug_addr = "127.0.0.1:18183"
# restart_command = "./scripts/restart-app.sh"
# app_dir = "app"
"#
    .to_string()
}

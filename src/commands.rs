//! Command implementations for the `livesync` binary

use std::path::{Path, PathBuf};
use std::sync::Arc;

use color_eyre::eyre::{bail, Result};

use livesync_app::config::{init_config_dir, load_settings};
use livesync_app::device_commands::{self, select_devices};
use livesync_app::{ChangeSet, Settings, SyncOrchestrator, SyncPolicy};
use livesync_core::prelude::*;
use livesync_core::SyncFlags;
use livesync_device::SandboxDevice;

/// Arguments of `livesync sync`
#[derive(Debug)]
pub struct SyncRequest {
    pub devices: Vec<String>,
    pub flags: SyncFlags,
    pub modified: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
}

fn configured_devices(settings: &Settings) -> Vec<Arc<SandboxDevice>> {
    settings
        .devices
        .iter()
        .cloned()
        .map(|config| Arc::new(SandboxDevice::new(config)))
        .collect()
}

/// Run one sync cycle and print the JSON report.
pub async fn sync(project_dir: &Path, request: SyncRequest) -> Result<()> {
    let settings = load_settings(project_dir);
    let project = settings.project.resolve(project_dir)?;
    let policy = SyncPolicy::from_settings(&settings.livesync)?;
    let devices = select_devices(&configured_devices(&settings), &request.devices)?;

    let orchestrator = SyncOrchestrator::new(
        project,
        settings.project.local_app_dir(project_dir),
        policy,
    );
    let changes = ChangeSet {
        modified: request.modified,
        removed: request.removed,
    };

    let report = orchestrator.run(&devices, &changes, request.flags).await;
    orchestrator.shutdown().await;

    println!("{}", report.to_json()?);

    let failed = report.failed_devices();
    if !failed.is_empty() {
        bail!("sync failed on {}", failed.join(", "));
    }
    Ok(())
}

fn resolve_app_id(settings: &Settings, app_id: Option<String>) -> Result<String> {
    match app_id.or_else(|| settings.project.app_id.clone()) {
        Some(id) if !id.trim().is_empty() => Ok(id),
        _ => bail!("no APP_ID given and project.app_id is not set"),
    }
}

/// `livesync device list-files`
pub async fn list_files(
    project_dir: &Path,
    path: &str,
    app_id: Option<String>,
    device_ids: &[String],
) -> Result<()> {
    let settings = load_settings(project_dir);
    let app_id = resolve_app_id(&settings, app_id)?;
    let devices = select_devices(&configured_devices(&settings), device_ids)?;

    let results = device_commands::list_files(&devices, path, &app_id).await;

    let mut failed = Vec::new();
    for entry in results {
        match entry.result {
            Ok(files) => {
                println!("{}:", entry.device_id);
                for file in files {
                    println!("  {file}");
                }
            }
            Err(e) => {
                eprintln!("{}: {}", entry.device_id, e);
                failed.push(entry.device_id);
            }
        }
    }

    if !failed.is_empty() {
        bail!("listing failed on {}", failed.join(", "));
    }
    Ok(())
}

/// `livesync device put-file`
pub async fn put_file(
    project_dir: &Path,
    local: &Path,
    remote: &str,
    app_id: Option<String>,
    device_ids: &[String],
) -> Result<()> {
    let settings = load_settings(project_dir);
    let app_id = resolve_app_id(&settings, app_id)?;
    let devices = select_devices(&configured_devices(&settings), device_ids)?;

    let results = device_commands::put_file(&devices, local, remote, &app_id).await;

    let mut failed = Vec::new();
    for entry in results {
        match entry.result {
            Ok(()) => println!("{}: {}", entry.device_id, remote),
            Err(e) => {
                eprintln!("{}: {}", entry.device_id, e);
                failed.push(entry.device_id);
            }
        }
    }

    if !failed.is_empty() {
        bail!("put-file failed on {}", failed.join(", "));
    }
    Ok(())
}

/// `livesync devices`
pub fn list_devices(project_dir: &Path) -> Result<()> {
    let settings = load_settings(project_dir);
    let devices = configured_devices(&settings);

    if devices.is_empty() {
        eprintln!("No devices configured in .livesync/config.toml");
        return Ok(());
    }

    for device in devices {
        println!("{}\t{}", device.config().id, device.display_name());
    }
    Ok(())
}

/// `livesync init`
pub fn init(project_dir: &Path) -> Result<()> {
    init_config_dir(project_dir)?;
    info!("Initialized {}", project_dir.display());
    println!(
        "Created {}",
        project_dir.join(".livesync").join("config.toml").display()
    );
    Ok(())
}

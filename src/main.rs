//! LiveSync - push project changes to running mobile apps
//!
//! This is the binary entry point. All logic lives in the workspace crates.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use livesync_core::prelude::*;
use livesync_core::SyncFlags;

/// LiveSync - push project changes to running mobile apps
#[derive(Parser, Debug)]
#[command(name = "livesync")]
#[command(about = "Push project changes to running mobile apps without reinstalling", long_about = None)]
struct Args {
    /// Project directory (defaults to the current directory)
    #[arg(long, short = 'C', global = true, value_name = "DIR")]
    project: Option<PathBuf>,

    /// Mirror log output to stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sync changed files to devices, reloading or restarting the app
    Sync {
        /// Only sync to this device (repeatable, default: all configured devices)
        #[arg(long = "device", value_name = "ID")]
        devices: Vec<String>,

        /// Always restart the app
        #[arg(long)]
        full_sync: bool,

        /// Restart the app and wait for a debugger to attach
        #[arg(long)]
        wait_for_debugger: bool,

        /// File deleted locally (repeatable)
        #[arg(long = "removed", value_name = "PATH")]
        removed: Vec<PathBuf>,

        /// Added or modified files
        #[arg(value_name = "FILES")]
        files: Vec<PathBuf>,
    },

    /// Device file operations
    Device {
        #[command(subcommand)]
        command: DeviceCommand,
    },

    /// List configured devices
    Devices,

    /// Create .livesync/config.toml
    Init,
}

#[derive(Subcommand, Debug)]
enum DeviceCommand {
    /// List files below a device path
    ListFiles {
        #[arg(value_name = "PATH")]
        path: String,

        /// Application identifier (default: project.app_id)
        #[arg(value_name = "APP_ID")]
        app_id: Option<String>,

        #[arg(long = "device", value_name = "ID")]
        devices: Vec<String>,
    },

    /// Push one file to a device path
    PutFile {
        #[arg(value_name = "LOCAL")]
        local: PathBuf,

        #[arg(value_name = "REMOTE")]
        remote: String,

        /// Application identifier (default: project.app_id)
        #[arg(value_name = "APP_ID")]
        app_id: Option<String>,

        #[arg(long = "device", value_name = "ID")]
        devices: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    // Log to file; stdout carries command output
    livesync_core::logging::init(args.verbose)?;

    let cwd = std::env::current_dir()?;
    let project_dir = match args.project {
        Some(dir) if dir.is_absolute() => dir,
        Some(dir) => cwd.join(dir),
        None => cwd.clone(),
    };

    info!("Project: {}", project_dir.display());

    let result = match args.command {
        Command::Sync {
            devices,
            full_sync,
            wait_for_debugger,
            removed,
            files,
        } => {
            let absolute = |p: PathBuf| if p.is_absolute() { p } else { cwd.join(p) };
            let request = commands::SyncRequest {
                devices,
                flags: SyncFlags {
                    full_sync,
                    wait_for_debugger,
                },
                modified: files.into_iter().map(absolute).collect(),
                removed: removed.into_iter().map(absolute).collect(),
            };
            commands::sync(&project_dir, request).await
        }
        Command::Device { command } => match command {
            DeviceCommand::ListFiles {
                path,
                app_id,
                devices,
            } => commands::list_files(&project_dir, &path, app_id, &devices).await,
            DeviceCommand::PutFile {
                local,
                remote,
                app_id,
                devices,
            } => {
                let local = if local.is_absolute() {
                    local
                } else {
                    cwd.join(local)
                };
                commands::put_file(&project_dir, &local, &remote, app_id, &devices).await
            }
        },
        Command::Devices => commands::list_devices(&project_dir),
        Command::Init => commands::init(&project_dir),
    };

    if let Err(ref e) = result {
        error!("Command failed: {:?}", e);
        eprintln!(
            "Logs: {}",
            livesync_core::logging::log_directory().display()
        );
    }

    info!("LiveSync exiting");
    result
}

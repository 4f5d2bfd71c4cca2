//! # livesync-app - Sync Engine
//!
//! Decides per device whether changed files can be reloaded into the running
//! app or need a restart, and drives many devices at once.
//!
//! Depends on [`livesync_core`] and [`livesync_device`].
//!
//! ## Public API
//!
//! ### Orchestration
//! - [`SyncOrchestrator`] - Concurrent sync cycles across devices
//! - [`ChangeSet`] - Modified and removed local files
//! - [`SyncReport`], [`DeviceSyncResult`], [`SyncOutcome`] - Per-device results
//!
//! ### Per-Device Policy
//! - [`DeviceSyncStrategy`] - Restart-vs-refresh decision, file push/removal
//! - [`RestartReason`] - Why a restart happened
//! - [`ChangeClassifier`] - Exclusion globs and script extension
//! - [`SyncPolicy`] - Settings shared by every strategy
//!
//! ### Configuration
//! - [`config::load_settings()`] / [`config::init_config_dir()`] - `.livesync/config.toml`

pub mod classify;
pub mod config;
pub mod device_commands;
pub mod file_ops;
pub mod orchestrator;
pub mod policy;
pub mod report;
pub mod strategy;

// Public API re-exports
pub use classify::{ChangeClassification, ChangeClassifier};
pub use config::{LiveSyncSettings, ProjectSettings, Settings};
pub use orchestrator::{ChangeSet, SyncOrchestrator};
pub use policy::SyncPolicy;
pub use report::{DeviceSyncResult, SyncOutcome, SyncReport};
pub use strategy::{DeviceSyncStrategy, RestartReason};

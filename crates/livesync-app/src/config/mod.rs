//! Configuration file parsing for LiveSync
//!
//! Supports:
//! - `.livesync/config.toml` - Project identity, sync policy and devices

pub mod settings;
pub mod types;

pub use settings::{init_config_dir, load_settings};
pub use types::*;

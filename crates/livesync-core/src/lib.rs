//! # livesync-core - Core Domain Types
//!
//! Foundation crate for LiveSync. Provides domain types, error handling and
//! logging setup.
//!
//! This crate has **zero internal dependencies** -- it only depends on external
//! crates (serde, thiserror, tracing).
//!
//! ## Public API
//!
//! ### Domain Types (`types`)
//! - [`LocalToDeviceFile`] - A changed project file and its resolved device path
//! - [`DeviceAppData`] - Device, platform, app id and device-side app root
//! - [`SyncResultInfo`] - Per-device, per-cycle sync input
//! - [`SyncFlags`] - Caller overrides (full sync, wait for debugger)
//! - [`ProjectInfo`] - Project name, directory and app id
//! - [`Platform`] - iOS or Android
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Custom error enum with `fatal` vs `recoverable` classification
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - Extension trait for adding error context
//! - [`FileOpFailure`] - One failed entry of an aggregated file operation
//!
//! ## Prelude
//!
//! Import commonly used types with:
//! ```rust
//! use livesync_core::prelude::*;
//! ```

pub mod error;
pub mod logging;
pub mod prelude;
pub mod types;

// Re-export commonly used types at crate root for convenience
pub use error::{Error, FileOpFailure, Result, ResultExt};
pub use types::{
    DeviceAppData, LocalToDeviceFile, Platform, ProjectInfo, SyncFlags, SyncResultInfo,
};

//! # livesync-device - Device Capabilities and Debug Channel
//!
//! Everything LiveSync needs from a connected device, and the reload protocol
//! spoken to the app running on it.
//!
//! Depends on [`livesync_core`] for domain types and error handling.
//!
//! ## Public API
//!
//! ### Device Contract
//! - [`DeviceCapabilities`] - File push/delete/list, app restart, debug socket acquisition
//! - [`RestartOptions`] - Arguments for an application restart
//!
//! ### Debug Channel
//! - [`DebugChannel`] - Lazily connected, single-owner reload channel per (device, app)
//! - [`ConnectionState`] - Connected / errored / closed, published by the socket listener
//! - [`ChannelSettings`] - Connect timeout and close grace period
//!
//! ### Wire Protocol
//! - [`DebugCommand`] - Commands sent to the app (`Page.reload`)
//! - [`encode_frame()`] / [`read_frame()`] - Length-prefixed UTF-16LE framing
//! - [`next_reload_id()`] - Process-wide reload message counter
//!
//! ### Sandbox Device
//! - [`SandboxDevice`] - Directory-backed device with a TCP debug endpoint

pub mod capabilities;
pub mod channel;
pub mod protocol;
pub mod sandbox;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;

// Public API re-exports
pub use capabilities::{DeviceCapabilities, RestartOptions};
pub use channel::{
    ChannelSettings, ConnectionState, DebugChannel, DEFAULT_CLOSE_GRACE, DEFAULT_CONNECT_TIMEOUT,
};
pub use protocol::{
    decode_payload, encode_frame, next_reload_id, read_frame, DebugCommand, DebugMessage,
    PAGE_RELOAD_METHOD,
};
pub use sandbox::{SandboxDevice, SandboxDeviceConfig, DEFAULT_DEVICE_APP_DIR};

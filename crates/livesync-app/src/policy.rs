//! Sync policy shared by every device strategy

use livesync_core::prelude::*;
use livesync_core::Platform;
use livesync_device::ChannelSettings;

use crate::classify::ChangeClassifier;
use crate::config::LiveSyncSettings;

/// Decision inputs that do not vary per device.
#[derive(Debug, Clone)]
pub struct SyncPolicy {
    pub classifier: ChangeClassifier,
    /// Platforms whose apps can reload in place
    pub refresh_platforms: Vec<Platform>,
    pub channel: ChannelSettings,
}

impl SyncPolicy {
    pub fn from_settings(settings: &LiveSyncSettings) -> Result<Self> {
        Ok(Self {
            classifier: ChangeClassifier::new(
                &settings.excluded_patterns,
                &settings.script_extension,
            )?,
            refresh_platforms: settings.refresh_platforms.clone(),
            channel: settings.channel_settings(),
        })
    }

    pub fn supports_refresh(&self, platform: Platform) -> bool {
        self.refresh_platforms.contains(&platform)
    }
}

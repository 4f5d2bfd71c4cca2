//! Per-device results of one sync cycle

use std::collections::BTreeMap;

use chrono::{DateTime, Local};
use serde::Serialize;

use livesync_core::prelude::*;
use livesync_core::Platform;

use crate::strategy::RestartReason;

/// What happened on one device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Nothing changed and nothing was requested
    UpToDate,
    /// The running app reloaded in place
    Refreshed {
        /// Device paths announced in the reload
        files: Vec<String>,
    },
    /// The app was restarted
    Restarted { reason: RestartReason },
    /// The cycle ended with an error on this device
    Failed {
        error: String,
        /// Set when the error came from the restart itself
        #[serde(skip_serializing_if = "Option::is_none")]
        restart_reason: Option<RestartReason>,
    },
}

impl SyncOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, SyncOutcome::Failed { .. })
    }

    pub fn is_restart(&self) -> bool {
        matches!(self, SyncOutcome::Restarted { .. })
    }

    pub fn is_refresh(&self) -> bool {
        matches!(self, SyncOutcome::Refreshed { .. })
    }
}

/// One device's line in the [`SyncReport`]
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSyncResult {
    pub device_id: String,
    pub platform: Platform,
    #[serde(flatten)]
    pub outcome: SyncOutcome,
    pub duration_ms: u64,
    pub finished_at: DateTime<Local>,
}

/// Outcome of a sync cycle, keyed by device id.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub devices: BTreeMap<String, DeviceSyncResult>,
}

impl SyncReport {
    pub fn insert(&mut self, result: DeviceSyncResult) {
        self.devices.insert(result.device_id.clone(), result);
    }

    pub fn get(&self, device_id: &str) -> Option<&DeviceSyncResult> {
        self.devices.get(device_id)
    }

    pub fn outcome(&self, device_id: &str) -> Option<&SyncOutcome> {
        self.get(device_id).map(|r| &r.outcome)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceSyncResult> {
        self.devices.values()
    }

    pub fn has_failures(&self) -> bool {
        self.iter().any(|r| r.outcome.is_failed())
    }

    /// Ids of devices whose cycle failed
    pub fn failed_devices(&self) -> Vec<&str> {
        self.iter()
            .filter(|r| r.outcome.is_failed())
            .map(|r| r.device_id.as_str())
            .collect()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

//! One-off device file commands and device selection

use std::path::Path;
use std::sync::Arc;

use futures_util::future::join_all;

use livesync_core::prelude::*;
use livesync_device::DeviceCapabilities;

/// Result of a command on one device
#[derive(Debug)]
pub struct DeviceCommandResult<T> {
    pub device_id: String,
    pub result: Result<T>,
}

/// Pick the devices named in `ids`, or every device when `ids` is empty.
pub fn select_devices<D: DeviceCapabilities>(
    available: &[Arc<D>],
    ids: &[String],
) -> Result<Vec<Arc<D>>> {
    if available.is_empty() {
        return Err(Error::NoDevices);
    }
    if ids.is_empty() {
        return Ok(available.to_vec());
    }

    ids.iter()
        .map(|id| {
            available
                .iter()
                .find(|d| d.id() == id.as_str())
                .cloned()
                .ok_or_else(|| Error::device_not_found(id.clone()))
        })
        .collect()
}

/// List files below `remote_path` on every device.
pub async fn list_files<D: DeviceCapabilities>(
    devices: &[Arc<D>],
    remote_path: &str,
    app_id: &str,
) -> Vec<DeviceCommandResult<Vec<String>>> {
    join_all(devices.iter().map(|device| async move {
        let result = device.list_files(remote_path, app_id).await;
        if let Err(e) = &result {
            warn!("[{}] Listing {} failed: {}", device.id(), remote_path, e);
        }
        DeviceCommandResult {
            device_id: device.id().to_string(),
            result,
        }
    }))
    .await
}

/// Push one file to every device.
pub async fn put_file<D: DeviceCapabilities>(
    devices: &[Arc<D>],
    local_path: &Path,
    remote_path: &str,
    app_id: &str,
) -> Vec<DeviceCommandResult<()>> {
    join_all(devices.iter().map(|device| async move {
        let result = device.push_file(local_path, remote_path, app_id).await;
        match &result {
            Ok(()) => info!("[{}] Pushed {}", device.id(), remote_path),
            Err(e) => warn!("[{}] Pushing {} failed: {}", device.id(), remote_path, e),
        }
        DeviceCommandResult {
            device_id: device.id().to_string(),
            result,
        }
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use livesync_device::test_utils::{test_device, FakeDevice};

    fn devices() -> Vec<Arc<FakeDevice>> {
        vec![Arc::new(test_device("a")), Arc::new(test_device("b"))]
    }

    #[test]
    fn test_select_all_when_no_ids() {
        let selected = select_devices(&devices(), &[]).unwrap();
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn test_select_by_id() {
        let selected = select_devices(&devices(), &["b".to_string()]).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id(), "b");
    }

    #[test]
    fn test_select_unknown_id() {
        let err = select_devices(&devices(), &["zzz".to_string()]).unwrap_err();
        assert!(matches!(err, Error::DeviceNotFound { .. }));
    }

    #[test]
    fn test_select_without_devices() {
        let err = select_devices::<FakeDevice>(&[], &[]).unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_put_file_reports_per_device() {
        let devices = devices();
        devices[1].fail_path("app/app.css");

        let results = put_file(&devices, Path::new("/p/app/app.css"), "app/app.css", "org.x").await;

        assert_eq!(results.len(), 2);
        assert!(results[0].result.is_ok());
        assert!(results[1].result.is_err());
        assert_eq!(devices[0].pushed_files()[0].1, "app/app.css");
    }

    #[tokio::test]
    async fn test_list_files() {
        let devices = devices();
        devices[0].add_file("app/app.css");

        let results = list_files(&devices, "app", "org.x").await;

        assert_eq!(results[0].device_id, "a");
        assert_eq!(results[0].result.as_ref().unwrap(), &vec!["app/app.css".to_string()]);
        assert!(results[1].result.as_ref().unwrap().is_empty());
    }
}

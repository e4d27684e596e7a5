//! Device records

use crate::ids::{DeviceType, DeviceUuid, ReleaseId};
use serde::{Deserialize, Serialize};

/// A device as seen by the migration engine
///
/// `assigned_release` is the release pin and the single source of truth for
/// which release manages the device. It only ever changes through a
/// conditional patch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub uuid: DeviceUuid,
    pub device_type: DeviceType,
    /// Supervisor version the device reports running, e.g. `7.4.3`
    pub reported_version: Option<String>,
    /// Release pin, `None` when the device was never pinned
    pub assigned_release: Option<ReleaseId>,
    /// Owning user; only populated when the read expanded it
    pub owner: Option<DeviceOwner>,
    pub logs_channel: Option<String>,
}

/// The user a device belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceOwner {
    pub username: String,
}

impl Device {
    /// Create an unpinned device reporting `version`
    pub fn new(uuid: impl Into<DeviceUuid>, device_type: impl Into<DeviceType>, version: &str) -> Self {
        Self {
            uuid: uuid.into(),
            device_type: device_type.into(),
            reported_version: Some(version.to_string()),
            assigned_release: None,
            owner: None,
            logs_channel: None,
        }
    }

    pub fn with_assigned_release(mut self, release: ReleaseId) -> Self {
        self.assigned_release = Some(release);
        self
    }

    pub fn with_owner(mut self, username: impl Into<String>) -> Self {
        self.owner = Some(DeviceOwner {
            username: username.into(),
        });
        self
    }

    pub fn with_logs_channel(mut self, channel: impl Into<String>) -> Self {
        self.logs_channel = Some(channel.into());
        self
    }

    pub fn is_pinned(&self) -> bool {
        self.assigned_release.is_some()
    }

    pub fn owner_username(&self) -> Option<&str> {
        self.owner.as_ref().map(|o| o.username.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_fields() {
        let device = Device::new("d1", "rpi3", "7.4.3")
            .with_assigned_release(ReleaseId::new(3))
            .with_owner("alice")
            .with_logs_channel("abc");

        assert!(device.is_pinned());
        assert_eq!(device.owner_username(), Some("alice"));
        assert_eq!(device.logs_channel.as_deref(), Some("abc"));
    }

    #[test]
    fn test_new_device_is_unpinned() {
        let device = Device::new("d1", "rpi3", "7.4.3");
        assert!(!device.is_pinned());
        assert!(device.owner_username().is_none());
    }
}

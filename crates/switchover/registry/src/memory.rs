//! In-memory registry backend
//!
//! Suitable for tests and local rehearsals. Filters are evaluated with the
//! same [`Filter`] semantics the HTTP backend renders, and every patch is
//! recorded so callers can assert on what was written and by whom.

use crate::error::Result;
use crate::filter::Filter;
use crate::registry::{DeviceQuery, DeviceRegistry, PatchStatus};
use async_trait::async_trait;
use dashmap::DashMap;
use switchover_types::{Credential, Device, DeviceUuid, ReleaseId, SupervisorRelease};
use tokio::sync::Mutex;
use tracing::debug;

/// How the in-memory registry answers patches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PatchBehavior {
    /// Apply the patch to every matching device
    #[default]
    Apply,
    /// Refuse the patch with the given status
    Reject { status: u16 },
    /// Report success without changing anything, as if another writer
    /// raced the patch
    AcknowledgeOnly,
}

/// A patch the registry received
#[derive(Debug, Clone)]
pub struct PatchRecord {
    pub filter: Filter,
    pub release: ReleaseId,
    pub credential: Credential,
    /// Devices the patch changed
    pub applied_to: Vec<DeviceUuid>,
}

/// In-memory device registry
pub struct InMemoryRegistry {
    releases: DashMap<ReleaseId, SupervisorRelease>,
    devices: DashMap<DeviceUuid, Device>,
    patches: Mutex<Vec<PatchRecord>>,
    behavior: Mutex<PatchBehavior>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self {
            releases: DashMap::new(),
            devices: DashMap::new(),
            patches: Mutex::new(Vec::new()),
            behavior: Mutex::new(PatchBehavior::Apply),
        }
    }

    pub fn insert_release(&self, release: SupervisorRelease) {
        self.releases.insert(release.id, release);
    }

    pub fn insert_device(&self, device: Device) {
        self.devices.insert(device.uuid.clone(), device);
    }

    /// Current state of a device, owner included
    pub fn device(&self, uuid: &DeviceUuid) -> Option<Device> {
        self.devices.get(uuid).map(|d| d.clone())
    }

    pub async fn set_patch_behavior(&self, behavior: PatchBehavior) {
        *self.behavior.lock().await = behavior;
    }

    /// Every patch received so far, in order
    pub async fn patches(&self) -> Vec<PatchRecord> {
        self.patches.lock().await.clone()
    }
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceRegistry for InMemoryRegistry {
    async fn releases(&self, filter: &Filter) -> Result<Vec<SupervisorRelease>> {
        let mut result: Vec<SupervisorRelease> = self
            .releases
            .iter()
            .filter(|r| filter.matches(r.value()))
            .map(|r| r.value().clone())
            .collect();
        result.sort_by_key(|r| r.id);
        Ok(result)
    }

    async fn devices(&self, filter: &Filter, query: DeviceQuery) -> Result<Vec<Device>> {
        let mut result: Vec<Device> = self
            .devices
            .iter()
            .filter(|d| filter.matches(d.value()))
            .map(|d| {
                let mut device = d.value().clone();
                if !query.expand_owner {
                    device.owner = None;
                }
                device
            })
            .collect();
        result.sort_by(|a, b| a.uuid.cmp(&b.uuid));
        Ok(result)
    }

    async fn patch_devices(
        &self,
        filter: &Filter,
        release: ReleaseId,
        credential: &Credential,
    ) -> Result<PatchStatus> {
        let behavior = *self.behavior.lock().await;
        let mut applied_to = Vec::new();

        let status = match behavior {
            PatchBehavior::Apply => {
                for mut device in self.devices.iter_mut() {
                    if filter.matches(device.value()) {
                        device.assigned_release = Some(release);
                        applied_to.push(device.uuid.clone());
                    }
                }
                PatchStatus::Applied
            }
            PatchBehavior::Reject { status } => PatchStatus::Rejected { status },
            PatchBehavior::AcknowledgeOnly => PatchStatus::Applied,
        };

        debug!(filter = %filter, release = %release, applied = applied_to.len(), "In-memory patch");

        self.patches.lock().await.push(PatchRecord {
            filter: filter.clone(),
            release,
            credential: credential.clone(),
            applied_to,
        });

        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::fields;
    use switchover_types::{DeviceType, VersionTag};

    fn release(id: u64, device_type: &str, tag: &str) -> SupervisorRelease {
        SupervisorRelease {
            id: ReleaseId::new(id),
            device_type: DeviceType::new(device_type),
            version_tag: VersionTag::new(tag),
            is_public: true,
        }
    }

    #[tokio::test]
    async fn test_release_lookup_by_tag() {
        let registry = InMemoryRegistry::new();
        registry.insert_release(release(1, "rpi3", "v7.4.3"));
        registry.insert_release(release(2, "rpi4", "v7.4.3"));
        registry.insert_release(release(3, "rpi3", "v7.5.0"));

        let found = registry
            .releases(&Filter::eq(fields::SUPERVISOR_VERSION, "v7.4.3"))
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id, ReleaseId::new(1));
    }

    #[tokio::test]
    async fn test_owner_only_when_expanded() {
        let registry = InMemoryRegistry::new();
        registry.insert_device(Device::new("d1", "rpi3", "7.4.3").with_owner("alice"));

        let filter = Filter::eq(fields::UUID, "d1");
        let plain = registry.devices(&filter, DeviceQuery::default()).await.unwrap();
        assert!(plain[0].owner.is_none());

        let expanded = registry.devices(&filter, DeviceQuery::with_owner()).await.unwrap();
        assert_eq!(expanded[0].owner_username(), Some("alice"));
    }

    #[tokio::test]
    async fn test_patch_applies_only_to_matching_rows() {
        let registry = InMemoryRegistry::new();
        registry.insert_device(Device::new("d1", "rpi3", "7.4.3"));
        registry.insert_device(Device::new("d2", "rpi3", "7.4.3").with_assigned_release(ReleaseId::new(9)));

        let filter = Filter::eq(fields::ASSIGNED_RELEASE, None::<ReleaseId>);
        let status = registry
            .patch_devices(&filter, ReleaseId::new(3), &Credential::bearer("t"))
            .await
            .unwrap();

        assert!(status.is_applied());
        assert_eq!(
            registry.device(&DeviceUuid::new("d1")).unwrap().assigned_release,
            Some(ReleaseId::new(3))
        );
        assert_eq!(
            registry.device(&DeviceUuid::new("d2")).unwrap().assigned_release,
            Some(ReleaseId::new(9))
        );

        let patches = registry.patches().await;
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].applied_to, vec![DeviceUuid::new("d1")]);
    }

    #[tokio::test]
    async fn test_scripted_patch_behaviors() {
        let registry = InMemoryRegistry::new();
        registry.insert_device(Device::new("d1", "rpi3", "7.4.3"));
        let filter = Filter::eq(fields::UUID, "d1");
        let cred = Credential::bearer("t");

        registry
            .set_patch_behavior(PatchBehavior::Reject { status: 401 })
            .await;
        let status = registry
            .patch_devices(&filter, ReleaseId::new(3), &cred)
            .await
            .unwrap();
        assert_eq!(status, PatchStatus::Rejected { status: 401 });

        registry.set_patch_behavior(PatchBehavior::AcknowledgeOnly).await;
        let status = registry
            .patch_devices(&filter, ReleaseId::new(3), &cred)
            .await
            .unwrap();
        assert!(status.is_applied());
        assert!(registry
            .device(&DeviceUuid::new("d1"))
            .unwrap()
            .assigned_release
            .is_none());
    }

    #[tokio::test]
    async fn test_count_devices_default_impl() {
        let registry = InMemoryRegistry::new();
        registry.insert_device(Device::new("d1", "rpi3", "7.4.3"));
        registry.insert_device(Device::new("d2", "rpi3", "7.5.0"));

        let count = registry
            .count_devices(&Filter::eq(fields::SUPERVISOR_VERSION, "7.4.3"))
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}

//! Device registry trait

use crate::error::Result;
use crate::filter::Filter;
use async_trait::async_trait;
use switchover_types::{Credential, Device, ReleaseId, SupervisorRelease};

/// Options for device reads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceQuery {
    /// Expand the owning user so `Device::owner` is populated
    pub expand_owner: bool,
}

impl DeviceQuery {
    pub fn with_owner() -> Self {
        Self { expand_owner: true }
    }
}

/// Outcome of a conditional patch
///
/// The registry does not say how many rows a patch touched, so an `Applied`
/// patch that matched nothing is indistinguishable from one that matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchStatus {
    Applied,
    Rejected { status: u16 },
}

impl PatchStatus {
    pub fn is_applied(&self) -> bool {
        matches!(self, PatchStatus::Applied)
    }
}

/// Read and conditional-write access to the device registry
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    /// All supervisor releases matching `filter`
    async fn releases(&self, filter: &Filter) -> Result<Vec<SupervisorRelease>>;

    /// All devices matching `filter`
    async fn devices(&self, filter: &Filter, query: DeviceQuery) -> Result<Vec<Device>>;

    /// Number of devices matching `filter`
    async fn count_devices(&self, filter: &Filter) -> Result<usize> {
        Ok(self.devices(filter, DeviceQuery::default()).await?.len())
    }

    /// Pin every device currently matching `filter` to `release`
    ///
    /// The write is authorised with `credential`, which decides whose name
    /// the change is recorded under.
    async fn patch_devices(
        &self,
        filter: &Filter,
        release: ReleaseId,
        credential: &Credential,
    ) -> Result<PatchStatus>;
}

//! Release resolution
//!
//! Maps a version tag (and optionally a device type) to supervisor release
//! rows. Matching is exact on the tag string; there is no prefix or fuzzy
//! matching.

use crate::error::{MigrationError, Result};
use std::sync::Arc;
use switchover_registry::{fields, DeviceRegistry, Filter};
use switchover_types::{DeviceType, SupervisorRelease, VersionTag};
use tracing::debug;

pub(crate) const RELEASE_RESOURCE: &str = "supervisor_release";

/// Resolves version tags to supervisor releases
#[derive(Clone)]
pub struct ReleaseResolver {
    registry: Arc<dyn DeviceRegistry>,
}

impl ReleaseResolver {
    pub fn new(registry: Arc<dyn DeviceRegistry>) -> Self {
        Self { registry }
    }

    /// Filter selecting the releases built from `tag`
    pub fn release_filter(tag: &VersionTag, device_type: Option<&DeviceType>) -> Filter {
        let by_tag = Filter::eq(fields::SUPERVISOR_VERSION, tag);
        match device_type {
            Some(dt) => Filter::and([by_tag, Filter::eq(fields::DEVICE_TYPE, dt)]),
            None => by_tag,
        }
    }

    /// Every release built from `tag`, optionally for one device type
    pub async fn find_all(
        &self,
        tag: &VersionTag,
        device_type: Option<&DeviceType>,
    ) -> Result<Vec<SupervisorRelease>> {
        let filter = Self::release_filter(tag, device_type);
        let releases = self.registry.releases(&filter).await?;
        debug!(tag = %tag, matches = releases.len(), "Resolved release candidates");
        Ok(releases)
    }

    /// The single release built from `tag`
    ///
    /// Fails with `NotFound` on zero matches and `Ambiguous` on more than one.
    pub async fn resolve(
        &self,
        tag: &VersionTag,
        device_type: Option<&DeviceType>,
    ) -> Result<SupervisorRelease> {
        let filter = Self::release_filter(tag, device_type);
        let releases = self.registry.releases(&filter).await?;
        exactly_one(releases, RELEASE_RESOURCE, &filter)
    }
}

/// Collapse a read result to its single row
pub(crate) fn exactly_one<T>(mut rows: Vec<T>, resource: &'static str, filter: &Filter) -> Result<T> {
    match rows.len() {
        0 => Err(MigrationError::NotFound {
            resource,
            filter: filter.to_string(),
        }),
        1 => Ok(rows.remove(0)),
        count => Err(MigrationError::Ambiguous {
            resource,
            filter: filter.to_string(),
            count,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use switchover_registry::InMemoryRegistry;
    use switchover_types::ReleaseId;

    fn release(id: u64, device_type: &str, tag: &str) -> SupervisorRelease {
        SupervisorRelease {
            id: ReleaseId::new(id),
            device_type: DeviceType::new(device_type),
            version_tag: VersionTag::new(tag),
            is_public: true,
        }
    }

    fn resolver_with(releases: Vec<SupervisorRelease>) -> ReleaseResolver {
        let registry = InMemoryRegistry::new();
        for r in releases {
            registry.insert_release(r);
        }
        ReleaseResolver::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn test_resolve_unique_release() {
        let resolver = resolver_with(vec![
            release(1, "rpi3", "v7.4.3"),
            release(2, "rpi4", "v7.4.3"),
        ]);

        let found = resolver
            .resolve(&VersionTag::new("v7.4.3"), Some(&DeviceType::new("rpi3")))
            .await
            .unwrap();
        assert_eq!(found.id, ReleaseId::new(1));
    }

    #[tokio::test]
    async fn test_resolve_not_found() {
        let resolver = resolver_with(vec![release(1, "rpi3", "v7.4.3")]);

        let err = resolver
            .resolve(&VersionTag::new("v7.4"), Some(&DeviceType::new("rpi3")))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_resolve_ambiguous_without_device_type() {
        let resolver = resolver_with(vec![
            release(1, "rpi3", "v7.4.3"),
            release(2, "rpi4", "v7.4.3"),
        ]);

        let err = resolver
            .resolve(&VersionTag::new("v7.4.3"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::Ambiguous { count: 2, .. }));
    }

    #[test]
    fn test_release_filter_rendering() {
        let filter = ReleaseResolver::release_filter(
            &VersionTag::new("v7.4.3"),
            Some(&DeviceType::new("rpi3")),
        );
        assert_eq!(
            filter.to_odata(),
            "(supervisor_version eq 'v7.4.3') and (device_type eq 'rpi3')"
        );
    }
}

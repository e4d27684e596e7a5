//! Release pair planning
//!
//! For a from-tag and to-tag, finds the device types that have exactly one
//! release on each side. Device types with zero or several candidates on
//! either side are left out: moving an ambiguously matched release could
//! move the wrong segment of the fleet, so the planner does nothing there.

use crate::error::Result;
use crate::resolver::ReleaseResolver;
use std::collections::BTreeMap;
use switchover_types::{DeviceType, ReleasePair, SupervisorRelease, VersionTag};
use tracing::{debug, info};

/// A device type the planner could not pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedDeviceType {
    pub device_type: DeviceType,
    pub from_matches: usize,
    pub to_matches: usize,
}

/// Output of a planning pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleasePlan {
    pub pairs: Vec<ReleasePair>,
    pub skipped: Vec<SkippedDeviceType>,
}

/// Computes actionable release pairs per device type
#[derive(Clone)]
pub struct ReleasePairPlanner {
    resolver: ReleaseResolver,
}

impl ReleasePairPlanner {
    pub fn new(resolver: ReleaseResolver) -> Self {
        Self { resolver }
    }

    /// Actionable pairs for `from_tag` to `to_tag`
    pub async fn plan(
        &self,
        from_tag: &VersionTag,
        to_tag: &VersionTag,
        device_type: Option<&DeviceType>,
    ) -> Result<Vec<ReleasePair>> {
        Ok(self.plan_with_skips(from_tag, to_tag, device_type).await?.pairs)
    }

    /// Actionable pairs plus the device types that were dropped
    pub async fn plan_with_skips(
        &self,
        from_tag: &VersionTag,
        to_tag: &VersionTag,
        device_type: Option<&DeviceType>,
    ) -> Result<ReleasePlan> {
        let from = self.resolver.find_all(from_tag, device_type).await?;
        let to = self.resolver.find_all(to_tag, device_type).await?;

        let plan = pair_releases(from_tag, to_tag, &from, &to);
        info!(
            from_tag = %from_tag,
            to_tag = %to_tag,
            pairs = plan.pairs.len(),
            skipped = plan.skipped.len(),
            "Planned release pairs"
        );
        Ok(plan)
    }
}

/// Pair releases by device type
///
/// Pure part of planning. A pair is formed only for device types with
/// exactly one release in `from` and exactly one in `to`. Output is ordered
/// by device type.
pub fn pair_releases(
    from_tag: &VersionTag,
    to_tag: &VersionTag,
    from: &[SupervisorRelease],
    to: &[SupervisorRelease],
) -> ReleasePlan {
    let mut by_type: BTreeMap<&DeviceType, (Vec<&SupervisorRelease>, Vec<&SupervisorRelease>)> =
        BTreeMap::new();
    for release in from {
        by_type.entry(&release.device_type).or_default().0.push(release);
    }
    for release in to {
        by_type.entry(&release.device_type).or_default().1.push(release);
    }

    let mut plan = ReleasePlan::default();
    for (device_type, (from_matches, to_matches)) in by_type {
        match (from_matches.as_slice(), to_matches.as_slice()) {
            ([from_release], [to_release]) => plan.pairs.push(ReleasePair {
                device_type: device_type.clone(),
                from_tag: from_tag.clone(),
                from_release: from_release.id,
                to_tag: to_tag.clone(),
                to_release: to_release.id,
            }),
            _ => {
                debug!(
                    device_type = %device_type,
                    from_matches = from_matches.len(),
                    to_matches = to_matches.len(),
                    "Device type is not actionable"
                );
                plan.skipped.push(SkippedDeviceType {
                    device_type: device_type.clone(),
                    from_matches: from_matches.len(),
                    to_matches: to_matches.len(),
                });
            }
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
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

    #[test]
    fn test_pairs_unique_matches() {
        let from_tag = VersionTag::new("v7.4.3");
        let to_tag = VersionTag::new("v7.5.0");
        let from = vec![release(1, "rpi3", "v7.4.3"), release(2, "rpi4", "v7.4.3")];
        let to = vec![release(3, "rpi3", "v7.5.0"), release(4, "rpi4", "v7.5.0")];

        let plan = pair_releases(&from_tag, &to_tag, &from, &to);
        assert_eq!(plan.pairs.len(), 2);
        assert!(plan.skipped.is_empty());
        assert_eq!(plan.pairs[0].device_type, DeviceType::new("rpi3"));
        assert_eq!(plan.pairs[0].from_release, ReleaseId::new(1));
        assert_eq!(plan.pairs[0].to_release, ReleaseId::new(3));
    }

    #[test]
    fn test_skips_ambiguous_from_side() {
        let from_tag = VersionTag::new("v7.4.3");
        let to_tag = VersionTag::new("v7.5.0");
        let from = vec![release(1, "rpi3", "v7.4.3"), release(2, "rpi3", "v7.4.3")];
        let to = vec![release(3, "rpi3", "v7.5.0")];

        let plan = pair_releases(&from_tag, &to_tag, &from, &to);
        assert!(plan.pairs.is_empty());
        assert_eq!(
            plan.skipped,
            vec![SkippedDeviceType {
                device_type: DeviceType::new("rpi3"),
                from_matches: 2,
                to_matches: 1,
            }]
        );
    }

    #[test]
    fn test_skips_missing_to_side() {
        let from_tag = VersionTag::new("v7.4.3");
        let to_tag = VersionTag::new("v7.5.0");
        let from = vec![release(1, "rpi3", "v7.4.3")];

        let plan = pair_releases(&from_tag, &to_tag, &from, &[]);
        assert!(plan.pairs.is_empty());
        assert_eq!(plan.skipped[0].to_matches, 0);
    }

    #[tokio::test]
    async fn test_plan_scoped_to_device_type() {
        let registry = InMemoryRegistry::new();
        registry.insert_release(release(1, "rpi3", "v7.4.3"));
        registry.insert_release(release(2, "rpi4", "v7.4.3"));
        registry.insert_release(release(3, "rpi3", "v7.5.0"));
        registry.insert_release(release(4, "rpi4", "v7.5.0"));
        let planner = ReleasePairPlanner::new(ReleaseResolver::new(Arc::new(registry)));

        let pairs = planner
            .plan(
                &VersionTag::new("v7.4.3"),
                &VersionTag::new("v7.5.0"),
                Some(&DeviceType::new("rpi4")),
            )
            .await
            .unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].to_release, ReleaseId::new(4));
    }

    proptest! {
        /// A device type is paired iff it has exactly one release on each side.
        #[test]
        fn paired_iff_unique_on_both_sides(
            counts in prop::collection::vec((0usize..4, 0usize..4), 1..6),
        ) {
            let from_tag = VersionTag::new("v1.0.0");
            let to_tag = VersionTag::new("v2.0.0");
            let mut from = Vec::new();
            let mut to = Vec::new();
            let mut next_id = 1;

            for (i, (from_count, to_count)) in counts.iter().enumerate() {
                let dt = format!("type-{}", i);
                for _ in 0..*from_count {
                    from.push(release(next_id, &dt, "v1.0.0"));
                    next_id += 1;
                }
                for _ in 0..*to_count {
                    to.push(release(next_id, &dt, "v2.0.0"));
                    next_id += 1;
                }
            }

            let plan = pair_releases(&from_tag, &to_tag, &from, &to);

            for (i, (from_count, to_count)) in counts.iter().enumerate() {
                let dt = DeviceType::new(format!("type-{}", i));
                let paired = plan.pairs.iter().any(|p| p.device_type == dt);
                prop_assert_eq!(paired, *from_count == 1 && *to_count == 1);
            }
        }
    }
}

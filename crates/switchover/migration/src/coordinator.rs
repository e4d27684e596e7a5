//! Migration Coordinator - drives release pin changes end to end
//!
//! Two paths share the resolver, planner and eligibility predicate:
//!
//! - the single-device path verifies preconditions, writes on behalf of the
//!   device owner, re-reads the device to confirm the write and publishes a
//!   tombstone on the device's log channel;
//! - the batch path plans one release pair per device type and moves every
//!   eligible device of that type with one conditional patch authorised by
//!   the system credential. It does not re-read or notify.
//!
//! Independent operations run through a bounded pool of in-flight requests.
//! A failure is recorded against its own device or device type and never
//! stops its siblings.

use crate::auth::TokenProvider;
use crate::eligibility::{eligibility_filter, verify_precondition};
use crate::error::{MigrationError, Result};
use crate::notify::{LogLine, NotificationPublisher, DEFAULT_TOMBSTONE_MESSAGE, PUBLISH_OK};
use crate::outcome::{DeviceReport, MigrationOutcome, PairReport, RunReport, SkipReason};
use crate::planner::ReleasePairPlanner;
use crate::resolver::{exactly_one, ReleaseResolver};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use switchover_registry::{fields, DeviceQuery, DeviceRegistry, Filter, PatchStatus};
use switchover_types::{
    BatchEntry, Credential, Device, DeviceType, DeviceUuid, MigrationRequest, MigrationTarget,
    ReleaseId, ReleasePair, VersionTag,
};
use tracing::{debug, info, instrument, warn};

const DEVICE_RESOURCE: &str = "device";

/// Default number of registry operations in flight at once
pub const DEFAULT_MAX_IN_FLIGHT: usize = 8;

/// Coordinator configuration
///
/// Everything the coordinator needs from its environment is passed in here;
/// nothing is read from the process environment.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Credential for batch writes and owner token lookups
    pub system_credential: Credential,
    /// Upper bound on concurrent device or device-type operations
    pub max_in_flight: usize,
    /// Text of the tombstone log line
    pub tombstone_message: String,
}

impl CoordinatorConfig {
    pub fn new(system_credential: Credential) -> Self {
        Self {
            system_credential,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            tombstone_message: DEFAULT_TOMBSTONE_MESSAGE.to_string(),
        }
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    pub fn with_tombstone_message(mut self, message: impl Into<String>) -> Self {
        self.tombstone_message = message.into();
        self
    }
}

/// Migration Coordinator
pub struct MigrationCoordinator {
    /// Registry for reads and conditional writes
    registry: Arc<dyn DeviceRegistry>,
    /// Tag to release resolution
    resolver: ReleaseResolver,
    /// Per device type pairing for the batch path
    planner: ReleasePairPlanner,
    /// Owner credentials for the single-device path
    tokens: Arc<dyn TokenProvider>,
    /// Tombstone delivery
    notifier: Arc<dyn NotificationPublisher>,
    config: CoordinatorConfig,
}

impl MigrationCoordinator {
    /// Create a new coordinator
    pub fn new(
        registry: Arc<dyn DeviceRegistry>,
        tokens: Arc<dyn TokenProvider>,
        notifier: Arc<dyn NotificationPublisher>,
        config: CoordinatorConfig,
    ) -> Self {
        let resolver = ReleaseResolver::new(registry.clone());
        let planner = ReleasePairPlanner::new(resolver.clone());

        Self {
            registry,
            resolver,
            planner,
            tokens,
            notifier,
            config,
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Run one request to completion
    pub async fn run(&self, request: &MigrationRequest) -> Result<RunReport> {
        match &request.target {
            MigrationTarget::Device(uuid) => {
                let outcome = MigrationOutcome::from_result(
                    self.migrate_device(uuid, &request.from_tag, &request.to_tag, request.dry_run)
                        .await,
                );
                Ok(RunReport::Devices(vec![DeviceReport {
                    uuid: uuid.clone(),
                    outcome,
                }]))
            }
            MigrationTarget::Fleet { device_type } => {
                let reports = self
                    .reconcile(
                        &request.from_tag,
                        &request.to_tag,
                        device_type.as_ref(),
                        request.dry_run,
                    )
                    .await?;
                Ok(RunReport::Pairs(reports))
            }
        }
    }

    /// Migrate one device from `from_tag` to `to_tag`
    ///
    /// Returns `Verified` for a dry run, `Patched` once the new pin has been
    /// read back, or `NotificationFailed` when only the tombstone failed.
    /// Every other failure is an error.
    #[instrument(skip(self), fields(uuid = %uuid, from = %from_tag, to = %to_tag))]
    pub async fn migrate_device(
        &self,
        uuid: &DeviceUuid,
        from_tag: &VersionTag,
        to_tag: &VersionTag,
        dry_run: bool,
    ) -> Result<MigrationOutcome> {
        // 1. Read the device with its owner
        let device = self.read_device(uuid).await?;

        // 2. Resolve both releases for the device's type
        let from_release = match self
            .resolver
            .resolve(from_tag, Some(&device.device_type))
            .await
        {
            Ok(release) => Some(release.id),
            Err(MigrationError::NotFound { .. }) => {
                debug!("No from-release for this device type, expecting an unpinned device");
                None
            }
            Err(err) => return Err(err),
        };
        let to_release = self
            .resolver
            .resolve(to_tag, Some(&device.device_type))
            .await?
            .id;

        // 3. Check the device is where we expect it
        verify_precondition(&device, from_release, from_tag)?;

        if dry_run {
            info!(to_release = %to_release, "Preconditions hold, dry run stops here");
            return Ok(MigrationOutcome::Verified { candidates: 1 });
        }

        // 4. Authorise as the owner
        let credential = self.owner_credential(&device).await?;

        // 5. Patch only if the pin is still what we observed
        let observed = device.assigned_release;
        let filter = Filter::and([
            Filter::eq(fields::UUID, uuid),
            Filter::eq(fields::ASSIGNED_RELEASE, observed),
        ]);
        match self
            .registry
            .patch_devices(&filter, to_release, &credential)
            .await?
        {
            PatchStatus::Applied => {}
            PatchStatus::Rejected { status } => {
                return Err(MigrationError::PatchFailed {
                    scope: format!("UUID '{}'", uuid),
                    status,
                });
            }
        }

        // 6. Confirm the write took effect
        self.verify_postcondition(uuid, to_release).await?;
        info!(to_release = %to_release, "Device moved to new supervisor release");

        // 7. Tombstone on the log channel
        if device.logs_channel.is_some() {
            if let Err(err) = self.send_tombstone(uuid).await {
                warn!(error = %err, "Release changed but tombstone failed");
                return Ok(MigrationOutcome::NotificationFailed(err));
            }
        }

        Ok(MigrationOutcome::Patched)
    }

    /// Single-device path for several devices
    ///
    /// Reports come back in input order.
    pub async fn migrate_devices(
        &self,
        uuids: &[DeviceUuid],
        from_tag: &VersionTag,
        to_tag: &VersionTag,
        dry_run: bool,
    ) -> Vec<DeviceReport> {
        stream::iter(uuids.iter().cloned())
            .map(|uuid| async move {
                let outcome = MigrationOutcome::from_result(
                    self.migrate_device(&uuid, from_tag, to_tag, dry_run).await,
                );
                DeviceReport { uuid, outcome }
            })
            .buffered(self.config.max_in_flight)
            .collect()
            .await
    }

    /// Batch path: move every eligible device, one patch per device type
    ///
    /// With `count_only` nothing is written and each pair reports how many
    /// devices it would move. Fails only when planning itself fails.
    #[instrument(skip(self), fields(from = %from_tag, to = %to_tag))]
    pub async fn reconcile(
        &self,
        from_tag: &VersionTag,
        to_tag: &VersionTag,
        device_type: Option<&DeviceType>,
        count_only: bool,
    ) -> Result<Vec<PairReport>> {
        let plan = self
            .planner
            .plan_with_skips(from_tag, to_tag, device_type)
            .await?;

        let mut reports: Vec<PairReport> = stream::iter(plan.pairs.iter())
            .map(|pair| async move {
                PairReport::for_pair(pair, self.apply_pair(pair, count_only).await)
            })
            .buffered(self.config.max_in_flight)
            .collect()
            .await;

        reports.extend(
            plan.skipped
                .into_iter()
                .map(|skipped| PairReport::for_skipped(from_tag, to_tag, skipped)),
        );
        reports.sort_by(|a, b| a.device_type.cmp(&b.device_type));
        Ok(reports)
    }

    /// Batch path for each batch-file entry in turn
    pub async fn reconcile_batch(&self, entries: &[BatchEntry], count_only: bool) -> Vec<PairReport> {
        let mut reports = Vec::new();

        for entry in entries {
            let request = match entry.to_request() {
                Some(request) => request,
                None => {
                    debug!(?entry, "Incomplete batch entry");
                    reports.push(PairReport::unplanned(
                        entry.device_type.clone(),
                        &entry.from_tag.clone().unwrap_or_else(|| VersionTag::new("")),
                        &entry.to_tag.clone().unwrap_or_else(|| VersionTag::new("")),
                        MigrationOutcome::Skipped(SkipReason::IncompleteEntry),
                    ));
                    continue;
                }
            };

            match self
                .reconcile(
                    &request.from_tag,
                    &request.to_tag,
                    entry.device_type.as_ref(),
                    count_only,
                )
                .await
            {
                Ok(pair_reports) => reports.extend(pair_reports),
                Err(err) => {
                    warn!(error = %err, "Could not plan batch entry");
                    reports.push(PairReport::unplanned(
                        entry.device_type.clone(),
                        &request.from_tag,
                        &request.to_tag,
                        MigrationOutcome::Failed(err),
                    ));
                }
            }
        }

        reports
    }

    async fn apply_pair(&self, pair: &ReleasePair, count_only: bool) -> MigrationOutcome {
        let filter = eligibility_filter(pair);

        if count_only {
            return match self.registry.count_devices(&filter).await {
                Ok(candidates) => {
                    info!(pair = %pair, candidates, "Counted migration candidates");
                    MigrationOutcome::Verified { candidates }
                }
                Err(err) => MigrationOutcome::Failed(err.into()),
            };
        }

        match self
            .registry
            .patch_devices(&filter, pair.to_release, &self.config.system_credential)
            .await
        {
            Ok(PatchStatus::Applied) => {
                info!(pair = %pair, "Patched eligible devices");
                MigrationOutcome::Patched
            }
            Ok(PatchStatus::Rejected { status }) => {
                MigrationOutcome::Failed(MigrationError::PatchFailed {
                    scope: format!("device type '{}'", pair.device_type),
                    status,
                })
            }
            Err(err) => MigrationOutcome::Failed(err.into()),
        }
    }

    async fn read_device(&self, uuid: &DeviceUuid) -> Result<Device> {
        let filter = Filter::eq(fields::UUID, uuid);
        let devices = self
            .registry
            .devices(&filter, DeviceQuery::with_owner())
            .await?;
        exactly_one(devices, DEVICE_RESOURCE, &filter)
    }

    async fn owner_credential(&self, device: &Device) -> Result<Credential> {
        let username = device
            .owner_username()
            .ok_or_else(|| MigrationError::Authorization {
                uuid: device.uuid.clone(),
                reason: "device has no owner".to_string(),
            })?;

        self.tokens
            .token_for(username)
            .await
            .map_err(|err| MigrationError::Authorization {
                uuid: device.uuid.clone(),
                reason: err.to_string(),
            })
    }

    async fn verify_postcondition(&self, uuid: &DeviceUuid, expected: ReleaseId) -> Result<()> {
        let filter = Filter::and([
            Filter::eq(fields::UUID, uuid),
            Filter::eq(fields::ASSIGNED_RELEASE, expected),
        ]);

        match self.registry.devices(&filter, DeviceQuery::default()).await {
            Ok(devices) if devices.len() == 1 => Ok(()),
            Ok(devices) => {
                warn!(matches = devices.len(), "Postcondition read did not find the device");
                Err(MigrationError::PostconditionMismatch {
                    uuid: uuid.clone(),
                    expected,
                })
            }
            Err(err) => {
                warn!(error = %err, "Postcondition read failed");
                Err(MigrationError::PostconditionMismatch {
                    uuid: uuid.clone(),
                    expected,
                })
            }
        }
    }

    async fn send_tombstone(&self, uuid: &DeviceUuid) -> Result<()> {
        let channel = uuid.logs_channel();
        let lines = [LogLine::now(self.config.tombstone_message.as_str())];

        match self.notifier.publish(&channel, &lines).await {
            Ok(PUBLISH_OK) => {
                debug!(channel = %channel, "Tombstone published");
                Ok(())
            }
            Ok(status) => Err(MigrationError::NotificationFailed {
                channel,
                reason: format!("status code '{}'", status),
            }),
            Err(err) => Err(MigrationError::NotificationFailed {
                channel,
                reason: err.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthError;
    use crate::notify::PublishError;
    use async_trait::async_trait;
    use switchover_registry::{InMemoryRegistry, PatchBehavior};
    use switchover_types::SupervisorRelease;
    use tokio::sync::Mutex;

    struct StaticTokens;

    #[async_trait]
    impl TokenProvider for StaticTokens {
        async fn token_for(&self, username: &str) -> std::result::Result<Credential, AuthError> {
            Ok(Credential::bearer(format!("user-{}", username)))
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NotificationPublisher for RecordingPublisher {
        async fn publish(
            &self,
            channel: &str,
            _lines: &[LogLine],
        ) -> std::result::Result<u16, PublishError> {
            self.sent.lock().await.push(channel.to_string());
            Ok(PUBLISH_OK)
        }
    }

    fn release(id: u64, device_type: &str, tag: &str) -> SupervisorRelease {
        SupervisorRelease {
            id: ReleaseId::new(id),
            device_type: DeviceType::new(device_type),
            version_tag: VersionTag::new(tag),
            is_public: true,
        }
    }

    fn setup() -> (Arc<InMemoryRegistry>, Arc<RecordingPublisher>, MigrationCoordinator) {
        let registry = Arc::new(InMemoryRegistry::new());
        registry.insert_release(release(1, "rpi3", "v7.4.3"));
        registry.insert_release(release(2, "rpi3", "v7.5.0"));
        let publisher = Arc::new(RecordingPublisher::default());
        let coordinator = MigrationCoordinator::new(
            registry.clone(),
            Arc::new(StaticTokens),
            publisher.clone(),
            CoordinatorConfig::new(Credential::bearer("system")),
        );
        (registry, publisher, coordinator)
    }

    #[test]
    fn test_config_never_allows_zero_in_flight() {
        let config = CoordinatorConfig::new(Credential::bearer("system")).with_max_in_flight(0);
        assert_eq!(config.max_in_flight, 1);
        assert_eq!(config.tombstone_message, DEFAULT_TOMBSTONE_MESSAGE);
    }

    #[tokio::test]
    async fn test_device_without_owner_is_not_written() {
        let (registry, _, coordinator) = setup();
        registry.insert_device(Device::new("d1", "rpi3", "7.4.3"));

        let err = coordinator
            .migrate_device(
                &DeviceUuid::new("d1"),
                &VersionTag::new("v7.4.3"),
                &VersionTag::new("v7.5.0"),
                false,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, MigrationError::Authorization { .. }));
        assert!(registry.patches().await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_device_is_not_found() {
        let (_, _, coordinator) = setup();

        let err = coordinator
            .migrate_device(
                &DeviceUuid::new("ghost"),
                &VersionTag::new("v7.4.3"),
                &VersionTag::new("v7.5.0"),
                false,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::NotFound { resource: "device", .. }));
    }

    #[tokio::test]
    async fn test_rejected_patch_is_patch_failed() {
        let (registry, publisher, coordinator) = setup();
        registry.insert_device(
            Device::new("d1", "rpi3", "7.4.3")
                .with_owner("alice")
                .with_logs_channel("abc"),
        );
        registry
            .set_patch_behavior(PatchBehavior::Reject { status: 401 })
            .await;

        let err = coordinator
            .migrate_device(
                &DeviceUuid::new("d1"),
                &VersionTag::new("v7.4.3"),
                &VersionTag::new("v7.5.0"),
                false,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, MigrationError::PatchFailed { status: 401, .. }));
        assert!(publisher.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_no_tombstone_without_logs_channel() {
        let (registry, publisher, coordinator) = setup();
        registry.insert_device(Device::new("d1", "rpi3", "7.4.3").with_owner("alice"));

        let outcome = coordinator
            .migrate_device(
                &DeviceUuid::new("d1"),
                &VersionTag::new("v7.4.3"),
                &VersionTag::new("v7.5.0"),
                false,
            )
            .await
            .unwrap();

        assert!(matches!(outcome, MigrationOutcome::Patched));
        assert!(publisher.sent.lock().await.is_empty());
    }
}

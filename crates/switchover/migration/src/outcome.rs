//! Per-device and per-device-type outcomes
//!
//! Every device or device type a run touches ends with exactly one
//! [`MigrationOutcome`]. Failures are recorded here instead of aborting the
//! run.

use crate::error::MigrationError;
use crate::planner::SkippedDeviceType;
use switchover_types::{DeviceType, DeviceUuid, ReleaseId, ReleasePair, VersionTag};

/// Why nothing was written
#[derive(Debug)]
pub enum SkipReason {
    /// The device's state contradicts the run's assumptions
    Precondition(MigrationError),
    /// The device type lacks a unique release on one side
    NoReleasePair { from_matches: usize, to_matches: usize },
    /// A batch entry without both tags
    IncompleteEntry,
}

/// Final state of one migration target
#[derive(Debug)]
pub enum MigrationOutcome {
    Skipped(SkipReason),
    /// Preconditions hold and nothing was written; `candidates` devices
    /// would be moved
    Verified { candidates: usize },
    /// The release pin changed and, on the single-device path, was read back
    Patched,
    /// A lookup, read or write failed; no change is known to have happened
    Failed(MigrationError),
    /// The write reported success but the device is not on the target
    /// release
    PostconditionFailed(MigrationError),
    /// The release pin changed but the tombstone was not delivered
    NotificationFailed(MigrationError),
}

impl MigrationOutcome {
    /// Fold a single-device result into an outcome
    pub fn from_result(result: Result<MigrationOutcome, MigrationError>) -> Self {
        match result {
            Ok(outcome) => outcome,
            Err(err) if err.is_precondition() => {
                MigrationOutcome::Skipped(SkipReason::Precondition(err))
            }
            Err(err @ MigrationError::PostconditionMismatch { .. }) => {
                MigrationOutcome::PostconditionFailed(err)
            }
            Err(err) => MigrationOutcome::Failed(err),
        }
    }

    /// Whether the run achieved what was asked
    ///
    /// A failed tombstone still counts: the release change is committed.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            MigrationOutcome::Verified { .. }
                | MigrationOutcome::Patched
                | MigrationOutcome::NotificationFailed(_)
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            MigrationOutcome::Skipped(_) => "skipped",
            MigrationOutcome::Verified { .. } => "verified",
            MigrationOutcome::Patched => "patched",
            MigrationOutcome::Failed(_) => "failed",
            MigrationOutcome::PostconditionFailed(_) => "postcondition-failed",
            MigrationOutcome::NotificationFailed(_) => "notification-failed",
        }
    }

    /// Human readable detail for reports
    pub fn detail(&self) -> String {
        match self {
            MigrationOutcome::Skipped(SkipReason::Precondition(err)) => err.to_string(),
            MigrationOutcome::Skipped(SkipReason::NoReleasePair {
                from_matches,
                to_matches,
            }) => format!(
                "{} from-release(s) and {} to-release(s) match, expected one each",
                from_matches, to_matches
            ),
            MigrationOutcome::Skipped(SkipReason::IncompleteEntry) => {
                "entry needs both fromTag and toTag".to_string()
            }
            MigrationOutcome::Verified { candidates } => format!("{} candidate(s)", candidates),
            MigrationOutcome::Patched => String::new(),
            MigrationOutcome::Failed(err)
            | MigrationOutcome::PostconditionFailed(err)
            | MigrationOutcome::NotificationFailed(err) => err.to_string(),
        }
    }
}

/// Outcome for one device on the single-device path
#[derive(Debug)]
pub struct DeviceReport {
    pub uuid: DeviceUuid,
    pub outcome: MigrationOutcome,
}

/// Outcome for one device type on the batch path
#[derive(Debug)]
pub struct PairReport {
    pub device_type: Option<DeviceType>,
    pub from_tag: VersionTag,
    pub to_tag: VersionTag,
    pub from_release: Option<ReleaseId>,
    pub to_release: Option<ReleaseId>,
    pub outcome: MigrationOutcome,
}

impl PairReport {
    pub fn for_pair(pair: &ReleasePair, outcome: MigrationOutcome) -> Self {
        Self {
            device_type: Some(pair.device_type.clone()),
            from_tag: pair.from_tag.clone(),
            to_tag: pair.to_tag.clone(),
            from_release: Some(pair.from_release),
            to_release: Some(pair.to_release),
            outcome,
        }
    }

    pub fn for_skipped(from_tag: &VersionTag, to_tag: &VersionTag, skipped: SkippedDeviceType) -> Self {
        Self {
            device_type: Some(skipped.device_type),
            from_tag: from_tag.clone(),
            to_tag: to_tag.clone(),
            from_release: None,
            to_release: None,
            outcome: MigrationOutcome::Skipped(SkipReason::NoReleasePair {
                from_matches: skipped.from_matches,
                to_matches: skipped.to_matches,
            }),
        }
    }

    /// Report for a whole request that could not be planned
    pub fn unplanned(
        device_type: Option<DeviceType>,
        from_tag: &VersionTag,
        to_tag: &VersionTag,
        outcome: MigrationOutcome,
    ) -> Self {
        Self {
            device_type,
            from_tag: from_tag.clone(),
            to_tag: to_tag.clone(),
            from_release: None,
            to_release: None,
            outcome,
        }
    }
}

/// Everything one run produced
#[derive(Debug)]
pub enum RunReport {
    Devices(Vec<DeviceReport>),
    Pairs(Vec<PairReport>),
}

impl RunReport {
    pub fn all_succeeded(&self) -> bool {
        match self {
            RunReport::Devices(reports) => reports.iter().all(|r| r.outcome.is_success()),
            RunReport::Pairs(reports) => reports.iter().all(|r| {
                r.outcome.is_success() || matches!(r.outcome, MigrationOutcome::Skipped(_))
            }),
        }
    }
}

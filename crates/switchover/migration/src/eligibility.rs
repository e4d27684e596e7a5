//! Migration eligibility
//!
//! A device may move along a [`ReleasePair`] when either
//!
//! - it is pinned to the pair's from-release, or
//! - it is unpinned, of the pair's device type, and reports running the
//!   coerced form of the from-tag.
//!
//! The second branch catches devices that were never pinned but already run
//! the from version. The same predicate exists twice: as [`is_eligible`] for
//! a device in hand, and as [`eligibility_filter`] so the registry can apply
//! it at write time.

use crate::error::{MigrationError, Result};
use switchover_registry::{fields, Filter};
use switchover_types::{Device, ReleaseId, ReleasePair, VersionTag};

/// Whether `device` is a migration candidate for `pair`
pub fn is_eligible(device: &Device, pair: &ReleasePair) -> bool {
    if device.assigned_release == Some(pair.from_release) {
        return true;
    }

    match pair.from_tag.reported_form() {
        Some(expected) => {
            device.assigned_release.is_none()
                && device.device_type == pair.device_type
                && device.reported_version.as_deref() == Some(expected.as_str())
        }
        None => false,
    }
}

/// The eligibility predicate as a registry filter
pub fn eligibility_filter(pair: &ReleasePair) -> Filter {
    let pinned = Filter::eq(fields::ASSIGNED_RELEASE, pair.from_release);

    match pair.from_tag.reported_form() {
        Some(expected) => Filter::or([
            pinned,
            Filter::and([
                Filter::eq(fields::DEVICE_TYPE, &pair.device_type),
                Filter::eq(fields::ASSIGNED_RELEASE, None::<ReleaseId>),
                Filter::eq(fields::SUPERVISOR_VERSION, expected.as_str()),
            ]),
        ]),
        None => pinned,
    }
}

/// Check a single device before migrating it
///
/// Stricter than [`is_eligible`]: the pin must be absent or equal to
/// `from_release`, and the reported version must equal the coerced
/// from-tag even when the pin matches, since the reported version is what
/// the device actually runs.
pub fn verify_precondition(
    device: &Device,
    from_release: Option<ReleaseId>,
    from_tag: &VersionTag,
) -> Result<()> {
    if let Some(found) = device.assigned_release {
        if Some(found) != from_release {
            return Err(MigrationError::UnexpectedRelease {
                uuid: device.uuid.clone(),
                expected: from_release,
                found,
            });
        }
    }

    let expected = from_tag
        .reported_form()
        .ok_or_else(|| MigrationError::InvalidTag {
            tag: from_tag.clone(),
        })?;

    if device.reported_version.as_deref() != Some(expected.as_str()) {
        return Err(MigrationError::UnexpectedVersion {
            uuid: device.uuid.clone(),
            expected,
            found: device.reported_version.clone(),
        });
    }

    Ok(())
}

//! Migration error types

use switchover_registry::RegistryError;
use switchover_types::{DeviceUuid, ReleaseId, VersionTag};
use thiserror::Error;

/// Migration errors
///
/// Every variant carries enough context (uuid, tag, expected and observed
/// values) to be reported without consulting the log.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("No {resource} matches {filter}")]
    NotFound {
        resource: &'static str,
        filter: String,
    },

    #[error("{count} {resource} records match {filter}, expected exactly one")]
    Ambiguous {
        resource: &'static str,
        filter: String,
        count: usize,
    },

    #[error("Unexpected supervisor release on {uuid}: expected {}, found {found}", expected_pin(.expected))]
    UnexpectedRelease {
        uuid: DeviceUuid,
        expected: Option<ReleaseId>,
        found: ReleaseId,
    },

    #[error("Unexpected supervisor version on {uuid}: expected {expected}, found {}", .found.as_deref().unwrap_or("none"))]
    UnexpectedVersion {
        uuid: DeviceUuid,
        expected: String,
        found: Option<String>,
    },

    #[error("Tag '{tag}' does not contain a version number")]
    InvalidTag { tag: VersionTag },

    #[error("Cannot authorise as the owner of {uuid}: {reason}")]
    Authorization { uuid: DeviceUuid, reason: String },

    #[error("Patch request for {scope} was rejected with status {status}")]
    PatchFailed { scope: String, status: u16 },

    #[error("Device {uuid} is not on release {expected} after patching; it changed after the write")]
    PostconditionMismatch { uuid: DeviceUuid, expected: ReleaseId },

    #[error("Tombstone on {channel} failed: {reason}")]
    NotificationFailed { channel: String, reason: String },

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

fn expected_pin(release: &Option<ReleaseId>) -> String {
    match release {
        Some(id) => format!("{} or unpinned", id),
        None => "unpinned".to_string(),
    }
}

/// Fieldless discriminant of [`MigrationError`] for callers that branch on kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Ambiguous,
    UnexpectedRelease,
    UnexpectedVersion,
    InvalidTag,
    Authorization,
    PatchFailed,
    PostconditionMismatch,
    NotificationFailed,
    Registry,
}

impl MigrationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MigrationError::NotFound { .. } => ErrorKind::NotFound,
            MigrationError::Ambiguous { .. } => ErrorKind::Ambiguous,
            MigrationError::UnexpectedRelease { .. } => ErrorKind::UnexpectedRelease,
            MigrationError::UnexpectedVersion { .. } => ErrorKind::UnexpectedVersion,
            MigrationError::InvalidTag { .. } => ErrorKind::InvalidTag,
            MigrationError::Authorization { .. } => ErrorKind::Authorization,
            MigrationError::PatchFailed { .. } => ErrorKind::PatchFailed,
            MigrationError::PostconditionMismatch { .. } => ErrorKind::PostconditionMismatch,
            MigrationError::NotificationFailed { .. } => ErrorKind::NotificationFailed,
            MigrationError::Registry(_) => ErrorKind::Registry,
        }
    }

    /// Whether the device state contradicts what the run assumed
    ///
    /// These failures happen before any write and are never retried. A
    /// release or device that cannot be resolved is not one of them.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::UnexpectedRelease
                | ErrorKind::UnexpectedVersion
                | ErrorKind::InvalidTag
        )
    }
}

/// Result type for migration operations
pub type Result<T> = std::result::Result<T, MigrationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unexpected_release_message() {
        let err = MigrationError::UnexpectedRelease {
            uuid: DeviceUuid::new("d1"),
            expected: None,
            found: ReleaseId::new(8),
        };
        assert_eq!(
            err.to_string(),
            "Unexpected supervisor release on d1: expected unpinned, found 8"
        );
        assert_eq!(err.kind(), ErrorKind::UnexpectedRelease);
        assert!(err.is_precondition());
    }

    #[test]
    fn test_unexpected_version_message() {
        let err = MigrationError::UnexpectedVersion {
            uuid: DeviceUuid::new("d1"),
            expected: "7.4.3".into(),
            found: None,
        };
        assert_eq!(
            err.to_string(),
            "Unexpected supervisor version on d1: expected 7.4.3, found none"
        );
    }

    #[test]
    fn test_write_errors_are_not_preconditions() {
        let err = MigrationError::PatchFailed {
            scope: "UUID 'd1'".into(),
            status: 500,
        };
        assert!(!err.is_precondition());
        assert_eq!(err.kind(), ErrorKind::PatchFailed);
    }

    #[test]
    fn test_resolution_errors_are_not_preconditions() {
        let err = MigrationError::NotFound {
            resource: "supervisor release",
            filter: "supervisor_version eq 'v9.0.0'".into(),
        };
        assert!(!err.is_precondition());
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}

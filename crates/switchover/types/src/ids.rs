//! Strongly-typed identifiers for registry entities
//!
//! Registry ids are plain integers and device uuids are opaque hex strings,
//! but both are wrapped in newtype structs so they cannot be mixed up.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric id of a supervisor release row in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReleaseId(u64);

impl ReleaseId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ReleaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Device uuid as assigned by the registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceUuid(String);

impl DeviceUuid {
    pub fn new(uuid: impl Into<String>) -> Self {
        Self(uuid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Log channel a device's consumers subscribe to
    pub fn logs_channel(&self) -> String {
        format!("device-{}-logs", self.0)
    }
}

impl fmt::Display for DeviceUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceUuid {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for DeviceUuid {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Device type slug, e.g. `raspberrypi3`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceType(String);

impl DeviceType {
    pub fn new(slug: impl Into<String>) -> Self {
        Self(slug.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for DeviceType {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logs_channel_format() {
        let uuid = DeviceUuid::new("d1");
        assert_eq!(uuid.logs_channel(), "device-d1-logs");
    }

    #[test]
    fn test_release_id_serializes_as_number() {
        let json = serde_json::to_string(&ReleaseId::new(42)).unwrap();
        assert_eq!(json, "42");
    }
}

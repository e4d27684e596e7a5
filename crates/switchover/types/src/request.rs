//! Migration requests and batch-file entries

use crate::ids::{DeviceType, DeviceUuid};
use crate::release::VersionTag;
use serde::{Deserialize, Serialize};

/// What a migration run is aimed at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationTarget {
    /// A single device, migrated with owner attribution and verification
    Device(DeviceUuid),
    /// Every eligible device, optionally restricted to one device type
    Fleet { device_type: Option<DeviceType> },
}

/// One requested migration from `from_tag` to `to_tag`
///
/// For a device target `dry_run` stops after precondition verification; for
/// a fleet target it only counts candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRequest {
    pub target: MigrationTarget,
    pub from_tag: VersionTag,
    pub to_tag: VersionTag,
    pub dry_run: bool,
}

impl MigrationRequest {
    pub fn device(uuid: impl Into<DeviceUuid>, from_tag: &str, to_tag: &str) -> Self {
        Self {
            target: MigrationTarget::Device(uuid.into()),
            from_tag: VersionTag::new(from_tag),
            to_tag: VersionTag::new(to_tag),
            dry_run: false,
        }
    }

    pub fn fleet(device_type: Option<DeviceType>, from_tag: &str, to_tag: &str) -> Self {
        Self {
            target: MigrationTarget::Fleet { device_type },
            from_tag: VersionTag::new(from_tag),
            to_tag: VersionTag::new(to_tag),
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// One line of a batch file
///
/// Batch files are JSON arrays of `{"fromTag", "toTag", "device_type"}`
/// objects. Entries missing either tag are not actionable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchEntry {
    #[serde(rename = "fromTag", default)]
    pub from_tag: Option<VersionTag>,
    #[serde(rename = "toTag", default)]
    pub to_tag: Option<VersionTag>,
    #[serde(default)]
    pub device_type: Option<DeviceType>,
}

impl BatchEntry {
    /// The fleet request this entry describes, if it names both tags
    pub fn to_request(&self) -> Option<MigrationRequest> {
        match (&self.from_tag, &self.to_tag) {
            (Some(from), Some(to)) if !from.as_str().is_empty() && !to.as_str().is_empty() => {
                Some(MigrationRequest {
                    target: MigrationTarget::Fleet {
                        device_type: self.device_type.clone(),
                    },
                    from_tag: from.clone(),
                    to_tag: to.clone(),
                    dry_run: false,
                })
            }
            _ => None,
        }
    }
}

//! Supervisor releases and the version tags that name them

use crate::ids::{DeviceType, ReleaseId};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A supervisor release as published by the registry
///
/// Releases are immutable once created. There is one row per
/// (version tag, device type) combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorRelease {
    pub id: ReleaseId,
    pub device_type: DeviceType,
    /// Tag the release was built from, e.g. `v7.4.3` or `v7.4.3_logstream`
    #[serde(rename = "supervisor_version")]
    pub version_tag: VersionTag,
    #[serde(default)]
    pub is_public: bool,
}

/// A supervisor version tag
///
/// Tags are compared verbatim (after trimming surrounding whitespace). The
/// only normalisation applied anywhere is [`VersionTag::coerce`], which maps
/// a tag to the three-part version a running supervisor reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionTag(String);

impl VersionTag {
    pub fn new(tag: impl AsRef<str>) -> Self {
        Self(tag.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Coerce the tag into the version a device running it reports
    ///
    /// Finds the first run of digits and reads up to three dot-separated
    /// numeric components from it, defaulting missing ones to zero.
    /// Anything before or after is ignored, so `v7.4.3_logstream` coerces to
    /// `7.4.3` and `v8` to `8.0.0`. Returns `None` when the tag holds no
    /// number at all.
    pub fn coerce(&self) -> Option<Version> {
        let bytes = self.0.as_bytes();
        let mut start = 0;

        while start < bytes.len() {
            if !bytes[start].is_ascii_digit() {
                start += 1;
                continue;
            }

            let (major, mut pos) = read_component(bytes, start);
            let Some(major) = major else {
                // Overlong run; skip it entirely and keep scanning.
                start = pos;
                continue;
            };

            let mut parts = [major, 0, 0];
            for part in parts.iter_mut().skip(1) {
                if pos + 1 < bytes.len() && bytes[pos] == b'.' && bytes[pos + 1].is_ascii_digit() {
                    let (value, next) = read_component(bytes, pos + 1);
                    match value {
                        Some(v) => {
                            *part = v;
                            pos = next;
                        }
                        None => break,
                    }
                } else {
                    break;
                }
            }

            return Some(Version::new(parts[0], parts[1], parts[2]));
        }

        None
    }

    /// The coerced version rendered the way devices report it
    pub fn reported_form(&self) -> Option<String> {
        self.coerce().map(|v| v.to_string())
    }
}

/// Read one run of ASCII digits starting at `start`.
///
/// Returns the parsed value (or `None` if it does not fit) and the index just
/// past the run.
fn read_component(bytes: &[u8], start: usize) -> (Option<u64>, usize) {
    let mut end = start;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let digits = &bytes[start..end];
    if digits.len() > 16 {
        return (None, end);
    }
    let value = std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<u64>().ok());
    (value, end)
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VersionTag {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// The unique (from, to) release pairing for one device type
///
/// Only formed when exactly one release matches each tag for the device
/// type. Tags are carried for reporting; pairing is by device type alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleasePair {
    pub device_type: DeviceType,
    pub from_tag: VersionTag,
    pub from_release: ReleaseId,
    pub to_tag: VersionTag,
    pub to_release: ReleaseId,
}

impl fmt::Display for ReleasePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) to {} ({}) for type '{}'",
            self.from_tag, self.from_release, self.to_tag, self.to_release, self.device_type
        )
    }
}

//! Filter predicates over registry records
//!
//! A [`Filter`] is rendered to the registry's `$filter` syntax by the HTTP
//! backend and evaluated directly by the in-memory backend, so both agree on
//! which rows a read or patch touches.

use serde::{Deserialize, Serialize};
use std::fmt;
use switchover_types::{
    Device, DeviceType, DeviceUuid, ReleaseId, SupervisorRelease, VersionTag,
};

/// Registry field names
pub mod fields {
    pub const ID: &str = "id";
    pub const UUID: &str = "uuid";
    pub const DEVICE_TYPE: &str = "device_type";
    pub const SUPERVISOR_VERSION: &str = "supervisor_version";
    pub const ASSIGNED_RELEASE: &str = "should_be_managed_by__supervisor_release";
    pub const IS_PUBLIC: &str = "is_public";
}

/// A literal a field is compared against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    Null,
    Integer(u64),
    Text(String),
    Bool(bool),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str("null"),
            FieldValue::Integer(n) => write!(f, "{}", n),
            FieldValue::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            FieldValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<ReleaseId> for FieldValue {
    fn from(id: ReleaseId) -> Self {
        FieldValue::Integer(id.get())
    }
}

impl From<Option<ReleaseId>> for FieldValue {
    fn from(id: Option<ReleaseId>) -> Self {
        id.map(FieldValue::from).unwrap_or(FieldValue::Null)
    }
}

impl From<&DeviceUuid> for FieldValue {
    fn from(uuid: &DeviceUuid) -> Self {
        FieldValue::Text(uuid.as_str().to_string())
    }
}

impl From<&DeviceType> for FieldValue {
    fn from(dt: &DeviceType) -> Self {
        FieldValue::Text(dt.as_str().to_string())
    }
}

impl From<&VersionTag> for FieldValue {
    fn from(tag: &VersionTag) -> Self {
        FieldValue::Text(tag.as_str().to_string())
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

/// Predicate tree over named record fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Filter {
    /// Field equals the value; equality with `Null` means "is null"
    Eq(String, FieldValue),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<FieldValue>) -> Self {
        Filter::Eq(field.to_string(), value.into())
    }

    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::And(filters.into_iter().collect())
    }

    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Or(filters.into_iter().collect())
    }

    /// Render as an OData `$filter` expression
    pub fn to_odata(&self) -> String {
        match self {
            Filter::Eq(field, value) => format!("{} eq {}", field, value),
            Filter::And(parts) => join(parts, " and ", "true"),
            Filter::Or(parts) => join(parts, " or ", "false"),
        }
    }

    /// Evaluate against a record
    ///
    /// Unknown fields never match.
    pub fn matches<R: Filterable + ?Sized>(&self, record: &R) -> bool {
        match self {
            Filter::Eq(field, value) => record.field(field).as_ref() == Some(value),
            Filter::And(parts) => parts.iter().all(|p| p.matches(record)),
            Filter::Or(parts) => parts.iter().any(|p| p.matches(record)),
        }
    }
}

fn join(parts: &[Filter], sep: &str, empty: &str) -> String {
    match parts {
        [] => empty.to_string(),
        [single] => single.to_odata(),
        _ => parts
            .iter()
            .map(|p| format!("({})", p.to_odata()))
            .collect::<Vec<_>>()
            .join(sep),
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_odata())
    }
}

/// Records a [`Filter`] can be evaluated against
pub trait Filterable {
    /// Current value of `name`, or `None` if the record has no such field
    fn field(&self, name: &str) -> Option<FieldValue>;
}

impl Filterable for Device {
    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            fields::UUID => Some((&self.uuid).into()),
            fields::DEVICE_TYPE => Some((&self.device_type).into()),
            fields::SUPERVISOR_VERSION => Some(
                self.reported_version
                    .as_deref()
                    .map(FieldValue::from)
                    .unwrap_or(FieldValue::Null),
            ),
            fields::ASSIGNED_RELEASE => Some(self.assigned_release.into()),
            _ => None,
        }
    }
}

impl Filterable for SupervisorRelease {
    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            fields::ID => Some(self.id.into()),
            fields::DEVICE_TYPE => Some((&self.device_type).into()),
            fields::SUPERVISOR_VERSION => Some((&self.version_tag).into()),
            fields::IS_PUBLIC => Some(self.is_public.into()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_odata_rendering() {
        let filter = Filter::and([
            Filter::eq(fields::UUID, "d1"),
            Filter::eq(fields::ASSIGNED_RELEASE, None::<ReleaseId>),
        ]);
        assert_eq!(
            filter.to_odata(),
            "(uuid eq 'd1') and (should_be_managed_by__supervisor_release eq null)"
        );
    }

    #[test]
    fn test_odata_nested_or() {
        let filter = Filter::or([
            Filter::eq(fields::ASSIGNED_RELEASE, ReleaseId::new(5)),
            Filter::and([
                Filter::eq(fields::DEVICE_TYPE, "rpi3"),
                Filter::eq(fields::SUPERVISOR_VERSION, "7.4.3"),
            ]),
        ]);
        assert_eq!(
            filter.to_odata(),
            "(should_be_managed_by__supervisor_release eq 5) or \
             ((device_type eq 'rpi3') and (supervisor_version eq '7.4.3'))"
        );
    }

    #[test]
    fn test_odata_escapes_quotes() {
        let filter = Filter::eq(fields::DEVICE_TYPE, "o'brien");
        assert_eq!(filter.to_odata(), "device_type eq 'o''brien'");
    }

    #[test]
    fn test_matches_null_pin() {
        let device = Device::new("d1", "rpi3", "7.4.3");
        assert!(Filter::eq(fields::ASSIGNED_RELEASE, None::<ReleaseId>).matches(&device));
        assert!(!Filter::eq(fields::ASSIGNED_RELEASE, ReleaseId::new(1)).matches(&device));

        let pinned = device.with_assigned_release(ReleaseId::new(1));
        assert!(Filter::eq(fields::ASSIGNED_RELEASE, ReleaseId::new(1)).matches(&pinned));
        assert!(!Filter::eq(fields::ASSIGNED_RELEASE, None::<ReleaseId>).matches(&pinned));
    }

    #[test]
    fn test_unknown_field_never_matches() {
        let device = Device::new("d1", "rpi3", "7.4.3");
        assert!(!Filter::eq("nonexistent", "x").matches(&device));
    }

    #[test]
    fn test_empty_combinators() {
        let device = Device::new("d1", "rpi3", "7.4.3");
        assert!(Filter::and([]).matches(&device));
        assert!(!Filter::or([]).matches(&device));
    }
}

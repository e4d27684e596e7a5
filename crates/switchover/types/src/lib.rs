//! Switchover Types - Core data model for supervisor release migration
//!
//! This crate defines the records the migration engine reads from the device
//! registry and the value objects it passes around during one run:
//!
//! - **Identifiers**: [`ReleaseId`], [`DeviceUuid`], [`DeviceType`]
//! - **Registry records**: [`SupervisorRelease`], [`Device`]
//! - **Derived values**: [`ReleasePair`], [`VersionTag`]
//! - **Requests**: [`MigrationRequest`], [`BatchEntry`]
//!
//! Registry records are owned by the remote registry. Nothing in this crate
//! creates or mutates them; the engine only reads them and issues conditional
//! patches through `switchover-registry`.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod auth;
pub mod device;
pub mod ids;
pub mod release;
pub mod request;

// Re-exports
pub use auth::Credential;
pub use device::{Device, DeviceOwner};
pub use ids::{DeviceType, DeviceUuid, ReleaseId};
pub use release::{ReleasePair, SupervisorRelease, VersionTag};
pub use request::{BatchEntry, MigrationRequest, MigrationTarget};

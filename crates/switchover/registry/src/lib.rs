//! Switchover Registry - Resource queries against the device registry
//!
//! This crate provides the read/patch surface the migration engine needs:
//!
//! - **Filter**: a small predicate language shared by every backend
//! - **DeviceRegistry**: typed reads of releases and devices, and
//!   conditional patches of a device's release pin
//! - **HttpRegistry**: the remote registry's OData-style resource API
//! - **InMemoryRegistry**: a scriptable backend for tests and rehearsals
//!
//! ## Query semantics
//!
//! Reads return every row matching the filter, and an empty result is not an
//! error. Writes apply only to rows matching the filter at the time of the
//! write and report success or failure, never a row count. Callers translate
//! zero or multiple matches into their own errors and verify writes by
//! reading back.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod error;
pub mod filter;
pub mod http;
pub mod memory;
pub mod registry;

// Re-exports
pub use error::{RegistryError, Result};
pub use filter::{fields, FieldValue, Filter, Filterable};
pub use http::HttpRegistry;
pub use memory::{InMemoryRegistry, PatchBehavior, PatchRecord};
pub use registry::{DeviceQuery, DeviceRegistry, PatchStatus};

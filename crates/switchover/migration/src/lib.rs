//! Switchover Migration - Verified supervisor release migrations
//!
//! Moves devices from one supervisor release to another by rewriting their
//! release pin in the device registry.
//!
//! ## Components
//!
//! - **ReleaseResolver**: version tag to release lookup, exact match only
//! - **ReleasePairPlanner**: pairs from and to releases per device type,
//!   leaving ambiguous device types alone
//! - **Eligibility**: which devices may move along a release pair
//! - **MigrationCoordinator**: the single-device and batch paths
//!
//! ## Single-device path
//!
//! ```text
//! read device -> resolve releases -> verify precondition -> [dry run stops]
//!   -> owner token -> conditional patch -> read back -> tombstone
//! ```
//!
//! The patch is conditional on the pin observed during verification, so a
//! concurrent writer makes it match nothing; the read-back then reports a
//! postcondition mismatch instead of a false success.
//!
//! ## Batch path
//!
//! One conditional patch per device type, authorised by the system
//! credential, with no read-back and no tombstone.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod auth;
pub mod coordinator;
pub mod eligibility;
pub mod error;
pub mod notify;
pub mod outcome;
pub mod planner;
pub mod resolver;

// Re-exports
pub use auth::{AuthError, CachingTokenProvider, TokenProvider};
pub use coordinator::{CoordinatorConfig, MigrationCoordinator, DEFAULT_MAX_IN_FLIGHT};
pub use eligibility::{eligibility_filter, is_eligible, verify_precondition};
pub use error::{ErrorKind, MigrationError, Result};
pub use notify::{
    DisabledPublisher, LogLine, NotificationPublisher, PublishError, DEFAULT_TOMBSTONE_MESSAGE,
    PUBLISH_OK,
};
pub use outcome::{DeviceReport, MigrationOutcome, PairReport, RunReport, SkipReason};
pub use planner::{pair_releases, ReleasePairPlanner, ReleasePlan, SkippedDeviceType};
pub use resolver::ReleaseResolver;

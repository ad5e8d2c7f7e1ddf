//! Core domain models for the port picture.
//!
//! This module defines the fundamental data structures used throughout the
//! system: vessel records and identities, the canonical vessel table, the
//! scenario parameter table, and the shared error type.

pub mod domain;
pub mod error;
pub mod scenario;

pub use domain::{
    CanonicalTable, CanonicalVesselEntry, FeedRole, StatusCounts, VesselIdentity, VesselRecord,
    VesselStatus,
};
pub use error::{PortError, PortResult};
pub use scenario::{Metric, MetricRange, Scenario, ScenarioProfile, ScenarioTable};
